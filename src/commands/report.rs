//! A/B report from a saved `results.json`

use std::fmt::Write;
use std::path::Path;

use crate::error::Result;
use crate::io::read_results;
use crate::pipeline::ResultsDocument;
use crate::stats::{MetricComparison, Verdict};

fn format_value(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_p(p: f64) -> String {
    if p < 0.0001 {
        "<0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}

fn render_row(out: &mut String, c: &MetricComparison) {
    let segment: String = c.segment.chars().take(16).collect();
    let prefix = format!(
        "{:18} {:16} {:>6} {:>6} {:>11} {:>11}",
        c.metric.as_str(),
        segment,
        c.sample_size_control,
        c.sample_size_treatment,
        format_value(c.control_value),
        format_value(c.treatment_value),
    );

    match &c.verdict {
        Verdict::Tested(stats) => {
            let relative = stats
                .relative_lift
                .map(|r| format!("{:+.1}%", r * 100.0))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{} {:>11} {:>8} {:>8} {:>4}",
                prefix,
                format!("{:+.4}", stats.absolute_lift),
                relative,
                format_p(stats.p_value),
                if stats.significant { "yes" } else { "no" }
            );
            let _ = writeln!(
                out,
                "  {} = {:.4} (df {:.1}), 95% CI [{:.4}, {:.4}]",
                stats.test.as_str(),
                stats.statistic,
                stats.degrees_of_freedom,
                stats.ci_lower,
                stats.ci_upper
            );
        }
        Verdict::InsufficientData => {
            let _ = writeln!(out, "{} {:>11}", prefix, "insufficient data");
        }
    }
}

/// Render the comparison table. With `only_significant`, untested and
/// non-significant rows are left out.
pub fn render_report(document: &ResultsDocument, only_significant: bool) -> String {
    let mut out = String::new();
    let segment = document
        .segment
        .map(|s| s.as_str())
        .unwrap_or("none");
    let header = format!(
        "🧪 A/B report, processing date {} (segment: {}, {} leads)",
        document.processing_date, segment, document.lead_count
    );
    let _ = writeln!(out, "{}", header);
    let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));

    let rows: Vec<&MetricComparison> = document
        .comparisons
        .iter()
        .filter(|c| !only_significant || c.verdict.is_significant())
        .collect();

    if rows.is_empty() {
        let _ = writeln!(out, "No comparisons match the given filters.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:18} {:16} {:>6} {:>6} {:>11} {:>11} {:>11} {:>8} {:>8} {:>4}",
        "Metric", "Segment", "n ctl", "n trt", "Control", "Treatment", "Lift", "Rel", "p", "Sig"
    );
    for comparison in rows {
        render_row(&mut out, comparison);
    }
    out
}

/// Print A/B test report to stdout.
pub fn print_report(document: &ResultsDocument, only_significant: bool) {
    print!("{}", render_report(document, only_significant));
}

/// Load `results.json` and print the report.
pub fn run(results_path: &Path, only_significant: bool) -> Result<ResultsDocument> {
    let document = read_results(results_path)?;
    print_report(&document, only_significant);
    Ok(document)
}
