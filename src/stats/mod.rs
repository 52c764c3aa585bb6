//! Significance testing of treatment vs control
//!
//! Conversion uses a pooled two-proportion z-test reported as a 1-dof
//! chi-square. Every other metric uses Welch's unequal-variance t-test.
//! A comparison with fewer than two observations in either arm yields
//! [`Verdict::InsufficientData`] instead of numbers.

pub mod distribution;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::{ArmSamples, Metric};
use distribution::{normal_two_sided_p, student_t_critical, student_t_two_sided_p, Z_95};

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Minimum observations per arm for a test to run.
pub const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    ChiSquare,
    WelchT,
}

impl TestKind {
    pub fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Conversion => TestKind::ChiSquare,
            _ => TestKind::WelchT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::ChiSquare => "chi_square",
            TestKind::WelchT => "welch_t",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStatistics {
    pub test: TestKind,
    /// Chi-square for conversion, t otherwise. Infinite when variance is zero
    /// but the arms differ.
    #[serde(with = "non_finite")]
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Treatment minus control.
    pub absolute_lift: f64,
    /// Absolute lift over the control value; `None` when control is zero.
    pub relative_lift: Option<f64>,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Tested(TestStatistics),
    InsufficientData,
}

impl Verdict {
    pub fn statistics(&self) -> Option<&TestStatistics> {
        match self {
            Verdict::Tested(stats) => Some(stats),
            Verdict::InsufficientData => None,
        }
    }

    pub fn is_significant(&self) -> bool {
        self.statistics().is_some_and(|s| s.significant)
    }
}

/// One metric compared within one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub segment: String,
    pub sample_size_control: usize,
    pub sample_size_treatment: usize,
    /// Mean (or rate) per arm; `None` for an empty arm.
    pub control_value: Option<f64>,
    pub treatment_value: Option<f64>,
    pub verdict: Verdict,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Unbiased sample variance; needs at least two values.
fn sample_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn relative_lift(absolute: f64, control: f64) -> Option<f64> {
    (control != 0.0).then(|| absolute / control)
}

/// Pooled two-proportion test over 0/1 observations.
pub fn two_proportion_test(control: &[f64], treatment: &[f64]) -> Verdict {
    let (n1, n2) = (control.len(), treatment.len());
    if n1 < MIN_SAMPLES || n2 < MIN_SAMPLES {
        return Verdict::InsufficientData;
    }
    let (n1, n2) = (n1 as f64, n2 as f64);
    let x1: f64 = control.iter().sum();
    let x2: f64 = treatment.iter().sum();
    let (p1, p2) = (x1 / n1, x2 / n2);
    let diff = p2 - p1;

    let pooled = (x1 + x2) / (n1 + n2);
    let se_pooled = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();

    let (z, p_value) = if se_pooled > 0.0 {
        let z = diff / se_pooled;
        (z, normal_two_sided_p(z))
    } else if diff == 0.0 {
        (0.0, 1.0)
    } else {
        (f64::INFINITY, 0.0)
    };

    let se_unpooled = (p1 * (1.0 - p1) / n1 + p2 * (1.0 - p2) / n2).sqrt();

    Verdict::Tested(TestStatistics {
        test: TestKind::ChiSquare,
        statistic: z * z,
        degrees_of_freedom: 1.0,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
        absolute_lift: diff,
        relative_lift: relative_lift(diff, p1),
        ci_lower: diff - Z_95 * se_unpooled,
        ci_upper: diff + Z_95 * se_unpooled,
    })
}

/// Welch's unequal-variance t-test.
pub fn welch_t_test(control: &[f64], treatment: &[f64]) -> Verdict {
    let (n1, n2) = (control.len(), treatment.len());
    if n1 < MIN_SAMPLES || n2 < MIN_SAMPLES {
        return Verdict::InsufficientData;
    }
    let (Some(m1), Some(m2)) = (mean(control), mean(treatment)) else {
        return Verdict::InsufficientData;
    };
    let v1 = sample_variance(control, m1) / n1 as f64;
    let v2 = sample_variance(treatment, m2) / n2 as f64;
    let se_squared = v1 + v2;
    let diff = m2 - m1;

    let (t, df, p_value, margin) = if se_squared > 0.0 {
        let se = se_squared.sqrt();
        let df = se_squared.powi(2)
            / (v1.powi(2) / (n1 - 1) as f64 + v2.powi(2) / (n2 - 1) as f64);
        let t = diff / se;
        let margin = student_t_critical(df, SIGNIFICANCE_LEVEL) * se;
        (t, df, student_t_two_sided_p(t, df), margin)
    } else {
        let df = (n1 + n2 - 2) as f64;
        if diff == 0.0 {
            (0.0, df, 1.0, 0.0)
        } else {
            (f64::INFINITY.copysign(diff), df, 0.0, 0.0)
        }
    };

    Verdict::Tested(TestStatistics {
        test: TestKind::WelchT,
        statistic: t,
        degrees_of_freedom: df,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
        absolute_lift: diff,
        relative_lift: relative_lift(diff, m1),
        ci_lower: diff - margin,
        ci_upper: diff + margin,
    })
}

/// Compare one metric within one segment.
pub fn compare_metric(metric: Metric, segment: &str, samples: &ArmSamples) -> MetricComparison {
    let control = samples.control.get(metric);
    let treatment = samples.treatment.get(metric);

    let verdict = match TestKind::for_metric(metric) {
        TestKind::ChiSquare => two_proportion_test(control, treatment),
        TestKind::WelchT => welch_t_test(control, treatment),
    };

    MetricComparison {
        metric,
        segment: segment.to_string(),
        sample_size_control: control.len(),
        sample_size_treatment: treatment.len(),
        control_value: mean(control),
        treatment_value: mean(treatment),
        verdict,
    }
}

/// Every metric for every segment, segments in key order.
pub fn compare_all(groups: &BTreeMap<String, ArmSamples>) -> Vec<MetricComparison> {
    groups
        .iter()
        .flat_map(|(segment, samples)| {
            Metric::ALL
                .iter()
                .map(move |metric| compare_metric(*metric, segment, samples))
        })
        .collect()
}

/// Keeps signed infinities intact through JSON, which has no literal for them.
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
