//! Property tests for cleaning, deduplication, sequencing and the tests

use std::collections::HashMap;

use abxplore::cleaning::lead::{clean_annual_revenue, LEAD_REVENUE_CAP};
use abxplore::cleaning::outcome::{MAX_DAYS_TO_CLOSE, OUTCOME_REVENUE_CEILING};
use abxplore::cleaning::{clean_lead, clean_outcome};
use abxplore::dedup::deduplicate;
use abxplore::funnel::sequence_lead;
use abxplore::model::{
    CompanySize, FunnelStage, FunnelStageFlags, Lead, LeadFlags, ProcessingContext, RawLead,
    RawOutcome, StageName,
};
use abxplore::stats::{two_proportion_test, welch_t_test, Verdict};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

fn ctx() -> ProcessingContext {
    ProcessingContext::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

fn raw_lead_strategy() -> impl Strategy<Value = RawLead> {
    (
        "[A-Z][0-9]{1,5}",
        proptest::option::of("[A-Z][a-z]{2,9}"),
        "[A-Za-z]{1,8}@[a-z]{1,8}\\.com",
        proptest::option::of("[0-9 ().+-]{0,16}( ?(x|ext)[0-9]{1,4})?"),
        proptest::option::of(proptest::sample::select(vec!["small", "Medium", "LARGE", "enterprise", "tiny"])),
        proptest::option::of(-1.0e9..1.0e9_f64),
        proptest::option::of((0_i64..500, 0_u32..24, 0_u32..60)),
        proptest::option::of(proptest::sample::select(vec!["control", "test", "treatment", "holdout"])),
    )
        .prop_map(
            |(id, company, email, phone, size, revenue, created, group)| RawLead {
                lead_id: Some(id),
                company_name: company,
                contact_email: Some(email),
                contact_phone: phone,
                company_size: size.map(str::to_string),
                annual_revenue: revenue,
                created_at: created.map(|(d, h, m)| format!("{} {:02}:{:02}:00", day(d), h, m)),
                lead_group: group.map(str::to_string),
                ..Default::default()
            },
        )
}

fn lead(idx: usize, email_slot: u8, created: Option<i64>) -> Lead {
    Lead {
        lead_id: format!("L{idx:03}"),
        company_name: None,
        contact_email: format!("user{email_slot}@example.com"),
        contact_phone: None,
        industry: "Retail".to_string(),
        region: "Europe".to_string(),
        source_channel: "Website".to_string(),
        company_size: CompanySize::Small,
        annual_revenue: 0.0,
        lead_group: None,
        created_at: created.and_then(|d| day(d).and_hms_opt(9, 0, 0)),
        assigned_at: None,
        flags: LeadFlags::default(),
    }
}

fn stage(idx: usize, order: u8, date: Option<i64>) -> FunnelStage {
    FunnelStage {
        stage_id: Some(format!("S{idx:03}")),
        lead_id: "L1".to_string(),
        stage_name: StageName::ALL[usize::from(order) - 1],
        stage_order: order,
        stage_date: date.map(day),
        flags: FunnelStageFlags::default(),
    }
}

proptest! {
    #[test]
    fn cleaning_a_clean_lead_changes_nothing(raw in raw_lead_strategy()) {
        let ctx = ctx();
        let Some(first) = clean_lead(&raw, &ctx).kept() else {
            return Ok(());
        };
        let second = clean_lead(&RawLead::from(&first), &ctx)
            .kept()
            .expect("a cleaned lead is never dropped again");

        prop_assert!(first.same_values(&second), "{:?} != {:?}", first, second);
    }

    #[test]
    fn lead_revenue_stays_in_bounds(revenue in proptest::option::of(-1.0e12..1.0e12_f64)) {
        let cleaned = clean_annual_revenue(revenue);
        prop_assert!((0.0..=LEAD_REVENUE_CAP).contains(&cleaned));
    }

    #[test]
    fn outcomes_reconcile_conversion_with_revenue(
        converted in proptest::option::of(any::<bool>()),
        revenue in proptest::option::of(prop_oneof![
            -1.0e6..1.0e10_f64,
            Just(0.01),
            Just(999_999_999.0),
            Just(50_000_000.0),
        ]),
        days in proptest::option::of(-2_000_i64..2_000),
    ) {
        let raw = RawOutcome {
            outcome_id: Some("O1".to_string()),
            lead_id: Some("L1".to_string()),
            converted,
            revenue,
            outcome_date: None,
            days_to_close: days,
        };

        let outcome = clean_outcome(&raw, &ctx()).kept().unwrap();

        prop_assert!((0.0..=OUTCOME_REVENUE_CEILING).contains(&outcome.revenue));
        prop_assert_eq!(outcome.converted, outcome.revenue > 0.0);
        prop_assert_eq!(outcome.outcome_date.is_some(), outcome.converted);
        if let Some(days) = outcome.days_to_close {
            prop_assert!((1..=MAX_DAYS_TO_CLOSE).contains(&days));
        }
    }

    #[test]
    fn dedup_keeps_latest_lead_per_email(
        specs in proptest::collection::vec((0_u8..5, proptest::option::of(0_i64..60)), 0..40)
    ) {
        let leads: Vec<Lead> = specs
            .iter()
            .enumerate()
            .map(|(idx, (slot, created))| lead(idx, *slot, *created))
            .collect();

        let mut best: HashMap<String, (Option<NaiveDateTime>, String)> = HashMap::new();
        for l in &leads {
            let key = (l.created_at, l.lead_id.clone());
            best.entry(l.contact_email.clone())
                .and_modify(|current| if key > *current { *current = key.clone() })
                .or_insert(key);
        }

        let result = deduplicate(leads.clone());

        prop_assert_eq!(result.leads.len(), best.len());
        prop_assert_eq!(result.merged, leads.len() - best.len());
        for survivor in &result.leads {
            let (_, expected_id) = &best[&survivor.contact_email];
            prop_assert_eq!(&survivor.lead_id, expected_id);
        }
    }

    #[test]
    fn sequence_is_dense_and_gaps_non_negative(
        specs in proptest::collection::vec((1_u8..=7, proptest::option::of(0_i64..200)), 1..12)
    ) {
        let stages: Vec<FunnelStage> = specs
            .iter()
            .enumerate()
            .map(|(idx, (order, date))| stage(idx, *order, *date))
            .collect();

        let sequenced = sequence_lead(stages);

        prop_assert_eq!(sequenced.len(), specs.len());
        for (idx, s) in sequenced.iter().enumerate() {
            prop_assert_eq!(s.stage_sequence as usize, idx + 1);
            prop_assert_eq!(s.days_in_previous_stage.is_none(), s.stage_sequence == 1);
            prop_assert!(s.days_in_previous_stage.unwrap_or(0) >= 0);
        }
    }

    #[test]
    fn p_values_are_probabilities(
        control in proptest::collection::vec(-1.0e3..1.0e3_f64, 0..30),
        treatment in proptest::collection::vec(-1.0e3..1.0e3_f64, 0..30),
    ) {
        match welch_t_test(&control, &treatment) {
            Verdict::Tested(stats) => {
                prop_assert!((0.0..=1.0).contains(&stats.p_value));
                prop_assert!(stats.ci_lower <= stats.ci_upper);
                prop_assert_eq!(stats.significant, stats.p_value < 0.05);
            }
            Verdict::InsufficientData => {
                prop_assert!(control.len() < 2 || treatment.len() < 2);
            }
        }
    }

    #[test]
    fn proportion_test_bounds(
        control in proptest::collection::vec(any::<bool>(), 2..60),
        treatment in proptest::collection::vec(any::<bool>(), 2..60),
    ) {
        let as_rates = |v: &[bool]| v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect::<Vec<f64>>();

        let verdict = two_proportion_test(&as_rates(&control), &as_rates(&treatment));
        let stats = verdict.statistics().unwrap();

        prop_assert!((0.0..=1.0).contains(&stats.p_value));
        prop_assert!(stats.statistic >= 0.0);
        prop_assert!(stats.absolute_lift.abs() <= 1.0);
    }
}
