//! Command-level tests over temporary data directories

mod test_quality;
mod test_report;
mod test_run;

use std::path::Path;

/// Write a minimal but complete raw data directory.
pub fn write_raw_data(dir: &Path) {
    std::fs::write(
        dir.join("leads.csv"),
        "lead_id,company_name,industry,company_size,region,contact_email,contact_phone,annual_revenue,source_channel,created_at,group,assigned_at\n\
         1,Acme,Retail,small,Europe,a@example.com,(555) 123-4567,1200000,Website,2024-01-01 10:00:00,control,2024-01-02\n\
         2,Beta,Retail,medium,,b@example.com,555.123.4567 x12,-5,Referral,2024-01-03 11:00:00,test,\n\
         3,Test Co,Retail,large,Europe,c@example.com,,,Website,2024-01-04,control,\n\
         4,Gamma,Finance,Enterprise,Asia,A@Example.com,,900000000,Event,2024-02-01 08:00:00,control,\n\
         5,Delta,Finance,tiny,Asia,d@example.com,,50000,Event,2030-01-01 00:00:00,test,\n\
         6,Epsilon,Retail,small,Europe,e@example.com,,,Website,2024-01-05,test,\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("contact_events.csv"),
        "event_id,lead_id,event_date,contact_type,response_type\n\
         E1,2,2024-01-05,email,Interested\n\
         E2,4,2024-02-03,Phone Call,\n\
         E3,99,2024-02-03,Email,Responded\n\
         E4,,2024-02-03,Email,Responded\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("funnel_stages.csv"),
        "stage_id,lead_id,stage_name,stage_date,stage_order\n\
         S1,4,New,2024-02-01,1\n\
         S2,4,won,2024-03-01,6\n\
         S3,2,Contacted,2024-01-05,0\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("outcomes.csv"),
        "outcome_id,lead_id,converted,revenue,outcome_date,days_to_close\n\
         O1,4,0,999999999,2024-03-01,-29\n\
         O2,2,1,0.01,2024-02-01,0\n\
         O3,6,1,2500000,,900\n",
    )
    .unwrap();
}
