//! Record cleaners
//!
//! One pure, total function per entity: `clean_*(raw, &ctx) -> Cleaned<T>`.
//! Cleaners never fail on dirty values. Flags are computed from the raw
//! values so they describe what was wrong, not what it became.
//!
//! Batches are cleaned on the rayon pool; output order matches input order.

pub mod contact_event;
pub mod dates;
pub mod funnel_stage;
pub mod lead;
pub mod outcome;

use rayon::prelude::*;

use crate::model::{Cleaned, ProcessingContext};

pub use contact_event::clean_contact_event;
pub use funnel_stage::clean_funnel_stage;
pub use lead::clean_lead;
pub use outcome::{clean_outcome, REVENUE_ARTIFACTS};

/// Clean a whole table in parallel, preserving row order.
pub fn clean_batch<R, T, F>(raw: &[R], ctx: &ProcessingContext, clean: F) -> Vec<Cleaned<T>>
where
    R: Sync,
    T: Send,
    F: Fn(&R, &ProcessingContext) -> Cleaned<T> + Sync,
{
    raw.par_iter().map(|record| clean(record, ctx)).collect()
}
