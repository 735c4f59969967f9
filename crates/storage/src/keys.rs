//! Deterministic blob key construction.
//!
//! The `{domain}/{owner_id}/{entity_id}/{filename}` layout is a stable
//! external contract: cleanup jobs and audits walk these prefixes.

use uuid::Uuid;

pub const SIMULATIONS_PREFIX: &str = "simulations";
pub const REPORTS_PREFIX: &str = "reports";

pub fn simulation_key(user_id: Uuid, job_id: Uuid, filename: &str) -> String {
    format!("{SIMULATIONS_PREFIX}/{user_id}/{job_id}/{filename}")
}

pub fn report_key(user_id: Uuid, report_id: Uuid, filename: &str) -> String {
    format!("{REPORTS_PREFIX}/{user_id}/{report_id}/{filename}")
}
