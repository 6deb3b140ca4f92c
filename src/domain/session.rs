use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use uuid::Uuid;

/// Engine-owned record of the current run. Mutated exactly when the UTC
/// date rolls (`current_run_dir` and `current_date` change together).
#[derive(Debug, Clone)]
pub struct Session {
    pub run_id: Uuid,
    pub run_name: String,
    pub session_start: DateTime<Utc>,
    pub current_date: NaiveDate,
    pub current_run_dir: PathBuf,
    pub data_output_root: PathBuf,
}
