//! Session lifecycle: run directory allocation and date-roll detection
//! (`spec.md` §4.5). Grounded in the teacher's `SessionManager`
//! (`application/risk_management/session_manager.rs`), which already
//! tracks a single mutex-guarded reference date and rolls a baseline on
//! date change; here the "baseline" is the on-disk run directory instead
//! of an equity figure.

use crate::domain::errors::EngineError;
use crate::domain::session::Session;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

pub struct SessionManager {
    data_output_root: PathBuf,
    state: Mutex<Session>,
}

impl SessionManager {
    /// Allocates `<dataOutputPath>/<YYYY-MM-DD>/run_<N>/` where `N` is one
    /// greater than the count of existing `run_*` siblings for today.
    pub fn initialize(data_output_root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let data_output_root = data_output_root.into();
        let now = Utc::now();
        let today = now.date_naive();

        let run_name = Self::allocate_run_name(&data_output_root, today)?;
        let current_run_dir = Self::date_dir(&data_output_root, today).join(&run_name);
        std::fs::create_dir_all(&current_run_dir).map_err(|e| {
            EngineError::wrap(
                format!("failed to create run directory {:?}", current_run_dir),
                e.into(),
            )
        })?;

        let session = Session {
            run_id: Uuid::new_v4(),
            run_name,
            session_start: now,
            current_date: today,
            current_run_dir,
            data_output_root: data_output_root.clone(),
        };

        info!(
            "session initialized: run_id={} dir={:?}",
            session.run_id, session.current_run_dir
        );

        Ok(Self {
            data_output_root,
            state: Mutex::new(session),
        })
    }

    fn date_dir(root: &Path, date: NaiveDate) -> PathBuf {
        root.join(date.format("%Y-%m-%d").to_string())
    }

    fn allocate_run_name(root: &Path, date: NaiveDate) -> Result<String, EngineError> {
        let date_dir = Self::date_dir(root, date);
        let mut existing = 0usize;
        if date_dir.exists() {
            for entry in std::fs::read_dir(&date_dir).map_err(|e| {
                EngineError::wrap(format!("failed to list {:?}", date_dir), e.into())
            })? {
                let entry = entry.map_err(|e| EngineError::wrap("failed to read dir entry", e.into()))?;
                if entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("run_")
                {
                    existing += 1;
                }
            }
        }
        Ok(format!("run_{}", existing + 1))
    }

    /// If `candle_time`'s UTC date differs from the current one, creates
    /// the new date's `run_<sameName>/` folder and swaps `current_run_dir`.
    /// Returns whether a roll occurred.
    pub fn handle_date_boundary(&self, candle_time: DateTime<Utc>) -> Result<bool, EngineError> {
        let new_date = candle_time.date_naive();
        let mut session = self.state.lock();
        if new_date == session.current_date {
            return Ok(false);
        }

        let new_dir = Self::date_dir(&self.data_output_root, new_date).join(&session.run_name);
        std::fs::create_dir_all(&new_dir).map_err(|e| {
            EngineError::wrap(format!("failed to create run directory {:?}", new_dir), e.into())
        })?;

        info!(
            "session rolled to new date: {} -> {} (dir={:?})",
            session.current_date, new_date, new_dir
        );

        session.current_date = new_date;
        session.current_run_dir = new_dir;
        Ok(true)
    }

    pub fn run_id(&self) -> Uuid {
        self.state.lock().run_id
    }

    pub fn run_name(&self) -> String {
        self.state.lock().run_name.clone()
    }

    pub fn current_run_path(&self) -> PathBuf {
        self.state.lock().current_run_dir.clone()
    }

    pub fn current_date(&self) -> NaiveDate {
        self.state.lock().current_date
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.state.lock().session_start
    }

    pub fn join_path(&self, file_name: &str) -> PathBuf {
        self.current_run_path().join(file_name)
    }

    pub fn list_runs_for_date(&self, date: NaiveDate) -> Vec<String> {
        let date_dir = Self::date_dir(&self.data_output_root, date);
        let Ok(entries) = std::fs::read_dir(&date_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("run_"))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn list_all_dates(&self) -> Vec<NaiveDate> {
        let Ok(entries) = std::fs::read_dir(&self.data_output_root) else {
            return Vec::new();
        };
        let mut dates: Vec<NaiveDate> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                NaiveDate::parse_from_str(&e.file_name().to_string_lossy(), "%Y-%m-%d").ok()
            })
            .collect();
        dates.sort();
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_of_the_day_is_run_1() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::initialize(dir.path()).unwrap();
        assert_eq!(mgr.run_name(), "run_1");
    }

    #[test]
    fn run_numbering_accounts_for_existing_siblings() {
        let dir = tempdir().unwrap();
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        std::fs::create_dir_all(dir.path().join(&today).join("run_1")).unwrap();
        std::fs::create_dir_all(dir.path().join(&today).join("run_2")).unwrap();

        let mgr = SessionManager::initialize(dir.path()).unwrap();
        assert_eq!(mgr.run_name(), "run_3");
    }

    #[test]
    fn date_boundary_rolls_directory_and_keeps_run_name() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::initialize(dir.path()).unwrap();
        let run_name = mgr.run_name();

        let tomorrow = Utc::now() + chrono::Duration::days(1);
        let rolled = mgr.handle_date_boundary(tomorrow).unwrap();
        assert!(rolled);
        assert_eq!(mgr.run_name(), run_name);
        assert!(mgr.current_run_path().exists());
        assert_eq!(mgr.current_date(), tomorrow.date_naive());
    }

    #[test]
    fn same_date_does_not_roll() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::initialize(dir.path()).unwrap();
        let rolled = mgr.handle_date_boundary(Utc::now()).unwrap();
        assert!(!rolled);
    }
}
