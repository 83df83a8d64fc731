use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::SafetyBudget;

const LEDGER_FILE: &str = "session_ledger.json";

/// Persisted record of session start times. Enforces the daily session cap
/// and the minimum spacing between sessions across process runs.
#[derive(Serialize, Deserialize, Default)]
pub struct SessionLedger {
    pub session_starts: Vec<DateTime<Local>>,
    #[serde(skip)]
    path: PathBuf,
}

impl SessionLedger {
    pub fn load() -> Self {
        Self::load_from(LEDGER_FILE)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path_buf = path.as_ref().to_path_buf();
        let mut ledger = if path.as_ref().exists() {
            Self::read_file(path.as_ref())
        } else {
            info!("No session ledger found. Starting fresh.");
            SessionLedger::default()
        };
        ledger.path = path_buf;
        ledger
    }

    fn read_file(path: &Path) -> Self {
        let mut content = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut content)) {
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read session ledger: {}", e);
                return SessionLedger::default();
            }
        }
        match serde_json::from_str::<SessionLedger>(&content) {
            Ok(ledger) => {
                info!("Session ledger: {} previous sessions.", ledger.session_starts.len());
                ledger
            }
            Err(e) => {
                error!("Failed to parse session ledger: {}. Starting fresh.", e);
                SessionLedger::default()
            }
        }
    }

    /// Checks the daily cap and minimum spacing before a new session starts.
    /// The returned reason is meant for the operator log.
    pub fn clearance(&self, budget: &SafetyBudget, now: DateTime<Local>) -> Result<(), String> {
        let today = self
            .session_starts
            .iter()
            .filter(|t| t.date_naive() == now.date_naive())
            .count() as u32;
        if budget.max_sessions_per_day > 0 && today >= budget.max_sessions_per_day {
            return Err(format!(
                "daily cap of {} sessions reached",
                budget.max_sessions_per_day
            ));
        }
        if let Some(last) = self.session_starts.iter().max() {
            let elapsed = now.signed_duration_since(*last);
            let required = Duration::seconds(budget.min_session_interval_secs as i64);
            if elapsed < required {
                return Err(format!(
                    "last session started {} minutes ago; minimum interval is {} minutes",
                    elapsed.num_minutes(),
                    required.num_minutes()
                ));
            }
        }
        Ok(())
    }

    pub fn record(&mut self, started_at: DateTime<Local>) {
        self.session_starts.push(started_at);
        self.save();
    }

    fn save(&self) {
        let json = match serde_json::to_string_pretty(self) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize session ledger: {}", e);
                return;
            }
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open session ledger for writing: {}", e);
                return;
            }
        };

        if let Err(e) = file.write_all(json.as_bytes()) {
            error!("Failed to write session ledger: {}", e);
        }
    }
}
