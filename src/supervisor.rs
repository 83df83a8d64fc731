use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Local;
use job_screener_lib::browser::ChromePage;
use job_screener_lib::session::ScreenedJob;
use job_screener_lib::{input_loader, sink};
use job_screener_lib::{
    SearchQuery, Session, SessionControl, SessionLedger, SessionStatus, Settings,
};

#[derive(Clone, serde::Serialize)]
pub struct RunStatus {
    pub id: String,
    pub status: String, // "queued", "running", "paused", "stopped", "completed", "failed"
    pub total_queries: usize,
    pub current_query: String,
    pub visited: usize,
    pub processed: usize,
    pub qualified: usize,
    pub logs: Vec<String>,
}

pub struct RunHandle {
    pub status: RunStatus,
    pub control: SessionControl,
}

/// Owns the screening worker threads and their shared status map.
pub struct Supervisor {
    pub runs: Arc<Mutex<HashMap<String, RunHandle>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor {
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn start_run(
        &self,
        run_id: String,
        settings: Settings,
        queries_path: Option<PathBuf>,
        output_dir: PathBuf,
    ) -> String {
        let control = SessionControl::new();
        let handle = RunHandle {
            status: RunStatus {
                id: run_id.clone(),
                status: "queued".to_string(),
                total_queries: 0,
                current_query: "Initializing...".to_string(),
                visited: 0,
                processed: 0,
                qualified: 0,
                logs: vec!["Run started.".to_string()],
            },
            control: control.clone(),
        };

        self.runs.lock().unwrap().insert(run_id.clone(), handle);

        let runs_arc = self.runs.clone();
        let id_clone = run_id.clone();

        thread::spawn(move || {
            Self::run_screening(id_clone, runs_arc, control, settings, queries_path, output_dir);
        });

        run_id
    }

    pub fn send_control(&self, run_id: &str, signal: &str) -> bool {
        let mut guard = self.runs.lock().unwrap();
        if let Some(run) = guard.get_mut(run_id) {
            match signal {
                "pause" => {
                    run.control.request_pause();
                    run.status.status = "paused".to_string(); // Immediate feedback
                }
                "resume" => {
                    run.control.resume();
                    if run.status.status == "paused" {
                        run.status.status = "running".to_string();
                    }
                }
                "stop" => {
                    run.control.request_stop();
                    // Unblock a paused session so the stop can land.
                    run.control.resume();
                }
                _ => return false,
            }
            return true;
        }
        false
    }

    pub fn status_of(&self, run_id: &str) -> Option<RunStatus> {
        self.runs
            .lock()
            .unwrap()
            .get(run_id)
            .map(|run| run.status.clone())
    }

    fn run_screening(
        run_id: String,
        runs: Arc<Mutex<HashMap<String, RunHandle>>>,
        control: SessionControl,
        settings: Settings,
        queries_path: Option<PathBuf>,
        output_dir: PathBuf,
    ) {
        let update = |status: &str, query: &str, log: Option<String>| {
            let mut guard = runs.lock().unwrap();
            if let Some(run) = guard.get_mut(&run_id) {
                if !status.is_empty() {
                    run.status.status = status.to_string();
                }
                if !query.is_empty() {
                    run.status.current_query = query.to_string();
                }
                if let Some(msg) = log {
                    run.status.logs.push(msg);
                    if run.status.logs.len() > 50 {
                        run.status.logs.remove(0);
                    }
                }
            }
        };

        // Resolve Queries
        let queries: Vec<SearchQuery> = match &queries_path {
            Some(path) => input_loader::load_queries(path, &settings.search),
            None => vec![settings.search.clone()],
        };

        if queries.is_empty() {
            update("failed", "", Some("No queries found in the uploaded file.".to_string()));
            return;
        }

        {
            let mut guard = runs.lock().unwrap();
            if let Some(run) = guard.get_mut(&run_id) {
                run.status.total_queries = queries.len();
                run.status.status = "running".to_string();
            }
        }

        let mut session_ledger = SessionLedger::load();
        let mut collected: Vec<ScreenedJob> = Vec::new();

        for (i, query) in queries.iter().enumerate() {
            if control.stop_requested() {
                update("stopped", "", Some("Run stopped by operator.".to_string()));
                return;
            }

            if let Err(reason) = session_ledger.clearance(&settings.safety, Local::now()) {
                update(
                    "",
                    "",
                    Some(format!("Skipping {} remaining query(ies): {}", queries.len() - i, reason)),
                );
                break;
            }

            update(
                "",
                &query.keywords,
                Some(format!("Query {} / {}: {}", i + 1, queries.len(), query.keywords)),
            );

            let page = match ChromePage::launch(&settings.browser) {
                Ok(p) => p,
                Err(e) => {
                    update("failed", "", Some(format!("Browser launch failed: {}", e)));
                    return;
                }
            };

            let session = Session::new(Box::new(page), &settings, query.clone());
            let state = session.run(&control);
            session_ledger.record(state.started_at);

            {
                let mut guard = runs.lock().unwrap();
                if let Some(run) = guard.get_mut(&run_id) {
                    run.status.visited += state.visited;
                    run.status.processed += state.processed;
                    run.status.qualified += state.qualified;
                }
            }

            update(
                "",
                "",
                Some(format!(
                    "Session {:?}: {} visited, {} processed, {} qualified",
                    state.status, state.visited, state.processed, state.qualified
                )),
            );

            let cancelled = state.status == SessionStatus::Cancelled;
            collected.extend(state.jobs);

            // Flush after every session so partial results stay downloadable.
            if let Err(e) = sink::write_workbook(&collected, &output_dir) {
                update("", "", Some(format!("Failed to write results: {}", e)));
            }

            if cancelled {
                update("stopped", "", Some("Run stopped by operator.".to_string()));
                return;
            }
        }

        update("completed", "Done", Some("All queries processed.".to_string()));
    }
}
