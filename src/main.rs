use job_screener_lib::browser::ChromePage;
use job_screener_lib::session::SessionStatus;
use job_screener_lib::{input_loader, logger, sink};
use job_screener_lib::{SearchQuery, Session, SessionControl, SessionLedger, Settings};

use std::error::Error;
use std::io::BufRead;
use std::path::Path;

use chrono::Local;
use log::{error, info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    info!("Starting Job Screener...");

    // 1. Load Settings (first CLI argument, else the default path)
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "screener_config.json".to_string());
    let settings = Settings::load(&settings_path);

    // 2. Resolve Queries (file when configured, else the default query)
    let queries: Vec<SearchQuery> = match &settings.queries_file {
        Some(path) => {
            let loaded = input_loader::load_queries(path, &settings.search);
            if loaded.is_empty() {
                error!(
                    "No queries found in {}. Expected headers: Keywords, Location (plus optional filters).",
                    path
                );
                return Ok(());
            }
            loaded
        }
        None => vec![settings.search.clone()],
    };

    // 3. Load Session Ledger
    let mut session_ledger = SessionLedger::load();

    // 4. Optional manual login hold (visible browser only)
    if !settings.browser.headless {
        println!("Log in to the job site in the browser window that opens,");
        println!("then press Enter here to start screening...");
    }

    let total = queries.len();
    let control = SessionControl::new();

    for (i, query) in queries.iter().enumerate() {
        if let Err(reason) = session_ledger.clearance(&settings.safety, Local::now()) {
            warn!(
                "Skipping {} remaining query(ies): {}",
                total - i,
                reason
            );
            break;
        }

        info!(
            "Query {} / {}: '{}' in '{}'",
            i + 1,
            total,
            query.keywords,
            query.location
        );

        let page = match ChromePage::launch(&settings.browser) {
            Ok(p) => p,
            Err(e) => {
                error!("Could not start the browser: {}", e);
                return Err(Box::new(e));
            }
        };

        if !settings.browser.headless && i == 0 {
            // Block until the operator confirms the logged-in session.
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
        }

        let session = Session::new(Box::new(page), &settings, query.clone());
        let state = session.run(&control);
        session_ledger.record(state.started_at);

        if state.status == SessionStatus::Aborted && state.jobs.is_empty() {
            warn!("Session aborted before any listing was captured.");
            continue;
        }

        if state.jobs.is_empty() {
            warn!("No job records captured for this query.");
            continue;
        }

        let run_dir = Path::new(&settings.output_dir)
            .join(format!("jobs_{}", state.started_at.format("%Y%m%d_%H%M%S")));
        match sink::write_workbook(&state.jobs, &run_dir) {
            Ok(files) => {
                sink::log_summary(&state.jobs);
                for file in files {
                    info!("Saved {:?}", file);
                }
            }
            Err(e) => {
                error!("Failed to write results: {}", e);
            }
        }
    }

    info!("Job Screener finished.");
    Ok(())
}
