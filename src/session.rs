use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{error, info, warn};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::browser::{BrowseError, ElemHandle, PageAccessor};
use crate::config::{SearchQuery, Settings};
use crate::extractor::{JobExtractor, JobRecord, RESULT_ITEM, RESULT_LIST};
use crate::pacing::Pacer;
use crate::qualifier::{QualificationVerdict, Qualifier};

/// A record with its attached verdict; the unit handed to the result sink.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenedJob {
    pub record: JobRecord,
    pub verdict: QualificationVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    /// Safety cap reached.
    Completed,
    /// The result list ran out of items.
    Exhausted,
    /// Stopped by an external control signal.
    Cancelled,
    /// The result list never rendered; whatever was accumulated is kept.
    Aborted,
}

#[derive(Debug)]
pub struct SessionState {
    pub jobs: Vec<ScreenedJob>,
    /// Items attempted, including unusable ones.
    pub visited: usize,
    /// Items that yielded a record.
    pub processed: usize,
    pub qualified: usize,
    pub started_at: DateTime<Local>,
    pub status: SessionStatus,
}

/// Shared stop/pause flags. The session observes them at iteration
/// boundaries only; an in-flight item always finishes.
#[derive(Clone, Default)]
pub struct SessionControl {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn new() -> Self {
        SessionControl::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Blocks while paused. Returns false once a stop has been requested.
    fn may_continue(&self) -> bool {
        while self.paused() {
            if self.stop_requested() {
                return false;
            }
            thread::sleep(Duration::from_millis(500));
        }
        !self.stop_requested()
    }
}

/// Per-item failure the loop absorbs without aborting the session.
#[derive(Debug, Error)]
enum ItemFailure {
    #[error("click failed: {0}")]
    Click(BrowseError),
    #[error("detail view could not be read")]
    Extraction,
}

/// Drives one bounded scraping session over a search query.
pub struct Session {
    page: Box<dyn PageAccessor>,
    pacer: Pacer,
    extractor: JobExtractor,
    qualifier: Qualifier,
    query: SearchQuery,
    max_jobs: usize,
    wait_timeout: Duration,
}

impl Session {
    pub fn new(page: Box<dyn PageAccessor>, settings: &Settings, query: SearchQuery) -> Self {
        Session {
            page,
            pacer: Pacer::new(settings.safety.clone()),
            extractor: JobExtractor::new(&settings.browser),
            qualifier: Qualifier::new(settings.criteria.clone()),
            query,
            max_jobs: settings.safety.max_jobs_per_session,
            wait_timeout: Duration::from_secs(settings.browser.wait_timeout_secs),
        }
    }

    /// Runs the session to completion. The accessor is released on every
    /// exit path before the state is returned.
    pub fn run(mut self, control: &SessionControl) -> SessionState {
        let mut state = SessionState {
            jobs: Vec::new(),
            visited: 0,
            processed: 0,
            qualified: 0,
            started_at: Local::now(),
            status: SessionStatus::Aborted,
        };

        match self.open_result_list() {
            Ok(()) => {
                state.status = self.iterate(control, &mut state);
            }
            Err(e) => {
                error!("Session could not reach the result list: {}", e);
                state.status = SessionStatus::Aborted;
            }
        }

        self.page.close();
        info!(
            "Session finished: {:?} ({} visited, {} processed, {} qualified)",
            state.status, state.visited, state.processed, state.qualified
        );
        state
    }

    fn open_result_list(&self) -> Result<(), BrowseError> {
        let url = self.query.to_url();
        info!("Opening search: {}", url);
        self.page.navigate(&url)?;
        self.pacer.initial_settle();
        self.page.wait_for(RESULT_LIST, self.wait_timeout)
    }

    fn iterate(&mut self, control: &SessionControl, state: &mut SessionState) -> SessionStatus {
        let mut index = 0;
        let mut last_break_at = 0;

        loop {
            if !control.may_continue() {
                info!("Stop requested; draining session.");
                return SessionStatus::Cancelled;
            }
            if state.processed >= self.max_jobs {
                info!("Session cap of {} jobs reached.", self.max_jobs);
                return SessionStatus::Completed;
            }
            if state.processed != last_break_at && self.pacer.should_break(state.processed) {
                last_break_at = state.processed;
                self.pacer.take_break();
            }
            if state.visited > 0 {
                self.pacer.delay_between_jobs();
            }

            // The page re-renders list elements after each selection, so the
            // items are re-queried every iteration instead of being cached.
            let items = self.page.find_all(RESULT_ITEM);
            if index >= items.len() {
                info!("No more listings in the result list.");
                return SessionStatus::Exhausted;
            }

            info!(
                "Processing listing {} / {} (cap {})",
                index + 1,
                items.len(),
                self.max_jobs
            );

            self.idle_jitter(&items);
            self.pacer.short_pause();

            match self.process_item(&items[index]) {
                Ok(job) => {
                    info!(
                        "   {} | {} | {}",
                        job.record.title, job.record.company, job.record.location
                    );
                    info!(
                        "   English {:.2} | {} | {}",
                        job.verdict.english_score,
                        job.verdict.work_arrangement.label(),
                        job.verdict.rejection_reason
                    );
                    if job.verdict.qualified {
                        state.qualified += 1;
                    }
                    state.jobs.push(job);
                    state.processed += 1;
                    state.visited += 1;
                }
                Err(failure) => {
                    warn!("Listing {} skipped: {}", index + 1, failure);
                    state.visited += 1;
                    self.pacer.error_backoff();
                }
            }

            index += 1;

            // Bring the next listing into view so its click lands.
            if let Some(next) = self.page.find_all(RESULT_ITEM).get(index) {
                let _ = self.page.scroll_into_view(next);
            }
        }
    }

    fn process_item(&self, item: &ElemHandle) -> Result<ScreenedJob, ItemFailure> {
        self.page.click(item).map_err(ItemFailure::Click)?;
        self.pacer.detail_settle();
        let record = self
            .extractor
            .extract(self.page.as_ref())
            .ok_or(ItemFailure::Extraction)?;
        let verdict = self.qualifier.qualify(&record);
        Ok(ScreenedJob { record, verdict })
    }

    /// Small randomized scroll before interacting, approximating a human
    /// skimming the list. Failures are ignored.
    fn idle_jitter(&self, items: &[ElemHandle]) {
        let mut rng = rand::thread_rng();
        if !items.is_empty() && rng.gen_bool(0.5) {
            let pick = rng.gen_range(0..items.len());
            let _ = self.page.scroll_into_view(&items[pick]);
        }
    }
}
