use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

use crate::config::SafetyBudget;

/// Draws randomized waits from the configured [`SafetyBudget`]. Holds no
/// state beyond the bounds; the orchestrator decides when each wait applies.
pub struct Pacer {
    budget: SafetyBudget,
}

impl Pacer {
    pub fn new(budget: SafetyBudget) -> Self {
        Pacer { budget }
    }

    /// True when `processed` is a positive multiple of the break cadence.
    pub fn should_break(&self, processed: usize) -> bool {
        self.budget.break_after > 0 && processed > 0 && processed % self.budget.break_after == 0
    }

    pub fn take_break(&self) {
        self.sleep_range("Session break", self.budget.break_duration);
    }

    pub fn delay_between_jobs(&self) {
        self.sleep_range("Job delay", self.budget.delay_between_jobs);
    }

    pub fn short_pause(&self) {
        self.sleep_range("Pause", self.budget.short_pause);
    }

    pub fn detail_settle(&self) {
        self.sleep_range("Detail settle", self.budget.detail_settle);
    }

    pub fn initial_settle(&self) {
        self.sleep_range("Page settle", self.budget.initial_settle);
    }

    /// Extended delay applied after a failed item before moving on.
    pub fn error_backoff(&self) {
        self.sleep_range("Error backoff", self.budget.error_backoff);
    }

    fn sleep_range(&self, label: &str, (min, max): (f64, f64)) {
        let min = min.max(0.0);
        let max = max.max(min);
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if secs > 0.0 {
            info!("Waiting {:.1}s ({})...", secs, label);
            thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}
