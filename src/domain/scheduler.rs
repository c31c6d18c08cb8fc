//! Fixed-delay cycle scheduler.
//!
//! The next cycle starts `interval` after the previous one finishes, so two
//! cycles never overlap and a slow cycle simply pushes the schedule back.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::orchestrator::{CycleReport, Orchestrator};

/// Time source for the scheduler and the paper venue.
pub trait Clock: fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until the process exits.
    pub max_cycles: Option<u64>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Run cycles until `max_cycles` is reached. Returns the number run.
    pub fn run(
        &self,
        orchestrator: &mut Orchestrator<'_>,
        clock: &dyn Clock,
        mut on_cycle: impl FnMut(&CycleReport),
    ) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            max_cycles = ?self.max_cycles,
            "scheduler started"
        );
        let mut completed = 0u64;
        loop {
            if self.max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            let report = orchestrator.run_cycle(clock.now());
            on_cycle(&report);
            completed += 1;

            if self.max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            debug!(cycle = completed, "sleeping until next cycle");
            clock.sleep(self.interval);
        }
        info!(cycles = completed, "scheduler stopped");
        completed
    }
}
