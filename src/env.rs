//! Process-wide collaborators, injected explicitly.
//!
//! The current date (for `date = "auto"`) and the progress sink are passed
//! in as one [`Environment`] value instead of being read from global state,
//! so tests can pin the clock and capture progress without side effects.

use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

/// Source of "today".
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock stuck on one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Collaborators shared by config resolution and the orchestrator.
#[derive(Clone)]
pub struct Environment {
    pub clock: Arc<dyn Clock>,
    pub progress: Option<ProgressCallback>,
}

impl Environment {
    /// System clock, no progress reporting.
    pub fn system() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            progress: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("clock", &"<dyn Clock>")
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}
