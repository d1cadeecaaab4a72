//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::env::Environment::with_progress`] to receive events as the
//! orchestrator works through a batch. The trait is `Send + Sync` because
//! jobs run concurrently: `on_job_start`, `on_job_complete` and
//! `on_job_error` may be called from different tasks at the same time.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{BatchProgressCallback, Environment, Job};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, job: &Job, bytes_written: usize) {
//!         self.written.fetch_add(bytes_written, Ordering::SeqCst);
//!         eprintln!("{} done", job.output.display());
//!     }
//! }
//!
//! let env = Environment::system()
//!     .with_progress(Arc::new(CountingCallback { written: AtomicUsize::new(0) }));
//! ```

use crate::discover::Job;
use std::sync::Arc;

/// Called by the orchestrator as it processes each file.
///
/// All methods default to no-ops so callers only override what they need.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any job starts.
    fn on_batch_start(&self, total_jobs: usize) {
        let _ = total_jobs;
    }

    /// Called after a converter was acquired for `job`.
    fn on_job_start(&self, job: &Job) {
        let _ = job;
    }

    /// Called once `job`'s output is on disk.
    fn on_job_complete(&self, job: &Job, bytes_written: usize) {
        let _ = (job, bytes_written);
    }

    /// Called when `job` failed or was cancelled.
    fn on_job_error(&self, job: &Job, error: &str) {
        let _ = (job, error);
    }

    /// Called once after every job has an outcome.
    fn on_batch_complete(&self, total_jobs: usize, succeeded: usize) {
        let _ = (total_jobs, succeeded);
    }
}

/// Ignores every event.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::env::Environment`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
