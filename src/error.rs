//! Error types for the edgequake-md2pdf library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`BatchError`] — **Fatal or aggregate**: the batch cannot start at all
//!   (bad input path, unsupported extension, nothing to convert, broken
//!   config file), or it ran and at least one file failed. Returned as
//!   `Err(BatchError)` from discovery and from
//!   [`crate::output::BatchResult::into_result`].
//!
//! * [`JobError`] — **Non-fatal**: a single file failed (unreadable source,
//!   renderer crash, output not writable) but every other file is fine.
//!   Stored inside [`crate::output::ConversionOutcome`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad file.
//!
//! * [`PoolError`] — converter-pool lifecycle failures.
//!
//! Successful outputs always stay on disk, whichever of these is reported.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal and aggregate errors returned by the edgequake-md2pdf library.
///
/// File-level failures use [`JobError`] and are stored in
/// [`crate::output::ConversionOutcome`] rather than propagated here, until
/// the caller asks for the aggregate via
/// [`crate::output::BatchResult::into_result`].
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// A single input file does not carry a Markdown extension.
    #[error("Unsupported extension for '{path}': expected one of {expected}")]
    UnsupportedExtension { path: PathBuf, expected: String },

    // ── Discovery errors ──────────────────────────────────────────────────
    /// The directory walk found nothing to convert.
    #[error("No Markdown files found under '{dir}'")]
    NoMatchingFiles { dir: PathBuf },

    /// The directory walk itself failed.
    #[error("Failed to scan '{path}': {detail}")]
    DiscoveryFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configuration file could not be read or parsed.
    #[error("Failed to load config file '{path}': {detail}")]
    ConfigLoad { path: PathBuf, detail: String },

    /// The configuration parsed but holds out-of-range values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pool errors ───────────────────────────────────────────────────────
    #[error(transparent)]
    Pool(#[from] PoolError),

    // ── Aggregate errors ──────────────────────────────────────────────────
    /// The batch ran with zero jobs, so nothing was converted.
    #[error("Batch contained no jobs; nothing was converted")]
    EmptyBatch,

    /// Some files failed. Every failing input is listed with its cause.
    #[error("{failed}/{total} files failed to convert:{}", render_failures(.failures))]
    JobsFailed {
        failed: usize,
        total: usize,
        failures: Vec<JobFailure>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// One failing input inside [`BatchError::JobsFailed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub input: PathBuf,
    pub error: JobError,
}

fn render_failures(failures: &[JobFailure]) -> String {
    let mut out = String::new();
    for f in failures {
        let _ = write!(out, "\n  - {}: {}", f.input.display(), f.error);
    }
    out
}

/// A non-fatal error for a single file.
///
/// Stored alongside [`crate::output::ConversionOutcome`] when a job fails.
/// The batch continues regardless.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum JobError {
    /// The Markdown source could not be read as UTF-8 text.
    #[error("failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    /// The converter rejected the document or crashed.
    #[error("conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The rendered bytes could not be written.
    #[error("failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// The batch was cancelled before this job finished.
    #[error("cancelled before completion")]
    Cancelled,

    /// No converter could be acquired (the pool was closed).
    #[error("no converter available: {detail}")]
    PoolUnavailable { detail: String },
}

/// Converter-pool lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A pool needs at least one converter instance.
    #[error("converter pool capacity must be at least 1")]
    Empty,

    /// The pool has been closed; no further tokens are handed out.
    #[error("converter pool is closed")]
    Closed,

    /// At least one converter failed to release its resources on close.
    #[error("failed to close {failed} converter(s): {first_error}")]
    CloseFailed { failed: usize, first_error: String },
}
