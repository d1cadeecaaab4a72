//! The batch orchestrator: run every job against the converter pool.
//!
//! ```text
//! jobs ──► buffer_unordered(pool.size()) ──► collect ──► BatchResult
//!            │
//!            └─ per job: acquire ─► read ─► build request ─► convert
//!                        ─► write (tmp + rename) ─► release
//! ```
//!
//! A failing job is recorded in its [`ConversionOutcome`] and never stops
//! its siblings. Cancellation is observed while waiting for a converter and
//! while converting; the write of already-rendered bytes is allowed to
//! finish so no half-written document is left behind.

use crate::converter::{Converter, RequestBuilder};
use crate::discover::Job;
use crate::env::Environment;
use crate::error::JobError;
use crate::output::{BatchResult, ConversionOutcome};
use crate::pool::ConverterPool;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Convert every job and collect the outcomes.
///
/// At most `pool.size()` jobs are in flight at once. The returned
/// [`BatchResult`] always holds one outcome per job; use
/// [`BatchResult::into_result`] for a pass/fail answer.
pub async fn run<C: Converter>(
    cancel: &CancellationToken,
    jobs: Vec<Job>,
    pool: &ConverterPool<C>,
    builder: &RequestBuilder,
    env: &Environment,
) -> BatchResult {
    let started_at = Instant::now();
    let total = jobs.len();
    info!(
        "Starting batch: {} files, {} converters",
        total,
        pool.size()
    );
    if let Some(ref cb) = env.progress {
        cb.on_batch_start(total);
    }

    let progress = env.progress.as_ref();
    let outcomes: Vec<ConversionOutcome> = stream::iter(
        jobs.into_iter()
            .map(|job| process_job(job, cancel, pool, builder, progress)),
    )
    .buffer_unordered(pool.size())
    .collect()
    .await;

    let result = BatchResult::from_outcomes(outcomes, started_at.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} succeeded, {} bytes, {}ms",
        result.stats.succeeded, result.stats.total, result.stats.bytes_written, result.stats.duration_ms
    );
    if let Some(ref cb) = env.progress {
        cb.on_batch_complete(total, result.stats.succeeded);
    }
    result
}

/// Run one job to its outcome. Never fails; errors land in the outcome.
pub(crate) async fn process_job<C: Converter>(
    job: Job,
    cancel: &CancellationToken,
    pool: &ConverterPool<C>,
    builder: &RequestBuilder,
    progress: Option<&ProgressCallback>,
) -> ConversionOutcome {
    let started_at = Instant::now();
    let result = execute(&job, cancel, pool, builder, progress).await;
    let duration_ms = started_at.elapsed().as_millis() as u64;

    match result {
        Ok(bytes_written) => {
            debug!(
                "Converted {} → {} ({} bytes, {}ms)",
                job.input.display(),
                job.output.display(),
                bytes_written,
                duration_ms
            );
            if let Some(cb) = progress {
                cb.on_job_complete(&job, bytes_written);
            }
            ConversionOutcome {
                job,
                bytes_written,
                duration_ms,
                error: None,
            }
        }
        Err(error) => {
            warn!("Failed to convert {}: {}", job.input.display(), error);
            if let Some(cb) = progress {
                cb.on_job_error(&job, &error.to_string());
            }
            ConversionOutcome {
                job,
                bytes_written: 0,
                duration_ms,
                error: Some(error),
            }
        }
    }
}

async fn execute<C: Converter>(
    job: &Job,
    cancel: &CancellationToken,
    pool: &ConverterPool<C>,
    builder: &RequestBuilder,
    progress: Option<&ProgressCallback>,
) -> Result<usize, JobError> {
    let token = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(JobError::Cancelled),
        acquired = pool.acquire() => acquired.map_err(|e| JobError::PoolUnavailable {
            detail: e.to_string(),
        })?,
    };
    if let Some(cb) = progress {
        cb.on_job_start(job);
    }

    let markdown = tokio::fs::read_to_string(&job.input)
        .await
        .map_err(|e| JobError::ReadFailed {
            path: job.input.clone(),
            detail: e.to_string(),
        })?;
    let request = builder.build(job, markdown);

    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(JobError::Cancelled),
        converted = token.convert(&request) => converted.map_err(|e| JobError::ConversionFailed {
            detail: e.to_string(),
        })?,
    };

    write_output(&job.output, &bytes).await?;
    drop(token);
    Ok(bytes.len())
}

/// Atomic write: parent dirs, a uniquely named temp file beside the
/// target, then rename. Concurrent writers to one path each get their own
/// temp file; the last rename wins.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), JobError> {
    let write_failed = |detail: String| JobError::WriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(e.to_string()))?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    let target = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".md2pdf-")
            .suffix(".tmp")
            .tempfile_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        // A failed persist drops the temp file, which removes it.
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| write_failed(e.to_string()))?
    .map_err(|e| write_failed(e.to_string()))
}
