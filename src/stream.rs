//! Streaming batch API: emit outcomes as jobs complete.
//!
//! Unlike the eager [`crate::batch::run`], which returns only after every
//! job has an outcome, [`run_stream`] yields each [`ConversionOutcome`] the
//! moment its job finishes. Outcomes arrive in completion order.
//!
//! The stream owns clones of the pool, request builder and cancellation
//! token, so it can outlive the caller's borrows. Dropping the stream
//! drops in-flight jobs, which returns their converters to the pool.

use crate::batch::process_job;
use crate::converter::{Converter, RequestBuilder};
use crate::discover::Job;
use crate::env::Environment;
use crate::output::ConversionOutcome;
use crate::pool::ConverterPool;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A boxed stream of job outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = ConversionOutcome> + Send>>;

/// Convert `jobs`, streaming outcomes with the same concurrency bound as
/// [`crate::batch::run`].
///
/// `on_batch_start` fires immediately; `on_batch_complete` does not fire,
/// since the caller decides when the stream is finished.
pub fn run_stream<C>(
    cancel: CancellationToken,
    jobs: Vec<Job>,
    pool: ConverterPool<C>,
    builder: RequestBuilder,
    env: &Environment,
) -> OutcomeStream
where
    C: Converter + 'static,
{
    info!(
        "Starting streaming batch: {} files, {} converters",
        jobs.len(),
        pool.size()
    );
    if let Some(ref cb) = env.progress {
        cb.on_batch_start(jobs.len());
    }

    let concurrency = pool.size();
    let progress = env.progress.clone();
    let s = stream::iter(jobs.into_iter().map(move |job| {
        let cancel = cancel.clone();
        let pool = pool.clone();
        let builder = builder.clone();
        let progress = progress.clone();
        async move { process_job(job, &cancel, &pool, &builder, progress.as_ref()).await }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
