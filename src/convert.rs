//! One-call entry point: discover, convert, aggregate.
//!
//! [`convert_path`] is what the CLI runs. It is a thin composition of
//! [`crate::discover::discover`], [`crate::batch::run`] and
//! [`BatchResult::into_result`]; callers that need the partial result of a
//! failing batch (or a stream of outcomes) should use those directly.

use crate::batch;
use crate::config::ResolvedConfig;
use crate::converter::{Converter, RequestBuilder};
use crate::discover::{discover, Job};
use crate::env::Environment;
use crate::error::BatchError;
use crate::output::BatchResult;
use crate::pool::ConverterPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Convert a Markdown file or directory tree.
///
/// # Arguments
/// * `input`      — a `.md`/`.markdown` file or a directory to walk
/// * `output`     — `None` to write beside each source; a directory; or, for
///   a single file, a `.pdf` path
/// * `config`     — the resolved configuration shared by every job
///
/// # Errors
/// Discovery errors are returned before any conversion starts. After the
/// batch ran, [`BatchError::JobsFailed`] names every failing input; the
/// outputs of the other inputs remain on disk.
pub async fn convert_path<C: Converter>(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: Arc<ResolvedConfig>,
    pool: &ConverterPool<C>,
    env: &Environment,
    cancel: &CancellationToken,
) -> Result<BatchResult, BatchError> {
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    let jobs = discover_jobs(input, output).await?;
    let builder = RequestBuilder::new(config);
    batch::run(cancel, jobs, pool, &builder, env)
        .await
        .into_result()
}

/// [`discover`] on the blocking pool, since the directory walk is
/// synchronous.
pub async fn discover_jobs(input: &Path, output: Option<&Path>) -> Result<Vec<Job>, BatchError> {
    let input: PathBuf = input.to_path_buf();
    let output: Option<PathBuf> = output.map(Path::to_path_buf);
    tokio::task::spawn_blocking(move || discover(&input, output.as_deref()))
        .await
        .map_err(|e| BatchError::Internal(format!("discovery task failed: {e}")))?
}
