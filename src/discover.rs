//! Input discovery: turn a file or directory into conversion jobs.
//!
//! A single file must carry a Markdown extension. A directory is walked
//! recursively and every Markdown file in it becomes a job; everything else
//! is skipped silently. Finding nothing is an error: a batch that would
//! silently do nothing is almost always a wrong path.
//!
//! ## Output placement
//!
//! | Input     | `output` argument              | Result                              |
//! |-----------|--------------------------------|-------------------------------------|
//! | any       | none                           | beside the source, `.pdf`           |
//! | file      | looks like a file (`x.pdf`)    | that path, verbatim                 |
//! | file      | a directory                    | `<dir>/<stem>.pdf`                  |
//! | directory | a directory                    | mirrored: `<dir>/<relative>.pdf`    |
//!
//! When a file cannot be expressed relative to the input directory the
//! output falls back to `<dir>/<stem>.pdf`. Two such files with the same
//! stem collide; collisions are logged, not prevented.

use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions recognised as Markdown sources (case-sensitive).
pub const SOURCE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Extension of rendered documents.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// One source file and where its rendering goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Whether `path` has a recognised Markdown extension.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Resolve `input` into jobs, placing outputs according to `output_dir`.
///
/// # Errors
/// - [`BatchError::UnsupportedExtension`] — a single file that is not Markdown
/// - [`BatchError::InputNotFound`] / [`BatchError::PermissionDenied`]
/// - [`BatchError::DiscoveryFailed`] — the directory walk hit an I/O error
/// - [`BatchError::NoMatchingFiles`] — a directory without Markdown files
pub fn discover(input: &Path, output_dir: Option<&Path>) -> Result<Vec<Job>, BatchError> {
    // Reject obviously unsupported single files before stat'ing anything
    // beyond "is this a directory".
    if input.extension().is_some() && !is_source_file(input) && !input.is_dir() {
        return Err(unsupported(input));
    }

    let metadata = std::fs::metadata(input).map_err(|e| match e.kind() {
        ErrorKind::NotFound => BatchError::InputNotFound {
            path: input.to_path_buf(),
        },
        ErrorKind::PermissionDenied => BatchError::PermissionDenied {
            path: input.to_path_buf(),
        },
        _ => BatchError::DiscoveryFailed {
            path: input.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    let jobs = if metadata.is_dir() {
        discover_dir(input, output_dir)?
    } else {
        if !is_source_file(input) {
            return Err(unsupported(input));
        }
        let output = match output_dir {
            Some(out) if looks_like_file_target(out) => out.to_path_buf(),
            _ => resolve_output_path(input, output_dir, None),
        };
        vec![Job {
            input: input.to_path_buf(),
            output,
        }]
    };

    warn_on_collisions(&jobs);
    Ok(jobs)
}

fn discover_dir(dir: &Path, output_dir: Option<&Path>) -> Result<Vec<Job>, BatchError> {
    info!("Scanning {} for Markdown files", dir.display());

    let mut jobs = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| BatchError::DiscoveryFailed {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf()),
            detail: e.to_string(),
        })?;

        // Directory links are not followed; file links count as files.
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file || !is_source_file(entry.path()) {
            continue;
        }

        let input = entry.path().to_path_buf();
        let output = resolve_output_path(&input, output_dir, Some(dir));
        debug!("Discovered {} → {}", input.display(), output.display());
        jobs.push(Job { input, output });
    }

    if jobs.is_empty() {
        return Err(BatchError::NoMatchingFiles {
            dir: dir.to_path_buf(),
        });
    }

    info!("Discovered {} Markdown files", jobs.len());
    Ok(jobs)
}

/// Where the rendering of `input` goes.
///
/// Never fails: when `input` is not under `base_dir` the output is placed
/// flat in `output_dir`.
pub fn resolve_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    base_dir: Option<&Path>,
) -> PathBuf {
    let Some(out) = output_dir else {
        return input.with_extension(OUTPUT_EXTENSION);
    };

    if let Some(base) = base_dir {
        if let Ok(relative) = input.strip_prefix(base) {
            if relative.file_name().is_some() {
                return out.join(relative).with_extension(OUTPUT_EXTENSION);
            }
        }
        debug!(
            "{} is not under {}; placing output flat",
            input.display(),
            base.display()
        );
    }

    flat_output(input, out)
}

fn flat_output(input: &Path, out: &Path) -> PathBuf {
    let name = input.file_name().unwrap_or(input.as_os_str());
    out.join(name).with_extension(OUTPUT_EXTENSION)
}

/// An output argument that names a document rather than a directory.
fn looks_like_file_target(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(OUTPUT_EXTENSION) && !path.is_dir()
}

fn unsupported(path: &Path) -> BatchError {
    BatchError::UnsupportedExtension {
        path: path.to_path_buf(),
        expected: SOURCE_EXTENSIONS
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn warn_on_collisions(jobs: &[Job]) {
    let mut seen: HashMap<&Path, &Path> = HashMap::with_capacity(jobs.len());
    for job in jobs {
        if let Some(previous) = seen.insert(&job.output, &job.input) {
            warn!(
                "Output collision: {} and {} both render to {}",
                previous.display(),
                job.input.display(),
                job.output.display()
            );
        }
    }
}
