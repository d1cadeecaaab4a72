//! A converter backed by an external renderer executable.
//!
//! Each instance owns a private scratch directory. For every request it
//! writes `request.json` there and runs
//!
//! ```text
//! <program> [args...] request.json output.pdf
//! ```
//!
//! with the scratch directory as the working directory, then reads back
//! `output.pdf`. Because the pool hands an instance to one job at a time,
//! the fixed file names never collide.
//!
//! The child is spawned with `kill_on_drop`, so a cancelled batch that drops
//! the in-flight future also kills the renderer.

use super::{ConversionRequest, ConvertError, Converter};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

const REQUEST_FILE: &str = "request.json";
const OUTPUT_FILE: &str = "output.pdf";

/// Renders by invoking an external program.
#[derive(Debug)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
    scratch: Option<TempDir>,
}

impl CommandConverter {
    /// Create an instance with a fresh scratch directory.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Result<Self, ConvertError> {
        let scratch = tempfile::Builder::new().prefix("md2pdf-").tempdir()?;
        Ok(Self {
            program: program.into(),
            args,
            scratch: Some(scratch),
        })
    }

    /// Create `n` independent instances for a pool.
    pub fn instances(
        n: usize,
        program: impl AsRef<Path>,
        args: &[String],
    ) -> Result<Vec<Self>, ConvertError> {
        (0..n)
            .map(|_| Self::new(program.as_ref(), args.to_vec()))
            .collect()
    }

    /// The scratch directory, while the instance is open.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<Vec<u8>, ConvertError> {
        let started_at = Instant::now();
        let dir = self
            .scratch_dir()
            .ok_or_else(|| ConvertError::Request("converter already closed".into()))?;
        let request_path = dir.join(REQUEST_FILE);
        let output_path = dir.join(OUTPUT_FILE);

        let payload =
            serde_json::to_vec(request).map_err(|e| ConvertError::Request(e.to_string()))?;
        tokio::fs::write(&request_path, payload).await?;
        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(REQUEST_FILE)
            .arg(OUTPUT_FILE)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ConvertError::NotFound {
                        program: program.clone(),
                    }
                } else {
                    ConvertError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                "Renderer {} failed for {} after {}ms: {}",
                program,
                request.source_path.display(),
                started_at.elapsed().as_millis(),
                stderr
            );
            return Err(ConvertError::Renderer {
                exit_code: output.status.code(),
                stderr,
            });
        }

        let bytes = match tokio::fs::read(&output_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ConvertError::MissingOutput),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Rendered {} → {} bytes in {}ms",
            request.source_path.display(),
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<(), ConvertError> {
        if let Some(dir) = self.scratch.take() {
            dir.close()?;
        }
        Ok(())
    }
}
