//! The rendering capability the batch delegates to.
//!
//! The orchestrator never renders anything itself. It hands each job's
//! [`ConversionRequest`] to a [`Converter`] borrowed from the
//! [`crate::pool::ConverterPool`] and writes whatever bytes come back.
//!
//! * [`request`] — builds the per-job request from the source text and the
//!   shared [`crate::config::ResolvedConfig`]
//! * [`command`] — a converter backed by an external renderer executable

pub mod command;
pub mod request;

pub use command::CommandConverter;
pub use request::{ConversionRequest, RequestBuilder};

use async_trait::async_trait;
use thiserror::Error;

/// A reusable renderer instance.
///
/// The pool guarantees that one instance serves at most one job at a time,
/// so implementations may keep per-instance scratch state. `convert` is
/// called repeatedly over the instance's lifetime; `close` is called once,
/// when the pool shuts down, and must release whatever the instance owns.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Render one request into the bytes of the output document.
    async fn convert(&self, request: &ConversionRequest) -> Result<Vec<u8>, ConvertError>;

    /// Release resources owned by this instance.
    async fn close(&mut self) -> Result<(), ConvertError> {
        Ok(())
    }
}

/// Why a converter could not produce a document.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The renderer executable does not exist.
    #[error("renderer '{program}' not found")]
    NotFound { program: String },

    /// Scratch I/O around the renderer failed.
    #[error("renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The renderer ran and reported failure.
    #[error("renderer exited with {}: {stderr}", exit_code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    Renderer {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The renderer reported success but produced nothing.
    #[error("renderer produced no output")]
    MissingOutput,

    /// The request could not be handed to the renderer.
    #[error("invalid request: {0}")]
    Request(String),
}
