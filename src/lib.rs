//! # edgequake-md2pdf
//!
//! Convert Markdown files and whole documentation trees to PDF, in parallel,
//! with a bounded pool of reusable renderers.
//!
//! ## Why this crate?
//!
//! Rendering a document is slow and renderers are costly to start. Converting
//! a tree of a few hundred files one at a time wastes most of the machine;
//! starting a renderer per file wastes the rest. This crate discovers the
//! files, resolves one configuration for the whole batch, and runs the jobs
//! concurrently against a fixed pool of converter instances. One failing file
//! never stops the others; the batch reports every failure at the end.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input path
//!  │
//!  ├─ 1. Discover  file or recursive walk → jobs (input → output path)
//!  ├─ 2. Resolve   defaults < config file < overrides → ResolvedConfig
//!  ├─ 3. Acquire   borrow a converter from the pool (≤ N in flight)
//!  ├─ 4. Render    Markdown + config → ConversionRequest → bytes
//!  ├─ 5. Write     tmp file + rename, parents created
//!  └─ 6. Report    BatchResult, or BatchError::JobsFailed naming each file
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{
//!     convert_path, resolve, CommandConverter, ConfigLayer, ConverterPool, Environment,
//!     Overrides,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env = Environment::system();
//!     let config = resolve(
//!         &ConfigLayer::builtin(),
//!         &ConfigLayer::default(),
//!         &Overrides::default(),
//!         &env,
//!     );
//!     let pool = ConverterPool::new(CommandConverter::instances(4, "md-render", &[])?)?;
//!     let result = convert_path(
//!         "docs/",
//!         Some(Path::new("build/pdf")),
//!         Arc::new(config),
//!         &pool,
//!         &env,
//!         &CancellationToken::new(),
//!     )
//!     .await;
//!     pool.close().await?;
//!     let result = result?;
//!     eprintln!("{} documents written", result.stats.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod converter;
pub mod discover;
pub mod env;
pub mod error;
pub mod output;
pub mod pool;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::run;
pub use config::{
    load_config_file, parse_config, resolve, ConfigLayer, Feature, Overrides, ResolvedConfig,
};
pub use convert::{convert_path, discover_jobs};
pub use converter::{
    CommandConverter, ConversionRequest, ConvertError, Converter, RequestBuilder,
};
pub use discover::{discover, resolve_output_path, Job};
pub use env::{Clock, Environment, FixedClock, SystemClock};
pub use error::{BatchError, JobError, JobFailure, PoolError};
pub use output::{BatchResult, BatchStats, ConversionOutcome};
pub use pool::{ConverterPool, PoolToken};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{run_stream, OutcomeStream};
