//! Load the file layer from TOML.
//!
//! ```toml
//! [author]
//! name = "Jane Doe"
//! email = "jane@example.com"
//!
//! [document]
//! version = "v1.0"
//! date = "auto"
//!
//! [cover]
//! enabled = true
//!
//! [watermark]
//! enabled = true
//! text = "CONFIDENTIAL"
//! opacity = 0.15
//! ```
//!
//! Unknown keys are rejected so typos surface immediately instead of being
//! silently ignored.

use super::layer::ConfigLayer;
use crate::error::BatchError;
use std::path::Path;
use tracing::debug;

/// Read, parse and validate a TOML config file.
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<ConfigLayer, BatchError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BatchError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => BatchError::ConfigLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    let layer: ConfigLayer = toml::from_str(&text).map_err(|e| BatchError::ConfigLoad {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    validate(&layer)?;

    debug!("Loaded config file: {}", path.display());
    Ok(layer)
}

/// Parse and validate TOML text already in memory.
pub fn parse_config(text: &str) -> Result<ConfigLayer, BatchError> {
    let layer: ConfigLayer =
        toml::from_str(text).map_err(|e| BatchError::InvalidConfig(e.to_string()))?;
    validate(&layer)?;
    Ok(layer)
}

/// Range checks the type system cannot express.
pub fn validate(layer: &ConfigLayer) -> Result<(), BatchError> {
    if let Some(m) = layer.page.margin_inches {
        if !(0.0..=3.0).contains(&m) {
            return Err(BatchError::InvalidConfig(format!(
                "page.margin_inches must be 0–3, got {m}"
            )));
        }
    }

    if let Some(o) = layer.watermark.opacity {
        if !(0.0..=1.0).contains(&o) {
            return Err(BatchError::InvalidConfig(format!(
                "watermark.opacity must be 0–1, got {o}"
            )));
        }
    }

    if let Some(ref color) = layer.watermark.color {
        if !is_hex_color(color) {
            return Err(BatchError::InvalidConfig(format!(
                "watermark.color must be #rgb or #rrggbb, got {color:?}"
            )));
        }
    }

    for (key, depth) in [
        ("toc.min_depth", layer.toc.min_depth),
        ("toc.max_depth", layer.toc.max_depth),
    ] {
        if let Some(d) = depth {
            if !(1..=6).contains(&d) {
                return Err(BatchError::InvalidConfig(format!(
                    "{key} must be 1–6, got {d}"
                )));
            }
        }
    }
    if let (Some(min), Some(max)) = (layer.toc.min_depth, layer.toc.max_depth) {
        if min > max {
            return Err(BatchError::InvalidConfig(format!(
                "toc.min_depth ({min}) must not exceed toc.max_depth ({max})"
            )));
        }
    }

    for (key, lines) in [
        ("page_breaks.orphans", layer.page_breaks.orphans),
        ("page_breaks.widows", layer.page_breaks.widows),
    ] {
        if let Some(n) = lines {
            if !(1..=10).contains(&n) {
                return Err(BatchError::InvalidConfig(format!(
                    "{key} must be 1–10, got {n}"
                )));
            }
        }
    }

    Ok(())
}

fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
