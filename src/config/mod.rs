//! Configuration types for batch Markdown-to-PDF conversion.
//!
//! Configuration arrives in three layers of one partial shape,
//! [`ConfigLayer`]: the built-in defaults, an optional TOML file, and the
//! explicit overrides supplied by the caller (usually CLI flags). The
//! [`resolve`] step merges them once per batch into a [`ResolvedConfig`],
//! which every job then shares read-only.
//!
//! ```text
//! ConfigLayer::builtin() ─┐
//! load_config_file(path) ─┼─▶ resolve() ─▶ Arc<ResolvedConfig> ─▶ RequestBuilder
//! Overrides (CLI)        ─┘
//! ```

pub mod layer;
pub mod load;
pub mod resolve;

pub use layer::{
    AuthorLayer, ConfigLayer, CoverLayer, DocumentLayer, FooterLayer, Overrides, PageBreaksLayer,
    PageLayer, SignatureLayer, StyleLayer, TocLayer, WatermarkLayer,
};
pub use load::{load_config_file, parse_config};
pub use resolve::resolve;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Fully merged configuration for one batch run.
///
/// Feature blocks are `Some` only when the feature is enabled after merge.
/// Shared identity fields have already been copied into every enabled
/// block that displays them, so nothing needs to be looked up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub author: AuthorInfo,
    pub document: DocumentInfo,
    pub page: PageSettings,
    pub style: Option<StyleSettings>,
    pub cover: Option<CoverSettings>,
    pub signature: Option<SignatureSettings>,
    pub footer: Option<FooterSettings>,
    pub watermark: Option<WatermarkSettings>,
    pub toc: Option<TocSettings>,
    pub page_breaks: Option<PageBreakSettings>,
}

impl ResolvedConfig {
    /// Whether `feature` survived the merge.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Cover => self.cover.is_some(),
            Feature::Signature => self.signature.is_some(),
            Feature::Footer => self.footer.is_some(),
            Feature::Watermark => self.watermark.is_some(),
            Feature::Toc => self.toc.is_some(),
            Feature::PageBreaks => self.page_breaks.is_some(),
            Feature::Style => self.style.is_some(),
        }
    }
}

/// Who wrote the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub title: String,
    pub email: String,
    pub organization: String,
}

/// What the document is. An empty `title` means "derive it per file".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    pub subtitle: String,
    pub version: String,
    pub date: String,
}

/// Paper geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSettings {
    pub size: PageSize,
    pub orientation: Orientation,
    /// Uniform margin in inches.
    pub margin_inches: f32,
}

/// Stylesheet selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSettings {
    /// Name of a renderer-provided theme.
    pub name: String,
    /// Extra CSS appended after the theme.
    pub css_file: Option<PathBuf>,
}

/// Title page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverSettings {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub author_title: String,
    pub organization: String,
    pub version: String,
    pub date: String,
    pub logo: Option<PathBuf>,
}

/// Closing signature block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSettings {
    pub name: String,
    pub title: String,
    pub email: String,
    pub organization: String,
    pub image: Option<PathBuf>,
    pub links: Vec<SignatureLink>,
}

/// A labelled link under the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureLink {
    pub label: String,
    pub url: String,
}

/// Running page footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterSettings {
    pub position: FooterPosition,
    pub show_page_number: bool,
    pub text: String,
    /// Document status line, usually the version.
    pub status: String,
    pub date: String,
}

/// Diagonal background text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSettings {
    pub text: String,
    pub color: String,
    pub opacity: f32,
    pub angle: f32,
}

/// Generated table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocSettings {
    pub title: String,
    pub min_depth: u8,
    pub max_depth: u8,
}

/// Page-break rules around headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBreakSettings {
    pub before_h1: bool,
    pub before_h2: bool,
    pub before_h3: bool,
    /// Minimum lines kept at the bottom of a page.
    pub orphans: u8,
    /// Minimum lines carried to the top of a page.
    pub widows: u8,
}

// ── Enums ────────────────────────────────────────────────────────────────

/// An independently switchable output section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Cover,
    Signature,
    Footer,
    Watermark,
    Toc,
    PageBreaks,
    Style,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Cover,
        Feature::Signature,
        Feature::Footer,
        Feature::Watermark,
        Feature::Toc,
        Feature::PageBreaks,
        Feature::Style,
    ];
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Cover => "cover",
            Feature::Signature => "signature",
            Feature::Footer => "footer",
            Feature::Watermark => "watermark",
            Feature::Toc => "toc",
            Feature::PageBreaks => "page_breaks",
            Feature::Style => "style",
        };
        f.write_str(name)
    }
}

/// Paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    Letter,
    A4,
    Legal,
}

/// Paper orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Horizontal placement of the footer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FooterPosition {
    Left,
    Center,
    #[default]
    Right,
}
