//! Per-job request construction.
//!
//! A [`ConversionRequest`] is the only thing a converter sees: the raw
//! Markdown plus the slice of [`ResolvedConfig`] that affects rendering.
//! It is built once per job and never mutated afterwards.

use crate::config::{
    CoverSettings, FooterSettings, PageBreakSettings, PageSettings, ResolvedConfig,
    SignatureSettings, StyleSettings, TocSettings, WatermarkSettings,
};
use crate::discover::Job;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a converter needs to render one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// The Markdown file this request was built from; renderers resolve
    /// relative image links against its parent directory.
    pub source_path: PathBuf,
    pub markdown: String,
    /// The document title for this file (never empty).
    pub title: String,
    pub page: PageSettings,
    pub style: Option<StyleSettings>,
    pub page_breaks: Option<PageBreakSettings>,
    pub cover: Option<CoverSettings>,
    pub signature: Option<SignatureSettings>,
    pub footer: Option<FooterSettings>,
    pub watermark: Option<WatermarkSettings>,
    pub toc: Option<TocSettings>,
}

/// Builds [`ConversionRequest`]s against one shared [`ResolvedConfig`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    config: Arc<ResolvedConfig>,
}

impl RequestBuilder {
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Materialise the request for `job` from its source text.
    ///
    /// The title is the configured document title when set, else the first
    /// `# ` heading in the Markdown, else the input file stem, else
    /// [`UNTITLED`]. An enabled
    /// cover without its own title shows that same title.
    pub fn build(&self, job: &Job, markdown: String) -> ConversionRequest {
        let c = &self.config;
        let title = if c.document.title.is_empty() {
            first_heading(&markdown).unwrap_or_else(|| file_stem(&job.input))
        } else {
            c.document.title.clone()
        };

        let cover = c.cover.clone().map(|mut cover| {
            if cover.title.is_empty() {
                cover.title = title.clone();
            }
            cover
        });

        ConversionRequest {
            source_path: job.input.clone(),
            markdown,
            title,
            page: c.page.clone(),
            style: c.style.clone(),
            page_breaks: c.page_breaks.clone(),
            cover,
            signature: c.signature.clone(),
            footer: c.footer.clone(),
            watermark: c.watermark.clone(),
            toc: c.toc.clone(),
        }
    }
}

static H1_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}#[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex")
});

/// Text of the first level-one ATX heading outside fenced code blocks.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut fence: Option<&str> = None;
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }
        if let Some(caps) = H1_RE.captures(line) {
            let text = caps[1].trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Title used when neither the config nor the source names one.
pub const UNTITLED: &str = "Untitled";

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}
