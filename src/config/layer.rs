//! The partial configuration shape shared by every layer.
//!
//! Every field is an `Option`: `None` means "this layer has no opinion",
//! `Some(v)` (including `Some("")`) means "this layer sets the field". The
//! same shape deserialises from the TOML config file, is filled in by the
//! CLI for explicit overrides, and is fully populated by
//! [`ConfigLayer::builtin`] for the defaults.

use super::{Feature, FooterPosition, Orientation, PageSize, SignatureLink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub author: AuthorLayer,
    pub document: DocumentLayer,
    pub page: PageLayer,
    pub style: StyleLayer,
    pub cover: CoverLayer,
    pub signature: SignatureLayer,
    pub footer: FooterLayer,
    pub watermark: WatermarkLayer,
    pub toc: TocLayer,
    pub page_breaks: PageBreaksLayer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorLayer {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentLayer {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub version: Option<String>,
    /// A date string, or `"auto"` for today.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageLayer {
    pub size: Option<PageSize>,
    pub orientation: Option<Orientation>,
    pub margin_inches: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleLayer {
    pub enabled: Option<bool>,
    pub name: Option<String>,
    pub css_file: Option<PathBuf>,
}

/// Cover page. `title` and `subtitle` override the document identity on the
/// cover only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverLayer {
    pub enabled: Option<bool>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub logo: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignatureLayer {
    pub enabled: Option<bool>,
    pub image: Option<PathBuf>,
    pub links: Option<Vec<SignatureLink>>,
}

/// Footer. `status` and `date` override the document version and date in
/// the footer only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FooterLayer {
    pub enabled: Option<bool>,
    pub position: Option<FooterPosition>,
    pub show_page_number: Option<bool>,
    pub text: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkLayer {
    pub enabled: Option<bool>,
    pub text: Option<String>,
    pub color: Option<String>,
    pub opacity: Option<f32>,
    pub angle: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TocLayer {
    pub enabled: Option<bool>,
    pub title: Option<String>,
    pub min_depth: Option<u8>,
    pub max_depth: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageBreaksLayer {
    pub enabled: Option<bool>,
    pub before_h1: Option<bool>,
    pub before_h2: Option<bool>,
    pub before_h3: Option<bool>,
    pub orphans: Option<u8>,
    pub widows: Option<u8>,
}

impl ConfigLayer {
    /// The built-in defaults: every field populated.
    ///
    /// Footer, page breaks and styling are on; cover, signature, watermark
    /// and TOC are opt-in.
    pub fn builtin() -> Self {
        Self {
            author: AuthorLayer {
                name: Some(String::new()),
                title: Some(String::new()),
                email: Some(String::new()),
                organization: Some(String::new()),
            },
            document: DocumentLayer {
                title: Some(String::new()),
                subtitle: Some(String::new()),
                version: Some(String::new()),
                date: Some("auto".to_string()),
            },
            page: PageLayer {
                size: Some(PageSize::Letter),
                orientation: Some(Orientation::Portrait),
                margin_inches: Some(0.5),
            },
            style: StyleLayer {
                enabled: Some(true),
                name: Some("default".to_string()),
                css_file: None,
            },
            cover: CoverLayer {
                enabled: Some(false),
                title: None,
                subtitle: None,
                logo: None,
            },
            signature: SignatureLayer {
                enabled: Some(false),
                image: None,
                links: Some(Vec::new()),
            },
            footer: FooterLayer {
                enabled: Some(true),
                position: Some(FooterPosition::Right),
                show_page_number: Some(true),
                text: Some(String::new()),
                status: None,
                date: None,
            },
            watermark: WatermarkLayer {
                enabled: Some(false),
                text: Some("DRAFT".to_string()),
                color: Some("#888888".to_string()),
                opacity: Some(0.1),
                angle: Some(-45.0),
            },
            toc: TocLayer {
                enabled: Some(false),
                title: Some("Table of Contents".to_string()),
                min_depth: Some(2),
                max_depth: Some(3),
            },
            page_breaks: PageBreaksLayer {
                enabled: Some(true),
                before_h1: Some(true),
                before_h2: Some(false),
                before_h3: Some(false),
                orphans: Some(2),
                widows: Some(2),
            },
        }
    }

    /// The explicit `enabled` value this layer sets for `feature`, if any.
    pub fn enabled(&self, feature: Feature) -> Option<bool> {
        match feature {
            Feature::Cover => self.cover.enabled,
            Feature::Signature => self.signature.enabled,
            Feature::Footer => self.footer.enabled,
            Feature::Watermark => self.watermark.enabled,
            Feature::Toc => self.toc.enabled,
            Feature::PageBreaks => self.page_breaks.enabled,
            Feature::Style => self.style.enabled,
        }
    }
}

/// The highest-precedence layer: explicit per-field values plus features
/// the caller switched off outright.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub layer: ConfigLayer,
    /// Features forced off regardless of any other layer.
    pub disable: BTreeSet<Feature>,
}

impl Overrides {
    pub fn new(layer: ConfigLayer) -> Self {
        Self {
            layer,
            disable: BTreeSet::new(),
        }
    }

    /// Force `feature` off.
    pub fn disable(mut self, feature: Feature) -> Self {
        self.disable.insert(feature);
        self
    }
}
