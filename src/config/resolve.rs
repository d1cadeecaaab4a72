//! Merge defaults, file config and explicit overrides into one
//! [`ResolvedConfig`].
//!
//! ## Precedence
//!
//! Per field: override > file > default. A feature listed in
//! [`Overrides::disable`] is absent no matter what any layer says.
//!
//! ## Propagation
//!
//! Author identity feeds the cover and the signature; document identity
//! feeds the cover, and its version/date feed the footer. Propagation runs
//! after precedence, so overriding `author.name` changes every destination
//! at once. A destination-specific field (`cover.title`, `footer.date`, …)
//! replaces the propagated value at that destination only, and only when
//! it comes from a layer at least as strong as the one that supplied the
//! identity value.

use super::layer::{ConfigLayer, Overrides};
use super::{
    AuthorInfo, CoverSettings, DocumentInfo, Feature, FooterSettings, PageBreakSettings,
    PageSettings, ResolvedConfig, SignatureSettings, StyleSettings, TocSettings,
    WatermarkSettings,
};
use crate::env::{Clock, Environment};
use tracing::debug;

/// Resolve the three layers into a fully materialised configuration.
///
/// Never fails: structural validation belongs to
/// [`crate::config::load_config_file`].
pub fn resolve(
    defaults: &ConfigLayer,
    file: &ConfigLayer,
    overrides: &Overrides,
    env: &Environment,
) -> ResolvedConfig {
    let layers = Layers {
        defaults,
        file,
        overrides,
    };
    let clock = env.clock.as_ref();

    // ── Shared identity ──────────────────────────────────────────────────
    let author = AuthorIdentity {
        name: layers.sourced(|l| l.author.name.clone()),
        title: layers.sourced(|l| l.author.title.clone()),
        email: layers.sourced(|l| l.author.email.clone()),
        organization: layers.sourced(|l| l.author.organization.clone()),
    };
    let mut document = DocumentIdentity {
        title: layers.sourced(|l| l.document.title.clone()),
        subtitle: layers.sourced(|l| l.document.subtitle.clone()),
        version: layers.sourced(|l| l.document.version.clone()),
        date: layers.sourced(|l| l.document.date.clone()),
    };
    document.date.value = materialise_date(document.date.value, clock);

    // ── Feature blocks ───────────────────────────────────────────────────
    let style = layers.enabled(Feature::Style).then(|| StyleSettings {
        name: layers.value(|l| l.style.name.clone()),
        css_file: layers.value(|l| l.style.css_file.clone().map(Some)),
    });

    let cover = layers.enabled(Feature::Cover).then(|| CoverSettings {
        title: document.title.or_destination(layers.pick(|l| l.cover.title.clone())),
        subtitle: document
            .subtitle
            .or_destination(layers.pick(|l| l.cover.subtitle.clone())),
        author: author.name.value.clone(),
        author_title: author.title.value.clone(),
        organization: author.organization.value.clone(),
        version: document.version.value.clone(),
        date: document.date.value.clone(),
        logo: layers.value(|l| l.cover.logo.clone().map(Some)),
    });

    let signature = layers.enabled(Feature::Signature).then(|| SignatureSettings {
        name: author.name.value.clone(),
        title: author.title.value.clone(),
        email: author.email.value.clone(),
        organization: author.organization.value.clone(),
        image: layers.value(|l| l.signature.image.clone().map(Some)),
        links: layers.value(|l| l.signature.links.clone()),
    });

    let footer = layers.enabled(Feature::Footer).then(|| FooterSettings {
        position: layers.value(|l| l.footer.position),
        show_page_number: layers.value(|l| l.footer.show_page_number),
        text: layers.value(|l| l.footer.text.clone()),
        status: document
            .version
            .or_destination(layers.pick(|l| l.footer.status.clone())),
        date: materialise_date(
            document
                .date
                .or_destination(layers.pick(|l| l.footer.date.clone())),
            clock,
        ),
    });

    let watermark = layers.enabled(Feature::Watermark).then(|| WatermarkSettings {
        text: layers.value(|l| l.watermark.text.clone()),
        color: layers.value(|l| l.watermark.color.clone()),
        opacity: layers.value(|l| l.watermark.opacity),
        angle: layers.value(|l| l.watermark.angle),
    });

    let toc = layers.enabled(Feature::Toc).then(|| TocSettings {
        title: layers.value(|l| l.toc.title.clone()),
        min_depth: layers.value(|l| l.toc.min_depth),
        max_depth: layers.value(|l| l.toc.max_depth),
    });

    let page_breaks = layers.enabled(Feature::PageBreaks).then(|| PageBreakSettings {
        before_h1: layers.value(|l| l.page_breaks.before_h1),
        before_h2: layers.value(|l| l.page_breaks.before_h2),
        before_h3: layers.value(|l| l.page_breaks.before_h3),
        orphans: layers.value(|l| l.page_breaks.orphans),
        widows: layers.value(|l| l.page_breaks.widows),
    });

    let resolved = ResolvedConfig {
        author: AuthorInfo {
            name: author.name.value,
            title: author.title.value,
            email: author.email.value,
            organization: author.organization.value,
        },
        document: DocumentInfo {
            title: document.title.value,
            subtitle: document.subtitle.value,
            version: document.version.value,
            date: document.date.value,
        },
        page: PageSettings {
            size: layers.value(|l| l.page.size),
            orientation: layers.value(|l| l.page.orientation),
            margin_inches: layers.value(|l| l.page.margin_inches),
        },
        style,
        cover,
        signature,
        footer,
        watermark,
        toc,
        page_breaks,
    };

    debug!(
        "Resolved config: enabled features = [{}]",
        Feature::ALL
            .iter()
            .filter(|f| resolved.is_enabled(**f))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    resolved
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Which layer supplied a value. Ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    Default,
    File,
    Override,
}

/// A resolved value together with the layer it came from.
#[derive(Debug, Clone)]
struct Sourced {
    value: String,
    source: Source,
}

impl Sourced {
    /// The value to show at one destination: the destination-specific
    /// value if it is at least as strong as the identity value, else the
    /// identity value.
    fn or_destination(&self, destination: Option<(String, Source)>) -> String {
        match destination {
            Some((value, source)) if source >= self.source => value,
            _ => self.value.clone(),
        }
    }
}

struct AuthorIdentity {
    name: Sourced,
    title: Sourced,
    email: Sourced,
    organization: Sourced,
}

struct DocumentIdentity {
    title: Sourced,
    subtitle: Sourced,
    version: Sourced,
    date: Sourced,
}

struct Layers<'a> {
    defaults: &'a ConfigLayer,
    file: &'a ConfigLayer,
    overrides: &'a Overrides,
}

impl Layers<'_> {
    /// Strongest first.
    fn ordered(&self) -> [(Source, &ConfigLayer); 3] {
        [
            (Source::Override, &self.overrides.layer),
            (Source::File, self.file),
            (Source::Default, self.defaults),
        ]
    }

    /// The strongest layer's value for a field, with its origin.
    fn pick<T>(&self, field: impl Fn(&ConfigLayer) -> Option<T>) -> Option<(T, Source)> {
        self.ordered()
            .into_iter()
            .find_map(|(source, layer)| field(layer).map(|v| (v, source)))
    }

    /// The strongest layer's value, or `T::default()` when no layer sets it.
    fn value<T: Default>(&self, field: impl Fn(&ConfigLayer) -> Option<T>) -> T {
        self.pick(field).map(|(v, _)| v).unwrap_or_default()
    }

    fn sourced(&self, field: impl Fn(&ConfigLayer) -> Option<String>) -> Sourced {
        match self.pick(field) {
            Some((value, source)) => Sourced { value, source },
            None => Sourced {
                value: String::new(),
                source: Source::Default,
            },
        }
    }

    /// Disable directives always win; otherwise the strongest explicit
    /// `enabled` decides, defaulting to off.
    fn enabled(&self, feature: Feature) -> bool {
        if self.overrides.disable.contains(&feature) {
            return false;
        }
        self.pick(|l| l.enabled(feature))
            .map(|(on, _)| on)
            .unwrap_or(false)
    }
}

fn materialise_date(date: String, clock: &dyn Clock) -> String {
    if date.trim().eq_ignore_ascii_case("auto") {
        clock.today().format("%Y-%m-%d").to_string()
    } else {
        date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::layer::{AuthorLayer, CoverLayer, DocumentLayer, FooterLayer};
    use crate::config::{FooterPosition, PageSize};
    use crate::env::FixedClock;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn env() -> Environment {
        Environment::system().with_clock(Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        )))
    }

    fn with_cover_and_signature(mut layer: ConfigLayer) -> ConfigLayer {
        layer.cover.enabled = Some(true);
        layer.signature.enabled = Some(true);
        layer
    }

    #[test]
    fn override_beats_file_in_every_destination() {
        let file = with_cover_and_signature(ConfigLayer {
            author: AuthorLayer {
                name: Some("Config Author".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        let overrides = Overrides::new(ConfigLayer {
            author: AuthorLayer {
                name: Some("CLI Author".into()),
                ..Default::default()
            },
            ..Default::default()
        });

        let resolved = resolve(&ConfigLayer::builtin(), &file, &overrides, &env());

        assert_eq!(resolved.author.name, "CLI Author");
        assert_eq!(resolved.cover.unwrap().author, "CLI Author");
        assert_eq!(resolved.signature.unwrap().name, "CLI Author");
    }

    #[test]
    fn file_identity_propagates_without_override() {
        let file = with_cover_and_signature(ConfigLayer {
            author: AuthorLayer {
                name: Some("John Doe".into()),
                email: Some("john@example.com".into()),
                ..Default::default()
            },
            ..Default::default()
        });

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::default(),
            &env(),
        );

        assert_eq!(resolved.cover.as_ref().unwrap().author, "John Doe");
        assert_eq!(resolved.signature.as_ref().unwrap().email, "john@example.com");
    }

    #[test]
    fn document_identity_reaches_cover_and_footer() {
        let file = with_cover_and_signature(ConfigLayer {
            document: DocumentLayer {
                version: Some("v1.2".into()),
                date: Some("2023-01-01".into()),
                ..Default::default()
            },
            ..Default::default()
        });

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::default(),
            &env(),
        );

        let cover = resolved.cover.unwrap();
        let footer = resolved.footer.unwrap();
        assert_eq!(cover.version, "v1.2");
        assert_eq!(cover.date, "2023-01-01");
        assert_eq!(footer.status, "v1.2");
        assert_eq!(footer.date, "2023-01-01");
    }

    #[test]
    fn disable_override_beats_file_enable() {
        let file = with_cover_and_signature(ConfigLayer::default());
        let overrides = Overrides::default()
            .disable(Feature::Cover)
            .disable(Feature::Footer);

        let resolved = resolve(&ConfigLayer::builtin(), &file, &overrides, &env());

        assert!(resolved.cover.is_none());
        assert!(resolved.footer.is_none());
        assert!(resolved.signature.is_some());
    }

    #[test]
    fn disable_wins_even_when_override_layer_enables() {
        let mut layer = ConfigLayer::default();
        layer.watermark.enabled = Some(true);
        let overrides = Overrides::new(layer).disable(Feature::Watermark);

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &ConfigLayer::default(),
            &overrides,
            &env(),
        );

        assert!(resolved.watermark.is_none());
    }

    #[test]
    fn file_can_switch_off_a_default_feature() {
        let mut file = ConfigLayer::default();
        file.footer.enabled = Some(false);

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::default(),
            &env(),
        );

        assert!(resolved.footer.is_none());
        assert!(resolved.page_breaks.is_some(), "untouched defaults stay on");
    }

    #[test]
    fn cover_specific_title_does_not_leak_into_identity() {
        let file = with_cover_and_signature(ConfigLayer {
            document: DocumentLayer {
                title: Some("Annual Report".into()),
                ..Default::default()
            },
            cover: CoverLayer {
                enabled: Some(true),
                title: Some("Annual Report 2024".into()),
                ..Default::default()
            },
            ..Default::default()
        });

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::default(),
            &env(),
        );

        assert_eq!(resolved.cover.unwrap().title, "Annual Report 2024");
        assert_eq!(resolved.document.title, "Annual Report");
    }

    #[test]
    fn weaker_destination_value_yields_to_stronger_identity() {
        let file = ConfigLayer {
            footer: FooterLayer {
                status: Some("Draft".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let overrides = Overrides::new(ConfigLayer {
            document: DocumentLayer {
                version: Some("v2.0".into()),
                ..Default::default()
            },
            ..Default::default()
        });

        let resolved = resolve(&ConfigLayer::builtin(), &file, &overrides, &env());

        assert_eq!(resolved.footer.unwrap().status, "v2.0");
    }

    #[test]
    fn auto_date_uses_injected_clock() {
        let mut file = with_cover_and_signature(ConfigLayer::default());
        file.footer.date = Some("AUTO".into());

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::default(),
            &env(),
        );

        assert_eq!(resolved.document.date, "2024-03-15");
        assert_eq!(resolved.cover.unwrap().date, "2024-03-15");
        assert_eq!(resolved.footer.unwrap().date, "2024-03-15");
    }

    #[test]
    fn non_identity_fields_follow_precedence() {
        let mut file = ConfigLayer::default();
        file.page.size = Some(PageSize::A4);
        file.footer.position = Some(FooterPosition::Left);
        file.footer.text = Some("Confidential".into());
        let mut over = ConfigLayer::default();
        over.footer.position = Some(FooterPosition::Center);

        let resolved = resolve(
            &ConfigLayer::builtin(),
            &file,
            &Overrides::new(over),
            &env(),
        );

        assert_eq!(resolved.page.size, PageSize::A4);
        assert!((resolved.page.margin_inches - 0.5).abs() < f32::EPSILON);
        let footer = resolved.footer.unwrap();
        assert_eq!(footer.position, FooterPosition::Center);
        assert_eq!(footer.text, "Confidential");
        assert!(footer.show_page_number);
    }

    #[test]
    fn empty_layers_resolve_to_everything_off() {
        let resolved = resolve(
            &ConfigLayer::default(),
            &ConfigLayer::default(),
            &Overrides::default(),
            &env(),
        );
        for feature in Feature::ALL {
            assert!(!resolved.is_enabled(feature), "{feature} should be off");
        }
        assert_eq!(resolved.author, AuthorInfo::default());
    }
}
