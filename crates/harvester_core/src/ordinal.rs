use std::sync::LazyLock;

use engine_logging::engine_warn;
use regex::Regex;

use crate::Ordinal;

struct OrdinalRule {
    name: &'static str,
    pattern: &'static Regex,
}

static PAGE_MARKER_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:page|pg|p)[-_]?(\d{1,5})(?:[-_./?#]|$)").expect("valid page marker regex")
});

static PAGE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](?:page|pg|p)=(\d{1,5})(?:&|#|$)").expect("valid page query regex")
});

static DIGITS_BEFORE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{1,5})\.(?:svgz|svg|png|jpe?g|webp|gif)(?:[?#]|$)")
        .expect("valid extension regex")
});

/// Outcome of resolving one origin URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Matched { ordinal: Ordinal, rule: &'static str },
    Fallback { ordinal: Ordinal },
}

impl Resolution {
    pub fn ordinal(&self) -> Ordinal {
        match self {
            Resolution::Matched { ordinal, .. } | Resolution::Fallback { ordinal } => *ordinal,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// Derives an asset's page position from its origin URL.
///
/// Rules are tried in a fixed order and the first positive match wins:
/// a path segment made of a page marker and digits (`/p12_`, `/page-3.png`),
/// a page query parameter (`?page=4`), then a number directly before an
/// image extension (`scan_0007.jpg`).
pub struct PageOrdinalResolver {
    rules: Vec<OrdinalRule>,
}

impl Default for PageOrdinalResolver {
    fn default() -> Self {
        Self {
            rules: vec![
                OrdinalRule {
                    name: "page_marker_segment",
                    pattern: &PAGE_MARKER_SEGMENT,
                },
                OrdinalRule {
                    name: "page_query",
                    pattern: &PAGE_QUERY,
                },
                OrdinalRule {
                    name: "digits_before_extension",
                    pattern: &DIGITS_BEFORE_EXTENSION,
                },
            ],
        }
    }
}

impl PageOrdinalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `origin` to a page ordinal, or `fallback` when no rule matches.
    pub fn resolve(&self, origin: &str, fallback: Ordinal) -> Resolution {
        for rule in &self.rules {
            let ordinal = rule
                .pattern
                .captures(origin)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<Ordinal>().ok())
                .filter(|n| *n > 0);
            if let Some(ordinal) = ordinal {
                return Resolution::Matched {
                    ordinal,
                    rule: rule.name,
                };
            }
        }
        engine_warn!(
            "No page ordinal in {}; falling back to sequence position {}",
            origin,
            fallback
        );
        Resolution::Fallback { ordinal: fallback }
    }
}
