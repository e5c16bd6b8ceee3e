use url::Url;

/// Hosts that serve page assets for the supported viewers. Responses from
/// these hosts are captured on their URL extension even when the declared
/// content type is not an image (svgz pages are often `application/octet-stream`).
pub const KNOWN_ASSET_HOSTS: &[&str] = &["calameoassets.com", "googleusercontent.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Calameo,
    GoogleDrive,
    Generic,
}

/// A "next page" control candidate tried by the navigation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    /// Plain CSS selector.
    Css(&'static str),
    /// First element among `tags` whose trimmed text equals `label`.
    Text {
        tags: &'static str,
        label: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid target url {url}: {message}")]
    InvalidTarget { url: String, message: String },
}

/// Per-source capture and navigation rules, derived once from the target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePolicy {
    pub kind: SourceKind,
    pub vector_only: bool,
}

const CALAMEO_CONTROLS: &[NextControl] = &[
    NextControl::Css("button.next"),
    NextControl::Css(".navigation .next"),
    NextControl::Css("[aria-label*='next' i]"),
    NextControl::Css(".next-page"),
];

const DRIVE_CONTROLS: &[NextControl] = &[
    NextControl::Css("[aria-label='Next page']"),
    NextControl::Css("[aria-label*='next' i]"),
    NextControl::Text {
        tags: "button, a",
        label: "Next",
    },
];

const GENERIC_CONTROLS: &[NextControl] = &[
    NextControl::Text {
        tags: "button",
        label: "Next",
    },
    NextControl::Text {
        tags: "button",
        label: "\u{2192}",
    },
    NextControl::Text {
        tags: "a",
        label: "Next",
    },
    NextControl::Css("[aria-label*='next' i]"),
    NextControl::Css(".next-page"),
    NextControl::Css("#next-page"),
];

impl SourcePolicy {
    pub fn for_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            vector_only: matches!(kind, SourceKind::Calameo),
        }
    }

    pub fn for_url(target: &str) -> Result<Self, PolicyError> {
        let parsed = Url::parse(target).map_err(|err| PolicyError::InvalidTarget {
            url: target.to_string(),
            message: err.to_string(),
        })?;
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let kind = if host_matches(&host, "calameo.com") {
            SourceKind::Calameo
        } else if host_matches(&host, "drive.google.com") || host_matches(&host, "docs.google.com")
        {
            SourceKind::GoogleDrive
        } else {
            SourceKind::Generic
        };
        Ok(Self::for_kind(kind))
    }

    /// Candidate "next" controls in priority order.
    pub fn next_controls(&self) -> &'static [NextControl] {
        match self.kind {
            SourceKind::Calameo => CALAMEO_CONTROLS,
            SourceKind::GoogleDrive => DRIVE_CONTROLS,
            SourceKind::Generic => GENERIC_CONTROLS,
        }
    }

    /// Key used when no explicit control could be clicked.
    pub fn fallback_key(&self) -> &'static str {
        "ArrowRight"
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
