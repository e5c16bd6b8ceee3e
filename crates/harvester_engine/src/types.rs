use std::fmt;
use std::path::PathBuf;

use harvester_core::{AssetFormat, Ordinal, PolicyError, TerminationReason};

use crate::persist::PersistError;
use crate::settings::SettingsError;

/// One network response body captured from the viewer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAsset {
    pub origin: String,
    pub bytes: Vec<u8>,
}

/// A captured asset with its page position and sniffed format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub ordinal: Ordinal,
    pub bytes: Vec<u8>,
    pub format: AssetFormat,
}

/// A page that is on disk at the end of the harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
    pub ordinal: Ordinal,
    pub path: PathBuf,
    pub format: AssetFormat,
    pub byte_len: u64,
    pub sha256: String,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRequest {
    pub target_url: String,
    pub output_dir: PathBuf,
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub target_url: String,
    /// Saved files in strictly increasing ordinal order.
    pub paths: Vec<PathBuf>,
    pub pages: Vec<SavedPage>,
    pub termination: TerminationReason,
    pub passes: u32,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("browser launch failed: {0}")]
    LaunchFailure(String),
    #[error("navigation to {url} failed: {message}")]
    InitialNavigation { url: String, message: String },
    #[error(transparent)]
    InvalidTarget(#[from] PolicyError),
    #[error("output directory unusable: {0}")]
    OutputDir(#[from] PersistError),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: SessionFailure,
    pub message: String,
}

impl SessionError {
    pub(crate) fn new(kind: SessionFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    NavigationTimeout,
    ElementMissing,
    BodyUnavailable,
    Protocol,
    Closed,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::NavigationTimeout => write!(f, "navigation timeout"),
            SessionFailure::ElementMissing => write!(f, "element missing"),
            SessionFailure::BodyUnavailable => write!(f, "response body unavailable"),
            SessionFailure::Protocol => write!(f, "browser protocol error"),
            SessionFailure::Closed => write!(f, "session closed"),
        }
    }
}
