use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use harvester_core::{DEFAULT_EMPTY_RUN_THRESHOLD, DEFAULT_MIN_ASSET_BYTES};
use serde::Deserialize;
use thiserror::Error;

/// How a pass collects page candidates from the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Keep the image responses the viewer downloads.
    #[default]
    Intercept,
    /// One full-page PNG per pass, for canvas-rendered viewers.
    Screenshot,
    /// Read `<img>` sources from the document and fetch or decode them.
    Download,
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStrategy::Intercept => write!(f, "intercept"),
            RetrievalStrategy::Screenshot => write!(f, "screenshot"),
            RetrievalStrategy::Download => write!(f, "download"),
        }
    }
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intercept" => Ok(RetrievalStrategy::Intercept),
            "screenshot" => Ok(RetrievalStrategy::Screenshot),
            "download" => Ok(RetrievalStrategy::Download),
            other => Err(format!(
                "unknown strategy '{other}' (expected intercept, screenshot or download)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("empty_run_threshold must be at least 1")]
    ZeroEmptyRunThreshold,
    #[error("capture_queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Tunables for one harvest. Every field has a default so partial settings
/// files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub strategy: RetrievalStrategy,
    pub headless: bool,
    pub navigation_timeout_ms: u64,
    pub user_agent: Option<String>,
    /// Wait before each drain so in-flight responses can land.
    pub settle_delay_ms: u64,
    /// Extra wait after the target URL has loaded.
    pub initial_settle_ms: u64,
    /// Pause after a click or key press.
    pub post_action_delay_ms: u64,
    pub empty_run_threshold: u32,
    pub min_asset_bytes: usize,
    pub initial_navigation_retries: u32,
    pub capture_queue_capacity: usize,
    pub chromium_path: Option<PathBuf>,
    pub deadline_secs: Option<u64>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategy::default(),
            headless: true,
            navigation_timeout_ms: 30_000,
            user_agent: None,
            settle_delay_ms: 2_000,
            initial_settle_ms: 2_000,
            post_action_delay_ms: 1_000,
            empty_run_threshold: DEFAULT_EMPTY_RUN_THRESHOLD,
            min_asset_bytes: DEFAULT_MIN_ASSET_BYTES,
            initial_navigation_retries: 3,
            capture_queue_capacity: 256,
            chromium_path: None,
            deadline_secs: None,
        }
    }
}

impl HarvestSettings {
    /// Reject values that would make the loop stop or stall on its own.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.empty_run_threshold == 0 {
            return Err(SettingsError::ZeroEmptyRunThreshold);
        }
        if self.capture_queue_capacity == 0 {
            return Err(SettingsError::ZeroQueueCapacity);
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn post_action_delay(&self) -> Duration {
        Duration::from_millis(self.post_action_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
