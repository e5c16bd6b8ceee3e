use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_logging::engine_info;
use harvester_engine::{HarvestRequest, HarvestSettings};
use serde::Deserialize;

use crate::args::Args;

const DEFAULT_OUTPUT_DIR: &str = "./pages";

/// Contents of a `--config` file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub output_dir: Option<PathBuf>,
    pub max_pages: Option<usize>,
    pub settings: HarvestSettings,
}

pub fn load_config(path: &Path) -> anyhow::Result<HarvesterConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: HarvesterConfig = ron::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(config)
}

/// Merge command-line flags over the file config. Flags win.
pub fn resolve(args: &Args, config: HarvesterConfig) -> (HarvestRequest, HarvestSettings) {
    let mut settings = config.settings;
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if args.headed {
        settings.headless = false;
    }
    if let Some(user_agent) = &args.user_agent {
        settings.user_agent = Some(user_agent.clone());
    }
    if let Some(secs) = args.deadline_secs {
        settings.deadline_secs = Some(secs);
    }

    let request = HarvestRequest {
        target_url: args.url.clone(),
        output_dir: args
            .output_dir
            .clone()
            .or(config.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        max_pages: args.max_pages.or(config.max_pages),
    };
    (request, settings)
}
