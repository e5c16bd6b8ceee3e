mod args;
mod config;
mod report;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, LogDestination};
use harvester_engine::{ChromiumLauncher, Harvester};
use log::LevelFilter;

use crate::args::Args;
use crate::config::{load_config, resolve, HarvesterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => HarvesterConfig::default(),
    };
    let (request, settings) = resolve(&args, config);
    engine_info!(
        "page-harvester {} starting for {}",
        env!("CARGO_PKG_VERSION"),
        request.target_url
    );

    let harvester = Harvester::new(ChromiumLauncher, settings);
    let report = harvester
        .run(&request)
        .await
        .with_context(|| format!("harvest of {} failed", request.target_url))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report::render_json(&report))?);
    } else {
        print!("{}", report::render_text(&report));
    }
    Ok(())
}
