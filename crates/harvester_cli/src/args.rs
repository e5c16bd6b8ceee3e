use std::path::PathBuf;

use clap::Parser;
use harvester_engine::RetrievalStrategy;

#[derive(Debug, Clone, Parser)]
#[command(name = "page-harvester")]
#[command(about = "Save every page of a paginated online document viewer")]
#[command(version)]
pub struct Args {
    /// Viewer URL of the document to harvest
    pub url: String,

    /// Directory that receives page_NNN files (default: ./pages)
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Stop after this many distinct pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// RON settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How pages are collected: intercept, screenshot or download
    #[arg(long)]
    pub strategy: Option<RetrievalStrategy>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Wall-clock limit for the whole harvest
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
