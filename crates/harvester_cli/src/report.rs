use std::fmt::Write as _;

use harvester_engine::{termination_tag, HarvestReport};
use serde_json::{json, Value};

pub fn render_text(report: &HarvestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Harvested {} page(s) from {} in {} pass(es): {}",
        report.paths.len(),
        report.target_url,
        report.passes,
        report.termination
    );
    for page in &report.pages {
        let _ = writeln!(
            out,
            "  {:>4}  {}  ({} bytes)",
            page.ordinal,
            page.path.display(),
            page.byte_len
        );
    }
    if let Some(manifest) = &report.manifest_path {
        let _ = writeln!(out, "Manifest: {}", manifest.display());
    }
    out
}

pub fn render_json(report: &HarvestReport) -> Value {
    json!({
        "target_url": report.target_url,
        "termination": termination_tag(report.termination),
        "passes": report.passes,
        "paths": report
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        "manifest": report.manifest_path.as_ref().map(|p| p.display().to_string()),
    })
}
