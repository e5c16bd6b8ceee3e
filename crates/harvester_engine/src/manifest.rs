use std::path::{Path, PathBuf};

use harvester_core::TerminationReason;
use serde_json::json;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::SavedPage;

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Write `manifest.json` describing every page on disk, in ordinal order.
pub fn write_manifest(
    output_dir: &Path,
    target_url: &str,
    termination: TerminationReason,
    passes: u32,
    pages: &[SavedPage],
) -> Result<PathBuf, PersistError> {
    let manifest = json!({
        "target_url": target_url,
        "termination": termination_tag(termination),
        "passes": passes,
        "page_count": pages.len(),
        "total_bytes": pages.iter().map(|p| p.byte_len).sum::<u64>(),
        "pages": pages.iter().map(|page| {
            json!({
                "ordinal": page.ordinal,
                "filename": page
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                "bytes": page.byte_len,
                "sha256": page.sha256,
                "origin": page.origin,
            })
        }).collect::<Vec<_>>()
    });
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    writer.write(MANIFEST_FILENAME, manifest.to_string().as_bytes())
}

/// Stable machine-readable tag for a termination reason.
pub fn termination_tag(reason: TerminationReason) -> &'static str {
    match reason {
        TerminationReason::CapReached => "cap_reached",
        TerminationReason::EmptyRunThreshold => "empty_run_threshold",
        TerminationReason::NavigationDeadEnd => "navigation_dead_end",
        TerminationReason::DeadlineElapsed => "deadline_elapsed",
    }
}
