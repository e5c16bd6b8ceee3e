use std::collections::HashSet;

use base64::Engine as _;
use engine_logging::{engine_debug, engine_warn};
use sha2::{Digest, Sha256};

use crate::intercept::CaptureQueue;
use crate::session::ViewerPage;
use crate::CapturedAsset;

const SCREENSHOT_ORIGIN: &str = "screenshot";

/// Gathers one pass worth of page candidates, according to the strategy.
pub(crate) enum PassCollector {
    Intercept(CaptureQueue),
    Screenshot {
        last_digest: Option<Vec<u8>>,
    },
    Download {
        seen: HashSet<String>,
    },
}

impl PassCollector {
    pub(crate) fn screenshot() -> Self {
        PassCollector::Screenshot { last_digest: None }
    }

    pub(crate) fn download() -> Self {
        PassCollector::Download {
            seen: HashSet::new(),
        }
    }

    /// Candidates carry no page number of their own; the pass position is
    /// their ordinal.
    pub(crate) fn is_positional(&self) -> bool {
        matches!(self, PassCollector::Screenshot { .. })
    }

    pub(crate) async fn collect(&mut self, page: &dyn ViewerPage) -> Vec<CapturedAsset> {
        match self {
            PassCollector::Intercept(queue) => queue.drain(),
            PassCollector::Screenshot { last_digest } => {
                let bytes = match page.screenshot().await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        engine_warn!("Screenshot failed: {}", err);
                        return Vec::new();
                    }
                };
                let digest = Sha256::digest(&bytes).to_vec();
                if last_digest.replace(digest.clone()) == Some(digest) {
                    engine_debug!("Viewer shows the same page as the last pass");
                    return Vec::new();
                }
                vec![CapturedAsset {
                    origin: SCREENSHOT_ORIGIN.to_string(),
                    bytes,
                }]
            }
            PassCollector::Download { seen } => {
                let sources = match page.image_sources().await {
                    Ok(sources) => sources,
                    Err(err) => {
                        engine_warn!("Could not list document images: {}", err);
                        return Vec::new();
                    }
                };
                let mut batch = Vec::new();
                for src in sources {
                    if !seen.insert(src.clone()) {
                        continue;
                    }
                    if let Some(asset) = download_one(page, &src).await {
                        batch.push(asset);
                    }
                }
                batch
            }
        }
    }
}

async fn download_one(page: &dyn ViewerPage, src: &str) -> Option<CapturedAsset> {
    if src.starts_with("data:") {
        let Some(bytes) = decode_data_url(src) else {
            engine_debug!("Skipping undecodable data URL");
            return None;
        };
        // The payload is no use for ordinal rules or logs.
        let header = src.split_once(',').map_or(src, |(head, _)| head);
        return Some(CapturedAsset {
            origin: header.to_string(),
            bytes,
        });
    }
    match page.fetch(src).await {
        Ok(bytes) => Some(CapturedAsset {
            origin: src.to_string(),
            bytes,
        }),
        Err(err) => {
            engine_warn!("Dropping image {}: {}", src, err);
            None
        }
    }
}

/// Decode a `data:image/...;base64,` URL.
pub(crate) fn decode_data_url(src: &str) -> Option<Vec<u8>> {
    let (header, payload) = src.strip_prefix("data:image/")?.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
}
