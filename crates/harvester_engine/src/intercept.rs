use engine_logging::{engine_debug, engine_trace, engine_warn};
use harvester_core::KNOWN_ASSET_HOSTS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::ResponseSource;
use crate::CapturedAsset;

const IMAGE_EXTENSIONS: &[&str] = &[".svgz", ".svg", ".png", ".jpg", ".jpeg", ".webp", ".gif"];

/// Decides which responses are page-asset candidates.
pub struct CaptureFilter;

impl CaptureFilter {
    /// Accept declared images, or responses from a known asset host whose
    /// path ends in an image-like extension.
    pub fn accepts(content_type: &str, origin: &str) -> bool {
        if content_type.to_ascii_lowercase().contains("image") {
            return true;
        }
        let lowered = origin.to_ascii_lowercase();
        let without_query = lowered
            .split_once(['?', '#'])
            .map_or(lowered.as_str(), |(path, _)| path);
        let on_asset_host = without_query
            .split_once("://")
            .map(|(_, rest)| rest.split('/').next().unwrap_or_default())
            .is_some_and(|host| {
                KNOWN_ASSET_HOSTS
                    .iter()
                    .any(|known| host == *known || host.ends_with(&format!(".{known}")))
            });
        on_asset_host
            && IMAGE_EXTENSIONS
                .iter()
                .any(|ext| without_query.ends_with(ext))
    }
}

/// Subscribes to a page's responses and buffers accepted bodies until the
/// retrieval loop drains them.
pub struct ResponseInterceptor;

impl ResponseInterceptor {
    pub fn attach(source: Box<dyn ResponseSource>, capacity: usize) -> CaptureQueue {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(pump(source, tx));
        CaptureQueue { rx, task }
    }
}

async fn pump(mut source: Box<dyn ResponseSource>, tx: mpsc::Sender<CapturedAsset>) {
    while let Some(response) = source.next_response().await {
        if !CaptureFilter::accepts(&response.content_type, &response.origin) {
            engine_trace!(
                "Ignoring response {} ({})",
                response.origin,
                response.content_type
            );
            continue;
        }
        match source.read_body(&response).await {
            Ok(bytes) => {
                engine_debug!("Intercepted {} ({} bytes)", response.origin, bytes.len());
                let asset = CapturedAsset {
                    origin: response.origin,
                    bytes,
                };
                if tx.send(asset).await.is_err() {
                    break;
                }
            }
            Err(err) => engine_warn!("Dropping response {}: {}", response.origin, err),
        }
    }
    engine_debug!("Response stream closed");
}

/// Buffer of captured assets. The retrieval loop is its only consumer.
pub struct CaptureQueue {
    rx: mpsc::Receiver<CapturedAsset>,
    task: JoinHandle<()>,
}

impl CaptureQueue {
    /// Take everything buffered so far, in arrival order.
    pub fn drain(&mut self) -> Vec<CapturedAsset> {
        let mut batch = Vec::new();
        while let Ok(asset) = self.rx.try_recv() {
            batch.push(asset);
        }
        batch
    }
}

impl Drop for CaptureQueue {
    fn drop(&mut self) {
        self.task.abort();
    }
}
