//! Chromium-backed viewer session using chromiumoxide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use futures_util::StreamExt;
use harvester_core::NextControl;
use tokio::task::JoinHandle;

use crate::intercept::CaptureFilter;
use crate::session::{
    ObservedResponse, ResponseSource, SessionLauncher, ViewerPage, ViewerSession,
};
use crate::{HarvestError, HarvestSettings, SessionError, SessionFailure};

const CHROMIUM_PATH_ENV: &str = "HARVESTER_CHROMIUM_PATH";

/// Find the Chromium binary: env override, configured path, then `PATH`.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(path) = configured.filter(|p| p.exists()) {
        return Some(path.to_path_buf());
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Launches a fresh Chromium process per harvest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn acquire(
        &self,
        settings: &HarvestSettings,
    ) -> Result<Box<dyn ViewerSession>, HarvestError> {
        let chrome_path = find_chromium(settings.chromium_path.as_deref()).ok_or_else(|| {
            HarvestError::LaunchFailure(format!(
                "Chromium not found; set {CHROMIUM_PATH_ENV} or chromium_path"
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(settings.navigation_timeout())
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| HarvestError::LaunchFailure(format!("invalid browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::LaunchFailure(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_trace!("Browser handler event error: {}", err);
                }
            }
        });

        let page = match open_page(&browser, settings).await {
            Ok(page) => page,
            Err(err) => {
                shutdown_browser(&mut browser, handler_task).await;
                return Err(err);
            }
        };

        engine_info!("Chromium session ready (headless={})", settings.headless);
        Ok(Box::new(ChromiumSession {
            browser: Some((browser, handler_task)),
            page: ChromiumPage {
                page,
                timeout: settings.navigation_timeout(),
            },
        }))
    }
}

async fn open_page(browser: &Browser, settings: &HarvestSettings) -> Result<Page, HarvestError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| HarvestError::LaunchFailure(format!("failed to create page: {e}")))?;
    if let Some(user_agent) = settings.user_agent.as_deref() {
        page.set_user_agent(user_agent.to_string())
            .await
            .map_err(|e| HarvestError::LaunchFailure(format!("failed to set user agent: {e}")))?;
    }
    if let Err(err) = page.execute(EnableParams::default()).await {
        engine_warn!("Failed to enable the Network domain: {}", err);
    }
    Ok(page)
}

async fn shutdown_browser(browser: &mut Browser, handler_task: JoinHandle<()>) {
    if let Err(err) = browser.close().await {
        engine_warn!("Browser close failed: {}", err);
    }
    if let Err(err) = browser.wait().await {
        engine_warn!("Waiting for browser exit failed: {}", err);
    }
    handler_task.abort();
}

pub struct ChromiumSession {
    /// `None` once released.
    browser: Option<(Browser, JoinHandle<()>)>,
    page: ChromiumPage,
}

#[async_trait]
impl ViewerSession for ChromiumSession {
    fn page(&self) -> &dyn ViewerPage {
        &self.page
    }

    async fn responses(&mut self) -> Result<Box<dyn ResponseSource>, SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::new(
                SessionFailure::Closed,
                "responses requested after release",
            ));
        }
        let page = &self.page.page;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(protocol_error)?;
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(protocol_error)?;
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(protocol_error)?;
        Ok(Box::new(ChromiumResponseSource {
            page: page.clone(),
            responses,
            finished,
            failed,
            pending: PendingResponses::default(),
        }))
    }

    async fn release(&mut self) {
        let Some((mut browser, handler_task)) = self.browser.take() else {
            return;
        };
        if let Err(err) = self.page.page.clone().close().await {
            engine_debug!("Page close failed: {}", err);
        }
        shutdown_browser(&mut browser, handler_task).await;
        engine_info!("Chromium session released");
    }
}

pub struct ChromiumPage {
    page: Page,
    timeout: Duration,
}

impl ChromiumPage {
    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T, SessionError>
    where
        F: std::future::Future<Output = Result<T, chromiumoxide::error::CdpError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(protocol_error(err)),
            Err(_) => Err(SessionError::new(
                SessionFailure::NavigationTimeout,
                format!("{what} timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[async_trait]
impl ViewerPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.with_timeout("navigation", async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok(())
        })
        .await
    }

    async fn click_control(&self, control: &NextControl) -> Result<bool, SessionError> {
        match control {
            NextControl::Css(selector) => {
                let element = match self.page.find_element(*selector).await {
                    Ok(element) => element,
                    Err(err) => {
                        return Err(SessionError::new(
                            SessionFailure::ElementMissing,
                            format!("{selector}: {err}"),
                        ));
                    }
                };
                self.with_timeout("click", async {
                    element.click().await?;
                    Ok(())
                })
                .await?;
                Ok(true)
            }
            NextControl::Text { tags, label } => {
                let script = text_click_script(tags, label);
                let clicked: bool = self
                    .with_timeout("click", async { self.page.evaluate(script).await })
                    .await?
                    .into_value()
                    .map_err(|e| SessionError::new(SessionFailure::Protocol, format!("{e:?}")))?;
                Ok(clicked)
            }
        }
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.to_string())
                .code(key.to_string());
            if let Some(code) = virtual_key_code(key) {
                builder = builder.windows_virtual_key_code(code);
            }
            let params = builder
                .build()
                .map_err(|e| SessionError::new(SessionFailure::Protocol, e))?;
            self.with_timeout("key press", async {
                self.page.execute(params).await?;
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        let metrics = self
            .with_timeout("layout metrics", self.page.layout_metrics())
            .await?;
        let content = metrics.css_content_size;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(false)
            .capture_beyond_viewport(true)
            .clip(Viewport {
                x: 0.0,
                y: 0.0,
                width: content.width.ceil(),
                height: content.height.ceil(),
                scale: 1.0,
            })
            .build();
        let shot = self
            .with_timeout("screenshot", self.page.execute(params))
            .await?;
        let data: &str = shot.data.as_ref();
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| SessionError::new(SessionFailure::Protocol, e.to_string()))
    }

    async fn image_sources(&self) -> Result<Vec<String>, SessionError> {
        self.with_timeout("image listing", async {
            self.page.evaluate(IMAGE_SOURCES_SCRIPT).await
        })
        .await?
        .into_value()
        .map_err(|e| SessionError::new(SessionFailure::Protocol, format!("{e:?}")))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SessionError> {
        let script = fetch_script(url);
        let encoded: Option<String> = self
            .with_timeout("fetch", async { self.page.evaluate(script).await })
            .await?
            .into_value()
            .map_err(|e| SessionError::new(SessionFailure::Protocol, format!("{e:?}")))?;
        let encoded = encoded.ok_or_else(|| {
            SessionError::new(SessionFailure::BodyUnavailable, format!("{url} did not load"))
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SessionError::new(SessionFailure::BodyUnavailable, e.to_string()))
    }
}

const IMAGE_SOURCES_SCRIPT: &str =
    "Array.from(document.images, i => i.currentSrc || i.src).filter(Boolean)";

/// Fetch `url` inside the page so cookies and referrer match the viewer.
/// Resolves to the base64 body, or `null` on any failure.
fn fetch_script(url: &str) -> String {
    let url = serde_json::to_string(url).unwrap_or_else(|_| "\"\"".into());
    format!(
        "(async () => {{ try {{ const r = await fetch({url}, {{ credentials: 'include' }}); if (!r.ok) return null; const b = new Uint8Array(await r.arrayBuffer()); let s = ''; for (let i = 0; i < b.length; i += 0x8000) s += String.fromCharCode.apply(null, b.subarray(i, i + 0x8000)); return btoa(s); }} catch (e) {{ return null; }} }})()"
    )
}

fn text_click_script(tags: &str, label: &str) -> String {
    let tags = serde_json::to_string(tags).unwrap_or_else(|_| "\"button\"".into());
    let label = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".into());
    format!(
        "(() => {{ const el = Array.from(document.querySelectorAll({tags})).find(e => (e.textContent || '').trim() === {label}); if (!el) return false; el.click(); return true; }})()"
    )
}

fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "ArrowLeft" => Some(37),
        "ArrowUp" => Some(38),
        "ArrowRight" => Some(39),
        "ArrowDown" => Some(40),
        "PageDown" => Some(34),
        "Space" | " " => Some(32),
        _ => None,
    }
}

fn protocol_error(err: chromiumoxide::error::CdpError) -> SessionError {
    SessionError::new(SessionFailure::Protocol, err.to_string())
}

/// Pairs `responseReceived` with `loadingFinished` so bodies are only read
/// once they are complete.
struct ChromiumResponseSource {
    page: Page,
    responses: EventStream<EventResponseReceived>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
    pending: PendingResponses,
}

/// Responses waiting for their body to finish loading. Only capture
/// candidates are tracked, so the map stays as small as the asset set.
#[derive(Default)]
struct PendingResponses {
    by_request: HashMap<String, ObservedResponse>,
}

impl PendingResponses {
    fn received(&mut self, response: ObservedResponse) {
        if CaptureFilter::accepts(&response.content_type, &response.origin) {
            self.by_request
                .insert(response.request_id.clone(), response);
        } else {
            engine_trace!(
                "Not tracking {} ({})",
                response.origin,
                response.content_type
            );
        }
    }

    fn finished(&mut self, request_id: &str) -> Option<ObservedResponse> {
        self.by_request.remove(request_id)
    }

    fn failed(&mut self, request_id: &str) {
        self.by_request.remove(request_id);
    }

    fn len(&self) -> usize {
        self.by_request.len()
    }
}

#[async_trait]
impl ResponseSource for ChromiumResponseSource {
    async fn next_response(&mut self) -> Option<ObservedResponse> {
        loop {
            tokio::select! {
                biased;
                event = self.responses.next() => {
                    let event = event?;
                    self.pending.received(ObservedResponse {
                        request_id: event.request_id.inner().clone(),
                        origin: event.response.url.clone(),
                        content_type: event.response.mime_type.clone(),
                    });
                }
                event = self.finished.next() => {
                    let event = event?;
                    if let Some(response) = self.pending.finished(event.request_id.inner()) {
                        return Some(response);
                    }
                }
                event = self.failed.next() => {
                    let event = event?;
                    self.pending.failed(event.request_id.inner());
                }
            }
        }
    }

    async fn read_body(&self, response: &ObservedResponse) -> Result<Vec<u8>, SessionError> {
        let params = GetResponseBodyParams::new(RequestId::new(response.request_id.clone()));
        let body = self
            .page
            .execute(params)
            .await
            .map_err(|e| SessionError::new(SessionFailure::BodyUnavailable, e.to_string()))?
            .result;
        if body.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| SessionError::new(SessionFailure::BodyUnavailable, e.to_string()))
        } else {
            Ok(body.body.into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_click_script_escapes_label() {
        let script = text_click_script("button, a", "Next \"page\"");
        assert!(script.contains(r#"querySelectorAll("button, a")"#));
        assert!(script.contains(r#"=== "Next \"page\"""#));
    }

    #[test]
    fn fetch_script_escapes_url() {
        let script = fetch_script("https://cdn.example.com/p\"1.png");
        assert!(script.contains(r#"fetch("https://cdn.example.com/p\"1.png""#));
        assert!(script.starts_with("(async () =>"));
    }

    fn response(id: &str, origin: &str, content_type: &str) -> ObservedResponse {
        ObservedResponse {
            request_id: id.to_string(),
            origin: origin.to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn pending_responses_track_only_capture_candidates() {
        let mut pending = PendingResponses::default();
        pending.received(response("1", "https://viewer.example.com/app.js", "application/javascript"));
        pending.received(response("2", "https://viewer.example.com/", "text/html"));
        pending.received(response("3", "https://cdn.example.com/p1.png", "image/png"));
        assert_eq!(pending.len(), 1);

        assert_eq!(pending.finished("1"), None);
        assert_eq!(
            pending.finished("3").map(|r| r.origin),
            Some("https://cdn.example.com/p1.png".to_string())
        );
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn failed_loads_are_forgotten() {
        let mut pending = PendingResponses::default();
        pending.received(response("7", "https://cdn.example.com/p7.svg", "image/svg+xml"));
        pending.failed("7");
        assert_eq!(pending.finished("7"), None);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn arrow_keys_have_virtual_codes() {
        assert_eq!(virtual_key_code("ArrowRight"), Some(39));
        assert_eq!(virtual_key_code("F13"), None);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn launches_and_releases_twice() {
        let mut session = ChromiumLauncher
            .acquire(&HarvestSettings::default())
            .await
            .expect("launch");
        session
            .page()
            .goto("data:text/html,<button>Next</button>")
            .await
            .expect("navigate");
        let clicked = session
            .page()
            .click_control(&NextControl::Text {
                tags: "button",
                label: "Next",
            })
            .await
            .expect("click");
        assert!(clicked);
        session.release().await;
        session.release().await;
    }
}
