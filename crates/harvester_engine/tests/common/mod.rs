//! Scripted stand-ins for the browser seam.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use harvester_core::NextControl;
use harvester_engine::{
    HarvestError, HarvestSettings, ObservedResponse, ResponseSource, SessionError, SessionFailure,
    SessionLauncher, ViewerPage, ViewerSession,
};
use tokio::sync::mpsc;

/// One response the fake viewer emits. `body: None` makes the body read fail.
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub origin: String,
    pub content_type: String,
    pub body: Option<Vec<u8>>,
}

pub fn response(origin: &str, content_type: &str, body: Vec<u8>) -> FakeResponse {
    FakeResponse {
        origin: origin.to_string(),
        content_type: content_type.to_string(),
        body: Some(body),
    }
}

pub fn gzip_page(len: usize, fill: u8) -> Vec<u8> {
    let mut bytes = vec![0x1F, 0x8B, 0x08, 0x00];
    bytes.resize(len, fill);
    bytes
}

pub fn png_page(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len, 0);
    bytes
}

/// A PNG whose body differs per `fill`, as successive screenshots would.
pub fn png_frame(len: usize, fill: u8) -> Vec<u8> {
    let mut bytes = png_page(8);
    bytes.resize(len, fill);
    bytes
}

pub fn svg_page(len: usize) -> Vec<u8> {
    let mut bytes = b"<?xml version=\"1.0\"?><svg xmlns=\"http://www.w3.org/2000/svg\">".to_vec();
    bytes.resize(len, b' ');
    bytes
}

/// Counters shared between a test and the fakes it hands to the harvester.
#[derive(Default)]
pub struct Counters {
    pub gotos: AtomicUsize,
    pub clicks: AtomicUsize,
    pub key_presses: AtomicUsize,
    pub releases: AtomicUsize,
    pub acquisitions: AtomicUsize,
    pub screenshots: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl Counters {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

type StepFn = dyn Fn(usize) -> Vec<FakeResponse> + Send + Sync;
type FrameFn = dyn Fn(usize) -> Vec<u8> + Send + Sync;
type ImagesFn = dyn Fn(usize) -> Vec<String> + Send + Sync;

/// Viewer behaviour: what each page step emits and which interactions work.
pub struct Script {
    /// Responses emitted by the initial load (step 0) and each advance.
    pub steps: Box<StepFn>,
    pub has_next_control: bool,
    pub key_press_fails: bool,
    pub goto_failures: usize,
    /// Rendered document for the page currently shown.
    pub frames: Box<FrameFn>,
    /// `<img>` sources of the page currently shown.
    pub images: Box<ImagesFn>,
    /// Bodies served to in-page fetches; other URLs fail.
    pub remote: HashMap<String, Vec<u8>>,
}

impl Script {
    pub fn new(steps: impl Fn(usize) -> Vec<FakeResponse> + Send + Sync + 'static) -> Self {
        Self {
            steps: Box::new(steps),
            has_next_control: true,
            key_press_fails: false,
            goto_failures: 0,
            frames: Box::new(|_| Vec::new()),
            images: Box::new(|_| Vec::new()),
            remote: HashMap::new(),
        }
    }

    /// A viewer that renders `frames` and emits no network traffic.
    pub fn rendered(frames: impl Fn(usize) -> Vec<u8> + Send + Sync + 'static) -> Self {
        let mut script = Self::new(|_| Vec::new());
        script.frames = Box::new(frames);
        script
    }

    /// A viewer whose pages are `<img>` elements.
    pub fn with_images(
        images: impl Fn(usize) -> Vec<String> + Send + Sync + 'static,
        remote: HashMap<String, Vec<u8>>,
    ) -> Self {
        let mut script = Self::new(|_| Vec::new());
        script.images = Box::new(images);
        script.remote = remote;
        script
    }
}

struct Network {
    tx: mpsc::UnboundedSender<ObservedResponse>,
    bodies: Arc<Mutex<HashMap<String, Option<Vec<u8>>>>>,
    next_id: AtomicUsize,
}

impl Network {
    fn emit(&self, responses: Vec<FakeResponse>) {
        for response in responses {
            let id = format!("req-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.bodies
                .lock()
                .unwrap()
                .insert(id.clone(), response.body);
            let _ = self.tx.send(ObservedResponse {
                request_id: id,
                origin: response.origin,
                content_type: response.content_type,
            });
        }
    }
}

pub struct FakePage {
    script: Script,
    network: Network,
    step: AtomicUsize,
    counters: Arc<Counters>,
}

impl FakePage {
    fn emit_next_step(&self) {
        let step = self.step.fetch_add(1, Ordering::SeqCst);
        self.network.emit((self.script.steps)(step));
    }

    fn shown_step(&self) -> usize {
        self.step.load(Ordering::SeqCst).saturating_sub(1)
    }
}

#[async_trait]
impl ViewerPage for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), SessionError> {
        let attempt = self.counters.gotos.fetch_add(1, Ordering::SeqCst);
        if attempt < self.script.goto_failures {
            return Err(SessionError {
                kind: SessionFailure::NavigationTimeout,
                message: "scripted timeout".into(),
            });
        }
        self.emit_next_step();
        Ok(())
    }

    async fn click_control(&self, control: &NextControl) -> Result<bool, SessionError> {
        if !self.script.has_next_control {
            // Selector lookups fail loudly; text matches just find nothing.
            return match control {
                NextControl::Css(selector) => Err(SessionError {
                    kind: SessionFailure::ElementMissing,
                    message: format!("no element matches {selector}"),
                }),
                NextControl::Text { .. } => Ok(false),
            };
        }
        self.counters.clicks.fetch_add(1, Ordering::SeqCst);
        self.emit_next_step();
        Ok(true)
    }

    async fn press_key(&self, _key: &str) -> Result<(), SessionError> {
        self.counters.key_presses.fetch_add(1, Ordering::SeqCst);
        if self.script.key_press_fails {
            return Err(SessionError {
                kind: SessionFailure::Protocol,
                message: "scripted key failure".into(),
            });
        }
        self.emit_next_step();
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.counters.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok((self.script.frames)(self.shown_step()))
    }

    async fn image_sources(&self) -> Result<Vec<String>, SessionError> {
        Ok((self.script.images)(self.shown_step()))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SessionError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .remote
            .get(url)
            .cloned()
            .ok_or_else(|| SessionError {
                kind: SessionFailure::BodyUnavailable,
                message: format!("{url} not served"),
            })
    }
}

pub struct FakeSource {
    rx: mpsc::UnboundedReceiver<ObservedResponse>,
    bodies: Arc<Mutex<HashMap<String, Option<Vec<u8>>>>>,
}

#[async_trait]
impl ResponseSource for FakeSource {
    async fn next_response(&mut self) -> Option<ObservedResponse> {
        self.rx.recv().await
    }

    async fn read_body(&self, response: &ObservedResponse) -> Result<Vec<u8>, SessionError> {
        self.bodies
            .lock()
            .unwrap()
            .get(&response.request_id)
            .cloned()
            .flatten()
            .ok_or_else(|| SessionError {
                kind: SessionFailure::BodyUnavailable,
                message: "no body".into(),
            })
    }
}

pub struct FakeSession {
    page: FakePage,
    source: Option<FakeSource>,
    counters: Arc<Counters>,
    released: bool,
}

#[async_trait]
impl ViewerSession for FakeSession {
    fn page(&self) -> &dyn ViewerPage {
        &self.page
    }

    async fn responses(&mut self) -> Result<Box<dyn ResponseSource>, SessionError> {
        let source = self.source.take().ok_or_else(|| SessionError {
            kind: SessionFailure::Closed,
            message: "already subscribed".into(),
        })?;
        Ok(Box::new(source))
    }

    async fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn fake_session(script: Script, counters: Arc<Counters>) -> FakeSession {
    let (tx, rx) = mpsc::unbounded_channel();
    let bodies = Arc::new(Mutex::new(HashMap::new()));
    FakeSession {
        page: FakePage {
            script,
            network: Network {
                tx,
                bodies: bodies.clone(),
                next_id: AtomicUsize::new(0),
            },
            step: AtomicUsize::new(0),
            counters: counters.clone(),
        },
        source: Some(FakeSource { rx, bodies }),
        counters,
        released: false,
    }
}

/// Hands out one scripted session, or fails to launch when it has none.
pub struct FakeLauncher {
    session: Mutex<Option<FakeSession>>,
    counters: Arc<Counters>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let launcher = Self {
            session: Mutex::new(Some(fake_session(script, counters.clone()))),
            counters: counters.clone(),
        };
        (launcher, counters)
    }

    pub fn broken() -> Self {
        Self {
            session: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn acquire(
        &self,
        _settings: &HarvestSettings,
    ) -> Result<Box<dyn ViewerSession>, HarvestError> {
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        let session = self.session.lock().unwrap().take();
        match session {
            Some(session) => Ok(Box::new(session)),
            None => Err(HarvestError::LaunchFailure("no browser available".into())),
        }
    }
}
