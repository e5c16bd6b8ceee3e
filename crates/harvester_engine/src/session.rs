//! Browser seam: the retrieval loop only talks to these traits, so the same
//! loop drives Chromium in production and scripted fakes in tests.

use async_trait::async_trait;
use harvester_core::NextControl;

use crate::{HarvestError, HarvestSettings, SessionError};

/// A response that has finished loading in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub request_id: String,
    pub origin: String,
    pub content_type: String,
}

/// Push-based stream of finished network responses for one page.
#[async_trait]
pub trait ResponseSource: Send + Sync + 'static {
    /// Next finished response, or `None` once the page is gone.
    async fn next_response(&mut self) -> Option<ObservedResponse>;

    async fn read_body(&self, response: &ObservedResponse) -> Result<Vec<u8>, SessionError>;
}

/// The single page shared by the interceptor and the navigation driver.
#[async_trait]
pub trait ViewerPage: Send + Sync {
    /// Load `url` and wait for the load to settle.
    async fn goto(&self, url: &str) -> Result<(), SessionError>;

    /// Click `control` if it exists. A selector that matches nothing is an
    /// `ElementMissing` error; a text match that finds nothing is `Ok(false)`.
    async fn click_control(&self, control: &NextControl) -> Result<bool, SessionError>;

    async fn press_key(&self, key: &str) -> Result<(), SessionError>;

    /// PNG of the whole rendered document.
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;

    /// `src` of every `<img>` in document order.
    async fn image_sources(&self) -> Result<Vec<String>, SessionError>;

    /// Fetch `url` from inside the page, with its cookies and origin.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SessionError>;
}

/// Browser process, context and page, scoped together.
#[async_trait]
pub trait ViewerSession: Send {
    fn page(&self) -> &dyn ViewerPage;

    /// Subscribe to the page's network responses.
    async fn responses(&mut self) -> Result<Box<dyn ResponseSource>, SessionError>;

    /// Tear everything down. Safe to call more than once.
    async fn release(&mut self);
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn acquire(
        &self,
        settings: &HarvestSettings,
    ) -> Result<Box<dyn ViewerSession>, HarvestError>;
}
