//! Harvester engine: browser session, network capture, navigation and the
//! retrieval loop that persists page assets.
mod chromium;
mod collect;
mod engine;
mod filename;
mod intercept;
mod manifest;
mod navigate;
mod persist;
mod session;
mod settings;
mod types;

pub use chromium::{find_chromium, ChromiumLauncher, ChromiumPage, ChromiumSession};
pub use engine::Harvester;
pub use filename::page_filename;
pub use intercept::{CaptureFilter, CaptureQueue, ResponseInterceptor};
pub use manifest::{termination_tag, write_manifest, MANIFEST_FILENAME};
pub use navigate::NavigationDriver;
pub use persist::{ensure_output_dir, AssetWriter, AtomicFileWriter, PersistError};
pub use session::{ObservedResponse, ResponseSource, SessionLauncher, ViewerPage, ViewerSession};
pub use settings::{HarvestSettings, RetrievalStrategy, SettingsError};
pub use types::{
    CapturedAsset, HarvestError, HarvestReport, HarvestRequest, ResolvedAsset, SavedPage,
    SessionError, SessionFailure,
};
