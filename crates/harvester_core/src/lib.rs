//! Harvester core: pure page-harvest state machine, source policy, content
//! sniffing and page ordinal resolution. No IO lives here.
mod classify;
mod effect;
mod msg;
mod ordinal;
mod policy;
mod state;
mod update;
mod view_model;

pub use classify::{AssetClassifier, AssetFormat, Rejection, DEFAULT_MIN_ASSET_BYTES};
pub use effect::Effect;
pub use msg::{Msg, WrittenPage};
pub use ordinal::{PageOrdinalResolver, Resolution};
pub use policy::{NextControl, PolicyError, SourceKind, SourcePolicy, KNOWN_ASSET_HOSTS};
pub use state::{
    HarvestLimits, HarvestState, Phase, TerminationReason, DEFAULT_EMPTY_RUN_THRESHOLD,
};
pub use update::update;
pub use view_model::HarvestView;

/// Resolved 1-based position of a page within the harvested document.
pub type Ordinal = u32;
