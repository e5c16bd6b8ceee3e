use crate::{Ordinal, Phase};

/// Snapshot of a harvest in progress, for logging and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestView {
    pub phase: Phase,
    pub passes: u32,
    pub pages_saved: usize,
    pub consecutive_empty: u32,
    pub next_ordinal: Ordinal,
}
