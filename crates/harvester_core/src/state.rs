use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::view_model::HarvestView;
use crate::{Ordinal, WrittenPage};

pub const DEFAULT_EMPTY_RUN_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestLimits {
    /// Stop once this many distinct pages are on disk.
    pub max_pages: Option<usize>,
    /// Stop after this many consecutive passes that wrote nothing.
    pub empty_run_threshold: u32,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            max_pages: None,
            empty_run_threshold: DEFAULT_EMPTY_RUN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    CapReached,
    EmptyRunThreshold,
    NavigationDeadEnd,
    DeadlineElapsed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::CapReached => write!(f, "page cap reached"),
            TerminationReason::EmptyRunThreshold => write!(f, "empty run threshold reached"),
            TerminationReason::NavigationDeadEnd => write!(f, "navigation dead end"),
            TerminationReason::DeadlineElapsed => write!(f, "deadline elapsed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Starting,
    Iterating,
    Terminated(TerminationReason),
}

/// Per-harvest bookkeeping. One instance per harvest, never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestState {
    phase: Phase,
    limits: HarvestLimits,
    ordinal_counter: Ordinal,
    consecutive_empty: u32,
    passes: u32,
    saved: BTreeMap<Ordinal, PathBuf>,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self::new(HarvestLimits::default())
    }
}

impl HarvestState {
    pub fn new(limits: HarvestLimits) -> Self {
        Self {
            phase: Phase::Starting,
            limits,
            ordinal_counter: 1,
            consecutive_empty: 0,
            passes: 0,
            saved: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    /// Fallback ordinal for assets whose URL carries no page number.
    pub fn ordinal_counter(&self) -> Ordinal {
        self.ordinal_counter
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Saved paths in ordinal order.
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved.values().cloned().collect()
    }

    pub fn saved(&self) -> &BTreeMap<Ordinal, PathBuf> {
        &self.saved
    }

    /// Whether writing `ordinal` keeps the harvest within the page cap, given
    /// the pages already written during the current pass. Rewriting an ordinal
    /// that is already on disk never grows the count.
    pub fn has_capacity_for(&self, ordinal: Ordinal, pending: &[WrittenPage]) -> bool {
        let Some(cap) = self.limits.max_pages else {
            return true;
        };
        let fresh: BTreeSet<Ordinal> = pending
            .iter()
            .map(|page| page.ordinal)
            .filter(|n| !self.saved.contains_key(n))
            .collect();
        if self.saved.contains_key(&ordinal) || fresh.contains(&ordinal) {
            return true;
        }
        self.saved.len() + fresh.len() < cap
    }

    pub fn view(&self) -> HarvestView {
        HarvestView {
            phase: self.phase,
            passes: self.passes,
            pages_saved: self.saved.len(),
            consecutive_empty: self.consecutive_empty,
            next_ordinal: self.ordinal_counter,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.phase = Phase::Iterating;
    }

    pub(crate) fn terminate(&mut self, reason: TerminationReason) {
        self.phase = Phase::Terminated(reason);
    }

    pub(crate) fn record_pass(&mut self, written: Vec<WrittenPage>) {
        self.passes += 1;
        let highest = written.iter().map(|page| page.ordinal).max();
        for page in written {
            self.saved.insert(page.ordinal, page.path);
        }
        match highest {
            Some(highest) => {
                self.consecutive_empty = 0;
                self.ordinal_counter = self.ordinal_counter.max(highest) + 1;
            }
            None => self.consecutive_empty += 1,
        }
    }

    pub(crate) fn stop_condition(&self) -> Option<TerminationReason> {
        if self
            .limits
            .max_pages
            .is_some_and(|cap| self.saved.len() >= cap)
        {
            return Some(TerminationReason::CapReached);
        }
        // A zero threshold would end every harvest after its first pass.
        if self.consecutive_empty >= self.limits.empty_run_threshold.max(1) {
            return Some(TerminationReason::EmptyRunThreshold);
        }
        None
    }
}
