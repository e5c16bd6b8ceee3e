use crate::TerminationReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Wait the settle delay, drain the capture queue and write what it holds.
    SettleAndDrain,
    /// Move the viewer to its next page.
    AdvanceNavigation,
    /// Close the browser session; the harvest is over.
    Release { reason: TerminationReason },
}
