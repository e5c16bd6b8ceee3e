use std::path::PathBuf;

use crate::Ordinal;

/// A page that reached disk during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPage {
    pub ordinal: Ordinal,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Session acquired, interceptor attached and the target URL loaded.
    Started,
    /// One drain-and-write pass finished. `written` is in arrival order.
    PassCompleted { written: Vec<WrittenPage> },
    /// The navigation driver returned.
    NavigationFinished { advanced: bool },
    /// The external wall-clock deadline fired.
    DeadlineElapsed,
}
