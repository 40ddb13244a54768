//! Coordinator lifecycle states.

use std::fmt;

/// Lifecycle state of the ingestion coordinator.
///
/// ```text
/// Uninitialized --store ready--> Draining --queue empty--> Ready
///        \                          |                        |
///         `-------------------------+------------------------+--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    /// The message store is not available yet; events are buffered.
    #[default]
    Uninitialized,
    /// The store just became ready; buffered events are being processed in order.
    Draining,
    /// Steady state; events are processed as they arrive.
    Ready,
    /// Shut down, or gave up after repeated storage failures.
    Stopped,
}

impl CoordinatorState {
    /// Returns `true` in the steady state.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Draining => "draining",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
