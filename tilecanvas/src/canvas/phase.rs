//! Render cycle gating.

use std::fmt;

/// Whether render cycles may start.
///
/// ```text
/// Active    --[cancel_render]-->   Cancelled
/// Active    --[suppress_render]--> Suppressed
/// Suppressed --[cancel_render]-->  Cancelled
/// Cancelled --[suppress_render]--> Cancelled
/// *         --[request_render]-->  Active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderCyclePhase {
    #[default]
    Active,
    /// Running work was cancelled; no cycle starts until re-requested.
    Cancelled,
    /// Cycles are held back, running work continues.
    Suppressed,
}

impl RenderCyclePhase {
    pub fn allows_render(&self) -> bool {
        matches!(self, RenderCyclePhase::Active)
    }

    /// Phase after a suppress request. Cancellation dominates.
    pub fn suppressed(self) -> Self {
        match self {
            RenderCyclePhase::Cancelled => RenderCyclePhase::Cancelled,
            _ => RenderCyclePhase::Suppressed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderCyclePhase::Active => "active",
            RenderCyclePhase::Cancelled => "cancelled",
            RenderCyclePhase::Suppressed => "suppressed",
        }
    }
}

impl fmt::Display for RenderCyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
