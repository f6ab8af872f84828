//! Per-tick exit arbitration.
//!
//! Each control tick checks, in a fixed order, whether the run must end.  The
//! first condition that holds wins:
//!
//! 1. the touch latch is set,
//! 2. the current command is no longer `START`,
//! 3. the segment deadline has passed.
//!
//! Shutdown and vehicle faults are raised by the controller outside the tick
//! and never pass through [`evaluate_tick`].

use std::fmt;
use std::time::Instant;

use conechase_types::CommandKind;

use crate::timeout::TimeoutTimer;
use crate::touch_latch::TouchLatch;

/// Why a run left its control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakCondition {
    Touched,
    /// The executor replaced `START` with another command.
    CommandChanged(CommandKind),
    SegmentTimeout,
    /// Process-level shutdown was requested.
    Shutdown,
    /// The vehicle rejected a servo command mid-run.
    VehicleFault,
}

impl fmt::Display for BreakCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakCondition::Touched => f.write_str("touched"),
            BreakCondition::CommandChanged(kind) => write!(f, "command changed to {kind}"),
            BreakCondition::SegmentTimeout => f.write_str("segment timeout"),
            BreakCondition::Shutdown => f.write_str("shutdown"),
            BreakCondition::VehicleFault => f.write_str("vehicle fault"),
        }
    }
}

/// Evaluate the tick's exit conditions in priority order.
///
/// Returns `None` when the run should keep going.
pub fn evaluate_tick(
    latch: &TouchLatch,
    command: CommandKind,
    timer: &TimeoutTimer,
    now: Instant,
) -> Option<BreakCondition> {
    if latch.is_set() {
        return Some(BreakCondition::Touched);
    }
    if command != CommandKind::Start {
        return Some(BreakCondition::CommandChanged(command));
    }
    if timer.expired(now) {
        return Some(BreakCondition::SegmentTimeout);
    }
    None
}
