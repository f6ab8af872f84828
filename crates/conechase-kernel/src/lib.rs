//! `conechase-kernel` – Run arbitration
//!
//! Small, clock-agnostic building blocks that decide when a state's run ends
//! and what it reports.  Nothing here performs I/O.
//!
//! # Modules
//!
//! - [`timeout`] – [`TimeoutTimer`][timeout::TimeoutTimer]: one monotonic
//!   deadline per run.
//! - [`touch_latch`] – [`TouchLatch`][touch_latch::TouchLatch]: set by the
//!   first touch reading, never cleared.
//! - [`arbitration`] – [`evaluate_tick`][arbitration::evaluate_tick]: the
//!   priority-ordered exit check run on every control tick.
//! - [`outcome`] – [`DecisionTable`][outcome::DecisionTable] and
//!   [`OutcomeFlags`][outcome::OutcomeFlags]: turn the exit condition into the
//!   single reported [`TransitionOutcome`][conechase_types::TransitionOutcome].

pub mod arbitration;
pub mod outcome;
pub mod timeout;
pub mod touch_latch;

pub use arbitration::{BreakCondition, evaluate_tick};
pub use outcome::{DecisionTable, OutcomeFlags, REPORT_PRIORITY};
pub use timeout::TimeoutTimer;
pub use touch_latch::TouchLatch;
