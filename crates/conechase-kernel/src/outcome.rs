//! Outcome selection: decision tables and the global reporting priority.
//!
//! A run ends with exactly one [`BreakCondition`].  A [`DecisionTable`] maps
//! that condition onto the outcome flag it raises, and
//! [`OutcomeFlags::resolve`] picks the single [`TransitionOutcome`] to report
//! using [`REPORT_PRIORITY`], regardless of which flag was raised first.

use conechase_types::TransitionOutcome;

use crate::arbitration::BreakCondition;

/// Reporting order, highest first.  `aborted` is the fallback when nothing
/// else is set.
pub const REPORT_PRIORITY: [TransitionOutcome; 7] = [
    TransitionOutcome::PassedLastCone,
    TransitionOutcome::CourseTimeout,
    TransitionOutcome::TouchedLastCone,
    TransitionOutcome::PassedCone,
    TransitionOutcome::SegmentTimeout,
    TransitionOutcome::TouchedCone,
    TransitionOutcome::Aborted,
];

/// The outcome booleans accumulated during one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeFlags {
    pub touched_cone: bool,
    pub passed_cone: bool,
    pub segment_timeout: bool,
    pub touched_last_cone: bool,
    pub passed_last_cone: bool,
    pub course_timeout: bool,
    pub aborted: bool,
}

impl OutcomeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags with only `outcome` raised.
    pub fn only(outcome: TransitionOutcome) -> Self {
        let mut flags = Self::new();
        flags.raise(outcome);
        flags
    }

    pub fn raise(&mut self, outcome: TransitionOutcome) {
        *self.slot(outcome) = true;
    }

    pub fn is_raised(&self, outcome: TransitionOutcome) -> bool {
        match outcome {
            TransitionOutcome::TouchedCone => self.touched_cone,
            TransitionOutcome::PassedCone => self.passed_cone,
            TransitionOutcome::SegmentTimeout => self.segment_timeout,
            TransitionOutcome::TouchedLastCone => self.touched_last_cone,
            TransitionOutcome::PassedLastCone => self.passed_last_cone,
            TransitionOutcome::CourseTimeout => self.course_timeout,
            TransitionOutcome::Aborted => self.aborted,
        }
    }

    /// The highest-priority raised outcome, or `aborted` when none is.
    pub fn resolve(&self) -> TransitionOutcome {
        REPORT_PRIORITY
            .into_iter()
            .find(|outcome| self.is_raised(*outcome))
            .unwrap_or(TransitionOutcome::Aborted)
    }

    fn slot(&mut self, outcome: TransitionOutcome) -> &mut bool {
        match outcome {
            TransitionOutcome::TouchedCone => &mut self.touched_cone,
            TransitionOutcome::PassedCone => &mut self.passed_cone,
            TransitionOutcome::SegmentTimeout => &mut self.segment_timeout,
            TransitionOutcome::TouchedLastCone => &mut self.touched_last_cone,
            TransitionOutcome::PassedLastCone => &mut self.passed_last_cone,
            TransitionOutcome::CourseTimeout => &mut self.course_timeout,
            TransitionOutcome::Aborted => &mut self.aborted,
        }
    }
}

/// Maps each [`BreakCondition`] onto the outcome it raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionTable {
    pub touched: TransitionOutcome,
    pub segment_timeout: TransitionOutcome,
    pub command_changed: TransitionOutcome,
    pub shutdown: TransitionOutcome,
    pub vehicle_fault: TransitionOutcome,
}

impl DecisionTable {
    /// Approach to an intermediate cone.
    pub fn intermediate_cone() -> Self {
        Self {
            touched: TransitionOutcome::TouchedCone,
            segment_timeout: TransitionOutcome::SegmentTimeout,
            command_changed: TransitionOutcome::Aborted,
            shutdown: TransitionOutcome::Aborted,
            vehicle_fault: TransitionOutcome::Aborted,
        }
    }

    /// Approach to the last cone of the course: a touch completes the course.
    pub fn final_cone() -> Self {
        Self {
            touched: TransitionOutcome::TouchedLastCone,
            ..Self::intermediate_cone()
        }
    }

    pub fn outcome_for(&self, condition: BreakCondition) -> TransitionOutcome {
        match condition {
            BreakCondition::Touched => self.touched,
            BreakCondition::SegmentTimeout => self.segment_timeout,
            BreakCondition::CommandChanged(_) => self.command_changed,
            BreakCondition::Shutdown => self.shutdown,
            BreakCondition::VehicleFault => self.vehicle_fault,
        }
    }

    pub fn flags_for(&self, condition: BreakCondition) -> OutcomeFlags {
        OutcomeFlags::only(self.outcome_for(condition))
    }
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self::intermediate_cone()
    }
}
