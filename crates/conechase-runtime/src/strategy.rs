//! Per-state behaviour plugged into the generic controller.
//!
//! [`ExecutionController`][crate::controller::ExecutionController] owns the
//! arm/tick/disarm/report skeleton shared by every mission state.  What a
//! state does with perception, and which outcome each exit condition maps
//! to, lives behind [`StateStrategy`].

use conechase_hal::planner::{PlannerConfig, SteeringThrottlePlanner};
use conechase_kernel::{BreakCondition, DecisionTable, OutcomeFlags};
use conechase_types::{ActuatorCommand, CalibrationLimits, ConeObservation, StateIdentity};
use tracing::debug;

/// Enter / evaluate / exit hooks for one mission state.
pub trait StateStrategy: Send {
    /// The state this strategy runs as.
    fn identity(&self) -> StateIdentity;

    /// Called once the vehicle is armed and the deadline is set.
    fn enter(&mut self, _limits: &CalibrationLimits) {}

    /// Map a fresh perception frame to a servo command.
    ///
    /// `None` keeps the previously applied command.
    fn evaluate(
        &mut self,
        observations: &[ConeObservation],
        limits: &CalibrationLimits,
    ) -> Option<ActuatorCommand>;

    /// Outcome flags for the condition that ended the run.
    fn exit(&mut self, condition: BreakCondition) -> OutcomeFlags;
}

/// Steer and throttle toward the nearest cone until touched or timed out.
#[derive(Debug, Clone)]
pub struct DriveTowardCone {
    planner: SteeringThrottlePlanner,
    table: DecisionTable,
}

impl DriveTowardCone {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            planner: SteeringThrottlePlanner::new(config),
            table: DecisionTable::intermediate_cone(),
        }
    }

    /// Mark this segment as the approach to the last cone of the course.
    pub fn final_cone(mut self, is_final: bool) -> Self {
        self.table = if is_final {
            DecisionTable::final_cone()
        } else {
            DecisionTable::intermediate_cone()
        };
        self
    }

    pub fn decision_table(&self) -> &DecisionTable {
        &self.table
    }
}

impl Default for DriveTowardCone {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl StateStrategy for DriveTowardCone {
    fn identity(&self) -> StateIdentity {
        StateIdentity::DrivingTowardCone
    }

    fn enter(&mut self, limits: &CalibrationLimits) {
        debug!(
            config = ?self.planner.config(),
            steering = ?limits.steering,
            throttle = ?limits.throttle,
            "approaching cone"
        );
    }

    fn evaluate(
        &mut self,
        observations: &[ConeObservation],
        limits: &CalibrationLimits,
    ) -> Option<ActuatorCommand> {
        self.planner.plan(observations, limits)
    }

    fn exit(&mut self, condition: BreakCondition) -> OutcomeFlags {
        self.table.flags_for(condition)
    }
}
