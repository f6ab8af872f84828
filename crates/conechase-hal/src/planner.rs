//! Steering/throttle control law for approaching the nearest cone.
//!
//! The planner is stateless: given one perception frame and the run's
//! calibration it returns the servo command to apply, or `None` when the
//! frame holds no cones.
//!
//! # Algorithm
//!
//! 1. Pick the cone with the smallest forward distance `y` (first one wins
//!    on ties).
//! 2. Steering starts at neutral; outside the ±20 dead-band it moves by
//!    `steering_factor * 2 * x`.
//! 3. Throttle starts 20 µs above neutral.  With a depth reading beyond
//!    300 mm it adds `throttle_factor * (z - 300) / 20`; without depth it adds
//!    `throttle_factor * (y - 40)` when that is positive.
//! 4. An enabled throttle override replaces the computed throttle.
//! 5. Both channels are clamped to their calibrated `[min, max]`.
//!
//! Steering uses the raw lateral offset rather than the bearing angle.
//!
//! # Example
//!
//! ```rust
//! use conechase_hal::planner::{PlannerConfig, SteeringThrottlePlanner};
//! use conechase_types::{CalibrationLimits, ChannelLimits, ConeObservation};
//!
//! let limits = CalibrationLimits {
//!     steering: ChannelLimits::new("steering", 1135, 1435, 1735).unwrap(),
//!     throttle: ChannelLimits::new("throttle", 1650, 1650, 1800).unwrap(),
//! };
//! let planner = SteeringThrottlePlanner::new(PlannerConfig::default().with_throttle_override(1675.0));
//!
//! let cmd = planner
//!     .plan(&[ConeObservation { x: 0.0, y: 50.0, z: 0.0 }], &limits)
//!     .unwrap();
//! assert_eq!(cmd.steering_us, 1435);
//! assert_eq!(cmd.throttle_us, 1675);
//! ```

use conechase_types::{ActuatorCommand, CalibrationLimits, ConeObservation};

/// Lateral offsets within this band steer straight ahead.
pub const STEERING_DEAD_BAND: f64 = 20.0;
/// Steering microseconds per unit of lateral offset (before `steering_factor`).
pub const STEERING_GAIN: f64 = 2.0;
/// Slowest approach: fixed offset above throttle neutral.
pub const THROTTLE_FORWARD_BIAS: f64 = 20.0;
/// Depth readings at or below this (mm) add no throttle.
pub const DEPTH_FLOOR_MM: f64 = 300.0;
/// Millimetres of depth per extra microsecond of throttle.
pub const DEPTH_DIVISOR: f64 = 20.0;
/// Forward distance subtracted before it contributes to throttle.
pub const FORWARD_OFFSET: f64 = 40.0;

/// Gains and the optional fixed-throttle override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    pub steering_factor: f64,
    pub throttle_factor: f64,
    /// When `Some`, throttle is forced to this pulse width (still clamped).
    pub throttle_override: Option<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            steering_factor: 1.0,
            throttle_factor: 1.0,
            throttle_override: None,
        }
    }
}

impl PlannerConfig {
    pub fn with_throttle_override(mut self, throttle_us: f64) -> Self {
        self.throttle_override = Some(throttle_us);
        self
    }
}

/// Pure mapping from a perception frame to a bounded [`ActuatorCommand`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SteeringThrottlePlanner {
    config: PlannerConfig,
}

impl SteeringThrottlePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a servo command toward the nearest cone in `observations`.
    ///
    /// Returns `None` for an empty frame; the caller keeps its previous
    /// command.
    pub fn plan(
        &self,
        observations: &[ConeObservation],
        limits: &CalibrationLimits,
    ) -> Option<ActuatorCommand> {
        let cone = nearest(observations)?;

        let steering = self.steering(cone, f64::from(limits.steering.neutral));
        let throttle = match self.config.throttle_override {
            Some(fixed) => fixed,
            None => self.throttle(cone, f64::from(limits.throttle.neutral)),
        };

        Some(ActuatorCommand {
            steering_us: limits.steering.clamp(steering),
            throttle_us: limits.throttle.clamp(throttle),
        })
    }

    fn steering(&self, cone: &ConeObservation, neutral: f64) -> f64 {
        if cone.x.abs() > STEERING_DEAD_BAND {
            neutral + self.config.steering_factor * STEERING_GAIN * cone.x
        } else {
            neutral
        }
    }

    fn throttle(&self, cone: &ConeObservation, neutral: f64) -> f64 {
        let base = neutral + THROTTLE_FORWARD_BIAS;
        if cone.has_depth() {
            if cone.z > DEPTH_FLOOR_MM {
                base + self.config.throttle_factor * (cone.z - DEPTH_FLOOR_MM) / DEPTH_DIVISOR
            } else {
                base
            }
        } else {
            let forward = cone.y - FORWARD_OFFSET;
            if forward > 0.0 {
                base + self.config.throttle_factor * forward
            } else {
                base
            }
        }
    }
}

/// The observation with the smallest forward distance; the earliest one on
/// ties.
pub fn nearest(observations: &[ConeObservation]) -> Option<&ConeObservation> {
    observations.iter().min_by(|a, b| a.y.total_cmp(&b.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conechase_types::ChannelLimits;

    fn bench_limits() -> CalibrationLimits {
        CalibrationLimits {
            steering: ChannelLimits::new("steering", 1135, 1435, 1735).unwrap(),
            throttle: ChannelLimits::new("throttle", 1650, 1650, 1800).unwrap(),
        }
    }

    fn wide_limits() -> CalibrationLimits {
        CalibrationLimits {
            steering: ChannelLimits::new("steering", 1000, 1500, 2000).unwrap(),
            throttle: ChannelLimits::new("throttle", 1000, 1500, 2000).unwrap(),
        }
    }

    fn cone(x: f64, y: f64, z: f64) -> ConeObservation {
        ConeObservation { x, y, z }
    }

    #[test]
    fn bench_example_with_override() {
        let planner =
            SteeringThrottlePlanner::new(PlannerConfig::default().with_throttle_override(1675.0));
        let cmd = planner.plan(&[cone(0.0, 50.0, 0.0)], &bench_limits()).unwrap();
        assert_eq!(
            cmd,
            ActuatorCommand {
                steering_us: 1435,
                throttle_us: 1675
            }
        );
    }

    #[test]
    fn large_offset_clamps_steering_to_max() {
        let planner = SteeringThrottlePlanner::default();
        let cmd = planner.plan(&[cone(1000.0, 50.0, 0.0)], &bench_limits()).unwrap();
        assert_eq!(cmd.steering_us, 1735);
        // 1650 + 20 + (50 - 40)
        assert_eq!(cmd.throttle_us, 1680);
    }

    #[test]
    fn dead_band_keeps_steering_neutral() {
        let planner = SteeringThrottlePlanner::default();
        for x in [-20.0, -19.5, -5.0, 0.0, 7.25, 20.0] {
            let cmd = planner.plan(&[cone(x, 100.0, 0.0)], &wide_limits()).unwrap();
            assert_eq!(cmd.steering_us, 1500, "x={x} must steer straight");
        }
    }

    #[test]
    fn steering_monotonic_right_of_dead_band() {
        let planner = SteeringThrottlePlanner::default();
        let limits = wide_limits();
        let mut previous = 0;
        for step in 0..100 {
            let x = 20.5 + f64::from(step) * 7.0;
            let cmd = planner.plan(&[cone(x, 100.0, 0.0)], &limits).unwrap();
            assert!(cmd.steering_us >= previous, "x={x} decreased steering");
            assert!(cmd.steering_us <= limits.steering.max);
            previous = cmd.steering_us;
        }
        assert_eq!(previous, limits.steering.max);
    }

    #[test]
    fn steering_monotonic_left_of_dead_band() {
        let planner = SteeringThrottlePlanner::default();
        let limits = wide_limits();
        let mut previous = u16::MAX;
        for step in 0..100 {
            let x = -20.5 - f64::from(step) * 7.0;
            let cmd = planner.plan(&[cone(x, 100.0, 0.0)], &limits).unwrap();
            assert!(cmd.steering_us <= previous, "x={x} increased steering");
            assert!(cmd.steering_us >= limits.steering.min);
            previous = cmd.steering_us;
        }
        assert_eq!(previous, limits.steering.min);
    }

    #[test]
    fn steering_factor_scales_gain() {
        let planner = SteeringThrottlePlanner::new(PlannerConfig {
            steering_factor: 0.5,
            ..PlannerConfig::default()
        });
        let cmd = planner.plan(&[cone(100.0, 100.0, 0.0)], &wide_limits()).unwrap();
        // 1500 + 0.5 * 2 * 100
        assert_eq!(cmd.steering_us, 1600);
    }

    #[test]
    fn throttle_monotonic_in_depth_beyond_floor() {
        let planner = SteeringThrottlePlanner::default();
        let limits = wide_limits();
        let mut previous = 0;
        for step in 0..200 {
            let z = 300.5 + f64::from(step) * 50.0;
            let cmd = planner.plan(&[cone(0.0, 100.0, z)], &limits).unwrap();
            assert!(cmd.throttle_us >= previous, "z={z} decreased throttle");
            previous = cmd.throttle_us;
        }
    }

    #[test]
    fn shallow_depth_uses_forward_bias_only() {
        let planner = SteeringThrottlePlanner::default();
        let cmd = planner.plan(&[cone(0.0, 400.0, 250.0)], &wide_limits()).unwrap();
        assert_eq!(cmd.throttle_us, 1520);

        // 1500 + 20 + (1300 - 300) / 20
        let cmd = planner.plan(&[cone(0.0, 400.0, 1300.0)], &wide_limits()).unwrap();
        assert_eq!(cmd.throttle_us, 1570);
    }

    #[test]
    fn no_depth_uses_forward_distance() {
        let planner = SteeringThrottlePlanner::new(PlannerConfig {
            throttle_factor: 2.0,
            ..PlannerConfig::default()
        });
        // y - 40 <= 0 adds nothing.
        let cmd = planner.plan(&[cone(0.0, 30.0, 0.0)], &wide_limits()).unwrap();
        assert_eq!(cmd.throttle_us, 1520);
        // 1500 + 20 + 2 * (100 - 40)
        let cmd = planner.plan(&[cone(0.0, 100.0, -1.0)], &wide_limits()).unwrap();
        assert_eq!(cmd.throttle_us, 1640);
    }

    #[test]
    fn override_ignores_geometry() {
        let planner =
            SteeringThrottlePlanner::new(PlannerConfig::default().with_throttle_override(1675.0));
        let limits = bench_limits();
        for obs in [
            cone(0.0, 50.0, 0.0),
            cone(-500.0, 10.0, 0.0),
            cone(300.0, 900.0, 5000.0),
            cone(25.0, -3.0, 301.0),
        ] {
            let cmd = planner.plan(&[obs], &limits).unwrap();
            assert_eq!(cmd.throttle_us, 1675, "{obs:?}");
        }
    }

    #[test]
    fn override_is_still_clamped() {
        let planner =
            SteeringThrottlePlanner::new(PlannerConfig::default().with_throttle_override(2500.0));
        let cmd = planner.plan(&[cone(0.0, 50.0, 0.0)], &bench_limits()).unwrap();
        assert_eq!(cmd.throttle_us, 1800);
    }

    #[test]
    fn empty_frame_produces_no_command() {
        let planner = SteeringThrottlePlanner::default();
        assert!(planner.plan(&[], &bench_limits()).is_none());
    }

    #[test]
    fn nearest_cone_is_selected_by_forward_distance() {
        let frame = [cone(500.0, 80.0, 0.0), cone(-100.0, 30.0, 0.0), cone(0.0, 60.0, 0.0)];
        assert_eq!(nearest(&frame), Some(&frame[1]));

        let planner = SteeringThrottlePlanner::default();
        let cmd = planner.plan(&frame, &wide_limits()).unwrap();
        // Steers toward x = -100: 1500 - 200.
        assert_eq!(cmd.steering_us, 1300);
    }

    #[test]
    fn nearest_ties_keep_input_order() {
        let frame = [cone(50.0, 40.0, 0.0), cone(-50.0, 40.0, 0.0)];
        assert_eq!(nearest(&frame), Some(&frame[0]));
    }
}
