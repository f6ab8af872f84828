//! In-process simulated vehicle for tests and dry runs without hardware.
//!
//! [`SimVehicle`] accepts every command, records it, and answers parameter
//! reads from an in-memory table pre-populated with the bench calibration.
//! Clone a [`SimHandle`] before handing the vehicle to a controller to
//! inspect what was commanded afterwards.
//!
//! # Example
//!
//! ```rust
//! use conechase_hal::sim::{SimVehicle, VehicleCall};
//! use conechase_hal::vehicle::{VehicleControl, VehicleMode};
//!
//! let mut vehicle = SimVehicle::new();
//! let handle = vehicle.handle();
//!
//! vehicle.set_mode(VehicleMode::Manual).unwrap();
//! vehicle.set_arm(true).unwrap();
//!
//! assert!(handle.armed());
//! assert_eq!(handle.calls()[0], VehicleCall::SetMode(VehicleMode::Manual));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use conechase_types::{ActuatorCommand, ConeError};
use tracing::{debug, info};

use crate::vehicle::{VehicleControl, VehicleMode};

/// Bench steering calibration: `[min, trim, max]`.
pub const DEFAULT_STEERING_CALIBRATION: [i64; 3] = [1135, 1435, 1735];
/// Bench throttle calibration: forward range only, so trim equals min.
pub const DEFAULT_THROTTLE_CALIBRATION: [i64; 3] = [1650, 1650, 1800];

/// One recorded call on the vehicle control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleCall {
    SetMode(VehicleMode),
    SetArm(bool),
    SetThrottleServo { throttle_us: u16, steering_us: u16 },
}

#[derive(Debug, Default)]
struct SimState {
    calls: Vec<VehicleCall>,
    mode: Option<VehicleMode>,
    armed: bool,
    last_command: Option<ActuatorCommand>,
}

/// A simulated vehicle.  Always succeeds unless told to fail.
pub struct SimVehicle {
    params: HashMap<String, i64>,
    failing: HashSet<&'static str>,
    state: Arc<Mutex<SimState>>,
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVehicle {
    /// Create a vehicle carrying the bench calibration.
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
            failing: HashSet::new(),
            state: Arc::new(Mutex::new(SimState::default())),
        }
        .with_calibration(DEFAULT_STEERING_CALIBRATION, DEFAULT_THROTTLE_CALIBRATION)
    }

    /// Replace the RC1 (steering) and RC3 (throttle) MIN/TRIM/MAX values.
    pub fn with_calibration(self, steering: [i64; 3], throttle: [i64; 3]) -> Self {
        self.with_param("RC1_MIN", steering[0])
            .with_param("RC1_TRIM", steering[1])
            .with_param("RC1_MAX", steering[2])
            .with_param("RC3_MIN", throttle[0])
            .with_param("RC3_TRIM", throttle[1])
            .with_param("RC3_MAX", throttle[2])
    }

    /// Set a single parameter value.
    pub fn with_param(mut self, name: impl Into<String>, value: i64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Remove a parameter so reads of it fail.
    pub fn without_param(mut self, name: &str) -> Self {
        self.params.remove(name);
        self
    }

    /// Make every call to `operation` (`"set_mode"`, `"set_arm"`,
    /// `"set_throttle_servo"`) fail with [`ConeError::VehicleFault`].
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// A shared view of the recorded state.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn check(&self, operation: &str) -> Result<MutexGuard<'_, SimState>, ConeError> {
        if self.failing.contains(operation) {
            return Err(ConeError::VehicleFault {
                operation: operation.to_string(),
                details: "simulated failure".to_string(),
            });
        }
        self.state.lock().map_err(|_| ConeError::VehicleFault {
            operation: operation.to_string(),
            details: "sim state lock poisoned".to_string(),
        })
    }
}

impl VehicleControl for SimVehicle {
    fn set_mode(&mut self, mode: VehicleMode) -> Result<(), ConeError> {
        let mut state = self.check("set_mode")?;
        state.calls.push(VehicleCall::SetMode(mode));
        state.mode = Some(mode);
        info!(mode = %mode, "sim vehicle mode set");
        Ok(())
    }

    fn set_arm(&mut self, armed: bool) -> Result<(), ConeError> {
        let mut state = self.check("set_arm")?;
        state.calls.push(VehicleCall::SetArm(armed));
        state.armed = armed;
        info!(armed, "sim vehicle arming changed");
        Ok(())
    }

    fn set_throttle_servo(&mut self, throttle_us: u16, steering_us: u16) -> Result<(), ConeError> {
        let mut state = self.check("set_throttle_servo")?;
        state.calls.push(VehicleCall::SetThrottleServo {
            throttle_us,
            steering_us,
        });
        state.last_command = Some(ActuatorCommand {
            steering_us,
            throttle_us,
        });
        debug!(throttle_us, steering_us, "sim servo override");
        Ok(())
    }

    fn get_param_int(&self, name: &str) -> Result<i64, ConeError> {
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| ConeError::CalibrationUnavailable {
                parameter: name.to_string(),
                details: "parameter not set on sim vehicle".to_string(),
            })
    }
}

/// Read-only view onto a [`SimVehicle`]'s recorded state.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call in the order it was made.
    pub fn calls(&self) -> Vec<VehicleCall> {
        self.lock().calls.clone()
    }

    pub fn mode(&self) -> Option<VehicleMode> {
        self.lock().mode
    }

    pub fn armed(&self) -> bool {
        self.lock().armed
    }

    /// The most recent servo override, if any.
    pub fn last_command(&self) -> Option<ActuatorCommand> {
        self.lock().last_command
    }

    /// All servo overrides in order.
    pub fn servo_commands(&self) -> Vec<ActuatorCommand> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                VehicleCall::SetThrottleServo {
                    throttle_us,
                    steering_us,
                } => Some(ActuatorCommand {
                    steering_us: *steering_us,
                    throttle_us: *throttle_us,
                }),
                _ => None,
            })
            .collect()
    }
}
