//! Generic `VehicleControl` trait for the rover's flight controller.
//!
//! Drivers implement this trait; the controller only ever talks to the trait,
//! so a MAVLink link, a simulator or a test double can be swapped in without
//! touching control or arbitration logic.

use std::fmt;

use conechase_types::ConeError;

/// Flight-controller modes used by the cone-approach state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleMode {
    /// Vehicle holds position and ignores RC input.
    Hold,
    /// RC override input drives the servos directly.
    Manual,
}

impl VehicleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleMode::Hold => "HOLD",
            VehicleMode::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for VehicleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The vehicle control surface consumed by the controller.
pub trait VehicleControl: Send {
    /// Switch the flight-controller mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::VehicleFault`] if the mode change is rejected.
    fn set_mode(&mut self, mode: VehicleMode) -> Result<(), ConeError>;

    /// Arm (`true`) or disarm (`false`) the motors.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::VehicleFault`] if the request is rejected.
    fn set_arm(&mut self, armed: bool) -> Result<(), ConeError>;

    /// Override the throttle and steering servo outputs, in microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::VehicleFault`] if the override cannot be sent.
    fn set_throttle_servo(&mut self, throttle_us: u16, steering_us: u16) -> Result<(), ConeError>;

    /// Read an integer parameter from the flight controller.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::CalibrationUnavailable`] if the parameter does
    /// not exist or cannot be read.
    fn get_param_int(&self, name: &str) -> Result<i64, ConeError>;
}

impl<V: VehicleControl + ?Sized> VehicleControl for Box<V> {
    fn set_mode(&mut self, mode: VehicleMode) -> Result<(), ConeError> {
        (**self).set_mode(mode)
    }

    fn set_arm(&mut self, armed: bool) -> Result<(), ConeError> {
        (**self).set_arm(armed)
    }

    fn set_throttle_servo(&mut self, throttle_us: u16, steering_us: u16) -> Result<(), ConeError> {
        (**self).set_throttle_servo(throttle_us, steering_us)
    }

    fn get_param_int(&self, name: &str) -> Result<i64, ConeError> {
        (**self).get_param_int(name)
    }
}
