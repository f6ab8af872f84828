//! `conechase-hal` – Vehicle control surface
//!
//! Everything the cone-approach controller needs from the vehicle, expressed
//! as traits and pure functions so the rest of the stack never talks to a
//! flight controller directly.
//!
//! # Modules
//!
//! - [`vehicle`] – [`VehicleControl`][vehicle::VehicleControl]: mode, arming,
//!   RC override and parameter reads.
//! - [`calibration`] – [`fetch_limits`][calibration::fetch_limits]: reads the
//!   RC1 (steering) and RC3 (throttle) MIN/TRIM/MAX parameters.
//! - [`planner`] – [`SteeringThrottlePlanner`][planner::SteeringThrottlePlanner]:
//!   maps a perception frame onto a bounded [`ActuatorCommand`][conechase_types::ActuatorCommand].
//! - [`sim`] – [`SimVehicle`][sim::SimVehicle]: in-process vehicle that
//!   records every call, for tests and dry runs.

pub mod calibration;
pub mod planner;
pub mod sim;
pub mod vehicle;

pub use calibration::fetch_limits;
pub use planner::{PlannerConfig, SteeringThrottlePlanner};
pub use sim::{SimHandle, SimVehicle, VehicleCall};
pub use vehicle::{VehicleControl, VehicleMode};
