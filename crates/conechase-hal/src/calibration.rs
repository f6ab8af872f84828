//! Radio calibration lookup.
//!
//! The flight controller stores each RC channel's bounds as `RCn_MIN`,
//! `RCn_TRIM` (neutral) and `RCn_MAX`.  Steering is channel 1 and throttle is
//! channel 3.  Limits are read once per run; any missing or out-of-range
//! value is a fatal startup error.

use conechase_types::{CalibrationLimits, ChannelLimits, ConeError};
use tracing::debug;

use crate::vehicle::VehicleControl;

/// Parameter names for one RC channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelParams {
    pub channel: &'static str,
    pub min: &'static str,
    pub neutral: &'static str,
    pub max: &'static str,
}

pub const STEERING_PARAMS: ChannelParams = ChannelParams {
    channel: "steering",
    min: "RC1_MIN",
    neutral: "RC1_TRIM",
    max: "RC1_MAX",
};

pub const THROTTLE_PARAMS: ChannelParams = ChannelParams {
    channel: "throttle",
    min: "RC3_MIN",
    neutral: "RC3_TRIM",
    max: "RC3_MAX",
};

/// Read steering and throttle limits from the vehicle.
///
/// # Errors
///
/// Returns [`ConeError::CalibrationUnavailable`] when a parameter cannot be
/// read and [`ConeError::InvalidCalibration`] when a value does not fit a
/// servo pulse width or the triple is not ordered.
pub fn fetch_limits<V: VehicleControl + ?Sized>(vehicle: &V) -> Result<CalibrationLimits, ConeError> {
    let limits = CalibrationLimits {
        steering: fetch_channel(vehicle, &STEERING_PARAMS)?,
        throttle: fetch_channel(vehicle, &THROTTLE_PARAMS)?,
    };
    debug!(?limits, "calibration limits fetched");
    Ok(limits)
}

fn fetch_channel<V: VehicleControl + ?Sized>(
    vehicle: &V,
    params: &ChannelParams,
) -> Result<ChannelLimits, ConeError> {
    let min = read_pulse(vehicle, params.channel, params.min)?;
    let neutral = read_pulse(vehicle, params.channel, params.neutral)?;
    let max = read_pulse(vehicle, params.channel, params.max)?;
    ChannelLimits::new(params.channel, min, neutral, max)
}

fn read_pulse<V: VehicleControl + ?Sized>(
    vehicle: &V,
    channel: &str,
    name: &str,
) -> Result<u16, ConeError> {
    let raw = vehicle
        .get_param_int(name)
        .map_err(|e| ConeError::CalibrationUnavailable {
            parameter: name.to_string(),
            details: e.to_string(),
        })?;
    u16::try_from(raw).map_err(|_| ConeError::InvalidCalibration {
        channel: channel.to_string(),
        details: format!("{name}={raw} is not a valid pulse width"),
    })
}
