use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Mission states known to the supervising executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateIdentity {
    #[serde(rename = "Driving_toward_cone")]
    DrivingTowardCone,
    #[serde(rename = "Driving_away_from_cone")]
    DrivingAwayFromCone,
    #[serde(rename = "Following_waypoint")]
    FollowingWaypoint,
    Success,
    Failure,
}

impl StateIdentity {
    /// The name used on the command and report channels.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateIdentity::DrivingTowardCone => "Driving_toward_cone",
            StateIdentity::DrivingAwayFromCone => "Driving_away_from_cone",
            StateIdentity::FollowingWaypoint => "Following_waypoint",
            StateIdentity::Success => "Success",
            StateIdentity::Failure => "Failure",
        }
    }
}

impl fmt::Display for StateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateIdentity {
    type Err = ConeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Driving_toward_cone" => Ok(StateIdentity::DrivingTowardCone),
            "Driving_away_from_cone" => Ok(StateIdentity::DrivingAwayFromCone),
            "Following_waypoint" => Ok(StateIdentity::FollowingWaypoint),
            "Success" => Ok(StateIdentity::Success),
            "Failure" => Ok(StateIdentity::Failure),
            other => Err(ConeError::Serialization(format!("unknown state '{other}'"))),
        }
    }
}

/// Executor command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Start,
    Reset,
    Pause,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "START",
            CommandKind::Reset => "RESET",
            CommandKind::Pause => "PAUSE",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = ConeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(CommandKind::Start),
            "RESET" => Ok(CommandKind::Reset),
            "PAUSE" => Ok(CommandKind::Pause),
            other => Err(ConeError::Serialization(format!("invalid cmd '{other}'"))),
        }
    }
}

/// A parsed executor command addressed to one mission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub target: StateIdentity,
    pub kind: CommandKind,
}

/// The single terminating reason a state reports to the executor.
///
/// | Outcome | Executor moves to |
/// |---|---|
/// | `touched_cone` | `Driving_away_from_cone` |
/// | `passed_cone`, `segment_timeout` | `Following_waypoint` |
/// | `touched_last_cone` | `Success` |
/// | `passed_last_cone`, `course_timeout` | `Failure` |
/// | `aborted` | executor's choice |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    TouchedCone,
    PassedCone,
    SegmentTimeout,
    TouchedLastCone,
    PassedLastCone,
    CourseTimeout,
    Aborted,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionOutcome::TouchedCone => "touched_cone",
            TransitionOutcome::PassedCone => "passed_cone",
            TransitionOutcome::SegmentTimeout => "segment_timeout",
            TransitionOutcome::TouchedLastCone => "touched_last_cone",
            TransitionOutcome::PassedLastCone => "passed_last_cone",
            TransitionOutcome::CourseTimeout => "course_timeout",
            TransitionOutcome::Aborted => "aborted",
        }
    }

    /// The mission state the executor conventionally transitions to, or
    /// `None` when the decision is left to the executor.
    pub fn next_state(&self) -> Option<StateIdentity> {
        match self {
            TransitionOutcome::TouchedCone => Some(StateIdentity::DrivingAwayFromCone),
            TransitionOutcome::PassedCone | TransitionOutcome::SegmentTimeout => {
                Some(StateIdentity::FollowingWaypoint)
            }
            TransitionOutcome::TouchedLastCone => Some(StateIdentity::Success),
            TransitionOutcome::PassedLastCone | TransitionOutcome::CourseTimeout => {
                Some(StateIdentity::Failure)
            }
            TransitionOutcome::Aborted => None,
        }
    }
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibration and actuation
// ────────────────────────────────────────────────────────────────────────────

/// Servo bounds for one RC channel, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLimits {
    pub min: u16,
    pub neutral: u16,
    pub max: u16,
}

impl ChannelLimits {
    /// Build limits, rejecting any triple where `min <= neutral <= max` does
    /// not hold.
    pub fn new(channel: &str, min: u16, neutral: u16, max: u16) -> Result<Self, ConeError> {
        if min > neutral || neutral > max {
            return Err(ConeError::InvalidCalibration {
                channel: channel.to_string(),
                details: format!("expected min <= neutral <= max, got [{min}, {neutral}, {max}]"),
            });
        }
        Ok(Self { min, neutral, max })
    }

    /// Clamp a computed pulse width into `[min, max]`. NaN maps to neutral.
    pub fn clamp(&self, value: f64) -> u16 {
        if value.is_nan() {
            return self.neutral;
        }
        value.clamp(f64::from(self.min), f64::from(self.max)).round() as u16
    }
}

/// Steering and throttle calibration fetched once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationLimits {
    pub steering: ChannelLimits,
    pub throttle: ChannelLimits,
}

impl CalibrationLimits {
    /// The "no input" command for both channels.
    pub fn neutral_command(&self) -> ActuatorCommand {
        ActuatorCommand {
            steering_us: self.steering.neutral,
            throttle_us: self.throttle.neutral,
        }
    }
}

/// A single detected cone relative to the camera.
///
/// `y` is the forward distance used to rank cones; `z` is the depth reading
/// in millimetres, valid only when positive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConeObservation {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl ConeObservation {
    pub fn has_depth(&self) -> bool {
        self.z > 0.0
    }
}

/// Servo pulse widths sent to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub steering_us: u16,
    pub throttle_us: u16,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire messages
// ────────────────────────────────────────────────────────────────────────────

/// Raw command as published by the executor.  `cmd` is kept as a string so
/// that unknown verbs can be logged rather than failing deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub state_name: String,
    pub cmd: String,
}

/// Message kinds a state sends back to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecMessage {
    Done,
}

/// Outbound transition report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorReport {
    pub state_name: String,
    pub msg: ExecMessage,
    pub outcome: TransitionOutcome,
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "conechase-middleware::bridge/touch"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Command(CommandMessage),
    /// One perception frame; may be empty.
    ConeLocations(Vec<ConeObservation>),
    Touch(bool),
    Report(ExecutorReport),
}

/// Error type shared by every conechase crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConeError {
    #[error("Calibration parameter {parameter} unavailable: {details}")]
    CalibrationUnavailable { parameter: String, details: String },

    #[error("Invalid calibration for {channel}: {details}")]
    InvalidCalibration { channel: String, details: String },

    #[error("Vehicle fault during {operation}: {details}")]
    VehicleFault { operation: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("no START command received")]
    NotStarted,
}

impl ConeError {
    /// `true` for failures that abort a run before the vehicle is armed.
    pub fn is_fatal_startup(&self) -> bool {
        matches!(
            self,
            ConeError::CalibrationUnavailable { .. } | ConeError::InvalidCalibration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_identity_uses_mission_names() {
        let json = serde_json::to_string(&StateIdentity::DrivingTowardCone).unwrap();
        assert_eq!(json, "\"Driving_toward_cone\"");
        let back: StateIdentity = "Driving_toward_cone".parse().unwrap();
        assert_eq!(back, StateIdentity::DrivingTowardCone);
        assert!("driving".parse::<StateIdentity>().is_err());
    }

    #[test]
    fn command_kind_parses_uppercase_verbs() {
        assert_eq!("START".parse::<CommandKind>().unwrap(), CommandKind::Start);
        assert_eq!("PAUSE".parse::<CommandKind>().unwrap(), CommandKind::Pause);
        assert!("start".parse::<CommandKind>().is_err());
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&TransitionOutcome::TouchedLastCone).unwrap();
        assert_eq!(json, "\"touched_last_cone\"");
        assert_eq!(TransitionOutcome::Aborted.to_string(), "aborted");
    }

    #[test]
    fn outcome_transition_map() {
        assert_eq!(
            TransitionOutcome::TouchedCone.next_state(),
            Some(StateIdentity::DrivingAwayFromCone)
        );
        assert_eq!(
            TransitionOutcome::SegmentTimeout.next_state(),
            Some(StateIdentity::FollowingWaypoint)
        );
        assert_eq!(
            TransitionOutcome::CourseTimeout.next_state(),
            Some(StateIdentity::Failure)
        );
        assert_eq!(TransitionOutcome::Aborted.next_state(), None);
    }

    #[test]
    fn channel_limits_reject_unordered_triple() {
        assert!(ChannelLimits::new("steering", 1135, 1435, 1735).is_ok());
        let err = ChannelLimits::new("throttle", 1800, 1650, 1650).unwrap_err();
        assert!(matches!(err, ConeError::InvalidCalibration { .. }));
        assert!(err.is_fatal_startup());
    }

    #[test]
    fn channel_limits_clamp_and_round() {
        let limits = ChannelLimits::new("steering", 1135, 1435, 1735).unwrap();
        assert_eq!(limits.clamp(3435.0), 1735);
        assert_eq!(limits.clamp(-50.0), 1135);
        assert_eq!(limits.clamp(1500.4), 1500);
        assert_eq!(limits.clamp(f64::NAN), 1435);
    }

    #[test]
    fn report_wire_format() {
        let report = ExecutorReport {
            state_name: StateIdentity::DrivingTowardCone.to_string(),
            msg: ExecMessage::Done,
            outcome: TransitionOutcome::SegmentTimeout,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"state_name":"Driving_toward_cone","msg":"DONE","outcome":"segment_timeout"}"#
        );
    }

    #[test]
    fn observation_depth_defaults_to_invalid() {
        let obs: ConeObservation = serde_json::from_str(r#"{"x":1.0,"y":2.0}"#).unwrap();
        assert!(!obs.has_depth());
    }

    #[test]
    fn cone_error_display() {
        let err = ConeError::CalibrationUnavailable {
            parameter: "RC1_MIN".to_string(),
            details: "timeout".to_string(),
        };
        assert!(err.to_string().contains("RC1_MIN"));
        assert!(!ConeError::NotStarted.is_fatal_startup());
    }
}
