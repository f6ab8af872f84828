//! Node configuration – reads/writes `~/.conechase/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use conechase_hal::planner::PlannerConfig;
use conechase_hal::sim::{DEFAULT_STEERING_CALIBRATION, DEFAULT_THROTTLE_CALIBRATION};
use conechase_runtime::ControllerConfig;
use serde::{Deserialize, Serialize};

/// RC calibration loaded into the simulated vehicle, `[min, trim, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCalibration {
    #[serde(default = "default_steering_calibration")]
    pub steering: [i64; 3],
    #[serde(default = "default_throttle_calibration")]
    pub throttle: [i64; 3],
}

impl Default for SimCalibration {
    fn default() -> Self {
        Self {
            steering: default_steering_calibration(),
            throttle: default_throttle_calibration(),
        }
    }
}

/// Persisted node configuration stored in `~/.conechase/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Steering gain multiplier.
    #[serde(default = "default_factor")]
    pub steering_factor: f64,

    /// Throttle gain multiplier.
    #[serde(default = "default_factor")]
    pub throttle_factor: f64,

    /// Fixed throttle pulse width in µs; unset means computed throttle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_override: Option<f64>,

    /// Seconds allotted to one approach.
    #[serde(default = "default_segment_duration_sec")]
    pub segment_duration_sec: f64,

    /// Control tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,

    /// The approach targets the last cone of the course.
    #[serde(default)]
    pub final_cone: bool,

    #[serde(default)]
    pub calibration: SimCalibration,
}

fn default_factor() -> f64 {
    1.0
}
fn default_segment_duration_sec() -> f64 {
    30.0
}
fn default_tick_hz() -> f64 {
    2.0
}
fn default_steering_calibration() -> [i64; 3] {
    DEFAULT_STEERING_CALIBRATION
}
fn default_throttle_calibration() -> [i64; 3] {
    DEFAULT_THROTTLE_CALIBRATION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steering_factor: default_factor(),
            throttle_factor: default_factor(),
            throttle_override: None,
            segment_duration_sec: default_segment_duration_sec(),
            tick_hz: default_tick_hz(),
            final_cone: false,
            calibration: SimCalibration::default(),
        }
    }
}

impl Config {
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            steering_factor: self.steering_factor,
            throttle_factor: self.throttle_factor,
            throttle_override: self.throttle_override,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_segment_secs(self.segment_duration_sec)
            .with_tick_hz(self.tick_hz)
    }
}

/// Return the path to `~/.conechase/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".conechase").join("config.toml")
}

/// Load the config from `path` and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` without environment overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `CONECHASE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CONECHASE_SEGMENT_DURATION_SEC` | `segment_duration_sec` |
/// | `CONECHASE_STEERING_FACTOR` | `steering_factor` |
/// | `CONECHASE_THROTTLE_FACTOR` | `throttle_factor` |
/// | `CONECHASE_TICK_HZ` | `tick_hz` |
///
/// Values that do not parse as a finite number are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = env_f64("CONECHASE_SEGMENT_DURATION_SEC") {
        cfg.segment_duration_sec = v;
    }
    if let Some(v) = env_f64("CONECHASE_STEERING_FACTOR") {
        cfg.steering_factor = v;
    }
    if let Some(v) = env_f64("CONECHASE_THROTTLE_FACTOR") {
        cfg.throttle_factor = v;
    }
    if let Some(v) = env_f64("CONECHASE_TICK_HZ") {
        cfg.tick_hz = v;
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
