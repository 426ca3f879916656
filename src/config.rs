use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::error::{MoverError, Result};
use crate::plan::Gains;

/// Above this rate a shared bus starts dropping frames.
pub const RECOMMENDED_MAX_RATE_HZ: u32 = 1000;

/// What to do when the sink fails to send a setpoint or deliver telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryPolicy {
    /// Log the failure and keep moving.
    BestEffort,
    /// Abort the move with [`MoverError::SinkUnavailable`].
    Strict,
}

/// What to do when the actuator refuses a setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectPolicy {
    Skip,
    Abort,
}

/// Top level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub mover: MoverConfig,

    #[serde(default)]
    pub cycle: CycleConfig,
}

/// Control loop tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoverConfig {
    /// Control loop frequency in Hz
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,

    /// Telemetry wait bound per control step
    #[serde(default = "default_fast_timeout_us")]
    pub fast_timeout_us: u64,

    /// Wait bound for enable, disable and other one-shot commands
    #[serde(default = "default_slow_timeout_us")]
    pub slow_timeout_us: u64,

    #[serde(default = "default_kp")]
    pub kp: f64,

    #[serde(default = "default_kd")]
    pub kd: f64,

    /// Torque feedforward sent with every setpoint
    #[serde(default = "default_feedforward")]
    pub feedforward: f64,

    #[serde(default = "default_telemetry")]
    pub telemetry: TelemetryPolicy,

    #[serde(default = "default_on_reject")]
    pub on_reject: RejectPolicy,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            fast_timeout_us: default_fast_timeout_us(),
            slow_timeout_us: default_slow_timeout_us(),
            kp: default_kp(),
            kd: default_kd(),
            feedforward: default_feedforward(),
            telemetry: default_telemetry(),
            on_reject: default_on_reject(),
        }
    }
}

impl MoverConfig {
    pub fn fast_timeout(&self) -> Duration {
        Duration::from_micros(self.fast_timeout_us)
    }

    pub fn slow_timeout(&self) -> Duration {
        Duration::from_micros(self.slow_timeout_us)
    }

    pub fn gains(&self) -> Gains {
        Gains::new(self.kp, self.kd)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_hz == 0 {
            return Err(MoverError::InvalidPlan(
                "control rate must be positive".to_owned(),
            ));
        }
        self.gains().check().map_err(MoverError::InvalidConfig)?;
        if !self.feedforward.is_finite() {
            return Err(MoverError::InvalidConfig(format!(
                "feedforward must be finite, got {}",
                self.feedforward
            )));
        }
        Ok(())
    }
}

/// Gripper open/close session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleConfig {
    #[serde(default = "default_open_position")]
    pub open_position: f64,

    #[serde(default = "default_close_position")]
    pub close_position: f64,

    /// Duration of each slow move in seconds
    #[serde(default = "default_move_duration_s")]
    pub move_duration_s: f64,

    /// Pause between opening and closing
    #[serde(default = "default_settle_pause_ms")]
    pub settle_pause_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            open_position: default_open_position(),
            close_position: default_close_position(),
            move_duration_s: default_move_duration_s(),
            settle_pause_ms: default_settle_pause_ms(),
        }
    }
}

impl CycleConfig {
    pub fn settle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_pause_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.open_position.is_finite() || !self.close_position.is_finite() {
            return Err(MoverError::InvalidConfig(format!(
                "open and close positions must be finite, got {} and {}",
                self.open_position, self.close_position
            )));
        }
        if !self.move_duration_s.is_finite() {
            return Err(MoverError::InvalidConfig(format!(
                "move duration must be finite, got {}",
                self.move_duration_s
            )));
        }
        Ok(())
    }
}

fn default_rate_hz() -> u32 {
    200
}

fn default_fast_timeout_us() -> u64 {
    500
}

fn default_slow_timeout_us() -> u64 {
    2000
}

fn default_kp() -> f64 {
    20.0
}

fn default_kd() -> f64 {
    2.0
}

fn default_feedforward() -> f64 {
    0.05
}

fn default_telemetry() -> TelemetryPolicy {
    TelemetryPolicy::BestEffort
}

fn default_on_reject() -> RejectPolicy {
    RejectPolicy::Skip
}

fn default_open_position() -> f64 {
    0.0
}

fn default_close_position() -> f64 {
    0.8
}

fn default_move_duration_s() -> f64 {
    3.0
}

fn default_settle_pause_ms() -> u64 {
    500
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| MoverError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.mover.validate()?;
        self.cycle.validate()
    }
}
