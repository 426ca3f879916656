use async_trait::async_trait;
use std::time::Duration;

use crate::error::SinkError;
use crate::plan::Setpoint;

/// Which class of responses the actuator emits after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Responses are discarded. Used around enable and disable.
    Ignore,
    /// Responses are parsed as state reports.
    State,
}

/// Measured actuator state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub position: f64,
    pub velocity: f64,
    pub torque: f64,
}

impl Telemetry {
    pub fn new(position: f64, velocity: f64, torque: f64) -> Telemetry {
        Telemetry {
            position,
            velocity,
            torque,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Accepted,
    Rejected,
}

/// Real-time actuator controller the mover sends setpoints to.
///
/// Implementations own the transport. A `poll_updates` that sees nothing
/// before `timeout` returns an empty list rather than an error.
#[async_trait]
pub trait ActuatorSink: Send {
    async fn enable(&mut self) -> Result<(), SinkError>;
    async fn disable(&mut self) -> Result<(), SinkError>;
    async fn set_mode(&mut self, mode: CallbackMode) -> Result<(), SinkError>;
    /// Ask the actuator for a state report without commanding motion.
    async fn refresh(&mut self) -> Result<(), SinkError>;
    async fn apply(&mut self, setpoint: &Setpoint) -> Result<ApplyOutcome, SinkError>;
    async fn poll_updates(&mut self, timeout: Duration) -> Result<Vec<Telemetry>, SinkError>;
    /// Last reported position. `SinkError::Unavailable` until telemetry arrives.
    fn current_position(&self) -> Result<f64, SinkError>;
}
