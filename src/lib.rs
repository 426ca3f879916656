//! Slow point-to-point position moves for grippers and other actuators.
//!
//! [`SlowMover`] interpolates a [`MotionPlan`] into setpoints and sends them
//! to an [`ActuatorSink`] at a fixed control rate. [`OpenCloseCycle`] wraps
//! it into a full enable, open, close, disable session.
//!
//! The sink is a trait: the bus transport and motor protocol live in the
//! actuator library that implements it. [`SimulatedActuator`] is an
//! in-process stand-in.

mod actuator;
mod config;
mod cycle;
mod error;
mod mover;
mod plan;
mod simulated;

pub use actuator::{ActuatorSink, ApplyOutcome, CallbackMode, Telemetry};
pub use config::{
    Config, CycleConfig, MoverConfig, RejectPolicy, TelemetryPolicy, RECOMMENDED_MAX_RATE_HZ,
};
pub use cycle::{CycleReport, OpenCloseCycle};
pub use error::{AdminOperation, MoverError, Result, SinkError};
pub use mover::{MoveOutcome, MoveReport, SlowMover};
pub use plan::{plan, Gains, MotionPlan, Setpoint, Setpoints, MAX_INTERVALS};
pub use simulated::{SimulatedActuator, SimulatorStats, DEFAULT_POSITION_LIMIT};

pub use tokio_util::sync::CancellationToken;
