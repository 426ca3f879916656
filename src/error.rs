use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an actuator sink.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SinkError {
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
    #[error("actuator response timeout")]
    Timeout,
}

/// One-shot commands whose failure leaves the actuator state unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOperation {
    Enable,
    Disable,
    SetMode,
}

impl std::fmt::Display for AdminOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AdminOperation::Enable => write!(f, "enable"),
            AdminOperation::Disable => write!(f, "disable"),
            AdminOperation::SetMode => write!(f, "set callback mode"),
        }
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MoverError {
    #[error("invalid motion plan: {0}")]
    InvalidPlan(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("sink unavailable at step {step}: {source}")]
    SinkUnavailable {
        step: usize,
        #[source]
        source: SinkError,
    },
    #[error("setpoint {step} rejected (target {position:.3})")]
    SetpointRejected { step: usize, position: f64 },
    #[error("{operation} failed: {source}")]
    Administrative {
        operation: AdminOperation,
        #[source]
        source: SinkError,
    },
    #[error("failed to read configuration {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl MoverError {
    pub(crate) fn admin(operation: AdminOperation) -> impl FnOnce(SinkError) -> MoverError {
        move |source| MoverError::Administrative { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, MoverError>;
