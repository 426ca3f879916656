use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actuator::{ActuatorSink, CallbackMode};
use crate::config::{Config, CycleConfig};
use crate::error::{AdminOperation, MoverError, Result, SinkError};
use crate::mover::{poll_bounded, MoveReport, SlowMover};

/// What happened during one open/close session.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub start_position: f64,
    /// False when the start position fell back to the configured open position.
    pub start_measured: bool,
    pub open: Option<MoveReport>,
    pub close: Option<MoveReport>,
    pub cancelled: bool,
}

/// Enable, slowly open, pause, slowly close, disable.
///
/// The actuator is disabled exactly once per [`run`](OpenCloseCycle::run),
/// whether the session completes, is cancelled or fails part way.
#[derive(Debug, Clone)]
pub struct OpenCloseCycle {
    mover: SlowMover,
    cycle: CycleConfig,
}

impl OpenCloseCycle {
    pub fn new(config: Config) -> Result<OpenCloseCycle> {
        config.cycle.validate()?;
        Ok(OpenCloseCycle {
            mover: SlowMover::new(config.mover)?,
            cycle: config.cycle,
        })
    }

    pub fn mover(&self) -> &SlowMover {
        &self.mover
    }

    pub async fn run<S: ActuatorSink + ?Sized>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let outcome = self.drive(sink, cancel).await;
        let shutdown = self.shutdown(sink).await;
        match (outcome, shutdown) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(shutdown_err)) => {
                error!(error = %shutdown_err, "disable failed after an earlier error");
                Err(err)
            }
        }
    }

    async fn drive<S: ActuatorSink + ?Sized>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let slow_timeout = self.mover.config().slow_timeout();

        info!("enabling actuator");
        sink.set_mode(CallbackMode::Ignore)
            .await
            .map_err(MoverError::admin(AdminOperation::SetMode))?;
        sink.enable()
            .await
            .map_err(MoverError::admin(AdminOperation::Enable))?;
        poll_bounded(sink, slow_timeout)
            .await
            .map_err(MoverError::admin(AdminOperation::Enable))?;

        debug!("switching to state callbacks");
        sink.set_mode(CallbackMode::State)
            .await
            .map_err(MoverError::admin(AdminOperation::SetMode))?;

        let (start_position, start_measured) = match self.read_position(sink).await {
            Ok(position) => {
                info!(position, "current position");
                (position, true)
            }
            Err(err) => {
                warn!(error = %err, "cannot read current position, starting from open position");
                (self.cycle.open_position, false)
            }
        };

        let mut report = CycleReport {
            start_position,
            start_measured,
            open: None,
            close: None,
            cancelled: cancel.is_cancelled(),
        };
        if report.cancelled {
            return Ok(report);
        }

        info!("slowly opening");
        let open = self
            .mover
            .move_to(
                sink,
                start_position,
                self.cycle.open_position,
                self.cycle.move_duration_s,
                cancel,
            )
            .await?;
        report.cancelled = open.is_cancelled();
        report.open = Some(open);

        if !report.cancelled
            && timeout(self.cycle.settle_pause(), cancel.cancelled())
                .await
                .is_ok()
        {
            report.cancelled = true;
        }
        if report.cancelled {
            return Ok(report);
        }

        info!("slowly closing");
        let close = self
            .mover
            .move_to(
                sink,
                self.cycle.open_position,
                self.cycle.close_position,
                self.cycle.move_duration_s,
                cancel,
            )
            .await?;
        report.cancelled = close.is_cancelled();
        report.close = Some(close);
        Ok(report)
    }

    async fn read_position<S: ActuatorSink + ?Sized>(
        &self,
        sink: &mut S,
    ) -> std::result::Result<f64, SinkError> {
        sink.refresh().await?;
        poll_bounded(sink, self.mover.config().fast_timeout()).await?;
        sink.current_position()
    }

    async fn shutdown<S: ActuatorSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        info!("disabling actuator");
        let mode = sink
            .set_mode(CallbackMode::Ignore)
            .await
            .map_err(MoverError::admin(AdminOperation::SetMode));
        if let Err(err) = &mode {
            warn!(error = %err, "disabling without switching callback mode");
        }
        sink.disable()
            .await
            .map_err(MoverError::admin(AdminOperation::Disable))?;
        poll_bounded(sink, self.mover.config().slow_timeout())
            .await
            .map_err(MoverError::admin(AdminOperation::Disable))?;
        mode
    }
}
