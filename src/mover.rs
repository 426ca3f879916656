use std::time::Duration;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::actuator::{ActuatorSink, ApplyOutcome, Telemetry};
use crate::config::{MoverConfig, RejectPolicy, TelemetryPolicy, RECOMMENDED_MAX_RATE_HZ};
use crate::error::{MoverError, Result, SinkError};
use crate::plan::MotionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Completed,
    Cancelled,
}

/// Summary of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    /// Setpoints handed to the sink, including rejected ones.
    pub steps_sent: usize,
    pub total_steps: usize,
    pub rejected: usize,
    pub telemetry_records: usize,
    pub missed_deadlines: usize,
    pub elapsed: Duration,
    pub last_position: Option<f64>,
}

impl MoveReport {
    fn new(total_steps: usize) -> MoveReport {
        MoveReport {
            outcome: MoveOutcome::Completed,
            steps_sent: 0,
            total_steps,
            rejected: 0,
            telemetry_records: 0,
            missed_deadlines: 0,
            elapsed: Duration::ZERO,
            last_position: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == MoveOutcome::Cancelled
    }
}

struct MoverState {
    current_step: usize,
    elapsed: Duration,
    stop_requested: bool,
}

impl MoverState {
    fn new() -> MoverState {
        MoverState {
            current_step: 0,
            elapsed: Duration::ZERO,
            stop_requested: false,
        }
    }
}

/// Wait up to `wait` for telemetry. Running out of time is not a failure.
pub(crate) async fn poll_bounded<S: ActuatorSink + ?Sized>(
    sink: &mut S,
    wait: Duration,
) -> std::result::Result<Vec<Telemetry>, SinkError> {
    match timeout(wait, sink.poll_updates(wait)).await {
        Ok(updates) => updates,
        Err(_) => {
            trace!(?wait, "telemetry wait elapsed");
            Ok(Vec::new())
        }
    }
}

/// Paced point-to-point position mover.
#[derive(Debug, Clone)]
pub struct SlowMover {
    config: MoverConfig,
}

impl SlowMover {
    pub fn new(config: MoverConfig) -> Result<SlowMover> {
        config.validate()?;
        if config.rate_hz > RECOMMENDED_MAX_RATE_HZ {
            warn!(
                rate_hz = config.rate_hz,
                "control rate above {} Hz may saturate the bus", RECOMMENDED_MAX_RATE_HZ
            );
        }
        Ok(SlowMover { config })
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    pub fn plan(&self, start: f64, end: f64, duration_s: f64) -> Result<MotionPlan> {
        MotionPlan::new(start, end, duration_s, self.config.rate_hz)
    }

    /// Plan and execute a move in one go.
    pub async fn move_to<S: ActuatorSink + ?Sized>(
        &self,
        sink: &mut S,
        start: f64,
        end: f64,
        duration_s: f64,
        cancel: &CancellationToken,
    ) -> Result<MoveReport> {
        let plan = self.plan(start, end, duration_s)?;
        self.execute(&plan, sink, cancel).await
    }

    /// Send every setpoint of `plan` to `sink`, no faster than the plan's rate.
    ///
    /// Steps are paced on a fixed `start + k * period` schedule. `cancel` is
    /// checked once at the top of every step. A cancelled move returns `Ok`
    /// with [`MoveOutcome::Cancelled`]. Late steps are not made up for.
    pub async fn execute<S: ActuatorSink + ?Sized>(
        &self,
        plan: &MotionPlan,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<MoveReport> {
        let period = plan.period();
        let fast_timeout = self.config.fast_timeout();
        let mut state = MoverState::new();
        let mut report = MoveReport::new(plan.setpoint_count());
        let started = Instant::now();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        debug!(
            start = plan.start(),
            end = plan.end(),
            steps = report.total_steps,
            rate_hz = plan.rate_hz(),
            "starting move"
        );

        for setpoint in plan.setpoints(self.config.gains(), self.config.feedforward) {
            if cancel.is_cancelled() {
                state.stop_requested = true;
                break;
            }
            let tick = Instant::now();
            let step = state.current_step;

            report.steps_sent += 1;
            match sink.apply(&setpoint).await {
                Ok(ApplyOutcome::Accepted) => {}
                Ok(ApplyOutcome::Rejected) => {
                    report.rejected += 1;
                    match self.config.on_reject {
                        RejectPolicy::Skip => {
                            warn!(step, goal = setpoint.position(), "setpoint rejected, skipping")
                        }
                        RejectPolicy::Abort => {
                            return Err(MoverError::SetpointRejected {
                                step,
                                position: setpoint.position(),
                            })
                        }
                    }
                }
                Err(error) => self.absorb(step, error)?,
            }

            match poll_bounded(sink, fast_timeout).await {
                Ok(updates) => report.telemetry_records += updates.len(),
                Err(error) => self.absorb(step, error)?,
            }

            if let Ok(position) = sink.current_position() {
                report.last_position = Some(position);
            }
            trace!(
                step,
                goal = setpoint.position(),
                position = ?report.last_position,
                "setpoint sent"
            );

            let busy = tick.elapsed();
            if busy >= period {
                report.missed_deadlines += 1;
                if report.missed_deadlines % 10 == 1 {
                    warn!(
                        missed = report.missed_deadlines,
                        target_ms = period.as_secs_f64() * 1000.0,
                        actual_ms = busy.as_secs_f64() * 1000.0,
                        "control step overran its period"
                    );
                }
            }
            ticker.tick().await;

            state.current_step += 1;
            state.elapsed = started.elapsed();
        }

        report.elapsed = started.elapsed();
        if state.stop_requested {
            report.outcome = MoveOutcome::Cancelled;
            info!(
                step = state.current_step,
                total = report.total_steps,
                "move cancelled"
            );
        } else {
            info!(
                "move done in {:.2}s ({} steps @ {}Hz)",
                state.elapsed.as_secs_f64(),
                plan.intervals(),
                plan.rate_hz()
            );
        }
        Ok(report)
    }

    fn absorb(&self, step: usize, error: SinkError) -> Result<()> {
        match self.config.telemetry {
            TelemetryPolicy::Strict => Err(MoverError::SinkUnavailable {
                step,
                source: error,
            }),
            TelemetryPolicy::BestEffort => {
                warn!(step, %error, "sink failure absorbed");
                Ok(())
            }
        }
    }
}
