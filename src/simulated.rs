use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::actuator::{ActuatorSink, ApplyOutcome, CallbackMode, Telemetry};
use crate::error::SinkError;
use crate::plan::Setpoint;

/// Position range of a DM4310 joint in radians.
pub const DEFAULT_POSITION_LIMIT: f64 = 12.5;

/// Call counters kept by [`SimulatedActuator`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorStats {
    pub enable_calls: usize,
    pub disable_calls: usize,
    pub mode_changes: usize,
    pub refreshes: usize,
    pub applied: usize,
    pub rejected: usize,
}

/// In-process actuator with first-order position tracking.
///
/// Every accepted setpoint moves the joint a fixed fraction of the way to the
/// target. State reports are only queued while in [`CallbackMode::State`].
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    enabled: bool,
    mode: CallbackMode,
    position: f64,
    velocity: f64,
    torque: f64,
    limits: (f64, f64),
    tracking: f64,
    pending: VecDeque<Telemetry>,
    last: Option<Telemetry>,
    stats: SimulatorStats,
}

impl SimulatedActuator {
    pub fn new(position: f64) -> SimulatedActuator {
        SimulatedActuator {
            enabled: false,
            mode: CallbackMode::Ignore,
            position,
            velocity: 0.0,
            torque: 0.0,
            limits: (-DEFAULT_POSITION_LIMIT, DEFAULT_POSITION_LIMIT),
            tracking: 0.2,
            pending: VecDeque::new(),
            last: None,
            stats: SimulatorStats::default(),
        }
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> SimulatedActuator {
        self.limits = (min, max);
        self
    }

    /// Fraction of the remaining error closed per accepted setpoint.
    pub fn with_tracking(mut self, tracking: f64) -> SimulatedActuator {
        self.tracking = tracking.clamp(0.0, 1.0);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> CallbackMode {
        self.mode
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    fn report(&mut self) {
        if self.mode == CallbackMode::State {
            self.pending
                .push_back(Telemetry::new(self.position, self.velocity, self.torque));
        }
    }

    fn within_limits(&self, position: f64) -> bool {
        position >= self.limits.0 && position <= self.limits.1
    }
}

#[async_trait]
impl ActuatorSink for SimulatedActuator {
    async fn enable(&mut self) -> Result<(), SinkError> {
        self.stats.enable_calls += 1;
        self.enabled = true;
        self.report();
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), SinkError> {
        self.stats.disable_calls += 1;
        self.enabled = false;
        self.velocity = 0.0;
        self.torque = 0.0;
        self.report();
        Ok(())
    }

    async fn set_mode(&mut self, mode: CallbackMode) -> Result<(), SinkError> {
        self.stats.mode_changes += 1;
        self.mode = mode;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), SinkError> {
        self.stats.refreshes += 1;
        self.report();
        Ok(())
    }

    async fn apply(&mut self, setpoint: &Setpoint) -> Result<ApplyOutcome, SinkError> {
        self.stats.applied += 1;
        let target = setpoint.position();
        if !self.enabled || !self.within_limits(target) {
            self.stats.rejected += 1;
            debug!(goal = target, enabled = self.enabled, "simulated actuator rejected setpoint");
            return Ok(ApplyOutcome::Rejected);
        }
        let previous = self.position;
        self.position = if self.tracking >= 1.0 {
            target
        } else {
            self.position + (target - self.position) * self.tracking
        };
        self.velocity = self.position - previous;
        let gains = setpoint.gains();
        self.torque = gains.kp() * (target - self.position) - gains.kd() * self.velocity
            + setpoint.feedforward();
        self.report();
        Ok(ApplyOutcome::Accepted)
    }

    async fn poll_updates(&mut self, timeout: Duration) -> Result<Vec<Telemetry>, SinkError> {
        if self.pending.is_empty() {
            sleep(timeout).await;
            return Ok(Vec::new());
        }
        let updates: Vec<Telemetry> = self.pending.drain(..).collect();
        self.last = updates.last().copied();
        Ok(updates)
    }

    fn current_position(&self) -> Result<f64, SinkError> {
        self.last
            .map(|telemetry| telemetry.position)
            .ok_or_else(|| SinkError::Unavailable("no telemetry received yet".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Gains;

    fn setpoint(position: f64) -> Setpoint {
        Setpoint::new(position, 0.0, Gains::new(20.0, 2.0))
    }

    #[tokio::test(start_paused = true)]
    async fn position_unavailable_before_telemetry() {
        let actuator = SimulatedActuator::new(0.1);
        assert!(matches!(
            actuator.current_position(),
            Err(SinkError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_setpoints_while_disabled() {
        let mut actuator = SimulatedActuator::new(0.0);
        let outcome = actuator.apply(&setpoint(0.5)).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Rejected);
        assert_eq!(actuator.position(), 0.0);
        assert_eq!(actuator.stats().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_setpoints_outside_limits() {
        let mut actuator = SimulatedActuator::new(0.0).with_limits(-0.1, 1.0);
        actuator.enable().await.unwrap();
        assert_eq!(
            actuator.apply(&setpoint(1.5)).await.unwrap(),
            ApplyOutcome::Rejected
        );
        assert_eq!(
            actuator.apply(&setpoint(0.5)).await.unwrap(),
            ApplyOutcome::Accepted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_toward_target() {
        let mut actuator = SimulatedActuator::new(0.0).with_tracking(0.5);
        actuator.enable().await.unwrap();
        actuator.set_mode(CallbackMode::State).await.unwrap();
        actuator.apply(&setpoint(1.0)).await.unwrap();
        actuator.apply(&setpoint(1.0)).await.unwrap();

        let updates = actuator
            .poll_updates(Duration::from_micros(500))
            .await
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].position, 0.5);
        assert_eq!(actuator.current_position().unwrap(), 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn ignore_mode_emits_no_telemetry() {
        let mut actuator = SimulatedActuator::new(0.0);
        actuator.enable().await.unwrap();
        actuator.refresh().await.unwrap();

        let started = tokio::time::Instant::now();
        let updates = actuator.poll_updates(Duration::from_millis(2)).await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(started.elapsed(), Duration::from_millis(2));
        assert!(actuator.current_position().is_err());
    }
}
