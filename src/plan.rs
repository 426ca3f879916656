use std::time::Duration;

use crate::error::{MoverError, Result};

/// Proportional and derivative gains of the actuator's position loop.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Gains {
    kp: f64,
    kd: f64,
}

impl Gains {
    pub fn new(kp: f64, kd: f64) -> Gains {
        Gains { kp, kd }
    }

    pub fn kp(&self) -> f64 {
        self.kp
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }

    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        if !(self.kp.is_finite() && self.kp >= 0.0) {
            return Err(format!("kp must be finite and non-negative, got {}", self.kp));
        }
        if !(self.kd.is_finite() && self.kd >= 0.0) {
            return Err(format!("kd must be finite and non-negative, got {}", self.kd));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for Gains {
    fn from(input: (f64, f64)) -> Self {
        let (kp, kd) = input;
        Gains::new(kp, kd)
    }
}

/// A single commanded target state.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Setpoint {
    position: f64,
    feedforward: f64,
    gains: Gains,
}

impl Setpoint {
    pub fn new(position: f64, feedforward: f64, gains: Gains) -> Setpoint {
        Setpoint {
            position,
            feedforward,
            gains,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn feedforward(&self) -> f64 {
        self.feedforward
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Longest plan accepted, in interpolation intervals.
pub const MAX_INTERVALS: u32 = u32::MAX;

/// Straight-line move from `start` to `end` over `duration_s`, sampled at
/// `rate_hz`.
///
/// A positive duration is split into `max(1, round(duration_s * rate_hz))`
/// intervals, giving one more setpoint than intervals. A duration of zero or
/// less collapses to a single setpoint at `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    start: f64,
    end: f64,
    duration_s: f64,
    rate_hz: u32,
}

impl MotionPlan {
    pub fn new(start: f64, end: f64, duration_s: f64, rate_hz: u32) -> Result<MotionPlan> {
        if rate_hz == 0 {
            return Err(MoverError::InvalidPlan(
                "control rate must be positive".to_owned(),
            ));
        }
        if !start.is_finite() || !end.is_finite() {
            return Err(MoverError::InvalidPlan(format!(
                "positions must be finite, got {} -> {}",
                start, end
            )));
        }
        if !duration_s.is_finite() {
            return Err(MoverError::InvalidPlan(format!(
                "duration must be finite, got {}",
                duration_s
            )));
        }
        if duration_s * rate_hz as f64 > MAX_INTERVALS as f64 {
            return Err(MoverError::InvalidPlan(format!(
                "{}s at {}Hz exceeds {} intervals",
                duration_s, rate_hz, MAX_INTERVALS
            )));
        }
        Ok(MotionPlan {
            start,
            end,
            duration_s,
            rate_hz,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Number of interpolation intervals; zero for an endpoint-only plan.
    pub fn intervals(&self) -> usize {
        if self.duration_s <= 0.0 {
            return 0;
        }
        let steps = (self.duration_s * self.rate_hz as f64).round() as usize;
        steps.max(1)
    }

    /// Number of setpoints the plan produces.
    pub fn setpoint_count(&self) -> usize {
        self.intervals() + 1
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz as f64)
    }

    fn position_at(&self, index: usize) -> f64 {
        let intervals = self.intervals();
        if intervals == 0 || index >= intervals {
            return self.end;
        }
        lerp(self.start, self.end, index as f64 / intervals as f64)
    }

    pub fn setpoints(&self, gains: Gains, feedforward: f64) -> Setpoints {
        Setpoints {
            plan: *self,
            gains,
            feedforward,
            next: 0,
            len: self.setpoint_count(),
        }
    }
}

/// Iterator over the setpoints of a [`MotionPlan`].
#[derive(Debug, Clone)]
pub struct Setpoints {
    plan: MotionPlan,
    gains: Gains,
    feedforward: f64,
    next: usize,
    len: usize,
}

impl Iterator for Setpoints {
    type Item = Setpoint;

    fn next(&mut self) -> Option<Setpoint> {
        if self.next >= self.len {
            return None;
        }
        let position = self.plan.position_at(self.next);
        self.next += 1;
        Some(Setpoint::new(position, self.feedforward, self.gains))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Setpoints {}

/// Interpolated setpoints from `start` to `end`.
pub fn plan(
    start: f64,
    end: f64,
    duration_s: f64,
    rate_hz: u32,
    gains: Gains,
    feedforward: f64,
) -> Result<Vec<Setpoint>> {
    gains.check().map_err(MoverError::InvalidPlan)?;
    if !feedforward.is_finite() {
        return Err(MoverError::InvalidPlan(format!(
            "feedforward must be finite, got {}",
            feedforward
        )));
    }
    let motion = MotionPlan::new(start, end, duration_s, rate_hz)?;
    Ok(motion.setpoints(gains, feedforward).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> Gains {
        Gains::new(20.0, 2.0)
    }

    fn positions(setpoints: &[Setpoint]) -> Vec<f64> {
        setpoints.iter().map(|s| s.position()).collect()
    }

    #[test]
    fn gripper_close_plan() {
        let setpoints = plan(0.0, 0.8, 3.0, 200, gains(), 0.05).unwrap();
        assert_eq!(setpoints.len(), 601);
        assert_eq!(setpoints[0].position(), 0.0);
        assert_eq!(setpoints[600].position(), 0.8);
        assert!((setpoints[300].position() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn gains_and_feedforward_are_constant() {
        let setpoints = plan(0.8, 0.0, 0.5, 100, gains(), 0.05).unwrap();
        assert!(setpoints
            .iter()
            .all(|s| s.gains() == gains() && s.feedforward() == 0.05));
    }

    #[test]
    fn length_follows_rounded_step_count() {
        let cases = [(1.0, 10, 11), (0.26, 10, 4), (0.24, 10, 3), (0.01, 10, 2)];
        for (duration, rate, expected) in cases {
            let setpoints = plan(0.0, 1.0, duration, rate, gains(), 0.0).unwrap();
            assert_eq!(setpoints.len(), expected, "duration {} rate {}", duration, rate);
            assert_eq!(setpoints.first().unwrap().position(), 0.0);
            assert_eq!(setpoints.last().unwrap().position(), 1.0);
        }
    }

    #[test]
    fn opening_is_monotonic_decreasing() {
        let setpoints = plan(0.8, 0.0, 1.0, 50, gains(), 0.0).unwrap();
        let positions = positions(&setpoints);
        assert!(positions.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(positions[0], 0.8);
        assert_eq!(*positions.last().unwrap(), 0.0);
    }

    #[test]
    fn closing_is_monotonic_increasing() {
        let setpoints = plan(-0.3, 0.9, 2.0, 30, gains(), 0.0).unwrap();
        let positions = positions(&setpoints);
        assert!(positions.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn zero_duration_is_single_endpoint() {
        let setpoints = plan(0.0, 0.8, 0.0, 200, gains(), 0.0).unwrap();
        assert_eq!(positions(&setpoints), vec![0.8]);
        let setpoints = plan(0.0, 0.8, -1.0, 200, gains(), 0.0).unwrap();
        assert_eq!(positions(&setpoints), vec![0.8]);
    }

    #[test]
    fn stationary_plan_keeps_full_length() {
        let setpoints = plan(0.4, 0.4, 1.0, 20, gains(), 0.0).unwrap();
        assert_eq!(setpoints.len(), 21);
        assert!(setpoints.iter().all(|s| s.position() == 0.4));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let result = plan(0.0, 0.8, 3.0, 0, gains(), 0.0);
        assert!(matches!(result, Err(MoverError::InvalidPlan(_))));
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        assert!(MotionPlan::new(f64::NAN, 0.8, 1.0, 10).is_err());
        assert!(MotionPlan::new(0.0, f64::INFINITY, 1.0, 10).is_err());
        assert!(MotionPlan::new(0.0, 0.8, f64::NAN, 10).is_err());
        assert!(plan(0.0, 0.8, 1.0, 10, Gains::new(-1.0, 0.0), 0.0).is_err());
        assert!(plan(0.0, 0.8, 1.0, 10, gains(), f64::NAN).is_err());
    }

    #[test]
    fn oversized_plan_is_rejected() {
        assert!(matches!(
            MotionPlan::new(0.0, 1.0, 1e300, 200),
            Err(MoverError::InvalidPlan(_))
        ));
        assert!(matches!(
            MotionPlan::new(0.0, 1.0, 4.4e7, 100),
            Err(MoverError::InvalidPlan(_))
        ));
        let longest = MotionPlan::new(0.0, 1.0, 4.2e7, 100).unwrap();
        assert_eq!(longest.intervals(), 4_200_000_000);
    }

    #[test]
    fn setpoints_iterator_is_restartable() {
        let motion = MotionPlan::new(0.0, 1.0, 0.1, 100).unwrap();
        let iter = motion.setpoints(gains(), 0.0);
        assert_eq!(iter.len(), 11);
        let first: Vec<Setpoint> = iter.clone().collect();
        let second: Vec<Setpoint> = motion.setpoints(gains(), 0.0).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn period_matches_rate() {
        let motion = MotionPlan::new(0.0, 1.0, 1.0, 200).unwrap();
        assert_eq!(motion.period(), Duration::from_millis(5));
    }

    #[test]
    fn gains_from_tuple() {
        let gains: Gains = (20.0, 2.0).into();
        assert_eq!(gains.kp(), 20.0);
        assert_eq!(gains.kd(), 2.0);
    }
}
