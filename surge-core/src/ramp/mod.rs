//! Rate ramping schedules.
//!
//! A ramp schedule produces a deterministic, monotonically progressing
//! sequence of target rates from a start rate to an end rate over a fixed
//! number of steps. The runner pulls one rate per step and drives the
//! scenario at that rate for the step's share of the total duration.

mod exponential;
mod linear;

pub use exponential::ExponentialRamp;
pub use linear::LinearRamp;

/// Interpolation kind for a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampKind {
    Linear,
    Exponential,
}

impl RampKind {
    /// Parses the configuration spelling of a ramp kind.
    ///
    /// Unknown spellings yield `None`; the caller falls back to
    /// steady-state execution.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "linear" => Some(RampKind::Linear),
            "exponential" => Some(RampKind::Exponential),
            _ => None,
        }
    }

    /// Builds the schedule for this kind.
    ///
    /// Bounds are not validated here — callers must gate construction on
    /// [`crate::config::ConfigResolver::validate_ramp_config`]; invalid
    /// bounds produce an undefined numeric sequence.
    pub fn schedule(self, start_rate: i64, end_rate: i64, steps: i64) -> Box<dyn RampSchedule> {
        match self {
            RampKind::Linear => Box::new(LinearRamp::new(start_rate, end_rate, steps)),
            RampKind::Exponential => Box::new(ExponentialRamp::new(start_rate, end_rate, steps)),
        }
    }
}

/// A stateful sequence of target rates.
///
/// Call [`RampSchedule::next_rate`] exactly [`RampSchedule::steps`] times;
/// the final step returns the configured end rate exactly, regardless of
/// accumulated rounding, and repeated calls past the end keep returning it.
pub trait RampSchedule: Send {
    /// Advances the schedule and returns the rate for the next step.
    fn next_rate(&mut self) -> i64;

    /// Configured number of steps. Never mutates state.
    fn steps(&self) -> i64;

    /// Human-readable kind label for logs. Never mutates state.
    fn label(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(RampKind::parse("linear"), Some(RampKind::Linear));
        assert_eq!(RampKind::parse("exponential"), Some(RampKind::Exponential));
        assert_eq!(RampKind::parse("quadratic"), None);
        assert_eq!(RampKind::parse(""), None);
    }

    #[test]
    fn test_schedule_factory_labels() {
        assert_eq!(
            RampKind::Linear.schedule(1, 10, 5).label(),
            "Linear ramp"
        );
        assert_eq!(
            RampKind::Exponential.schedule(1, 10, 5).label(),
            "Exponential ramp"
        );
    }

    proptest! {
        /// The last of `steps` calls always lands exactly on the end rate,
        /// and every call past the end keeps returning it.
        #[test]
        fn prop_final_step_is_end_rate(
            start in 1i64..500,
            span in 1i64..500,
            steps in 2i64..32,
            kind in prop_oneof![Just(RampKind::Linear), Just(RampKind::Exponential)],
        ) {
            let end = start + span;
            let mut schedule = kind.schedule(start, end, steps);
            for _ in 0..steps - 1 {
                schedule.next_rate();
            }
            prop_assert_eq!(schedule.next_rate(), end);
            prop_assert_eq!(schedule.next_rate(), end);
        }

        /// Emitted rates never exceed the end rate for an ascending ramp.
        #[test]
        fn prop_rates_bounded_by_end(
            start in 1i64..500,
            span in 1i64..500,
            steps in 2i64..32,
            kind in prop_oneof![Just(RampKind::Linear), Just(RampKind::Exponential)],
        ) {
            let end = start + span;
            let mut schedule = kind.schedule(start, end, steps);
            for _ in 0..steps {
                prop_assert!(schedule.next_rate() <= end);
            }
        }
    }
}
