//! Linear rate interpolation.

use super::RampSchedule;

/// Evenly spaced ramp: each step adds `(end - start) / (steps - 1)` to an
/// internal floating-point accumulator, rounding on emission.
#[derive(Debug)]
pub struct LinearRamp {
    end_rate: i64,
    steps: i64,
    current_rate: f64,
    current_step: i64,
    delta: f64,
}

impl LinearRamp {
    pub fn new(start_rate: i64, end_rate: i64, steps: i64) -> Self {
        let delta = (end_rate - start_rate) as f64 / (steps - 1) as f64;
        Self {
            end_rate,
            steps,
            current_rate: start_rate as f64,
            current_step: 1,
            delta,
        }
    }
}

impl RampSchedule for LinearRamp {
    fn next_rate(&mut self) -> i64 {
        if self.current_step == self.steps {
            // Pinned to the exact end rate; does not advance, so the final
            // step is idempotent.
            return self.end_rate;
        }
        if self.current_step != 1 {
            self.current_rate += self.delta;
        }
        self.current_step += 1;
        self.current_rate.round() as i64
    }

    fn steps(&self) -> i64 {
        self.steps
    }

    fn label(&self) -> &'static str {
        "Linear ramp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(schedule: &mut LinearRamp, count: usize) -> Vec<i64> {
        (0..count).map(|_| schedule.next_rate()).collect()
    }

    #[test]
    fn test_next_rate_2_to_50_in_6() {
        let mut ramp = LinearRamp::new(2, 50, 6);
        assert_eq!(collect(&mut ramp, 6), vec![2, 12, 21, 31, 40, 50]);
    }

    #[test]
    fn test_next_rate_1_to_15_in_9() {
        let mut ramp = LinearRamp::new(1, 15, 9);
        assert_eq!(collect(&mut ramp, 9), vec![1, 3, 5, 6, 8, 10, 12, 13, 15]);
    }

    #[test]
    fn test_next_rate_1_to_10_in_10() {
        let mut ramp = LinearRamp::new(1, 10, 10);
        assert_eq!(collect(&mut ramp, 10), (1..=10).collect::<Vec<i64>>());
    }

    #[test]
    fn test_final_step_repeats_end_rate() {
        let mut ramp = LinearRamp::new(2, 50, 6);
        for _ in 0..6 {
            ramp.next_rate();
        }
        assert_eq!(ramp.next_rate(), 50);
        assert_eq!(ramp.next_rate(), 50);
    }

    #[test]
    fn test_steps_and_label_do_not_advance() {
        let mut ramp = LinearRamp::new(1, 10, 7);
        assert_eq!(ramp.steps(), 7);
        assert_eq!(ramp.label(), "Linear ramp");
        assert_eq!(ramp.steps(), 7);
        // Accessors above must not have consumed the first step.
        assert_eq!(ramp.next_rate(), 1);
    }
}
