//! Exponential rate interpolation.

use super::RampSchedule;

/// Geometric ramp: step `i` emits `round(start * ratio^i)` where
/// `ratio = (end / start) ^ (1 / steps)`. The exponent starts at one, so
/// the first emitted rate already sits above the start rate.
#[derive(Debug)]
pub struct ExponentialRamp {
    start_rate: i64,
    end_rate: i64,
    steps: i64,
    current_step: i64,
    ratio: f64,
}

impl ExponentialRamp {
    pub fn new(start_rate: i64, end_rate: i64, steps: i64) -> Self {
        let ratio = (end_rate as f64 / start_rate as f64).powf(1.0 / steps as f64);
        Self {
            start_rate,
            end_rate,
            steps,
            current_step: 1,
            ratio,
        }
    }
}

impl RampSchedule for ExponentialRamp {
    fn next_rate(&mut self) -> i64 {
        if self.current_step == self.steps {
            // Pinned to the exact end rate; does not advance, so the final
            // step is idempotent.
            return self.end_rate;
        }
        let rate = self.start_rate as f64 * self.ratio.powi(self.current_step as i32);
        self.current_step += 1;
        rate.round() as i64
    }

    fn steps(&self) -> i64 {
        self.steps
    }

    fn label(&self) -> &'static str {
        "Exponential ramp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(schedule: &mut ExponentialRamp, count: usize) -> Vec<i64> {
        (0..count).map(|_| schedule.next_rate()).collect()
    }

    #[test]
    fn test_next_rate_2_to_20_in_8() {
        let mut ramp = ExponentialRamp::new(2, 20, 8);
        assert_eq!(collect(&mut ramp, 8), vec![3, 4, 5, 6, 8, 11, 15, 20]);
    }

    #[test]
    fn test_next_rate_1_to_100_in_8() {
        let mut ramp = ExponentialRamp::new(1, 100, 8);
        assert_eq!(collect(&mut ramp, 8), vec![2, 3, 6, 10, 18, 32, 56, 100]);
    }

    #[test]
    fn test_final_step_repeats_end_rate() {
        let mut ramp = ExponentialRamp::new(2, 20, 8);
        for _ in 0..8 {
            ramp.next_rate();
        }
        assert_eq!(ramp.next_rate(), 20);
        assert_eq!(ramp.next_rate(), 20);
    }

    #[test]
    fn test_steps_and_label_do_not_advance() {
        let mut ramp = ExponentialRamp::new(1, 10, 5);
        assert_eq!(ramp.steps(), 5);
        assert_eq!(ramp.label(), "Exponential ramp");
        // First consumed step is round(1 * 10^(1/5)) = round(1.584...) = 2.
        assert_eq!(ramp.next_rate(), 2);
    }
}
