//! Attack rate parsing and pacing arithmetic.
//!
//! Rates are configured as `"<frequency>/<unit>"` strings (`"5/s"`,
//! `"120/m"`). A bare integer implies per-second; `"infinity"` and a zero
//! frequency mean unrestricted — the attack engine applies no pacing at
//! all. The configured frequency is the aggregate across every parallel
//! connection, so parsing divides it by the connection count.

use std::fmt;
use std::time::Duration;

/// Errors raised while parsing a rate string.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("rate {input:?} does not match the \"freq/unit\" format (i.e. 50/s)")]
    InvalidFrequency { input: String },

    #[error("unknown rate unit {unit:?}")]
    InvalidUnit { unit: String },
}

/// A target request rate: `freq` requests per `per`.
///
/// A zero frequency is the unrestricted rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub freq: u64,
    pub per: Duration,
}

impl Rate {
    /// The unrestricted rate: requests are issued with no pacing delay.
    pub const fn unrestricted() -> Self {
        Self {
            freq: 0,
            per: Duration::ZERO,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.freq == 0 || self.per.is_zero()
    }

    /// Pause between consecutive request starts, or `None` when
    /// unrestricted.
    pub fn interval(&self) -> Option<Duration> {
        if self.is_unrestricted() {
            None
        } else {
            let interval = Duration::from_secs_f64(self.per.as_secs_f64() / self.freq as f64);
            Some(interval.max(Duration::from_nanos(1)))
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            write!(f, "infinity")
        } else {
            write!(f, "{}/{}", self.freq, format_per(self.per))
        }
    }
}

fn format_per(per: Duration) -> String {
    const UNITS: [(u128, &str); 5] = [
        (3_600_000_000_000, "h"),
        (60_000_000_000, "m"),
        (1_000_000_000, "s"),
        (1_000_000, "ms"),
        (1_000, "us"),
    ];
    let nanos = per.as_nanos();
    for (scale, label) in UNITS {
        if nanos % scale == 0 {
            return format!("{}{}", nanos / scale, label);
        }
    }
    format!("{nanos}ns")
}

/// Parses a rate string, dividing the frequency across `connections`
/// parallel connections (integer division, floor of one) so the aggregate
/// matches the requested rate.
pub fn parse_rate(input: &str, connections: usize) -> Result<Rate, RateError> {
    let input = input.trim();
    if input == "infinity" {
        return Ok(Rate::unrestricted());
    }

    let (freq_part, per_part) = match input.split_once('/') {
        Some((freq, per)) => (freq, per),
        None => (input, "1s"),
    };

    let freq: u64 = freq_part.parse().map_err(|_| RateError::InvalidFrequency {
        input: input.to_string(),
    })?;
    if freq == 0 {
        return Ok(Rate::unrestricted());
    }

    let per = parse_per(per_part)?;
    let freq = if connections > 1 {
        (freq / connections as u64).max(1)
    } else {
        freq
    };
    Ok(Rate { freq, per })
}

fn parse_per(input: &str) -> Result<Duration, RateError> {
    let unit_start = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| RateError::InvalidUnit {
            unit: input.to_string(),
        })?;
    let (count, unit) = input.split_at(unit_start);
    let count: u32 = if count.is_empty() {
        1
    } else {
        count.parse().map_err(|_| RateError::InvalidUnit {
            unit: input.to_string(),
        })?
    };
    let base = match unit {
        "ns" => Duration::from_nanos(1),
        "us" | "µs" => Duration::from_micros(1),
        "ms" => Duration::from_millis(1),
        "s" => Duration::from_secs(1),
        "m" => Duration::from_secs(60),
        "h" => Duration::from_secs(3600),
        _ => {
            return Err(RateError::InvalidUnit {
                unit: unit.to_string(),
            });
        }
    };
    Ok(base * count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_single_connection() {
        let cases = [
            ("1/s", 1, Duration::from_secs(1)),
            ("10", 10, Duration::from_secs(1)),
            ("1/m", 1, Duration::from_secs(60)),
            ("1/h", 1, Duration::from_secs(3600)),
            ("1/ms", 1, Duration::from_millis(1)),
            ("1/ns", 1, Duration::from_nanos(1)),
            ("1/us", 1, Duration::from_micros(1)),
            ("1/µs", 1, Duration::from_micros(1)),
            ("500/s", 500, Duration::from_secs(1)),
            ("5/2s", 5, Duration::from_secs(2)),
        ];
        for (input, freq, per) in cases {
            let rate = parse_rate(input, 1).unwrap();
            assert_eq!(rate, Rate { freq, per }, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_rate_divides_across_connections() {
        let cases = [
            ("1/s", 2, 1, Duration::from_secs(1)),
            ("10", 2, 5, Duration::from_secs(1)),
            ("10", 3, 3, Duration::from_secs(1)),
            ("500/s", 4, 125, Duration::from_secs(1)),
            ("1/m", 2, 1, Duration::from_secs(60)),
            ("1/ms", 3, 1, Duration::from_millis(1)),
        ];
        for (input, connections, freq, per) in cases {
            let rate = parse_rate(input, connections).unwrap();
            assert_eq!(rate, Rate { freq, per }, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_rate_unrestricted_forms() {
        assert!(parse_rate("infinity", 1).unwrap().is_unrestricted());
        assert!(parse_rate("0", 1).unwrap().is_unrestricted());
        assert!(parse_rate("0", 2).unwrap().is_unrestricted());
    }

    #[test]
    fn test_parse_rate_rejects_bad_input() {
        assert!(matches!(
            parse_rate("fast", 1),
            Err(RateError::InvalidFrequency { .. })
        ));
        assert!(matches!(
            parse_rate("1/t", 1),
            Err(RateError::InvalidUnit { .. })
        ));
        assert!(matches!(
            parse_rate("", 1),
            Err(RateError::InvalidFrequency { .. })
        ));
    }

    #[test]
    fn test_interval_spacing() {
        let rate = parse_rate("5/s", 1).unwrap();
        assert_eq!(rate.interval(), Some(Duration::from_millis(200)));
        assert_eq!(Rate::unrestricted().interval(), None);
    }

    #[test]
    fn test_display_round_trips_units() {
        assert_eq!(parse_rate("5/s", 1).unwrap().to_string(), "5/1s");
        assert_eq!(parse_rate("1/m", 1).unwrap().to_string(), "1/1m");
        assert_eq!(Rate::unrestricted().to_string(), "infinity");
    }
}
