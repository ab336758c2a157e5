use chrono::{Duration, NaiveTime};
use crate::constants::MAX_TIME_SPAN;
use crate::error::Error;

/// `a - b` for times of day.
///
/// Requires `a >= b` and the two values to be at most 8 hours apart; day
/// wrap is not supported.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] when the operands are ordered the wrong way
/// round or further apart than the supported window.
pub fn timediff(a: NaiveTime, b: NaiveTime) -> Result<Duration, Error> {
    if a < b {
        return Err(Error::OutOfRange(format!("{a} < {b}")));
    }

    let diff = a - b;
    if diff > MAX_TIME_SPAN {
        return Err(Error::OutOfRange(format!("{a} and {b} are more than 8 hours apart")));
    }

    Ok(diff)
}

/// `t + delta` for a time of day.
///
/// The offset may be negative. A result that crosses midnight is wrapped to
/// the next/previous day's time of day, with an advisory on the log; callers
/// that care about the wrap must not feed journeys across midnight.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] when `|delta|` exceeds 8 hours.
pub fn timeadd(t: NaiveTime, delta: Duration) -> Result<NaiveTime, Error> {
    if delta > MAX_TIME_SPAN || -delta > MAX_TIME_SPAN {
        return Err(Error::OutOfRange(format!("offset of {delta} exceeds 8 hours")));
    }

    let (sum, wrap) = t.overflowing_add_signed(delta);
    if wrap != 0 {
        log::warn!("{t} + {delta} crosses midnight, wrapping to {sum}");
    }

    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    #[test]
    fn test_timediff() {
        assert_eq!(
            timediff(hms(19, 20, 0), hms(17, 40, 0)).expect("in range"),
            Duration::minutes(100)
        );
    }

    #[test]
    fn test_timediff_wrong_order() {
        assert!(timediff(hms(19, 20, 0), hms(20, 30, 0)).is_err());
    }

    #[test]
    fn test_timediff_too_far_apart() {
        assert!(timediff(hms(19, 20, 0), hms(10, 30, 0)).is_err());
    }

    #[test]
    fn test_timeadd() {
        assert_eq!(
            timeadd(hms(10, 20, 0), Duration::minutes(80)).expect("in range"),
            hms(11, 40, 0)
        );
    }

    #[test]
    fn test_timeadd_wraps_past_midnight() {
        assert_eq!(
            timeadd(hms(22, 20, 0), Duration::minutes(120)).expect("in range"),
            hms(0, 20, 0)
        );
    }

    #[test]
    fn test_timeadd_negative_offset() {
        assert_eq!(
            timeadd(hms(10, 20, 0), Duration::minutes(-30)).expect("in range"),
            hms(9, 50, 0)
        );
    }

    #[test]
    fn test_timeadd_offset_too_large() {
        assert!(timeadd(hms(10, 20, 0), Duration::hours(9)).is_err());
        assert!(timeadd(hms(10, 20, 0), Duration::hours(-9)).is_err());
    }
}
