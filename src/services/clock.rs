//! Wall-clock access and `HH:MM` arithmetic.
//!
//! Times are stored as zero-padded `HH:MM` strings and compared as minutes of
//! the day. Timezone handling stops here: "now" is server-local time.

use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};

use crate::errors::AppError;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to one instant until moved with [`FixedClock::set`].
pub struct FixedClock(Mutex<NaiveDateTime>);

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: NaiveDateTime) {
        match self.0.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub fn parse_time_to_minutes(time: &str) -> Result<i32, AppError> {
    let invalid = || AppError::InvalidFormat(format!("expected HH:MM, got {time:?}"));

    let (hours, minutes) = time.trim().split_once(':').ok_or_else(invalid)?;
    let field = |s: &str| -> Result<i32, AppError> {
        if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse().map_err(|_| invalid())
    };
    let hours = field(hours)?;
    let minutes = field(minutes)?;

    if hours > 23 || minutes > 59 {
        return Err(AppError::InvalidFormat(format!("time out of range: {time}")));
    }
    Ok(hours * 60 + minutes)
}

pub fn minutes_to_time(minutes: i32) -> Result<String, AppError> {
    if !(0..MINUTES_PER_DAY).contains(&minutes) {
        return Err(AppError::InvalidFormat(format!(
            "minute of day out of range: {minutes}"
        )));
    }
    Ok(format!("{:02}:{:02}", minutes / 60, minutes % 60))
}

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)`. Back-to-back
/// intervals do not overlap.
pub fn overlaps(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time_to_minutes("00:00").unwrap(), 0);
        assert_eq!(parse_time_to_minutes("09:30").unwrap(), 570);
        assert_eq!(parse_time_to_minutes("23:59").unwrap(), 1439);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        for bad in ["", "9", "24:00", "12:60", "ab:cd", "12:3x", "-1:00", "12:00:00", "123:00"] {
            assert!(
                matches!(parse_time_to_minutes(bad), Err(AppError::InvalidFormat(_))),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_minutes_to_time() {
        assert_eq!(minutes_to_time(0).unwrap(), "00:00");
        assert_eq!(minutes_to_time(545).unwrap(), "09:05");
        assert_eq!(minutes_to_time(1439).unwrap(), "23:59");
        assert!(minutes_to_time(-1).is_err());
        assert!(minutes_to_time(1440).is_err());
    }

    #[test]
    fn test_every_minute_round_trips() {
        for m in 0..MINUTES_PER_DAY {
            let t = minutes_to_time(m).unwrap();
            assert_eq!(parse_time_to_minutes(&t).unwrap(), m);
            assert_eq!(minutes_to_time(parse_time_to_minutes(&t).unwrap()).unwrap(), t);
        }
    }

    #[test]
    fn test_overlaps() {
        // 10:00-10:30 vs 10:15-10:45
        assert!(overlaps(600, 630, 615, 645));
        // containment
        assert!(overlaps(600, 720, 630, 660));
        // touching endpoints do not count
        assert!(!overlaps(600, 630, 630, 660));
        assert!(!overlaps(630, 660, 600, 630));
        // disjoint
        assert!(!overlaps(600, 630, 700, 730));
    }
}
