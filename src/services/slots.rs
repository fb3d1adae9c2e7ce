use crate::errors::AppError;
use crate::services::clock::parse_time_to_minutes;

pub const SLOT_MINUTES: i32 = 30;

pub fn floor_to_slot(minutes: i32) -> i32 {
    minutes - minutes.rem_euclid(SLOT_MINUTES)
}

/// Bookable slot starts for one working window, from the slot boundary at or
/// before opening up to the last start that still ends by closing time.
///
/// The range is plain data; every call to [`SlotRange::iter`] starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    first: i32,
    last: i32,
}

impl SlotRange {
    pub fn new(start_minutes: i32, end_minutes: i32) -> Self {
        Self {
            first: floor_to_slot(start_minutes),
            last: end_minutes - SLOT_MINUTES,
        }
    }

    pub fn for_window(start_time: &str, end_time: &str) -> Result<Self, AppError> {
        Ok(Self::new(
            parse_time_to_minutes(start_time)?,
            parse_time_to_minutes(end_time)?,
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// Whether `start` is one of the generated slot starts.
    pub fn contains(&self, start: i32) -> bool {
        !self.is_empty()
            && start >= self.first
            && start <= self.last
            && (start - self.first) % SLOT_MINUTES == 0
    }

    /// Closing bound: no generated slot ends after this minute.
    pub fn closes_at(&self) -> i32 {
        self.last + SLOT_MINUTES
    }

    pub fn iter(&self) -> SlotIter {
        SlotIter {
            next: self.first,
            last: self.last,
        }
    }
}

impl IntoIterator for &SlotRange {
    type Item = i32;
    type IntoIter = SlotIter;

    fn into_iter(self) -> SlotIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct SlotIter {
    next: i32,
    last: i32,
}

impl Iterator for SlotIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.next > self.last {
            return None;
        }
        let current = self.next;
        self.next += SLOT_MINUTES;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next > self.last {
            0
        } else {
            ((self.last - self.next) / SLOT_MINUTES + 1) as usize
        };
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::minutes_to_time;

    fn starts(range: &SlotRange) -> Vec<String> {
        range.iter().map(|m| minutes_to_time(m).unwrap()).collect()
    }

    #[test]
    fn test_aligned_window() {
        let range = SlotRange::for_window("09:00", "12:00").unwrap();
        assert_eq!(
            starts(&range),
            vec!["09:00", "09:30", "10:00", "10:30", "11:00", "11:30"]
        );
    }

    #[test]
    fn test_unaligned_open_rounds_down() {
        let range = SlotRange::for_window("09:15", "11:00").unwrap();
        assert_eq!(starts(&range), vec!["09:00", "09:30", "10:00", "10:30"]);
    }

    #[test]
    fn test_unaligned_close_drops_partial_slot() {
        let range = SlotRange::for_window("09:00", "10:45").unwrap();
        assert_eq!(starts(&range), vec!["09:00", "09:30", "10:00"]);
        assert_eq!(range.closes_at(), 10 * 60 + 45);
    }

    #[test]
    fn test_window_too_short_is_empty() {
        let range = SlotRange::for_window("09:00", "09:20").unwrap();
        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
        assert!(!range.contains(540));
    }

    #[test]
    fn test_iteration_restarts() {
        let range = SlotRange::for_window("10:00", "11:30").unwrap();
        let first: Vec<i32> = range.iter().collect();
        let second: Vec<i32> = (&range).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(range.iter().size_hint(), (3, Some(3)));
    }

    #[test]
    fn test_contains() {
        let range = SlotRange::for_window("09:00", "12:00").unwrap();
        assert!(range.contains(9 * 60));
        assert!(range.contains(11 * 60 + 30));
        assert!(!range.contains(12 * 60));
        assert!(!range.contains(9 * 60 + 15));
        assert!(!range.contains(8 * 60 + 30));
    }
}
