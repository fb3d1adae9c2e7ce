//! Which slots a barber can still take on a given day.
//!
//! The same committed-interval rules back both the availability listing and
//! the write-time guard in [`crate::services::booking`], so a slot shown as
//! free is only refused at booking time if someone else took it in between.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::working_hours::weekday_index;
use crate::models::TimeSlot;
use crate::services::clock::{minutes_to_time, overlaps, parse_time_to_minutes};
use crate::services::slots::{floor_to_slot, SlotRange, SLOT_MINUTES};

/// Minimum notice for same-day bookings.
pub const LEAD_TIME_MINUTES: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalSource {
    /// Reserved block of an approved appointment.
    Slot,
    /// Live request that has no reserved block yet.
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedInterval {
    pub appointment_id: String,
    pub start: i32,
    pub end: i32,
    pub source: IntervalSource,
}

impl CommittedInterval {
    /// Listing rule. Reserved blocks hide anything they overlap; un-slotted
    /// requests only hide the slot starting at exactly the same minute.
    pub fn blocks(&self, start: i32, end: i32) -> bool {
        match self.source {
            IntervalSource::Slot => overlaps(self.start, self.end, start, end),
            IntervalSource::Request => self.start == start,
        }
    }

    /// Write rule. Every committed interval, request or slot, rejects any
    /// write it overlaps or shares a start with, so stored intervals stay
    /// pairwise disjoint.
    pub fn conflicts(&self, start: i32, end: i32) -> bool {
        self.start == start || overlaps(self.start, self.end, start, end)
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
    let trimmed = date.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid("date is required"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| AppError::invalid(format!("date must be YYYY-MM-DD, got {date:?}")))
}

/// Everything that currently holds time for `barber_id` on `date`.
pub fn load_committed(
    conn: &Connection,
    barber_id: &str,
    date: &str,
) -> Result<Vec<CommittedInterval>, AppError> {
    let mut committed = vec![];

    for (id, start, end) in queries::get_committed_slots(conn, barber_id, date)? {
        committed.push(CommittedInterval {
            appointment_id: id,
            start: parse_time_to_minutes(&start)?,
            end: parse_time_to_minutes(&end)?,
            source: IntervalSource::Slot,
        });
    }

    for (id, start, end) in queries::get_unslotted_requests(conn, barber_id, date)? {
        let start = parse_time_to_minutes(&start)?;
        let end = match end.as_deref() {
            Some(end) => parse_time_to_minutes(end)?,
            None => start + SLOT_MINUTES,
        };
        committed.push(CommittedInterval {
            appointment_id: id,
            start,
            end,
            source: IntervalSource::Request,
        });
    }

    Ok(committed)
}

/// First committed interval that hides slot `[start, end)` from the listing.
pub fn find_blocker(committed: &[CommittedInterval], start: i32, end: i32) -> Option<&CommittedInterval> {
    committed.iter().find(|c| c.blocks(start, end))
}

/// First committed interval a write of `[start, end)` would collide with,
/// ignoring `exclude_id` (the request being approved).
pub fn find_conflict<'a>(
    committed: &'a [CommittedInterval],
    start: i32,
    end: i32,
    exclude_id: Option<&str>,
) -> Option<&'a CommittedInterval> {
    committed
        .iter()
        .filter(|c| Some(c.appointment_id.as_str()) != exclude_id)
        .find(|c| c.conflicts(start, end))
}

/// Earliest slot start still offered when `date` is today: two hours from
/// now, snapped to the slot boundary at or below it so the slot containing
/// that instant stays bookable. `None` for any other day.
pub fn lead_time_cutoff(date: NaiveDate, now: NaiveDateTime) -> Option<i32> {
    if date != now.date() {
        return None;
    }
    let now_minutes = (now.hour() * 60 + now.minute()) as i32;
    Some(floor_to_slot(now_minutes + LEAD_TIME_MINUTES))
}

/// Slot range for the barber's hours that weekday, or `None` on a day off.
pub fn working_slots(
    conn: &Connection,
    barber_id: &str,
    date: NaiveDate,
) -> Result<Option<SlotRange>, AppError> {
    let hours = match queries::get_working_hours(conn, barber_id, weekday_index(date))? {
        Some(hours) if hours.is_working => hours,
        _ => return Ok(None),
    };
    Ok(Some(SlotRange::for_window(&hours.start_time, &hours.end_time)?))
}

pub fn get_availability(
    conn: &Connection,
    barber_id: &str,
    date: &str,
    now: NaiveDateTime,
) -> Result<Vec<TimeSlot>, AppError> {
    let day = parse_date(date)?;

    match queries::get_barber(conn, barber_id)? {
        Some(barber) if barber.is_active => {}
        _ => return Err(AppError::not_found(format!("barber {barber_id}"))),
    }

    if day < now.date() {
        return Ok(vec![]);
    }

    let Some(range) = working_slots(conn, barber_id, day)? else {
        return Ok(vec![]);
    };

    let date_key = day.format("%Y-%m-%d").to_string();
    let committed = load_committed(conn, barber_id, &date_key)?;
    let cutoff = lead_time_cutoff(day, now);

    let mut slots = Vec::with_capacity(range.iter().size_hint().0);
    for start in range.iter() {
        if cutoff.is_some_and(|c| start < c) {
            continue;
        }
        let end = start + SLOT_MINUTES;
        slots.push(TimeSlot {
            start_time: minutes_to_time(start)?,
            end_time: minutes_to_time(end)?,
            is_available: find_blocker(&committed, start, end).is_none(),
        });
    }

    Ok(slots)
}
