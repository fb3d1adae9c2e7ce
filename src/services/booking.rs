//! Write path for appointments.
//!
//! Every write that claims time re-reads the committed intervals inside a
//! `BEGIN IMMEDIATE` transaction, so two bookings for the same barber can
//! never interleave between check and insert. The partial unique indexes on
//! requests and slots catch anything that slips past.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Appointment, AppointmentRequest, AppointmentSlot, AppointmentStatus, CancelledBy,
};
use crate::services::availability::{
    find_conflict, lead_time_cutoff, load_committed, parse_date, working_slots,
};
use crate::services::clock::{minutes_to_time, parse_time_to_minutes};
use crate::services::slots::SLOT_MINUTES;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub barber_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOrigin {
    /// Public booking form: must land on an offered slot, starts `pending`.
    Customer,
    /// Staff-entered appointment: any free time, approved with its slot.
    Staff,
}

/// Validated `[start, end)` in minutes, plus its canonical `HH:MM` forms.
struct Interval {
    start: i32,
    end: i32,
    start_time: String,
    end_time: String,
}

fn resolve_interval(start_time: &str, end_time: Option<&str>) -> Result<Interval, AppError> {
    let start = parse_time_to_minutes(start_time)?;
    let end = match end_time.map(str::trim).filter(|s| !s.is_empty()) {
        Some(end) => parse_time_to_minutes(end)?,
        None => start + SLOT_MINUTES,
    };
    if end <= start {
        return Err(AppError::invalid("end time must be after start time"));
    }
    Ok(Interval {
        start,
        end,
        start_time: minutes_to_time(start)?,
        end_time: minutes_to_time(end)
            .map_err(|_| AppError::invalid("appointment must end before midnight"))?,
    })
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Unique-index hits inside the guard mean a concurrent booking won the race.
fn conflict_or_internal(err: anyhow::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::SlotConflict
    } else {
        AppError::Internal(err)
    }
}

fn ensure_bookable_barber(conn: &Connection, barber_id: &str) -> Result<(), AppError> {
    match queries::get_barber(conn, barber_id)? {
        Some(barber) if barber.is_active => Ok(()),
        _ => Err(AppError::not_found(format!("barber {barber_id}"))),
    }
}

fn ensure_offered(
    conn: &Connection,
    barber_id: &str,
    day: NaiveDate,
    interval: &Interval,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let range = working_slots(conn, barber_id, day)?
        .ok_or_else(|| AppError::invalid("barber is not working that day"))?;
    if !range.contains(interval.start) || interval.end > range.closes_at() {
        return Err(AppError::invalid(format!(
            "{} is outside the barber's working hours",
            interval.start_time
        )));
    }
    if lead_time_cutoff(day, now).is_some_and(|cutoff| interval.start < cutoff) {
        return Err(AppError::invalid(
            "same-day bookings need at least two hours notice",
        ));
    }
    Ok(())
}

pub fn create_booking(
    conn: &mut Connection,
    booking: &NewBooking,
    origin: BookingOrigin,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let customer_name = booking.customer_name.trim();
    let customer_phone = booking.customer_phone.trim();
    if customer_name.is_empty() {
        return Err(AppError::invalid("customer name is required"));
    }
    if customer_phone.is_empty() {
        return Err(AppError::invalid("customer phone is required"));
    }

    let day = parse_date(&booking.date)?;
    let interval = resolve_interval(&booking.start_time, booking.end_time.as_deref())?;
    if day < now.date() {
        return Err(AppError::invalid("date is in the past"));
    }
    let date = day.format("%Y-%m-%d").to_string();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    ensure_bookable_barber(&tx, &booking.barber_id)?;
    if origin == BookingOrigin::Customer {
        ensure_offered(&tx, &booking.barber_id, day, &interval, now)?;
    }

    let committed = load_committed(&tx, &booking.barber_id, &date)?;
    if let Some(blocker) = find_conflict(&committed, interval.start, interval.end, None) {
        tracing::info!(
            barber_id = %booking.barber_id,
            date = %date,
            start = %interval.start_time,
            blocked_by = %blocker.appointment_id,
            "booking rejected, slot taken"
        );
        return Err(AppError::SlotConflict);
    }

    let status = match origin {
        BookingOrigin::Customer => AppointmentStatus::Pending,
        BookingOrigin::Staff => AppointmentStatus::Approved,
    };
    let request = AppointmentRequest {
        id: Uuid::new_v4().to_string(),
        barber_id: booking.barber_id.clone(),
        customer_name: customer_name.to_string(),
        customer_phone: customer_phone.to_string(),
        customer_email: booking
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        date: date.clone(),
        requested_start_time: interval.start_time.clone(),
        requested_end_time: booking.end_time.as_ref().map(|_| interval.end_time.clone()),
        status,
        cancelled_by: None,
        notes: booking.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    queries::insert_request(&tx, &request).map_err(conflict_or_internal)?;

    let slot = match origin {
        BookingOrigin::Customer => None,
        BookingOrigin::Staff => {
            let slot = AppointmentSlot {
                id: Uuid::new_v4().to_string(),
                request_id: request.id.clone(),
                barber_id: request.barber_id.clone(),
                date,
                start_time: interval.start_time,
                end_time: interval.end_time,
            };
            queries::insert_slot(&tx, &slot).map_err(conflict_or_internal)?;
            Some(slot)
        }
    };

    tx.commit()?;

    tracing::info!(
        appointment_id = %request.id,
        barber_id = %request.barber_id,
        date = %request.date,
        start = %request.requested_start_time,
        status = request.status.as_str(),
        "booking created"
    );

    Ok(Appointment { request, slot })
}

pub fn get_appointment(conn: &Connection, id: &str) -> Result<Appointment, AppError> {
    queries::get_appointment(conn, id)?.ok_or_else(|| AppError::not_found(format!("appointment {id}")))
}

/// Approves a pending request, reserving either the requested time or a
/// staff-adjusted one.
pub fn approve(
    conn: &mut Connection,
    id: &str,
    adjusted_start: Option<&str>,
    adjusted_end: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut appointment = get_appointment(&tx, id)?;
    let request = &appointment.request;
    if request.status != AppointmentStatus::Pending {
        return Err(AppError::invalid(format!(
            "only pending appointments can be approved, this one is {}",
            request.status.as_str()
        )));
    }

    let interval = match adjusted_start {
        Some(start) => resolve_interval(start, adjusted_end)?,
        None => resolve_interval(
            &request.requested_start_time,
            adjusted_end.or(request.requested_end_time.as_deref()),
        )?,
    };

    let committed = load_committed(&tx, &request.barber_id, &request.date)?;
    if find_conflict(&committed, interval.start, interval.end, Some(id)).is_some() {
        return Err(AppError::SlotConflict);
    }

    let slot = AppointmentSlot {
        id: Uuid::new_v4().to_string(),
        request_id: id.to_string(),
        barber_id: request.barber_id.clone(),
        date: request.date.clone(),
        start_time: interval.start_time,
        end_time: interval.end_time,
    };
    queries::insert_slot(&tx, &slot).map_err(conflict_or_internal)?;
    queries::update_request_status(&tx, id, AppointmentStatus::Approved, None, &now)?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, start = %slot.start_time, end = %slot.end_time, "appointment approved");

    appointment.request.status = AppointmentStatus::Approved;
    appointment.request.updated_at = now;
    appointment.slot = Some(slot);
    Ok(appointment)
}

pub fn reject(conn: &mut Connection, id: &str, now: NaiveDateTime) -> Result<Appointment, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut appointment = get_appointment(&tx, id)?;
    if appointment.request.status != AppointmentStatus::Pending {
        return Err(AppError::invalid(format!(
            "only pending appointments can be rejected, this one is {}",
            appointment.request.status.as_str()
        )));
    }
    queries::update_request_status(&tx, id, AppointmentStatus::Rejected, None, &now)?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, "appointment rejected");

    appointment.request.status = AppointmentStatus::Rejected;
    appointment.request.updated_at = now;
    Ok(appointment)
}

pub fn cancel(
    conn: &mut Connection,
    id: &str,
    cancelled_by: CancelledBy,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let appointment = get_appointment(&tx, id)?;
    let appointment = release_time(&tx, appointment, cancelled_by, now)?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, cancelled_by = cancelled_by.as_str(), "appointment cancelled");
    Ok(appointment)
}

/// Marks a live appointment cancelled and drops its slot. Runs inside the
/// caller's transaction.
fn release_time(
    conn: &Connection,
    mut appointment: Appointment,
    cancelled_by: CancelledBy,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    if !appointment.request.status.holds_time() {
        return Err(AppError::invalid(format!(
            "appointment is already {}",
            appointment.request.status.as_str()
        )));
    }
    let id = appointment.request.id.clone();
    queries::update_request_status(conn, &id, AppointmentStatus::Cancelled, Some(cancelled_by), &now)?;
    queries::delete_slot_for_request(conn, &id)?;

    appointment.request.status = AppointmentStatus::Cancelled;
    appointment.request.cancelled_by = Some(cancelled_by);
    appointment.request.updated_at = now;
    appointment.slot = None;
    Ok(appointment)
}

/// Digits only, so `+1 (555) 000-1111` and `+15550001111` compare equal.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn starts_at(appointment: &Appointment) -> Result<NaiveDateTime, AppError> {
    let day = parse_date(&appointment.request.date)?;
    let minutes = parse_time_to_minutes(appointment.start_time())?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::invalid(format!("bad date {}", appointment.request.date)))?;
    Ok(midnight + Duration::minutes(minutes as i64))
}

/// Customer self-service cancellation, verified by the phone on file. The
/// phone and window checks read the row inside the same transaction that
/// cancels it.
pub fn cancel_by_customer(
    conn: &mut Connection,
    id: &str,
    customer_phone: &str,
    window_hours: i64,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let appointment = get_appointment(&tx, id)?;

    let given = normalize_phone(customer_phone);
    if given.is_empty() || given != normalize_phone(&appointment.request.customer_phone) {
        return Err(AppError::not_found(format!("appointment {id}")));
    }

    if appointment.request.status.holds_time() {
        let start = starts_at(&appointment)?;
        if start - now < Duration::hours(window_hours) {
            return Err(AppError::invalid(format!(
                "appointments can only be cancelled up to {window_hours} hours in advance"
            )));
        }
    }

    let appointment = release_time(&tx, appointment, CancelledBy::Customer, now)?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, cancelled_by = "customer", "appointment cancelled");
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Barber, WorkingHours};
    use crate::services::availability::get_availability;
    use crate::services::clock::overlaps;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    // 2025-06-16 is a Monday
    const MONDAY: &str = "2025-06-16";

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_barber(
            &conn,
            &Barber {
                id: "b1".to_string(),
                name: "Marco".to_string(),
                phone: None,
                api_token: "tok".to_string(),
                is_active: true,
            },
        )
        .unwrap();
        queries::upsert_working_hours(
            &conn,
            &WorkingHours {
                barber_id: "b1".to_string(),
                weekday: 1,
                is_working: true,
                start_time: "09:00".to_string(),
                end_time: "12:00".to_string(),
            },
        )
        .unwrap();
        conn
    }

    fn booking(start: &str) -> NewBooking {
        NewBooking {
            barber_id: "b1".to_string(),
            date: MONDAY.to_string(),
            start_time: start.to_string(),
            end_time: None,
            customer_name: "Jamie".to_string(),
            customer_phone: "+15550001111".to_string(),
            customer_email: None,
            notes: None,
        }
    }

    fn before() -> NaiveDateTime {
        dt("2025-06-10 09:00")
    }

    #[test]
    fn test_customer_booking_is_pending() {
        let mut conn = setup();
        let appt = create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap();
        assert_eq!(appt.request.status, AppointmentStatus::Pending);
        assert!(appt.slot.is_none());
        assert_eq!(appt.request.requested_end_time, None);
    }

    #[test]
    fn test_same_slot_twice_conflicts() {
        let mut conn = setup();
        create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap();
        let err = create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        let count = queries::list_appointments(&conn, &queries::AppointmentFilter { limit: 10, ..Default::default() })
            .unwrap()
            .len();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_staff_booking_reserves_slot_and_blocks_overlap() {
        let mut conn = setup();
        let mut staff = booking("10:00");
        staff.end_time = Some("11:00".to_string());
        let appt = create_booking(&mut conn, &staff, BookingOrigin::Staff, before()).unwrap();
        assert_eq!(appt.request.status, AppointmentStatus::Approved);
        assert_eq!(appt.slot.as_ref().unwrap().end_time, "11:00");

        let err = create_booking(&mut conn, &booking("10:30"), BookingOrigin::Customer, before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));
        // Back-to-back is fine.
        create_booking(&mut conn, &booking("11:00"), BookingOrigin::Customer, before()).unwrap();
    }

    #[test]
    fn test_customer_must_pick_offered_slot() {
        let mut conn = setup();
        for start in ["08:30", "12:00", "09:15"] {
            let err = create_booking(&mut conn, &booking(start), BookingOrigin::Customer, before()).unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "{start}");
        }
        // Tuesday: no hours
        let mut tuesday = booking("10:00");
        tuesday.date = "2025-06-17".to_string();
        assert!(matches!(
            create_booking(&mut conn, &tuesday, BookingOrigin::Customer, before()),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_same_day_lead_time_enforced_at_write() {
        let mut conn = setup();
        let now = dt("2025-06-16 08:10");
        let err = create_booking(&mut conn, &booking("09:30"), BookingOrigin::Customer, now).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, now).unwrap();
    }

    #[test]
    fn test_invalid_inputs() {
        let mut conn = setup();
        let mut bad = booking("10:00");
        bad.date = "not-a-date".to_string();
        assert!(matches!(
            create_booking(&mut conn, &bad, BookingOrigin::Customer, before()),
            Err(AppError::InvalidArgument(_))
        ));

        assert!(matches!(
            create_booking(&mut conn, &booking("10:99"), BookingOrigin::Customer, before()),
            Err(AppError::InvalidFormat(_))
        ));

        let mut nameless = booking("10:00");
        nameless.customer_name = "  ".to_string();
        assert!(matches!(
            create_booking(&mut conn, &nameless, BookingOrigin::Customer, before()),
            Err(AppError::InvalidArgument(_))
        ));

        let mut ghost = booking("10:00");
        ghost.barber_id = "ghost".to_string();
        assert!(matches!(
            create_booking(&mut conn, &ghost, BookingOrigin::Staff, before()),
            Err(AppError::NotFound(_))
        ));

        let mut backwards = booking("10:00");
        backwards.end_time = Some("09:30".to_string());
        assert!(matches!(
            create_booking(&mut conn, &backwards, BookingOrigin::Staff, before()),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_approve_reserves_adjusted_time() {
        let mut conn = setup();
        let appt = create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap();
        let approved = approve(&mut conn, &appt.request.id, Some("10:30"), Some("11:15"), before()).unwrap();
        assert_eq!(approved.request.status, AppointmentStatus::Approved);
        let slot = approved.slot.unwrap();
        assert_eq!((slot.start_time.as_str(), slot.end_time.as_str()), ("10:30", "11:15"));

        // The original 10:00 is free again; 11:00 overlaps the adjusted block.
        let slots = get_availability(&conn, "b1", MONDAY, before()).unwrap();
        let taken: Vec<&str> = slots.iter().filter(|s| !s.is_available).map(|s| s.start_time.as_str()).collect();
        assert_eq!(taken, vec!["10:30", "11:00"]);

        assert!(matches!(
            approve(&mut conn, &appt.request.id, None, None, before()),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_approve_conflicting_adjustment_rejected() {
        let mut conn = setup();
        let mut staff = booking("11:00");
        staff.end_time = Some("12:00".to_string());
        create_booking(&mut conn, &staff, BookingOrigin::Staff, before()).unwrap();

        let appt = create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap();
        let err = approve(&mut conn, &appt.request.id, Some("10:30"), Some("11:30"), before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        let still = get_appointment(&conn, &appt.request.id).unwrap();
        assert_eq!(still.request.status, AppointmentStatus::Pending);
        assert!(still.slot.is_none());
    }

    #[test]
    fn test_reject_and_cancel_transitions() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &booking("09:00"), BookingOrigin::Customer, before()).unwrap();
        reject(&mut conn, &a.request.id, before()).unwrap();
        assert!(matches!(
            cancel(&mut conn, &a.request.id, CancelledBy::Admin, before()),
            Err(AppError::InvalidArgument(_))
        ));

        let b = create_booking(&mut conn, &booking("09:30"), BookingOrigin::Staff, before()).unwrap();
        let cancelled = cancel(&mut conn, &b.request.id, CancelledBy::Barber, before()).unwrap();
        assert_eq!(cancelled.request.cancelled_by, Some(CancelledBy::Barber));
        assert!(get_appointment(&conn, &b.request.id).unwrap().slot.is_none());

        // Released time can be booked again.
        create_booking(&mut conn, &booking("09:30"), BookingOrigin::Customer, before()).unwrap();
        assert!(matches!(reject(&mut conn, "missing", before()), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_customer_cancellation_window() {
        let mut conn = setup();
        let appt = create_booking(&mut conn, &booking("11:00"), BookingOrigin::Customer, before()).unwrap();
        let id = appt.request.id;

        assert!(matches!(
            cancel_by_customer(&mut conn, &id, "+15550009999", 2, before()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            cancel_by_customer(&mut conn, &id, "+1 555 000 1111", 2, dt("2025-06-16 09:30")),
            Err(AppError::InvalidArgument(_))
        ));

        let cancelled = cancel_by_customer(&mut conn, &id, "+1 (555) 000-1111", 2, dt("2025-06-16 08:59")).unwrap();
        assert_eq!(cancelled.request.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.request.cancelled_by, Some(CancelledBy::Customer));
    }

    #[test]
    fn test_customer_cancel_checks_run_in_one_transaction() {
        let mut conn = setup();
        let appt = create_booking(&mut conn, &booking("11:00"), BookingOrigin::Customer, before()).unwrap();
        let id = appt.request.id;

        // Failed checks roll back cleanly and leave the row untouched.
        assert!(matches!(
            cancel_by_customer(&mut conn, &id, "+15550009999", 2, before()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            cancel_by_customer(&mut conn, &id, "+15550001111", 2, dt("2025-06-16 10:00")),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(conn.is_autocommit());
        assert_eq!(get_appointment(&conn, &id).unwrap().request.status, AppointmentStatus::Pending);

        cancel_by_customer(&mut conn, &id, "+15550001111", 2, before()).unwrap();
        assert!(matches!(
            cancel_by_customer(&mut conn, &id, "+15550001111", 2, before()),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(conn.is_autocommit());
    }

    fn assert_disjoint(conn: &Connection) {
        let committed = load_committed(conn, "b1", MONDAY).unwrap();
        for (i, a) in committed.iter().enumerate() {
            for b in &committed[i + 1..] {
                assert!(!overlaps(a.start, a.end, b.start, b.end), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_pending_requests_cannot_overlap() {
        let mut conn = setup();
        let mut long = booking("10:00");
        long.end_time = Some("11:00".to_string());
        create_booking(&mut conn, &long, BookingOrigin::Customer, before()).unwrap();

        // Starts inside the pending hour.
        let err = create_booking(&mut conn, &booking("10:30"), BookingOrigin::Customer, before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        // Staff block straddling it.
        let mut staff = booking("10:15");
        staff.end_time = Some("10:45".to_string());
        let err = create_booking(&mut conn, &staff, BookingOrigin::Staff, before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        // The listing still only hides the exact start.
        let slots = get_availability(&conn, "b1", MONDAY, before()).unwrap();
        let taken: Vec<&str> = slots.iter().filter(|s| !s.is_available).map(|s| s.start_time.as_str()).collect();
        assert_eq!(taken, vec!["10:00"]);

        create_booking(&mut conn, &booking("11:00"), BookingOrigin::Customer, before()).unwrap();
        assert_disjoint(&conn);
    }

    #[test]
    fn test_approve_cannot_cover_another_pending_request() {
        let mut conn = setup();
        let first = create_booking(&mut conn, &booking("10:00"), BookingOrigin::Customer, before()).unwrap();
        create_booking(&mut conn, &booking("10:30"), BookingOrigin::Customer, before()).unwrap();

        let err = approve(&mut conn, &first.request.id, Some("10:15"), Some("10:45"), before()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));
        assert_eq!(
            get_appointment(&conn, &first.request.id).unwrap().request.status,
            AppointmentStatus::Pending
        );

        approve(&mut conn, &first.request.id, None, None, before()).unwrap();
        assert_disjoint(&conn);
    }

    #[test]
    fn test_random_booking_attempts_never_overlap() {
        let mut conn = setup();
        // Deterministic pseudo-random sequence covering starts, lengths and origins.
        let mut seed: u32 = 0x2545_F491;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        for _ in 0..300 {
            let staff = next() % 2 == 0;
            // Staff may pick any quarter hour; customers stay on the slot grid.
            let start = if staff {
                9 * 60 + (next() % 12) as i32 * 15
            } else {
                9 * 60 + (next() % 6) as i32 * 30
            };
            let length = 15 * (1 + (next() % 6) as i32);
            let mut attempt = booking(&minutes_to_time(start).unwrap());
            if staff || next() % 2 == 0 {
                attempt.end_time = Some(minutes_to_time(start + length).unwrap());
            }
            let origin = if staff { BookingOrigin::Staff } else { BookingOrigin::Customer };
            let _ = create_booking(&mut conn, &attempt, origin, before());

            if next() % 4 == 0 {
                let pending = queries::list_appointments(
                    &conn,
                    &queries::AppointmentFilter {
                        status: Some(AppointmentStatus::Pending),
                        limit: 1,
                        ..Default::default()
                    },
                )
                .unwrap();
                if let Some(p) = pending.first() {
                    let shift = (next() % 3) as i32 * 15;
                    let adjusted = parse_time_to_minutes(p.start_time()).unwrap() + shift;
                    let adjusted = minutes_to_time(adjusted).unwrap();
                    let _ = approve(&mut conn, &p.request.id, Some(&adjusted), None, before());
                }
            }

            if next() % 8 == 0 {
                let live = queries::list_appointments(
                    &conn,
                    &queries::AppointmentFilter { limit: 1, ..Default::default() },
                )
                .unwrap();
                if let Some(a) = live.first() {
                    let _ = cancel(&mut conn, &a.request.id, CancelledBy::Admin, before());
                }
            }

            assert_disjoint(&conn);
        }
    }
}
