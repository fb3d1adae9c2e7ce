use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::TIMESTAMP_FORMAT;
use crate::models::{
    Appointment, AppointmentRequest, AppointmentSlot, AppointmentStatus, Barber, CancelledBy,
    SmsLog, SmsStatus, SystemJobLog, WorkingHours,
};

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("bad timestamp {s:?}: {e}"))
}

// ── Barbers ──

pub fn create_barber(conn: &Connection, barber: &Barber) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO barbers (id, name, phone, api_token, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            barber.id,
            barber.name,
            barber.phone,
            barber.api_token,
            barber.is_active as i32,
        ],
    )?;
    Ok(())
}

fn parse_barber_row(row: &rusqlite::Row) -> rusqlite::Result<Barber> {
    Ok(Barber {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        api_token: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
    })
}

pub fn get_barber(conn: &Connection, id: &str) -> anyhow::Result<Option<Barber>> {
    let barber = conn
        .query_row(
            "SELECT id, name, phone, api_token, is_active FROM barbers WHERE id = ?1",
            params![id],
            parse_barber_row,
        )
        .optional()?;
    Ok(barber)
}

pub fn get_barber_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<Barber>> {
    let barber = conn
        .query_row(
            "SELECT id, name, phone, api_token, is_active FROM barbers
             WHERE api_token = ?1 AND is_active = 1",
            params![token],
            parse_barber_row,
        )
        .optional()?;
    Ok(barber)
}

pub fn list_barbers(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Barber>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, api_token, is_active FROM barbers
         WHERE (?1 = 0 OR is_active = 1) ORDER BY name ASC",
    )?;
    let rows = stmt.query_map(params![active_only as i32], parse_barber_row)?;

    let mut barbers = vec![];
    for row in rows {
        barbers.push(row?);
    }
    Ok(barbers)
}

// ── Working Hours ──

pub fn upsert_working_hours(conn: &Connection, hours: &WorkingHours) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO working_hours (barber_id, weekday, is_working, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(barber_id, weekday) DO UPDATE SET
           is_working = excluded.is_working,
           start_time = excluded.start_time,
           end_time = excluded.end_time",
        params![
            hours.barber_id,
            hours.weekday,
            hours.is_working as i32,
            hours.start_time,
            hours.end_time,
        ],
    )?;
    Ok(())
}

fn parse_hours_row(row: &rusqlite::Row) -> rusqlite::Result<WorkingHours> {
    Ok(WorkingHours {
        barber_id: row.get(0)?,
        weekday: row.get(1)?,
        is_working: row.get::<_, i32>(2)? != 0,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
    })
}

pub fn get_working_hours(
    conn: &Connection,
    barber_id: &str,
    weekday: u8,
) -> anyhow::Result<Option<WorkingHours>> {
    let hours = conn
        .query_row(
            "SELECT barber_id, weekday, is_working, start_time, end_time
             FROM working_hours WHERE barber_id = ?1 AND weekday = ?2",
            params![barber_id, weekday],
            parse_hours_row,
        )
        .optional()?;
    Ok(hours)
}

pub fn list_working_hours(conn: &Connection, barber_id: &str) -> anyhow::Result<Vec<WorkingHours>> {
    let mut stmt = conn.prepare(
        "SELECT barber_id, weekday, is_working, start_time, end_time
         FROM working_hours WHERE barber_id = ?1 ORDER BY weekday ASC",
    )?;
    let rows = stmt.query_map(params![barber_id], parse_hours_row)?;

    let mut hours = vec![];
    for row in rows {
        hours.push(row?);
    }
    Ok(hours)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "r.id, r.barber_id, r.customer_name, r.customer_phone, r.customer_email, \
     r.date, r.requested_start_time, r.requested_end_time, r.status, r.cancelled_by, r.notes, \
     r.created_at, r.updated_at, s.id, s.start_time, s.end_time";

pub fn insert_request(conn: &Connection, request: &AppointmentRequest) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointment_requests (id, barber_id, customer_name, customer_phone, customer_email,
             date, requested_start_time, requested_end_time, status, cancelled_by, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            request.id,
            request.barber_id,
            request.customer_name,
            request.customer_phone,
            request.customer_email,
            request.date,
            request.requested_start_time,
            request.requested_end_time,
            request.status.as_str(),
            request.cancelled_by.map(|c| c.as_str()),
            request.notes,
            fmt_ts(&request.created_at),
            fmt_ts(&request.updated_at),
        ],
    )?;
    Ok(())
}

pub fn insert_slot(conn: &Connection, slot: &AppointmentSlot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointment_slots (id, request_id, barber_id, date, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            slot.id,
            slot.request_id,
            slot.barber_id,
            slot.date,
            slot.start_time,
            slot.end_time,
        ],
    )?;
    Ok(())
}

pub fn delete_slot_for_request(conn: &Connection, request_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointment_slots WHERE request_id = ?1",
        params![request_id],
    )?;
    Ok(count > 0)
}

pub fn update_request_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    cancelled_by: Option<CancelledBy>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointment_requests SET status = ?1, cancelled_by = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), cancelled_by.map(|c| c.as_str()), fmt_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointment_requests r
         LEFT JOIN appointment_slots s ON s.request_id = r.id
         WHERE r.id = ?1"
    );
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)))
        .optional()?;

    result.transpose()
}

#[derive(Debug, Default)]
pub struct AppointmentFilter<'a> {
    pub barber_id: Option<&'a str>,
    pub date: Option<&'a str>,
    pub status: Option<AppointmentStatus>,
    pub limit: i64,
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> anyhow::Result<Vec<Appointment>> {
    let mut clauses: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(barber_id) = filter.barber_id {
        params_vec.push(Box::new(barber_id.to_string()));
        clauses.push("r.barber_id = ?");
    }
    if let Some(date) = filter.date {
        params_vec.push(Box::new(date.to_string()));
        clauses.push("r.date = ?");
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        clauses.push("r.status = ?");
    }
    params_vec.push(Box::new(filter.limit));

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointment_requests r
         LEFT JOIN appointment_slots s ON s.request_id = r.id
         {where_sql}
         ORDER BY r.date ASC, COALESCE(s.start_time, r.requested_start_time) ASC
         LIMIT ?"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Every approved appointment with a start time, for the reminder sweep.
pub fn get_approved_appointments(conn: &Connection) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointment_requests r
         LEFT JOIN appointment_slots s ON s.request_id = r.id
         WHERE r.status = 'approved' AND r.requested_start_time IS NOT NULL
         ORDER BY r.date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Reserved blocks `(request_id, start, end)` for one barber and day.
pub fn get_committed_slots(
    conn: &Connection,
    barber_id: &str,
    date: &str,
) -> anyhow::Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT s.request_id, s.start_time, s.end_time
         FROM appointment_slots s
         JOIN appointment_requests r ON r.id = s.request_id
         WHERE s.barber_id = ?1 AND s.date = ?2 AND r.status IN ('pending', 'approved')
         ORDER BY s.start_time ASC",
    )?;
    let rows = stmt.query_map(params![barber_id, date], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

/// Live requests `(id, start, end?)` that have no reserved block yet.
pub fn get_unslotted_requests(
    conn: &Connection,
    barber_id: &str,
    date: &str,
) -> anyhow::Result<Vec<(String, String, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.requested_start_time, r.requested_end_time
         FROM appointment_requests r
         WHERE r.barber_id = ?1 AND r.date = ?2 AND r.status IN ('pending', 'approved')
           AND NOT EXISTS (SELECT 1 FROM appointment_slots s WHERE s.request_id = r.id)
         ORDER BY r.requested_start_time ASC",
    )?;
    let rows = stmt.query_map(params![barber_id, date], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut requests = vec![];
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let barber_id: String = row.get(1)?;
    let date: String = row.get(5)?;
    let status_str: String = row.get(8)?;
    let cancelled_by: Option<String> = row.get(9)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;
    let slot_id: Option<String> = row.get(13)?;

    let status = AppointmentStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown appointment status {status_str:?} on {id}"))?;

    let slot = match slot_id {
        Some(slot_id) => Some(AppointmentSlot {
            id: slot_id,
            request_id: id.clone(),
            barber_id: barber_id.clone(),
            date: date.clone(),
            start_time: row.get(14)?,
            end_time: row.get(15)?,
        }),
        None => None,
    };

    let request = AppointmentRequest {
        id,
        barber_id,
        customer_name: row.get(2)?,
        customer_phone: row.get(3)?,
        customer_email: row.get(4)?,
        date,
        requested_start_time: row.get(6)?,
        requested_end_time: row.get(7)?,
        status,
        cancelled_by: cancelled_by.as_deref().and_then(CancelledBy::parse),
        notes: row.get(10)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    };

    Ok(Appointment { request, slot })
}

// ── SMS Log ──

pub fn insert_sms_log(
    conn: &Connection,
    to: &str,
    message: &str,
    event: &str,
    status: SmsStatus,
    error: Option<&str>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO sms_logs (to_phone, message, event, status, error) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![to, message, event, status.as_str(), error],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn sms_event_exists(conn: &Connection, event: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sms_logs WHERE event = ?1",
        params![event],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_sms_logs(conn: &Connection, limit: i64) -> anyhow::Result<Vec<SmsLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, to_phone, message, event, status, error, created_at
         FROM sms_logs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        let status: String = row.get(4)?;
        Ok(SmsLog {
            id: row.get(0)?,
            to: row.get(1)?,
            message: row.get(2)?,
            event: row.get(3)?,
            status: SmsStatus::parse(&status),
            error: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut logs = vec![];
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

// ── System Job Log ──

pub struct NewJobLog<'a> {
    pub job_name: &'a str,
    pub status: &'a str,
    pub reminders_2h_sent: i64,
    pub reminders_1h_sent: i64,
    pub skipped: i64,
    pub errors: i64,
    pub total_approved: i64,
    pub error: Option<&'a str>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

pub fn insert_job_log(conn: &Connection, log: &NewJobLog) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO system_job_logs (job_name, status, reminders_2h_sent, reminders_1h_sent,
             skipped, errors, total_approved, error, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            log.job_name,
            log.status,
            log.reminders_2h_sent,
            log.reminders_1h_sent,
            log.skipped,
            log.errors,
            log.total_approved,
            log.error,
            fmt_ts(&log.started_at),
            fmt_ts(&log.finished_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_job_logs(conn: &Connection, limit: i64) -> anyhow::Result<Vec<SystemJobLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_name, status, reminders_2h_sent, reminders_1h_sent, skipped, errors,
                total_approved, error, started_at, finished_at
         FROM system_job_logs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(SystemJobLog {
            id: row.get(0)?,
            job_name: row.get(1)?,
            status: row.get(2)?,
            reminders_2h_sent: row.get(3)?,
            reminders_1h_sent: row.get(4)?,
            skipped: row.get(5)?,
            errors: row.get(6)?,
            total_approved: row.get(7)?,
            error: row.get(8)?,
            started_at: row.get(9)?,
            finished_at: row.get(10)?,
        })
    })?;

    let mut logs = vec![];
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

// ── Audit Log ──

pub fn insert_audit_log(
    conn: &Connection,
    actor: &str,
    action: &str,
    entity_id: Option<&str>,
    details: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (actor, action, entity_id, details) VALUES (?1, ?2, ?3, ?4)",
        params![actor, action, entity_id, details],
    )?;
    Ok(())
}

pub fn count_audit_logs(conn: &Connection, action: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM audit_logs WHERE action = ?1",
        params![action],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Settings ──

pub fn get_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

// ── Job Locks ──

/// Takes the lease on `key` unless another owner holds an unexpired one.
/// Timestamps compare as strings, which is sound for the fixed format.
pub fn try_acquire_lock(
    conn: &Connection,
    key: &str,
    owner: &str,
    now: &NaiveDateTime,
    ttl_seconds: i64,
) -> anyhow::Result<bool> {
    let expires_at = *now + chrono::Duration::seconds(ttl_seconds);
    let count = conn.execute(
        "INSERT INTO job_locks (key, owner, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key) DO UPDATE SET
           owner = excluded.owner,
           expires_at = excluded.expires_at,
           created_at = excluded.created_at
         WHERE job_locks.expires_at < ?4",
        params![key, owner, fmt_ts(&expires_at), fmt_ts(now)],
    )?;
    Ok(count > 0)
}

pub fn release_lock(conn: &Connection, key: &str, owner: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM job_locks WHERE key = ?1 AND owner = ?2",
        params![key, owner],
    )?;
    Ok(())
}
