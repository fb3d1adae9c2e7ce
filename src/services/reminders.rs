//! Periodic SMS reminders ahead of approved appointments.
//!
//! Each (appointment, threshold) pair is sent at most once: the `sms_logs`
//! row written under `"<TAG>_<appointment id>"` is the claim, and it is
//! written even when the provider rejects the message.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::time::interval;
use uuid::Uuid;

use crate::db::queries::{self, NewJobLog};
use crate::errors::AppError;
use crate::models::Appointment;
use crate::services::booking::{normalize_phone, starts_at};
use crate::services::notify;
use crate::state::AppState;

pub const JOB_NAME: &str = "appointment_reminders";
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 5;
const LOCK_KEY: &str = "reminder_sweep";
const LOCK_TTL_SECONDS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderThreshold {
    TwoHours,
    OneHour,
}

impl ReminderThreshold {
    pub const ALL: [ReminderThreshold; 2] = [ReminderThreshold::TwoHours, ReminderThreshold::OneHour];

    pub fn tag(&self) -> &'static str {
        match self {
            ReminderThreshold::TwoHours => "REMINDER_2H",
            ReminderThreshold::OneHour => "REMINDER_1H",
        }
    }

    pub fn lead(&self) -> Duration {
        match self {
            ReminderThreshold::TwoHours => Duration::hours(2),
            ReminderThreshold::OneHour => Duration::hours(1),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReminderThreshold::TwoHours => "2 hours",
            ReminderThreshold::OneHour => "1 hour",
        }
    }

    /// Whether `now` is within `tolerance` either side of `starts - lead`.
    pub fn is_due(&self, starts: NaiveDateTime, now: NaiveDateTime, tolerance: Duration) -> bool {
        let target = starts - self.lead();
        (now - target).num_seconds().abs() <= tolerance.num_seconds()
    }

    pub fn event_key(&self, appointment_id: &str) -> String {
        format!("{}_{appointment_id}", self.tag())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepSummary {
    pub sent_2h: i64,
    pub sent_1h: i64,
    pub skipped_2h: i64,
    pub skipped_1h: i64,
    pub errors: i64,
    pub total_approved: i64,
}

impl SweepSummary {
    fn record_sent(&mut self, threshold: ReminderThreshold) {
        match threshold {
            ReminderThreshold::TwoHours => self.sent_2h += 1,
            ReminderThreshold::OneHour => self.sent_1h += 1,
        }
    }

    fn record_skipped(&mut self, threshold: ReminderThreshold) {
        match threshold {
            ReminderThreshold::TwoHours => self.skipped_2h += 1,
            ReminderThreshold::OneHour => self.skipped_1h += 1,
        }
    }
}

pub fn reminder_message(appointment: &Appointment, threshold: ReminderThreshold, shop_name: &str) -> String {
    format!(
        "Hi {}, a reminder that your appointment at {shop_name} starts in {} ({} at {}).",
        appointment.request.customer_name,
        threshold.label(),
        appointment.request.date,
        appointment.start_time(),
    )
}

/// One full sweep, guarded by a DB lease so overlapping triggers do not
/// race each other. Always leaves a `system_job_logs` row behind.
pub async fn run_reminder_sweep(state: &AppState) -> Result<SweepSummary, AppError> {
    let started_at = state.clock.now();
    let owner = Uuid::new_v4().to_string();

    let acquired = {
        let db = state.conn()?;
        queries::try_acquire_lock(&db, LOCK_KEY, &owner, &started_at, LOCK_TTL_SECONDS)?
    };
    if !acquired {
        tracing::info!("reminder sweep already running, skipping this trigger");
        return Err(AppError::JobAlreadyRunning(JOB_NAME.to_string()));
    }

    let result = sweep(state, started_at).await;
    let finished_at = state.clock.now();

    let (status, summary, error) = match &result {
        Ok(summary) => ("completed", summary.clone(), None),
        Err(e) => ("failed", SweepSummary::default(), Some(e.to_string())),
    };

    let log = NewJobLog {
        job_name: JOB_NAME,
        status,
        reminders_2h_sent: summary.sent_2h,
        reminders_1h_sent: summary.sent_1h,
        skipped: summary.skipped_2h + summary.skipped_1h,
        errors: summary.errors,
        total_approved: summary.total_approved,
        error: error.as_deref(),
        started_at,
        finished_at,
    };
    finish_run(state, &log, &owner);

    match &result {
        Ok(summary) => tracing::info!(
            sent_2h = summary.sent_2h,
            sent_1h = summary.sent_1h,
            skipped = summary.skipped_2h + summary.skipped_1h,
            errors = summary.errors,
            total_approved = summary.total_approved,
            "reminder sweep finished"
        ),
        Err(e) => tracing::error!(error = %e, "reminder sweep failed"),
    }

    result
}

/// Persists the run's job log and gives the lease back. Runs on every exit
/// path of a sweep, including a poisoned connection mutex.
fn finish_run(state: &AppState, log: &NewJobLog, owner: &str) {
    let db = state.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Err(e) = queries::insert_job_log(&db, log) {
        tracing::error!(error = %e, "failed to persist reminder job log");
    }
    if let Err(e) = queries::release_lock(&db, LOCK_KEY, owner) {
        tracing::error!(error = %e, "failed to release reminder sweep lock");
    }
}

/// Runs the sweep every `interval_secs` for the life of the process. A tick
/// that lands while an earlier sweep still holds the lease is skipped.
pub fn spawn_reminder_loop(state: Arc<AppState>, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("reminder loop disabled");
        return;
    }
    tracing::info!(interval_secs = interval_secs, "starting reminder loop");

    tokio::spawn(async move {
        let mut tick = interval(std::time::Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            match run_reminder_sweep(&state).await {
                Ok(_) | Err(AppError::JobAlreadyRunning(_)) => {}
                Err(e) => tracing::error!(error = %e, "reminder loop iteration failed"),
            }
        }
    });
}

async fn sweep(state: &AppState, now: NaiveDateTime) -> Result<SweepSummary, AppError> {
    let appointments = {
        let db = state.conn()?;
        queries::get_approved_appointments(&db)?
    };
    let settings = state.settings();
    let house_phone = normalize_phone(&settings.admin_phone);
    let tolerance = Duration::minutes(state.config.reminder_tolerance_minutes);

    let mut summary = SweepSummary {
        total_approved: appointments.len() as i64,
        ..Default::default()
    };

    for appointment in &appointments {
        let id = appointment.request.id.as_str();

        let starts = match starts_at(appointment) {
            Ok(starts) => starts,
            Err(e) => {
                tracing::warn!(appointment_id = %id, error = %e, "unreadable appointment time");
                summary.errors += 1;
                continue;
            }
        };
        if starts < now {
            continue;
        }
        if !house_phone.is_empty() && normalize_phone(&appointment.request.customer_phone) == house_phone {
            continue;
        }

        for threshold in ReminderThreshold::ALL {
            if !threshold.is_due(starts, now, tolerance) {
                continue;
            }
            let event = threshold.event_key(id);

            let already_sent = {
                let db = state.conn()?;
                queries::sms_event_exists(&db, &event)
            };
            match already_sent {
                Ok(true) => {
                    summary.record_skipped(threshold);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(appointment_id = %id, error = %e, "failed to check reminder log");
                    summary.errors += 1;
                    continue;
                }
            }

            let body = reminder_message(appointment, threshold, &settings.shop_name);
            match notify::send_sms(state, &appointment.request.customer_phone, &body, &event).await {
                Ok(()) => summary.record_sent(threshold),
                Err(e) => {
                    tracing::warn!(appointment_id = %id, event = %event, error = %e, "reminder not delivered");
                    summary.errors += 1;
                }
            }
        }
    }

    Ok(summary)
}
