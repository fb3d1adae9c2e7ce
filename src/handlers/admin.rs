use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::queries::{self, AppointmentFilter};
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{Appointment, AppointmentStatus, Barber, SmsLog, SystemJobLog, WorkingHours};
use crate::services::availability::parse_date;
use crate::services::booking::{self, BookingOrigin, NewBooking};
use crate::services::reminders::{self, SweepSummary};
use crate::services::{audit, notify};
use crate::state::AppState;

fn load_appointment(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    let db = state.conn()?;
    booking::get_appointment(&db, id)
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub barber_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let caller = authenticate(&state, &headers)?;

    let barber_id = match (caller.barber_scope(), query.barber_id.as_deref()) {
        (Some(own), Some(requested)) if own != requested => {
            return Err(AppError::Unauthorized(
                "barbers can only list their own appointments".to_string(),
            ));
        }
        (Some(own), _) => Some(own),
        (None, requested) => requested,
    };
    let status = match query.status.as_deref() {
        Some(s) => Some(
            AppointmentStatus::parse(s).ok_or_else(|| AppError::invalid(format!("unknown status {s:?}")))?,
        ),
        None => None,
    };
    if let Some(date) = query.date.as_deref() {
        parse_date(date)?;
    }

    let filter = AppointmentFilter {
        barber_id,
        date: query.date.as_deref(),
        status,
        limit: query.limit.unwrap_or(100).clamp(1, 500),
    };
    let appointments = {
        let db = state.conn()?;
        queries::list_appointments(&db, &filter)?
    };
    Ok(Json(appointments))
}

// POST /api/admin/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_can_access(&body.barber_id)?;

    let now = state.clock.now();
    let appointment = {
        let mut db = state.conn()?;
        booking::create_booking(&mut db, &body, BookingOrigin::Staff, now)?
    };

    audit::record(
        &state,
        &caller.user_id,
        "appointment.created",
        Some(&appointment.request.id),
        serde_json::json!({
            "barber_id": appointment.request.barber_id,
            "date": appointment.request.date,
            "start_time": appointment.start_time(),
        }),
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

// POST /api/admin/appointments/:id/approve
#[derive(Deserialize, Default)]
pub struct ApproveRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

pub async fn approve_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Appointment>, AppError> {
    let caller = authenticate(&state, &headers)?;
    let existing = load_appointment(&state, &id)?;
    caller.ensure_can_access(&existing.request.barber_id)?;

    let Json(body) = body.unwrap_or_default();
    let now = state.clock.now();
    let appointment = {
        let mut db = state.conn()?;
        booking::approve(
            &mut db,
            &id,
            body.start_time.as_deref(),
            body.end_time.as_deref(),
            now,
        )?
    };

    audit::record(
        &state,
        &caller.user_id,
        "appointment.approved",
        Some(&id),
        serde_json::json!({
            "start_time": appointment.start_time(),
            "end_time": appointment.end_time(),
        }),
    );

    let shop_name = state.settings().shop_name;
    notify::notify(
        &state,
        &appointment.request.customer_phone,
        &notify::booking_approved_message(&appointment, &shop_name),
        &format!("BOOKING_APPROVED_{id}"),
    )
    .await;

    Ok(Json(appointment))
}

// POST /api/admin/appointments/:id/reject
pub async fn reject_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let caller = authenticate(&state, &headers)?;
    let existing = load_appointment(&state, &id)?;
    caller.ensure_can_access(&existing.request.barber_id)?;

    let now = state.clock.now();
    let appointment = {
        let mut db = state.conn()?;
        booking::reject(&mut db, &id, now)?
    };

    audit::record(&state, &caller.user_id, "appointment.rejected", Some(&id), serde_json::json!({}));

    Ok(Json(appointment))
}

// POST /api/admin/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let caller = authenticate(&state, &headers)?;
    let existing = load_appointment(&state, &id)?;
    caller.ensure_can_access(&existing.request.barber_id)?;

    let now = state.clock.now();
    let appointment = {
        let mut db = state.conn()?;
        booking::cancel(&mut db, &id, caller.cancelled_by(), now)?
    };

    audit::record(
        &state,
        &caller.user_id,
        "appointment.cancelled",
        Some(&id),
        serde_json::json!({ "cancelled_by": caller.cancelled_by().as_str() }),
    );

    let shop_name = state.settings().shop_name;
    notify::notify(
        &state,
        &appointment.request.customer_phone,
        &notify::booking_cancelled_message(&existing, &shop_name),
        &format!("BOOKING_CANCELLED_{id}"),
    )
    .await;

    Ok(Json(appointment))
}

// POST /api/admin/barbers
#[derive(Deserialize)]
pub struct CreateBarberRequest {
    pub name: String,
    pub phone: Option<String>,
}

pub async fn create_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBarberRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("barber name is required"));
    }

    let barber = Barber {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: body.phone.filter(|p| !p.trim().is_empty()),
        api_token: Uuid::new_v4().simple().to_string(),
        is_active: true,
    };
    {
        let db = state.conn()?;
        queries::create_barber(&db, &barber)?;
    }

    audit::record(&state, &caller.user_id, "barber.created", Some(&barber.id), serde_json::json!({ "name": barber.name }));

    // The token is only ever shown here.
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": barber.id,
            "name": barber.name,
            "phone": barber.phone,
            "api_token": barber.api_token,
        })),
    ))
}

// GET /api/admin/barbers/:id/working-hours
pub async fn get_working_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(barber_id): Path<String>,
) -> Result<Json<Vec<WorkingHours>>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_can_access(&barber_id)?;

    let hours = {
        let db = state.conn()?;
        if queries::get_barber(&db, &barber_id)?.is_none() {
            return Err(AppError::not_found(format!("barber {barber_id}")));
        }
        queries::list_working_hours(&db, &barber_id)?
    };
    Ok(Json(hours))
}

// PUT /api/admin/barbers/:id/working-hours
#[derive(Deserialize)]
pub struct WorkingHoursEntry {
    pub weekday: u8,
    pub is_working: bool,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

pub async fn put_working_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(barber_id): Path<String>,
    Json(body): Json<Vec<WorkingHoursEntry>>,
) -> Result<Json<Vec<WorkingHours>>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_can_access(&barber_id)?;

    let entries: Vec<WorkingHours> = body
        .into_iter()
        .map(|e| WorkingHours {
            barber_id: barber_id.clone(),
            weekday: e.weekday,
            is_working: e.is_working,
            start_time: e.start_time,
            end_time: e.end_time,
        })
        .collect();
    for entry in &entries {
        entry.validate()?;
    }

    let hours = {
        let mut db = state.conn()?;
        if queries::get_barber(&db, &barber_id)?.is_none() {
            return Err(AppError::not_found(format!("barber {barber_id}")));
        }
        let tx = db.transaction()?;
        for entry in &entries {
            queries::upsert_working_hours(&tx, entry)?;
        }
        tx.commit()?;
        queries::list_working_hours(&db, &barber_id)?
    };

    audit::record(
        &state,
        &caller.user_id,
        "working_hours.updated",
        Some(&barber_id),
        serde_json::json!({ "days": entries.iter().map(|e| e.weekday).collect::<Vec<_>>() }),
    );

    Ok(Json(hours))
}

// POST /api/admin/reminders/run
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepSummary>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;

    let summary = reminders::run_reminder_sweep(&state).await?;
    Ok(Json(summary))
}

// GET /api/admin/jobs
#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn get_job_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<SystemJobLog>>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;

    let logs = {
        let db = state.conn()?;
        queries::list_job_logs(&db, query.limit.unwrap_or(50).clamp(1, 500))?
    };
    Ok(Json(logs))
}

// GET /api/admin/sms-logs
pub async fn get_sms_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<SmsLog>>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;

    let logs = {
        let db = state.conn()?;
        queries::list_sms_logs(&db, query.limit.unwrap_or(50).clamp(1, 500))?
    };
    Ok(Json(logs))
}

// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Settings>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;
    Ok(Json(state.settings()))
}

// POST /api/admin/settings
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub shop_name: Option<String>,
    pub admin_phone: Option<String>,
    pub sms_sender: Option<String>,
    pub cancellation_window_hours: Option<i64>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<Settings>, AppError> {
    let caller = authenticate(&state, &headers)?;
    caller.ensure_admin()?;

    let mut settings = state.settings();
    if let Some(name) = body.shop_name {
        settings.shop_name = name.trim().to_string();
    }
    if let Some(phone) = body.admin_phone {
        settings.admin_phone = phone.trim().to_string();
    }
    if let Some(sender) = body.sms_sender {
        settings.sms_sender = sender.trim().to_string();
    }
    if let Some(hours) = body.cancellation_window_hours {
        settings.cancellation_window_hours = hours;
    }
    settings.validate()?;

    {
        let db = state.conn()?;
        settings.save(&db)?;
    }
    state.replace_settings(settings.clone());

    audit::record(&state, &caller.user_id, "settings.updated", None, serde_json::json!(settings));

    Ok(Json(settings))
}
