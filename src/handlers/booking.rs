use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Barber, TimeSlot};
use crate::services::booking::{self, BookingOrigin, NewBooking};
use crate::services::{audit, availability, notify};
use crate::state::AppState;

// GET /api/barbers
pub async fn list_barbers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Barber>>, AppError> {
    let barbers = {
        let db = state.conn()?;
        queries::list_barbers(&db, true)?
    };
    Ok(Json(barbers))
}

// GET /api/barbers/:id/availability?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(barber_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    let date = query
        .date
        .ok_or_else(|| AppError::invalid("date query parameter is required"))?;

    let now = state.clock.now();
    let slots = {
        let db = state.conn()?;
        availability::get_availability(&db, &barber_id, &date, now)?
    };
    Ok(Json(slots))
}

// POST /api/bookings
#[derive(Serialize)]
pub struct BookingCreated {
    success: bool,
    appointment_id: String,
    status: String,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingCreated>), AppError> {
    let now = state.clock.now();
    let appointment = {
        let mut db = state.conn()?;
        booking::create_booking(&mut db, &body, BookingOrigin::Customer, now)?
    };
    let id = appointment.request.id.clone();

    audit::record(
        &state,
        "customer",
        "booking.created",
        Some(&id),
        serde_json::json!({
            "barber_id": appointment.request.barber_id,
            "date": appointment.request.date,
            "start_time": appointment.request.requested_start_time,
        }),
    );

    let shop_name = state.settings().shop_name;
    notify::notify(
        &state,
        &appointment.request.customer_phone,
        &notify::booking_received_message(&appointment, &shop_name),
        &format!("BOOKING_RECEIVED_{id}"),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreated {
            success: true,
            appointment_id: id,
            status: appointment.request.status.as_str().to_string(),
        }),
    ))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CustomerCancelRequest {
    pub customer_phone: String,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CustomerCancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = state.clock.now();
    let window_hours = state.settings().cancellation_window_hours;
    let appointment = {
        let mut db = state.conn()?;
        booking::cancel_by_customer(&mut db, &id, &body.customer_phone, window_hours, now)?
    };

    audit::record(
        &state,
        "customer",
        "booking.cancelled",
        Some(&id),
        serde_json::json!({ "cancelled_by": "customer" }),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "status": appointment.request.status.as_str(),
    })))
}
