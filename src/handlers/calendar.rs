use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::AppointmentStatus;
use crate::services::booking;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /calendar/:id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    // Strip .ics suffix if present
    let appointment_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (appointment, barber_name) = {
        let db = state.conn()?;
        let appointment = booking::get_appointment(&db, appointment_id)?;
        let barber_name = queries::get_barber(&db, &appointment.request.barber_id)?
            .map(|b| b.name)
            .unwrap_or_else(|| "your barber".to_string());
        (appointment, barber_name)
    };

    // Only confirmed visits go on a calendar.
    if appointment.request.status != AppointmentStatus::Approved {
        return Err(AppError::not_found(format!("appointment {appointment_id}")));
    }

    let ics = generate_ics(&appointment, &state.settings().shop_name, &barber_name)?;
    let filename = format!("appointment-{appointment_id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
