use std::sync::Arc;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, SmsStatus};
use crate::state::AppState;

/// Sends one SMS and appends the outcome to `sms_logs` under `event`,
/// whether or not the provider accepted it. The DB lock is never held while
/// the provider call is in flight.
pub async fn send_sms(state: &AppState, to: &str, body: &str, event: &str) -> Result<(), AppError> {
    let message = format!("{}: {body}", state.settings().sms_sender);
    let outcome = state.messaging.send_message(to, &message).await;

    let (status, error) = match &outcome {
        Ok(sid) => {
            tracing::info!(to = %to, event = %event, sid = %sid, "sms sent");
            (SmsStatus::Success, None)
        }
        Err(e) => {
            tracing::warn!(to = %to, event = %event, error = %e, "sms send failed");
            (SmsStatus::Error, Some(format!("{e:#}")))
        }
    };

    {
        let db = state.conn()?;
        queries::insert_sms_log(&db, to, &message, event, status, error.as_deref())?;
    }

    match outcome {
        Ok(_) => Ok(()),
        Err(e) => Err(AppError::DeliveryFailure(format!("{e:#}"))),
    }
}

/// Fire-and-forget variant for side-effect notifications: failures are
/// logged, never returned.
pub async fn notify(state: &Arc<AppState>, to: &str, body: &str, event: &str) {
    if let Err(e) = send_sms(state, to, body, event).await {
        tracing::warn!(event = %event, error = %e, "notification not delivered");
    }
}

pub fn booking_received_message(appointment: &Appointment, shop_name: &str) -> String {
    format!(
        "Hi {}, we received your request for {} at {} with {shop_name}. We'll text you once it's confirmed.",
        appointment.request.customer_name,
        appointment.request.date,
        appointment.start_time(),
    )
}

pub fn booking_approved_message(appointment: &Appointment, shop_name: &str) -> String {
    format!(
        "Hi {}, your appointment at {shop_name} on {} at {} is confirmed. See you then!",
        appointment.request.customer_name,
        appointment.request.date,
        appointment.start_time(),
    )
}

pub fn booking_cancelled_message(appointment: &Appointment, shop_name: &str) -> String {
    format!(
        "Hi {}, your appointment at {shop_name} on {} at {} has been cancelled.",
        appointment.request.customer_name,
        appointment.request.date,
        appointment.start_time(),
    )
}
