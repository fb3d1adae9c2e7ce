use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Caller;
use crate::state::AppState;

/// Resolves the bearer token to a staff identity: the configured admin
/// token, or an active barber's API token.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("").trim();
    if token.is_empty() {
        return Err(AppError::Unauthenticated);
    }

    if token == state.config.admin_token {
        return Ok(Caller::admin());
    }

    let barber = {
        let db = state.conn()?;
        queries::get_barber_by_token(&db, token)?
    };
    match barber {
        Some(barber) => Ok(Caller::barber(&barber.id)),
        None => {
            tracing::warn!("rejected unknown bearer token");
            Err(AppError::Unauthenticated)
        }
    }
}
