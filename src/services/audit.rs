use crate::db::queries;
use crate::state::AppState;

/// Records an audit entry. Failures are logged and dropped; auditing never
/// fails the action it describes.
pub fn record(
    state: &AppState,
    actor: &str,
    action: &str,
    entity_id: Option<&str>,
    details: serde_json::Value,
) {
    let result = state.conn().map_err(anyhow::Error::from).and_then(|db| {
        queries::insert_audit_log(&db, actor, action, entity_id, &details.to_string())
    });

    if let Err(e) = result {
        tracing::error!(error = %e, action = %action, "failed to record audit entry");
    }
}
