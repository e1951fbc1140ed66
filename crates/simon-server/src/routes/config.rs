use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/config: the effective configuration plus validation findings.
///
/// Only the name of the API key variable is part of the config, never the
/// key itself.
pub async fn get_config(State(app): State<AppState>) -> Json<serde_json::Value> {
    let warnings = app.config.validate();
    Json(serde_json::json!({
        "config": &*app.config,
        "warnings": warnings,
    }))
}
