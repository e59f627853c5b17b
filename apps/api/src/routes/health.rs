use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the local day the service evaluates deadlines in.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let now = state.clock.now();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "medtrack-api",
        "local_date": now.date_naive(),
        "utc_offset": now.offset().to_string(),
    }))
}
