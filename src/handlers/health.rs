use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::db;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match db::health_check(&state.pool).await {
        Ok(()) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            Err(ApiError::service_unavailable("database unreachable"))
        }
    }
}
