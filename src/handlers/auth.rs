use axum::extract::State;
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::services::sessions::SessionService;
use crate::services::users::UserService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let sessions = SessionService::new(state.pool.clone(), state.config.clone());
    let tokens = sessions.login(&body.username, &body.password).await?;
    Ok(Json(json!({
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "token_type": "bearer"
    })))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let sessions = SessionService::new(state.pool.clone(), state.config.clone());
    let tokens = sessions.refresh(&body.refresh_token).await?;
    Ok(Json(json!({
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "token_type": "bearer"
    })))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let user = users.register(&body.username, &body.password).await?;
    Ok(Json(json!(user)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let sessions = SessionService::new(state.pool.clone(), state.config.clone());
    sessions.logout(&body.refresh_token).await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/auth/whoami
pub async fn whoami(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Value> {
    Json(json!(user))
}
