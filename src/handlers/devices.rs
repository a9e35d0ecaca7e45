use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::models::tenant::SYSTEM_TENANT_ID;
use crate::services::access::{AccessService, DeviceKey};
use crate::services::devices::{
    DeviceFilters, DeviceService, DeviceUpdate, HeartbeatPayload, NewDevice,
};
use crate::services::tags::TagService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DeviceListQuery {
    pub folder_id: Option<i64>,
    pub tenant_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub expiration_minutes: i64,
    pub otp_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagAssignment {
    pub tag_ids: Vec<i64>,
}

/// POST /api/devices
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(body): Json<NewDevice>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let device = devices.create_device(&actor, body).await?;
    Ok(Json(json!(device)))
}

/// GET /api/devices?folder_id=N&tenant_id=N
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Query(query): Query<DeviceListQuery>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let filters = DeviceFilters {
        folder_id: query.folder_id,
        tenant_id: query.tenant_id,
    };
    let items = devices.list_devices(&actor, filters).await?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/devices/:key. The key is either a numeric id or a serial number.
pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let device = devices.get_device(&actor, &DeviceKey::parse(&key)).await?;
    Ok(Json(json!(device)))
}

/// PATCH /api/devices/:key
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(body): Json<DeviceUpdate>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let device = devices
        .update_device(&actor, &DeviceKey::parse(&key), body)
        .await?;
    Ok(Json(json!(device)))
}

/// DELETE /api/devices/:key
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    devices.delete_device(&actor, &DeviceKey::parse(&key)).await?;
    Ok(Json(json!({ "deleted": key })))
}

/// POST /devices/register. Unauthenticated agent enrollment.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<NewDevice>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let device = devices.register_device(body).await?;
    Ok(Json(json!(device)))
}

/// POST /devices/:key/heartbeat. Unauthenticated agent telemetry; the
/// response tells the agent how long to wait before the next beat.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<HeartbeatPayload>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let interval = devices.heartbeat(&DeviceKey::parse(&key), body).await?;
    Ok(Json(json!({ "heartbeat_s": interval })))
}

/// POST /api/devices/:key/share
pub async fn share(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let (token, expires_at) = devices
        .create_share_url(
            &actor,
            &DeviceKey::parse(&key),
            body.expiration_minutes,
            body.otp_code.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "share_url": token, "expires_at": expires_at })))
}

/// GET /connect/:token. Redeems a share token for remote-access credentials.
pub async fn connect(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let devices = DeviceService::new(state.pool.clone(), state.config.clone());
    let info = devices.connect(&token).await?;
    Ok(Json(json!(info)))
}

/// GET /api/devices/:key/tags
pub async fn tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let device = access.has_access_to_device(&DeviceKey::parse(&key), &actor).await?;
    let tags = TagService::new(state.pool.clone());
    let items = tags.tags_for_entity(device.entity_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// PUT /api/devices/:key/tags
pub async fn assign_tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(body): Json<TagAssignment>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let device = access.can_edit_device(&DeviceKey::parse(&key), &actor).await?;
    let tenant_id = match device.folder_id {
        Some(folder_id) => access.has_access_to_folder(folder_id, &actor).await?.tenant_id,
        None => SYSTEM_TENANT_ID,
    };
    let tags = TagService::new(state.pool.clone());
    let items = tags
        .assign_tags(device.entity_id, &body.tag_ids, Some(tenant_id))
        .await?;
    Ok(Json(json!({ "items": items })))
}
