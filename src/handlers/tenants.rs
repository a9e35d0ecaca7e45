use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::services::access::AccessService;
use crate::services::error::ServiceError;
use crate::services::tags::TagService;
use crate::services::tenants::TenantService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TenantRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub heartbeat_s: i64,
}

#[derive(Debug, Deserialize)]
pub struct TagAssignment {
    pub tag_ids: Vec<i64>,
}

/// POST /api/tenants
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(body): Json<TenantRequest>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let tenant = tenants.create_tenant(&actor, &body.name).await?;
    Ok(Json(json!(tenant)))
}

/// GET /api/tenants
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let items = tenants.list_tenants(&actor).await?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/tenants/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let tenant = tenants.get_tenant(&actor, tenant_id).await?;
    Ok(Json(json!(tenant)))
}

/// PATCH /api/tenants/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
    Json(body): Json<TenantRequest>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let tenant = tenants.update_tenant(&actor, tenant_id, &body.name).await?;
    Ok(Json(json!(tenant)))
}

/// DELETE /api/tenants/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    tenants.delete_tenant(&actor, tenant_id).await?;
    Ok(Json(json!({ "deleted": tenant_id })))
}

/// GET /api/tenants/:id/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let settings = tenants.get_settings(&actor, tenant_id).await?;
    Ok(Json(json!(settings)))
}

/// PUT /api/tenants/:id/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
    Json(body): Json<SettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let settings = tenants
        .update_settings(&actor, tenant_id, body.heartbeat_s)
        .await?;
    Ok(Json(json!(settings)))
}

/// GET /api/tenants/:id/tags
pub async fn tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let tenant = tenants.get_tenant(&actor, tenant_id).await?;
    if tenant.is_system() {
        return Err(ServiceError::PermissionDenied.into());
    }
    let tags = TagService::new(state.pool.clone());
    let items = tags.tags_for_entity(tenant.entity_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// PUT /api/tenants/:id/tags
pub async fn assign_tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tenant_id): Path<i64>,
    Json(body): Json<TagAssignment>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    access.has_access_to_tenant(tenant_id, &actor).await?;
    let tenants = TenantService::new(state.pool.clone(), state.config.clone());
    let tenant = tenants.get_tenant(&actor, tenant_id).await?;
    if tenant.is_system() {
        return Err(ServiceError::PermissionDenied.into());
    }
    let tags = TagService::new(state.pool.clone());
    let items = tags
        .assign_tags(tenant.entity_id, &body.tag_ids, Some(tenant.id))
        .await?;
    Ok(Json(json!({ "items": items })))
}
