use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::services::access::AccessService;
use crate::services::tags::TagService;
use crate::services::users::{UserService, UserUpdate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role_id: Option<i64>,
    #[serde(default)]
    pub tenant_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub disabled: Option<bool>,
    pub role_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TagAssignment {
    pub tag_ids: Vec<i64>,
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let user = users
        .create_user(&actor, &body.username, &body.password, body.role_id, &body.tenant_ids)
        .await?;
    Ok(Json(json!(user)))
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let items = users.list_users(&actor).await?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let user = users.get_user(&actor, user_id).await?;
    Ok(Json(json!(user)))
}

/// PATCH /api/users/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let update = UserUpdate {
        password: body.password,
        disabled: body.disabled,
        role_id: body.role_id,
    };
    let user = users.update_user(&actor, user_id, update).await?;
    Ok(Json(json!(user)))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    users.delete_user(&actor, user_id).await?;
    Ok(Json(json!({ "deleted": user_id })))
}

/// GET /api/users/:id/tenants
pub async fn tenants(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    let assigned = users.tenants_of(&actor, user_id).await?;
    Ok(Json(json!({ "assigned": assigned })))
}

/// PUT /api/users/:id/tenants/:tenant_id
pub async fn assign_tenant(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path((user_id, tenant_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    users.assign_tenant(&actor, user_id, tenant_id).await?;
    let assigned = users.tenants_of(&actor, user_id).await?;
    Ok(Json(json!({ "assigned": assigned })))
}

/// DELETE /api/users/:id/tenants/:tenant_id
pub async fn remove_tenant(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path((user_id, tenant_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    let users = UserService::new(state.pool.clone());
    users.remove_tenant(&actor, user_id, tenant_id).await?;
    let assigned = users.tenants_of(&actor, user_id).await?;
    Ok(Json(json!({ "assigned": assigned })))
}

/// GET /api/users/:id/tags
pub async fn tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let target = access.has_access_to_user(user_id, &actor).await?;
    let tags = TagService::new(state.pool.clone());
    let items = tags.tags_for_entity(target.entity_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// PUT /api/users/:id/tags
pub async fn assign_tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(body): Json<TagAssignment>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let target = access.has_access_to_user(user_id, &actor).await?;
    let tags = TagService::new(state.pool.clone());
    // Users are not tenant-scoped, so no tenant filter applies here.
    let items = tags.assign_tags(target.entity_id, &body.tag_ids, None).await?;
    Ok(Json(json!({ "items": items })))
}
