use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::services::access::AccessService;
use crate::services::folders::FolderService;
use crate::services::tags::TagService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub tenant_id: i64,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FolderListQuery {
    pub tenant_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TagAssignment {
    pub tag_ids: Vec<i64>,
}

/// POST /api/folders
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(body): Json<CreateFolderRequest>,
) -> Result<Json<Value>, ApiError> {
    let folders = FolderService::new(state.pool.clone());
    let folder = folders
        .create_folder(&actor, &body.name, body.tenant_id, body.parent_id)
        .await?;
    Ok(Json(json!(folder)))
}

/// GET /api/folders?tenant_id=N
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Query(query): Query<FolderListQuery>,
) -> Result<Json<Value>, ApiError> {
    let folders = FolderService::new(state.pool.clone());
    let items = folders.list_folders(&actor, query.tenant_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/folders/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(folder_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let folders = FolderService::new(state.pool.clone());
    let folder = folders.get_folder(&actor, folder_id).await?;
    Ok(Json(json!(folder)))
}

/// PATCH /api/folders/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(folder_id): Path<i64>,
    Json(body): Json<UpdateFolderRequest>,
) -> Result<Json<Value>, ApiError> {
    let folders = FolderService::new(state.pool.clone());
    let folder = folders
        .update_folder(&actor, folder_id, body.name.as_deref(), body.parent_id)
        .await?;
    Ok(Json(json!(folder)))
}

/// DELETE /api/folders/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(folder_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let folders = FolderService::new(state.pool.clone());
    folders.delete_folder(&actor, folder_id).await?;
    Ok(Json(json!({ "deleted": folder_id })))
}

/// GET /api/folders/:id/tags
pub async fn tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(folder_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let folder = access.has_access_to_folder(folder_id, &actor).await?;
    let tags = TagService::new(state.pool.clone());
    let items = tags.tags_for_entity(folder.entity_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// PUT /api/folders/:id/tags
pub async fn assign_tags(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(folder_id): Path<i64>,
    Json(body): Json<TagAssignment>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let folder = access.can_edit_folder(folder_id, &actor).await?;
    let tags = TagService::new(state.pool.clone());
    let items = tags
        .assign_tags(folder.entity_id, &body.tag_ids, Some(folder.tenant_id))
        .await?;
    Ok(Json(json!({ "items": items })))
}
