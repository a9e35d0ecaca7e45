use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::models::tag::TagType;
use crate::models::User;
use crate::services::access::AccessService;
use crate::services::roles;
use crate::services::tags::{TagFilters, TagService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub tenant_id: Option<i64>,
    pub tag_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagListQuery {
    pub name: Option<String>,
    pub tenant_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub device_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// POST /api/tags. Global tags (no tenant) are admin-only; tenant-scoped
/// tags need owner rights in that tenant.
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(body): Json<CreateTagRequest>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    match body.tenant_id {
        Some(tenant_id) => {
            roles::require_admin_or_owner(&actor)?;
            access.has_access_to_tenant(tenant_id, &actor).await?;
        }
        None => roles::require_admin(&actor)?,
    }

    let tag_type = match body.tag_type.as_deref() {
        Some(raw) => raw
            .parse::<TagType>()
            .map_err(|_| ApiError::bad_request(format!("unknown tag type: {}", raw)))?,
        None => TagType::UserCreated,
    };

    let tags = TagService::new(state.pool.clone());
    let tag = tags
        .create_tag(&actor, &body.name, body.tenant_id, tag_type)
        .await?;
    Ok(Json(json!(tag)))
}

/// GET /api/tags with optional name/tenant/folder/device/user filters.
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Query(query): Query<TagListQuery>,
) -> Result<Json<Value>, ApiError> {
    let access = AccessService::new(state.pool.clone());
    let memberships = access.membership_tenant_ids(actor.id).await?;

    let filters = TagFilters {
        name: query.name,
        tenant_id: query.tenant_id,
        folder_id: query.folder_id,
        device_id: query.device_id,
        user_id: query.user_id,
    };
    let tags = TagService::new(state.pool.clone());
    let items = tags.get_tags(&actor, &memberships, &filters).await?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/tags/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tags = TagService::new(state.pool.clone());
    let tag = tags.get_tag(tag_id).await?;
    require_tag_rights(&state, &actor, tag.tenant_id).await?;
    Ok(Json(json!(tag)))
}

/// PATCH /api/tags/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tag_id): Path<i64>,
    Json(body): Json<UpdateTagRequest>,
) -> Result<Json<Value>, ApiError> {
    let tags = TagService::new(state.pool.clone());
    let tag = tags.get_tag(tag_id).await?;
    require_tag_edit_rights(&state, &actor, tag.tenant_id).await?;
    let tag = tags.update_tag(&actor, tag_id, &body.name).await?;
    Ok(Json(json!(tag)))
}

/// DELETE /api/tags/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tags = TagService::new(state.pool.clone());
    let tag = tags.get_tag(tag_id).await?;
    require_tag_edit_rights(&state, &actor, tag.tenant_id).await?;
    tags.delete_tag(tag_id).await?;
    Ok(Json(json!({ "deleted": tag_id })))
}

/// Read access: global tags are visible to everyone, tenant-scoped tags to
/// members of that tenant.
async fn require_tag_rights(
    state: &AppState,
    actor: &User,
    tenant_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(tid) = tenant_id {
        let access = AccessService::new(state.pool.clone());
        access.has_access_to_tenant(tid, actor).await?;
    }
    Ok(())
}

/// Write access: admin for global tags, admin or owner-with-membership for
/// tenant-scoped tags.
async fn require_tag_edit_rights(
    state: &AppState,
    actor: &User,
    tenant_id: Option<i64>,
) -> Result<(), ApiError> {
    match tenant_id {
        Some(tid) => {
            roles::require_admin_or_owner(actor).map_err(ApiError::from)?;
            let access = AccessService::new(state.pool.clone());
            access.has_access_to_tenant(tid, actor).await?;
        }
        None => roles::require_admin(actor).map_err(ApiError::from)?,
    }
    Ok(())
}
