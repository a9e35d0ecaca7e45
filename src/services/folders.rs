use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::models::tenant::SYSTEM_TENANT_ID;
use crate::models::{Folder, User};

use super::access::AccessService;
use super::entities;
use super::error::ServiceError;
use super::roles;

pub struct FolderService {
    pool: PgPool,
    access: AccessService,
}

impl FolderService {
    pub fn new(pool: PgPool) -> Self {
        let access = AccessService::new(pool.clone());
        Self { pool, access }
    }

    /// A folder with no explicit parent is attached under its tenant's root
    /// folder; the single parentless root per tenant only ever comes from
    /// tenant provisioning.
    pub async fn create_folder(
        &self,
        actor: &User,
        name: &str,
        tenant_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Folder, ServiceError> {
        let tenant = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        if tenant.is_none() {
            return Err(ServiceError::TenantNotFound);
        }
        roles::require_admin_or_owner(actor)?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;

        let parent_id = match parent_id {
            Some(pid) => {
                let parent = self.resolve(pid).await?;
                if parent.tenant_id != tenant_id {
                    return Err(ServiceError::PermissionDenied);
                }
                parent.id
            }
            None => self.root_folder_id(tenant_id).await?,
        };

        let mut tx = self.pool.begin().await?;
        let entity = entities::create_entity(&mut *tx).await?;
        let folder = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (name, entity_id, tenant_id, parent_id, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING *",
        )
        .bind(name)
        .bind(entity.id)
        .bind(tenant_id)
        .bind(parent_id)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            ServiceError::or_name_taken(e, ServiceError::FolderNameTaken(name.to_string()))
        })?;
        tx.commit().await?;

        Ok(folder)
    }

    pub async fn get_folder(&self, actor: &User, folder_id: i64) -> Result<Folder, ServiceError> {
        self.access.has_access_to_folder(folder_id, actor).await
    }

    pub async fn list_folders(
        &self,
        actor: &User,
        tenant_id: i64,
    ) -> Result<Vec<Folder>, ServiceError> {
        self.access.has_access_to_tenant(tenant_id, actor).await?;
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    pub async fn update_folder(
        &self,
        actor: &User,
        folder_id: i64,
        name: Option<&str>,
        new_parent_id: Option<i64>,
    ) -> Result<Folder, ServiceError> {
        let folder = self.access.can_edit_folder(folder_id, actor).await?;

        if let Some(pid) = new_parent_id {
            if folder.is_root() {
                // The root stays parentless; re-rooting a tenant is not a
                // folder move.
                return Err(ServiceError::PermissionDenied);
            }
            let parent = self.resolve(pid).await?;
            if parent.tenant_id != folder.tenant_id {
                return Err(ServiceError::PermissionDenied);
            }
            // A folder cannot be moved under itself or its own subtree.
            let subtree = subtree_ids(&self.pool, folder.id).await?;
            if subtree.contains(&pid) {
                return Err(ServiceError::PermissionDenied);
            }
        }

        let name = name.unwrap_or(&folder.name);
        let parent = new_parent_id.or(folder.parent_id);
        sqlx::query_as::<_, Folder>(
            "UPDATE folders SET name = $1, parent_id = $2, updated_at = now(), updated_by = $3 \
             WHERE id = $4 RETURNING *",
        )
        .bind(name)
        .bind(parent)
        .bind(actor.id)
        .bind(folder.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            ServiceError::or_name_taken(e, ServiceError::FolderNameTaken(name.to_string()))
        })
    }

    /// Deletes a folder and its subtree. Devices anywhere in the subtree are
    /// reassigned to the system tenant's root folder in the same
    /// transaction; devices are never destroyed by a folder delete.
    pub async fn delete_folder(&self, actor: &User, folder_id: i64) -> Result<(), ServiceError> {
        let folder = self.access.can_edit_folder(folder_id, actor).await?;
        if folder.is_root() {
            // Root folders fall only with their tenant.
            return Err(ServiceError::PermissionDenied);
        }

        let mut tx = self.pool.begin().await?;
        delete_subtree(&mut tx, folder.id).await?;
        tx.commit().await?;

        info!(folder_id, "folder deleted");
        Ok(())
    }

    async fn resolve(&self, folder_id: i64) -> Result<Folder, ServiceError> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::FolderNotFound)
    }

    async fn root_folder_id(&self, tenant_id: i64) -> Result<i64, ServiceError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM folders WHERE tenant_id = $1 AND parent_id IS NULL",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::FolderNotFound)
    }
}

async fn subtree_ids(pool: &PgPool, folder_id: i64) -> Result<Vec<i64>, ServiceError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "WITH RECURSIVE subtree AS ( \
             SELECT id FROM folders WHERE id = $1 \
             UNION ALL \
             SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id \
         ) SELECT id FROM subtree",
    )
    .bind(folder_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Shared by folder deletion and tenant deletion: reassign every device in
/// the subtree to the system root, then drop the subtree's entities (each
/// folder row cascades from its entity).
pub(crate) async fn delete_subtree(
    tx: &mut Transaction<'_, Postgres>,
    folder_id: i64,
) -> Result<(), ServiceError> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "WITH RECURSIVE subtree AS ( \
             SELECT id, entity_id FROM folders WHERE id = $1 \
             UNION ALL \
             SELECT f.id, f.entity_id FROM folders f JOIN subtree s ON f.parent_id = s.id \
         ) SELECT id, entity_id FROM subtree",
    )
    .bind(folder_id)
    .fetch_all(&mut **tx)
    .await?;

    let folder_ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let entity_ids: Vec<i64> = rows.iter().map(|(_, eid)| *eid).collect();

    let system_root = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM folders WHERE tenant_id = $1 AND parent_id IS NULL",
    )
    .bind(SYSTEM_TENANT_ID)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ServiceError::Internal("system root folder missing".into()))?;

    sqlx::query(
        "UPDATE devices SET folder_id = $1, updated_at = now() WHERE folder_id = ANY($2)",
    )
    .bind(system_root)
    .bind(&folder_ids)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM entities WHERE id = ANY($1)")
        .bind(&entity_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
