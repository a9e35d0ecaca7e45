use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::models::tenant::SYSTEM_TENANT_ID;
use crate::models::{Tag, TagType, Tenant, TenantSettings, User};

use super::access::AccessService;
use super::entities;
use super::error::ServiceError;
use super::folders;
use super::roles;

/// Deterministic auto-tag name derived from the tenant's normalized name.
pub fn auto_tag_name(tenant_name: &str) -> String {
    let normalized: String = tenant_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    format!("tenant-{}", normalized)
}

pub struct TenantService {
    pool: PgPool,
    config: Arc<AppConfig>,
    access: AccessService,
}

impl TenantService {
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Self {
        let access = AccessService::new(pool.clone());
        Self { pool, config, access }
    }

    /// Atomic provisioning: entity, tenant, auto-tag, root folder and
    /// default settings are created in one transaction, in that order. Any
    /// failure rolls the whole tenant back.
    pub async fn create_tenant(&self, actor: &User, name: &str) -> Result<Tenant, ServiceError> {
        roles::require_admin(actor)?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tenants WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(ServiceError::TenantNameTaken(name.to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let tenant = provision_tenant(
            &mut tx,
            name,
            Some(actor.id),
            self.config.default_heartbeat_s,
        )
        .await?;
        tx.commit().await?;

        info!(tenant_id = tenant.id, name = %tenant.name, "tenant provisioned");
        Ok(tenant)
    }

    pub async fn get_tenant(&self, actor: &User, tenant_id: i64) -> Result<Tenant, ServiceError> {
        let tenant = self.resolve(tenant_id).await?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;
        Ok(tenant)
    }

    pub async fn list_tenants(&self, actor: &User) -> Result<Vec<Tenant>, ServiceError> {
        let tenants = if actor.is_admin() {
            sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY id")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, Tenant>(
                "SELECT t.* FROM tenants t JOIN user_tenants ut ON ut.tenant_id = t.id \
                 WHERE ut.user_id = $1 ORDER BY t.id",
            )
            .bind(actor.id)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(tenants)
    }

    pub async fn update_tenant(
        &self,
        actor: &User,
        tenant_id: i64,
        name: &str,
    ) -> Result<Tenant, ServiceError> {
        let tenant = self.resolve(tenant_id).await?;
        if tenant.is_system() {
            return Err(ServiceError::PermissionDenied);
        }
        roles::require_admin_or_owner(actor)?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;

        sqlx::query_as::<_, Tenant>(
            "UPDATE tenants SET name = $1, updated_at = now(), updated_by = $2 \
             WHERE id = $3 RETURNING *",
        )
        .bind(name)
        .bind(actor.id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            ServiceError::or_name_taken(e, ServiceError::TenantNameTaken(name.to_string()))
        })
    }

    /// Deletes the tenant's root folder explicitly (subfolders cascade,
    /// devices are reassigned to the system root) and then the tenant
    /// itself, all in one transaction.
    pub async fn delete_tenant(&self, actor: &User, tenant_id: i64) -> Result<(), ServiceError> {
        roles::require_admin(actor)?;
        let tenant = self.resolve(tenant_id).await?;
        if tenant.is_system() {
            return Err(ServiceError::PermissionDenied);
        }

        let mut tx = self.pool.begin().await?;

        let root_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM folders WHERE tenant_id = $1 AND parent_id IS NULL",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(root_id) = root_id {
            folders::delete_subtree(&mut tx, root_id).await?;
        }

        // Dropping the entity cascades the tenant row, its memberships,
        // settings and scoped tags.
        sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(tenant.entity_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(tenant_id, "tenant deleted");
        Ok(())
    }

    /// Settings are created lazily with the process-wide default when first
    /// read. The system tenant's settings are never exposed.
    pub async fn get_settings(
        &self,
        actor: &User,
        tenant_id: i64,
    ) -> Result<TenantSettings, ServiceError> {
        let tenant = self.resolve(tenant_id).await?;
        if tenant.is_system() {
            return Err(ServiceError::PermissionDenied);
        }
        self.access.has_access_to_tenant(tenant_id, actor).await?;

        sqlx::query(
            "INSERT INTO tenant_settings (tenant_id, heartbeat_s) VALUES ($1, $2) \
             ON CONFLICT (tenant_id) DO NOTHING",
        )
        .bind(tenant_id)
        .bind(self.config.default_heartbeat_s)
        .execute(&self.pool)
        .await?;

        let settings = sqlx::query_as::<_, TenantSettings>(
            "SELECT * FROM tenant_settings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    pub async fn update_settings(
        &self,
        actor: &User,
        tenant_id: i64,
        heartbeat_s: i64,
    ) -> Result<TenantSettings, ServiceError> {
        let tenant = self.resolve(tenant_id).await?;
        if tenant.is_system() {
            return Err(ServiceError::PermissionDenied);
        }
        roles::require_admin_or_owner(actor)?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;
        if heartbeat_s <= 0 {
            return Err(ServiceError::InvalidHeartbeatInterval);
        }

        let settings = sqlx::query_as::<_, TenantSettings>(
            "INSERT INTO tenant_settings (tenant_id, heartbeat_s) VALUES ($1, $2) \
             ON CONFLICT (tenant_id) DO UPDATE SET heartbeat_s = $2, updated_at = now() \
             RETURNING *",
        )
        .bind(tenant_id)
        .bind(heartbeat_s)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn resolve(&self, tenant_id: i64) -> Result<Tenant, ServiceError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::TenantNotFound)
    }
}

/// The four-step provisioning flow, shared by the admin-facing operation
/// and the first-boot system tenant bootstrap.
pub async fn provision_tenant(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    actor_id: Option<i64>,
    default_heartbeat_s: i64,
) -> Result<Tenant, ServiceError> {
    let entity = entities::create_entity(&mut **tx).await?;

    let tenant = sqlx::query_as::<_, Tenant>(
        "INSERT INTO tenants (name, entity_id, created_by, updated_by) \
         VALUES ($1, $2, $3, $3) RETURNING *",
    )
    .bind(name)
    .bind(entity.id)
    .bind(actor_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| ServiceError::or_name_taken(e, ServiceError::TenantNameTaken(name.to_string())))?;

    let tag_name = auto_tag_name(name);
    sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (name, tenant_id, tag_type, created_by, updated_by) \
         VALUES ($1, $2, $3, $4, $4) RETURNING *",
    )
    .bind(&tag_name)
    .bind(tenant.id)
    .bind(TagType::Tenant.as_str())
    .bind(actor_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| ServiceError::or_name_taken(e, ServiceError::TagNameTaken(tag_name.clone())))?;

    let folder_entity = entities::create_entity(&mut **tx).await?;
    sqlx::query(
        "INSERT INTO folders (name, entity_id, tenant_id, parent_id, created_by, updated_by) \
         VALUES ($1, $2, $3, NULL, $4, $4)",
    )
    .bind(name)
    .bind(folder_entity.id)
    .bind(tenant.id)
    .bind(actor_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| ServiceError::or_name_taken(e, ServiceError::FolderNameTaken(name.to_string())))?;

    sqlx::query("INSERT INTO tenant_settings (tenant_id, heartbeat_s) VALUES ($1, $2)")
        .bind(tenant.id)
        .bind(default_heartbeat_s)
        .execute(&mut **tx)
        .await?;

    Ok(tenant)
}

/// First-boot bootstrap: an empty database gets the reserved system tenant
/// as its very first row, so it lands on id 1.
pub async fn ensure_system_tenant(
    pool: &PgPool,
    default_heartbeat_s: i64,
) -> Result<(), ServiceError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tenants")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let tenant = provision_tenant(&mut tx, "system", None, default_heartbeat_s).await?;
    tx.commit().await?;

    if tenant.id != SYSTEM_TENANT_ID {
        return Err(ServiceError::Internal(format!(
            "system tenant bootstrap landed on id {} instead of {}",
            tenant.id, SYSTEM_TENANT_ID
        )));
    }
    info!("bootstrapped system tenant");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_tag_name_is_deterministic_and_normalized() {
        assert_eq!(auto_tag_name("acme"), "tenant-acme");
        assert_eq!(auto_tag_name("  Acme Corp  "), "tenant-acme-corp");
        assert_eq!(auto_tag_name("ACME"), auto_tag_name("acme"));
    }
}
