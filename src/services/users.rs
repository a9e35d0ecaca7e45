use sqlx::PgPool;
use tracing::info;

use crate::auth::password;
use crate::models::role::USER_ROLE_ID;
use crate::models::{Tenant, User};

use super::access::AccessService;
use super::entities;
use super::error::ServiceError;
use super::roles;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub disabled: Option<bool>,
    pub role_id: Option<i64>,
}

pub struct UserService {
    pool: PgPool,
    access: AccessService,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        let access = AccessService::new(pool.clone());
        Self { pool, access }
    }

    /// Self-registration always lands on the lowest-privilege role.
    pub async fn register(&self, username: &str, plain_password: &str) -> Result<User, ServiceError> {
        self.insert_user(username, plain_password, Some(USER_ROLE_ID), None)
            .await
    }

    /// Admin- or owner-provisioned creation with an assignable role, bounded
    /// by `can_assign_role`: nobody provisions above their own privilege.
    pub async fn create_user(
        &self,
        actor: &User,
        username: &str,
        plain_password: &str,
        role_id: Option<i64>,
        tenant_ids: &[i64],
    ) -> Result<User, ServiceError> {
        roles::require_admin_or_owner(actor)?;
        if let Some(rid) = role_id {
            roles::get_role(&self.pool, rid).await?;
            if !roles::can_assign_role(rid, actor) {
                return Err(ServiceError::PermissionDenied);
            }
        }
        for tenant_id in tenant_ids {
            self.access.has_access_to_tenant(*tenant_id, actor).await?;
        }

        let user = self
            .insert_user(username, plain_password, role_id, Some(actor.id))
            .await?;
        for tenant_id in tenant_ids {
            self.add_membership(user.id, *tenant_id).await?;
        }
        Ok(user)
    }

    pub async fn get_user(&self, actor: &User, user_id: i64) -> Result<User, ServiceError> {
        self.access.has_access_to_user(user_id, actor).await
    }

    /// Admins see everyone; owners see the non-admin users of their own
    /// tenants; plain users see only themselves.
    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, ServiceError> {
        let users = if actor.is_admin() {
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?
        } else if actor.is_owner() {
            sqlx::query_as::<_, User>(
                "SELECT DISTINCT u.* FROM users u \
                 JOIN user_tenants ut ON ut.user_id = u.id \
                 JOIN user_tenants mine ON mine.tenant_id = ut.tenant_id \
                 WHERE mine.user_id = $1 AND (u.role_id IS NULL OR u.role_id <> 1) \
                 ORDER BY u.id",
            )
            .bind(actor.id)
            .fetch_all(&self.pool)
            .await?
        } else {
            vec![actor.clone()]
        };
        Ok(users)
    }

    pub async fn update_user(
        &self,
        actor: &User,
        user_id: i64,
        update: UserUpdate,
    ) -> Result<User, ServiceError> {
        let target = self.access.has_access_to_user(user_id, actor).await?;

        let hashed = match &update.password {
            Some(plain) => {
                validate_password(plain)?;
                Some(password::hash(plain)?)
            }
            None => None,
        };
        if let Some(rid) = update.role_id {
            roles::get_role(&self.pool, rid).await?;
            if !roles::can_assign_role(rid, actor) {
                return Err(ServiceError::PermissionDenied);
            }
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET \
                 hashed_password = COALESCE($1, hashed_password), \
                 disabled = COALESCE($2, disabled), \
                 role_id = COALESCE($3, role_id), \
                 updated_at = now(), updated_by = $4 \
             WHERE id = $5 RETURNING *",
        )
        .bind(hashed)
        .bind(update.disabled)
        .bind(update.role_id)
        .bind(actor.id)
        .bind(target.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Self-deletion is a distinct forbidden operation, checked before any
    /// other access rule and regardless of role.
    pub async fn delete_user(&self, actor: &User, user_id: i64) -> Result<(), ServiceError> {
        if user_id == actor.id {
            return Err(ServiceError::PermissionDenied);
        }
        let target = self.access.has_access_to_user(user_id, actor).await?;

        sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(target.entity_id)
            .execute(&self.pool)
            .await?;
        info!(user_id, "user deleted");
        Ok(())
    }

    pub async fn tenants_of(&self, actor: &User, user_id: i64) -> Result<Vec<Tenant>, ServiceError> {
        let target = self.access.has_access_to_user(user_id, actor).await?;
        let tenants = sqlx::query_as::<_, Tenant>(
            "SELECT t.* FROM tenants t JOIN user_tenants ut ON ut.tenant_id = t.id \
             WHERE ut.user_id = $1 ORDER BY t.id",
        )
        .bind(target.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    pub async fn assign_tenant(
        &self,
        actor: &User,
        user_id: i64,
        tenant_id: i64,
    ) -> Result<(), ServiceError> {
        roles::require_admin_or_owner(actor)?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;
        let target = self.access.has_access_to_user(user_id, actor).await?;
        self.add_membership(target.id, tenant_id).await
    }

    pub async fn remove_tenant(
        &self,
        actor: &User,
        user_id: i64,
        tenant_id: i64,
    ) -> Result<(), ServiceError> {
        roles::require_admin_or_owner(actor)?;
        self.access.has_access_to_tenant(tenant_id, actor).await?;
        let target = self.access.has_access_to_user(user_id, actor).await?;
        sqlx::query("DELETE FROM user_tenants WHERE user_id = $1 AND tenant_id = $2")
            .bind(target.id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_user(
        &self,
        username: &str,
        plain_password: &str,
        role_id: Option<i64>,
        created_by: Option<i64>,
    ) -> Result<User, ServiceError> {
        validate_password(plain_password)?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(ServiceError::UsernameTaken(username.to_string()));
        }

        let hashed = password::hash(plain_password)?;

        let mut tx = self.pool.begin().await?;
        let entity = entities::create_entity(&mut *tx).await?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, hashed_password, entity_id, role_id, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING *",
        )
        .bind(username)
        .bind(&hashed)
        .bind(entity.id)
        .bind(role_id)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            ServiceError::or_name_taken(e, ServiceError::UsernameTaken(username.to_string()))
        })?;
        tx.commit().await?;

        info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    async fn add_membership(&self, user_id: i64, tenant_id: i64) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO user_tenants (user_id, tenant_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, tenant_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn validate_password(plain: &str) -> Result<(), ServiceError> {
    if plain.len() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::InvalidPassword);
    }
    Ok(())
}

/// Create the bootstrap admin account on an empty user table.
pub async fn ensure_admin_user(pool: &PgPool, admin_password: &str) -> Result<(), ServiceError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let hashed = password::hash(admin_password)?;
    let mut tx = pool.begin().await?;
    let entity = entities::create_entity(&mut *tx).await?;
    sqlx::query(
        "INSERT INTO users (username, hashed_password, entity_id, role_id) VALUES ('admin', $1, $2, 1)",
    )
    .bind(&hashed)
    .bind(entity.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("bootstrapped admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(ServiceError::InvalidPassword)
        ));
        assert!(validate_password("long enough").is_ok());
    }
}
