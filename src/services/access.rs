//! The authorization predicate chain. Each layer resolves its object, then
//! defers to the next coarser-grained check: device -> folder -> tenant,
//! denying at the first failed predicate.

use sqlx::PgPool;

use crate::models::tenant::SYSTEM_TENANT_ID;
use crate::models::{Device, Folder, User};

use super::error::ServiceError;
use super::roles;

/// Dual-key device lookup. An identifier consisting entirely of digits is
/// treated as a numeric id; anything else as a serial number. This is a
/// textual-pattern dispatch preserved for wire compatibility: an all-digit
/// serial number resolves as an id, a documented limitation rather than a
/// bug to silently fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKey {
    Id(i64),
    Serial(String),
}

impl DeviceKey {
    pub fn parse(raw: &str) -> DeviceKey {
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            // Digit strings too large for i64 cannot be an id; fall back
            // to serial lookup.
            if let Ok(id) = raw.parse::<i64>() {
                return DeviceKey::Id(id);
            }
        }
        DeviceKey::Serial(raw.to_string())
    }
}

pub struct AccessService {
    pool: PgPool,
}

impl AccessService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Admins pass unconditionally; everyone else needs a membership row.
    pub async fn has_access_to_tenant(
        &self,
        tenant_id: i64,
        user: &User,
    ) -> Result<(), ServiceError> {
        if user.is_admin() {
            return Ok(());
        }
        let member = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM user_tenants WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user.id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        if member.is_some() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied)
        }
    }

    pub async fn has_access_to_folder(
        &self,
        folder_id: i64,
        user: &User,
    ) -> Result<Folder, ServiceError> {
        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::FolderNotFound)?;

        self.has_access_to_tenant(folder.tenant_id, user).await?;
        Ok(folder)
    }

    pub async fn resolve_device(&self, key: &DeviceKey) -> Result<Device, ServiceError> {
        let device = match key {
            DeviceKey::Id(id) => {
                sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            DeviceKey::Serial(serial) => {
                sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE serial_number = $1")
                    .bind(serial)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        device.ok_or(ServiceError::DeviceNotFound)
    }

    pub async fn has_access_to_device(
        &self,
        key: &DeviceKey,
        user: &User,
    ) -> Result<Device, ServiceError> {
        let device = self.resolve_device(key).await?;
        match device.folder_id {
            Some(folder_id) => {
                self.has_access_to_folder(folder_id, user).await?;
            }
            // Unassigned devices live under the system tenant's root folder.
            None => {
                self.has_access_to_tenant(SYSTEM_TENANT_ID, user).await?;
            }
        }
        Ok(device)
    }

    /// Self-access is always allowed and admins see everyone. Beyond that,
    /// only owner-role actors may proceed, and only for non-admin users
    /// sharing at least one tenant with them.
    pub async fn has_access_to_user(
        &self,
        target_user_id: i64,
        actor: &User,
    ) -> Result<User, ServiceError> {
        if actor.is_admin() || target_user_id == actor.id {
            return self.resolve_user(target_user_id).await;
        }

        roles::require_owner(actor)?;

        let target = self.resolve_user(target_user_id).await?;
        let shares_tenant = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM user_tenants a JOIN user_tenants b ON a.tenant_id = b.tenant_id \
             WHERE a.user_id = $1 AND b.user_id = $2 LIMIT 1",
        )
        .bind(actor.id)
        .bind(target.id)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        owner_user_access(&target, shares_tenant)?;
        Ok(target)
    }

    /// Editing is strictly more restrictive than reading: owner/admin role
    /// plus the read-side ownership chain.
    pub async fn can_edit_device(
        &self,
        key: &DeviceKey,
        user: &User,
    ) -> Result<Device, ServiceError> {
        roles::require_admin_or_owner(user)?;
        self.has_access_to_device(key, user).await
    }

    pub async fn can_edit_folder(
        &self,
        folder_id: i64,
        user: &User,
    ) -> Result<Folder, ServiceError> {
        roles::require_admin_or_owner(user)?;
        self.has_access_to_folder(folder_id, user).await
    }

    async fn resolve_user(&self, user_id: i64) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn membership_tenant_ids(&self, user_id: i64) -> Result<Vec<i64>, ServiceError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT tenant_id FROM user_tenants WHERE user_id = $1 ORDER BY tenant_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// Owners cannot inspect or manage admins, even through shared-tenant
/// membership.
pub fn owner_user_access(target: &User, shares_tenant: bool) -> Result<(), ServiceError> {
    if target.is_admin() || !shares_tenant {
        return Err(ServiceError::PermissionDenied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::{ADMIN_ROLE_ID, USER_ROLE_ID};
    use crate::services::testing;

    #[test]
    fn all_digit_identifiers_resolve_as_ids() {
        assert_eq!(DeviceKey::parse("42"), DeviceKey::Id(42));
        // An all-digit serial number is indistinguishable from an id.
        assert_eq!(DeviceKey::parse("99999"), DeviceKey::Id(99999));
    }

    #[test]
    fn anything_else_resolves_as_serial() {
        assert_eq!(
            DeviceKey::parse("SN-ABC123"),
            DeviceKey::Serial("SN-ABC123".into())
        );
        assert_eq!(DeviceKey::parse(""), DeviceKey::Serial(String::new()));
        assert_eq!(
            DeviceKey::parse("007a"),
            DeviceKey::Serial("007a".into())
        );
    }

    #[test]
    fn digit_strings_beyond_i64_fall_back_to_serial() {
        let huge = "99999999999999999999999999";
        assert_eq!(DeviceKey::parse(huge), DeviceKey::Serial(huge.into()));
    }

    #[test]
    fn owners_never_reach_admins() {
        let admin_target = testing::user(9, Some(ADMIN_ROLE_ID));
        assert!(matches!(
            owner_user_access(&admin_target, true),
            Err(ServiceError::PermissionDenied)
        ));
    }

    #[test]
    fn shared_tenant_is_required() {
        let target = testing::user(9, Some(USER_ROLE_ID));
        assert!(owner_user_access(&target, true).is_ok());
        assert!(matches!(
            owner_user_access(&target, false),
            Err(ServiceError::PermissionDenied)
        ));
    }
}
