use sqlx::PgPool;

use crate::models::role::{ADMIN_ROLE_ID, OWNER_ROLE_ID};
use crate::models::{Role, User};

use super::error::ServiceError;

pub async fn get_role(pool: &PgPool, role_id: i64) -> Result<Role, ServiceError> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::RoleNotFound)
}

pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, ServiceError> {
    let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(roles)
}

/// Hard gates: these raise PermissionDenied on failure rather than
/// returning false, so callers can use `?` at the top of an operation.
pub fn require_admin(user: &User) -> Result<(), ServiceError> {
    if user.role_id == Some(ADMIN_ROLE_ID) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied)
    }
}

pub fn require_owner(user: &User) -> Result<(), ServiceError> {
    if user.role_id == Some(OWNER_ROLE_ID) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied)
    }
}

pub fn require_admin_or_owner(user: &User) -> Result<(), ServiceError> {
    match user.role_id {
        Some(ADMIN_ROLE_ID) | Some(OWNER_ROLE_ID) => Ok(()),
        _ => Err(ServiceError::PermissionDenied),
    }
}

/// Role comparison is by numeric id, lower is more privileged. An actor may
/// assign a role only if they are admin, or the target role is not more
/// privileged than their own.
pub fn can_assign_role(role_id: i64, actor: &User) -> bool {
    if actor.is_admin() {
        return true;
    }
    match actor.role_id {
        Some(own) => role_id >= own,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::USER_ROLE_ID;
    use crate::services::testing;

    #[test]
    fn gates_raise_permission_denied() {
        let admin = testing::user(1, Some(ADMIN_ROLE_ID));
        let owner = testing::user(2, Some(OWNER_ROLE_ID));
        let plain = testing::user(3, Some(USER_ROLE_ID));
        let roleless = testing::user(4, None);

        assert!(require_admin(&admin).is_ok());
        assert!(matches!(require_admin(&owner), Err(ServiceError::PermissionDenied)));

        assert!(require_owner(&owner).is_ok());
        assert!(matches!(require_owner(&admin), Err(ServiceError::PermissionDenied)));

        assert!(require_admin_or_owner(&admin).is_ok());
        assert!(require_admin_or_owner(&owner).is_ok());
        assert!(matches!(require_admin_or_owner(&plain), Err(ServiceError::PermissionDenied)));
        assert!(matches!(require_admin_or_owner(&roleless), Err(ServiceError::PermissionDenied)));
    }

    #[test]
    fn admin_assigns_anything() {
        let admin = testing::user(1, Some(ADMIN_ROLE_ID));
        assert!(can_assign_role(ADMIN_ROLE_ID, &admin));
        assert!(can_assign_role(USER_ROLE_ID, &admin));
    }

    #[test]
    fn actors_cannot_elevate_above_themselves() {
        let owner = testing::user(2, Some(OWNER_ROLE_ID));
        assert!(!can_assign_role(ADMIN_ROLE_ID, &owner));
        assert!(can_assign_role(OWNER_ROLE_ID, &owner));
        assert!(can_assign_role(USER_ROLE_ID, &owner));

        let roleless = testing::user(4, None);
        assert!(!can_assign_role(USER_ROLE_ID, &roleless));
    }
}
