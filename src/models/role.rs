use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fixed role catalog row. Ordering convention: lower id is more privileged.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

pub const ADMIN_ROLE_ID: i64 = 1;
pub const OWNER_ROLE_ID: i64 = 2;
pub const USER_ROLE_ID: i64 = 3;

impl Role {
    pub fn is_admin(&self) -> bool {
        self.id == ADMIN_ROLE_ID
    }
}
