use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Audit;
use super::role::{ADMIN_ROLE_ID, OWNER_ROLE_ID};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub disabled: bool,
    pub entity_id: i64,
    pub role_id: Option<i64>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role_id == Some(ADMIN_ROLE_ID)
    }

    pub fn is_owner(&self) -> bool {
        self.role_id == Some(OWNER_ROLE_ID)
    }
}
