use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Audit;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub entity_id: i64,
    pub tenant_id: i64,
    /// None marks the tenant's root folder; at most one per tenant.
    pub parent_id: Option<i64>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
