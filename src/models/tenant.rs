use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Audit;

/// Tenant id 1 is the reserved system tenant: it backs the fallback root
/// folder for orphaned devices and is never exposed through tenant-scoped
/// endpoints, updated, or deleted.
pub const SYSTEM_TENANT_ID: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub entity_id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Tenant {
    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_TENANT_ID
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantSettings {
    pub tenant_id: i64,
    pub heartbeat_s: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
