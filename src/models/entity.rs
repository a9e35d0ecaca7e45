use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The polymorphic tag-carrier. Every Device, Folder, Tenant and User owns
/// exactly one Entity; tags attach to entities, never to the owner directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entity {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}
