use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only telemetry record. Rows are never updated or deleted
/// individually; liveness only ever reads the newest row per device
/// (timestamp DESC, id DESC as the deterministic tie-break).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Heartbeat {
    pub id: i64,
    pub device_id: i64,
    pub cpu_load: Option<f64>,
    pub mem_load_mb: Option<f64>,
    pub free_space_mb: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
