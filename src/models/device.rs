use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Audit;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    /// Unique across the whole system, not per tenant.
    pub name: String,
    pub entity_id: i64,
    /// None means the device logically lives under the system tenant's
    /// root folder.
    pub folder_id: Option<i64>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub vendor_brand: Option<String>,
    pub vendor_model: Option<String>,
    pub cpu_cores: Option<i64>,
    pub ram_mb: Option<i64>,
    pub mac_addresses: Option<String>,
    pub local_ips: Option<String>,
    pub serial_number: Option<String>,
    #[serde(skip_serializing)]
    pub remote_access_id: Option<String>,
    #[serde(skip_serializing)]
    pub remote_access_password: Option<String>,
    pub share_url: Option<String>,
    pub share_url_expires_at: Option<DateTime<Utc>>,
    pub time_zone: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

/// Wire shape for device responses. `is_online` is derived at serialization
/// time from the latest heartbeat, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOut {
    #[serde(flatten)]
    pub device: Device,
    pub is_online: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl DeviceOut {
    pub fn new(device: Device, is_online: bool, last_heartbeat: Option<DateTime<Utc>>) -> Self {
        Self { device, is_online, last_heartbeat }
    }
}
