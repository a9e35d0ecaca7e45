use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::auth::{otp, share};
use crate::config::AppConfig;
use crate::models::tenant::SYSTEM_TENANT_ID;
use crate::models::{Device, DeviceOut, User};

use super::access::{AccessService, DeviceKey};
use super::entities;
use super::error::ServiceError;
use super::roles;

/// A device is online when the latest heartbeat is no older than the
/// tenant's expected interval times the tolerance multiplier, both compared
/// at whole-minute resolution. Devices outside any folder report offline
/// regardless of heartbeats.
pub fn is_online(
    folder_id: Option<i64>,
    last_heartbeat: Option<DateTime<Utc>>,
    heartbeat_s: i64,
    tolerance: i64,
    now: DateTime<Utc>,
) -> bool {
    if folder_id.is_none() {
        return false;
    }
    let Some(last) = last_heartbeat else {
        return false;
    };
    let elapsed_minutes = (now - last).num_seconds() / 60;
    let max_minutes = (heartbeat_s / 60) * tolerance;
    elapsed_minutes >= 0 && elapsed_minutes <= max_minutes
}

#[derive(Debug, Deserialize)]
pub struct NewDevice {
    pub name: String,
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
    pub time_zone: Option<String>,
}

/// Distinguishes a field that is absent from one set to JSON null. Plain
/// `Option<Option<T>>` collapses both to `None` under serde's defaults.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<i64>>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub vendor_brand: Option<String>,
    pub vendor_model: Option<String>,
    pub cpu_cores: Option<i64>,
    pub ram_mb: Option<i64>,
    pub mac_addresses: Option<String>,
    pub local_ips: Option<String>,
    pub time_zone: Option<String>,
}

/// Telemetry sent by the on-device agent. Credential fields are only
/// applied when both are present; a lone id or password is ignored.
#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    pub cpu_load: Option<f64>,
    pub mem_load_mb: Option<f64>,
    pub free_space_mb: Option<f64>,
    pub remote_access_id: Option<String>,
    pub remote_access_password: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeviceFilters {
    pub folder_id: Option<i64>,
    pub tenant_id: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
pub struct ConnectionInfo {
    pub remote_access_id: String,
    pub remote_access_password: String,
}

#[derive(FromRow)]
struct DeviceWithLiveness {
    #[sqlx(flatten)]
    device: Device,
    last_heartbeat: Option<DateTime<Utc>>,
    heartbeat_s: Option<i64>,
}

const DEVICE_SELECT: &str = "SELECT d.*, hb.timestamp AS last_heartbeat, ts.heartbeat_s AS heartbeat_s \
     FROM devices d \
     LEFT JOIN folders f ON f.id = d.folder_id \
     LEFT JOIN tenant_settings ts ON ts.tenant_id = f.tenant_id \
     LEFT JOIN LATERAL (\
         SELECT timestamp FROM heartbeats h WHERE h.device_id = d.id \
         ORDER BY timestamp DESC, id DESC LIMIT 1\
     ) hb ON true";

pub struct DeviceService {
    pool: PgPool,
    config: Arc<AppConfig>,
    access: AccessService,
}

impl DeviceService {
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Self {
        let access = AccessService::new(pool.clone());
        Self { pool, config, access }
    }

    pub async fn create_device(&self, actor: &User, new: NewDevice) -> Result<DeviceOut, ServiceError> {
        match new.folder_id {
            Some(folder_id) => {
                self.access.can_edit_folder(folder_id, actor).await?;
            }
            None => {
                roles::require_admin_or_owner(actor)?;
                self.access.has_access_to_tenant(SYSTEM_TENANT_ID, actor).await?;
            }
        }

        let mut tx = self.pool.begin().await?;
        let entity = entities::create_entity(&mut *tx).await?;
        let device = sqlx::query_as::<_, Device>(
            "INSERT INTO devices (name, entity_id, folder_id, os_name, os_version, \
                 vendor_brand, vendor_model, cpu_cores, ram_mb, mac_addresses, \
                 local_ips, serial_number, time_zone, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
             RETURNING *",
        )
        .bind(&new.name)
        .bind(entity.id)
        .bind(new.folder_id)
        .bind(&new.os_name)
        .bind(&new.os_version)
        .bind(&new.vendor_brand)
        .bind(&new.vendor_model)
        .bind(new.cpu_cores)
        .bind(new.ram_mb)
        .bind(&new.mac_addresses)
        .bind(&new.local_ips)
        .bind(&new.serial_number)
        .bind(&new.time_zone)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::or_name_taken(e, ServiceError::DeviceNameTaken(new.name.clone())))?;
        tx.commit().await?;

        info!(device_id = device.id, name = %device.name, "device created");
        Ok(DeviceOut::new(device, false, None))
    }

    /// Unauthenticated agent enrollment. A known serial number updates the
    /// existing record in place instead of tripping the unique constraint;
    /// a fresh device lands unassigned under the system tenant's root.
    pub async fn register_device(&self, new: NewDevice) -> Result<Device, ServiceError> {
        if let Some(serial) = new.serial_number.as_deref() {
            let existing = sqlx::query_as::<_, Device>(
                "SELECT * FROM devices WHERE serial_number = $1",
            )
            .bind(serial)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(device) = existing {
                let updated = sqlx::query_as::<_, Device>(
                    "UPDATE devices SET \
                         os_name = COALESCE($1, os_name), \
                         os_version = COALESCE($2, os_version), \
                         vendor_brand = COALESCE($3, vendor_brand), \
                         vendor_model = COALESCE($4, vendor_model), \
                         cpu_cores = COALESCE($5, cpu_cores), \
                         ram_mb = COALESCE($6, ram_mb), \
                         mac_addresses = COALESCE($7, mac_addresses), \
                         local_ips = COALESCE($8, local_ips), \
                         time_zone = COALESCE($9, time_zone), \
                         updated_at = now() \
                     WHERE id = $10 RETURNING *",
                )
                .bind(&new.os_name)
                .bind(&new.os_version)
                .bind(&new.vendor_brand)
                .bind(&new.vendor_model)
                .bind(new.cpu_cores)
                .bind(new.ram_mb)
                .bind(&new.mac_addresses)
                .bind(&new.local_ips)
                .bind(&new.time_zone)
                .bind(device.id)
                .fetch_one(&self.pool)
                .await?;
                return Ok(updated);
            }
        }

        let mut tx = self.pool.begin().await?;
        let entity = entities::create_entity(&mut *tx).await?;
        let device = sqlx::query_as::<_, Device>(
            "INSERT INTO devices (name, entity_id, os_name, os_version, vendor_brand, \
                 vendor_model, cpu_cores, ram_mb, mac_addresses, local_ips, \
                 serial_number, time_zone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(&new.name)
        .bind(entity.id)
        .bind(&new.os_name)
        .bind(&new.os_version)
        .bind(&new.vendor_brand)
        .bind(&new.vendor_model)
        .bind(new.cpu_cores)
        .bind(new.ram_mb)
        .bind(&new.mac_addresses)
        .bind(&new.local_ips)
        .bind(&new.serial_number)
        .bind(&new.time_zone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::or_name_taken(e, ServiceError::DeviceNameTaken(new.name.clone())))?;
        tx.commit().await?;

        info!(device_id = device.id, name = %device.name, "device registered");
        Ok(device)
    }

    pub async fn get_device(&self, actor: &User, key: &DeviceKey) -> Result<DeviceOut, ServiceError> {
        self.access.has_access_to_device(key, actor).await?;

        let mut query = QueryBuilder::<Postgres>::new(DEVICE_SELECT);
        match key {
            DeviceKey::Id(id) => {
                query.push(" WHERE d.id = ").push_bind(id);
            }
            DeviceKey::Serial(serial) => {
                query.push(" WHERE d.serial_number = ").push_bind(serial);
            }
        }
        let row = query
            .build_query_as::<DeviceWithLiveness>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::DeviceNotFound)?;

        let mut out = self.to_out(row, Utc::now());
        self.expire_share_url(&mut out.device).await?;
        Ok(out)
    }

    pub async fn list_devices(
        &self,
        actor: &User,
        filters: DeviceFilters,
    ) -> Result<Vec<DeviceOut>, ServiceError> {
        if let Some(folder_id) = filters.folder_id {
            self.access.has_access_to_folder(folder_id, actor).await?;
        }
        if let Some(tenant_id) = filters.tenant_id {
            self.access.has_access_to_tenant(tenant_id, actor).await?;
        }

        let mut query = QueryBuilder::<Postgres>::new(DEVICE_SELECT);
        query.push(" WHERE true");
        if let Some(folder_id) = filters.folder_id {
            query.push(" AND d.folder_id = ").push_bind(folder_id);
        }
        if let Some(tenant_id) = filters.tenant_id {
            query.push(" AND f.tenant_id = ").push_bind(tenant_id);
        }
        if !actor.is_admin() {
            // Unassigned devices count as system-tenant devices.
            let memberships = self.access.membership_tenant_ids(actor.id).await?;
            query
                .push(" AND COALESCE(f.tenant_id, ")
                .push_bind(SYSTEM_TENANT_ID)
                .push(") = ANY(")
                .push_bind(memberships)
                .push(")");
        }
        query.push(" ORDER BY d.id");

        let rows = query
            .build_query_as::<DeviceWithLiveness>()
            .fetch_all(&self.pool)
            .await?;

        let now = Utc::now();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut item = self.to_out(row, now);
            self.expire_share_url(&mut item.device).await?;
            out.push(item);
        }
        Ok(out)
    }

    pub async fn update_device(
        &self,
        actor: &User,
        key: &DeviceKey,
        update: DeviceUpdate,
    ) -> Result<DeviceOut, ServiceError> {
        let device = self.access.can_edit_device(key, actor).await?;

        let (set_folder, new_folder) = match update.folder_id {
            Some(target) => {
                if let Some(folder_id) = target {
                    self.access.can_edit_folder(folder_id, actor).await?;
                } else {
                    roles::require_admin_or_owner(actor)?;
                }
                (true, target)
            }
            None => (false, device.folder_id),
        };

        let name = update.name.clone();
        sqlx::query(
            "UPDATE devices SET \
                 name = COALESCE($1, name), \
                 folder_id = CASE WHEN $2 THEN $3 ELSE folder_id END, \
                 os_name = COALESCE($4, os_name), \
                 os_version = COALESCE($5, os_version), \
                 vendor_brand = COALESCE($6, vendor_brand), \
                 vendor_model = COALESCE($7, vendor_model), \
                 cpu_cores = COALESCE($8, cpu_cores), \
                 ram_mb = COALESCE($9, ram_mb), \
                 mac_addresses = COALESCE($10, mac_addresses), \
                 local_ips = COALESCE($11, local_ips), \
                 time_zone = COALESCE($12, time_zone), \
                 updated_at = now(), updated_by = $13 \
             WHERE id = $14",
        )
        .bind(&update.name)
        .bind(set_folder)
        .bind(new_folder)
        .bind(&update.os_name)
        .bind(&update.os_version)
        .bind(&update.vendor_brand)
        .bind(&update.vendor_model)
        .bind(update.cpu_cores)
        .bind(update.ram_mb)
        .bind(&update.mac_addresses)
        .bind(&update.local_ips)
        .bind(&update.time_zone)
        .bind(actor.id)
        .bind(device.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            ServiceError::or_name_taken(
                e,
                ServiceError::DeviceNameTaken(name.unwrap_or_default()),
            )
        })?;

        self.get_device(actor, &DeviceKey::Id(device.id)).await
    }

    pub async fn delete_device(&self, actor: &User, key: &DeviceKey) -> Result<(), ServiceError> {
        let device = self.access.can_edit_device(key, actor).await?;
        sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(device.entity_id)
            .execute(&self.pool)
            .await?;
        info!(device_id = device.id, "device deleted");
        Ok(())
    }

    /// Records a heartbeat and returns the interval, in seconds, the agent
    /// should wait before the next one.
    pub async fn heartbeat(
        &self,
        key: &DeviceKey,
        payload: HeartbeatPayload,
    ) -> Result<i64, ServiceError> {
        let device = self.access.resolve_device(key).await?;

        sqlx::query(
            "INSERT INTO heartbeats (device_id, cpu_load, mem_load_mb, free_space_mb) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(device.id)
        .bind(payload.cpu_load)
        .bind(payload.mem_load_mb)
        .bind(payload.free_space_mb)
        .execute(&self.pool)
        .await?;

        if let (Some(id), Some(pw)) = (&payload.remote_access_id, &payload.remote_access_password) {
            sqlx::query(
                "UPDATE devices SET remote_access_id = $1, remote_access_password = $2, \
                 updated_at = now() WHERE id = $3",
            )
            .bind(id)
            .bind(pw)
            .bind(device.id)
            .execute(&self.pool)
            .await?;
        }

        let interval = match device.folder_id {
            Some(folder_id) => sqlx::query_scalar::<_, i64>(
                "SELECT ts.heartbeat_s FROM folders f \
                 JOIN tenant_settings ts ON ts.tenant_id = f.tenant_id \
                 WHERE f.id = $1",
            )
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };
        Ok(interval.unwrap_or(self.config.default_heartbeat_s))
    }

    /// Issues a time-boxed share token for a device. When an OTP secret is
    /// configured, the caller must also present a valid code.
    pub async fn create_share_url(
        &self,
        actor: &User,
        key: &DeviceKey,
        expiration_minutes: i64,
        otp_code: Option<&str>,
    ) -> Result<(String, DateTime<Utc>), ServiceError> {
        let device = self.access.can_edit_device(key, actor).await?;

        if !self.config.otp_secret.is_empty() {
            let code = otp_code.ok_or(ServiceError::InvalidOtp)?;
            let now = Utc::now().timestamp() as u64;
            if !otp::verify(&self.config.otp_secret, self.config.otp_interval_s, code, now) {
                return Err(ServiceError::InvalidOtp);
            }
        }

        let (token, expires_at) = share::issue(device.id, expiration_minutes, &self.config)?;
        sqlx::query(
            "UPDATE devices SET share_url = $1, share_url_expires_at = $2, \
             updated_at = now(), updated_by = $3 WHERE id = $4",
        )
        .bind(&token)
        .bind(expires_at)
        .bind(actor.id)
        .bind(device.id)
        .execute(&self.pool)
        .await?;

        info!(device_id = device.id, "share url issued");
        Ok((token, expires_at))
    }

    /// Redeems a share token. The token must both verify and still be the
    /// one stored on the device; issuing a new share URL revokes the old one.
    pub async fn connect(&self, token: &str) -> Result<ConnectionInfo, ServiceError> {
        let claims = share::verify(token, &self.config)?;
        let device = self.access.resolve_device(&DeviceKey::Id(claims.device_id)).await?;

        if device.share_url.as_deref() != Some(token) {
            return Err(ServiceError::ExpiredShareUrl);
        }
        match (device.remote_access_id, device.remote_access_password) {
            (Some(remote_access_id), Some(remote_access_password)) => Ok(ConnectionInfo {
                remote_access_id,
                remote_access_password,
            }),
            _ => Err(ServiceError::DeviceCredentialsNotConfigured),
        }
    }

    fn to_out(&self, row: DeviceWithLiveness, now: DateTime<Utc>) -> DeviceOut {
        let heartbeat_s = row.heartbeat_s.unwrap_or(self.config.default_heartbeat_s);
        let online = is_online(
            row.device.folder_id,
            row.last_heartbeat,
            heartbeat_s,
            self.config.max_tolerance_heartbeats,
            now,
        );
        DeviceOut::new(row.device, online, row.last_heartbeat)
    }

    /// Lazily clears a share URL past its expiry so stale tokens never
    /// appear in responses.
    async fn expire_share_url(&self, device: &mut Device) -> Result<(), ServiceError> {
        let expired = matches!(device.share_url_expires_at, Some(at) if at < Utc::now());
        if device.share_url.is_some() && expired {
            sqlx::query(
                "UPDATE devices SET share_url = NULL, share_url_expires_at = NULL WHERE id = $1",
            )
            .bind(device.id)
            .execute(&self.pool)
            .await?;
            device.share_url = None;
            device.share_url_expires_at = None;
        }
        Ok(())
    }
}
