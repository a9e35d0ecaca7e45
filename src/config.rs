use std::env;
use std::str::FromStr;

/// Process-wide configuration, built once in `main` and passed by reference
/// through `AppState` into the services that need it. There is deliberately
/// no global config singleton.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// Default expected seconds between device heartbeats, used when a
    /// tenant has no settings row yet.
    pub default_heartbeat_s: i64,
    /// Dimensionless multiplier: how many heartbeat intervals a device may
    /// miss before it is considered offline.
    pub max_tolerance_heartbeats: i64,
    /// Upper bound for share-URL lifetimes; also the value used when a
    /// caller passes expiration_minutes = 0.
    pub share_url_max_minutes: i64,
    pub otp_secret: String,
    pub otp_interval_s: u64,
    /// Password for the bootstrap admin account created on an empty database.
    pub admin_password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_or("FLEET_PORT", 3000)?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            jwt_secret: env::var("FLEET_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("FLEET_JWT_SECRET"))?,
            access_token_ttl_minutes: env_or("FLEET_ACCESS_TOKEN_TTL_MINUTES", 60)?,
            refresh_token_ttl_days: env_or("FLEET_REFRESH_TOKEN_TTL_DAYS", 30)?,
            default_heartbeat_s: env_or("FLEET_DEFAULT_HEARTBEAT_S", 300)?,
            max_tolerance_heartbeats: env_or("FLEET_MAX_TOLERANCE_HEARTBEATS", 2)?,
            share_url_max_minutes: env_or("FLEET_SHARE_URL_MAX_MINUTES", 60)?,
            otp_secret: env::var("FLEET_OTP_SECRET").unwrap_or_default(),
            otp_interval_s: env_or("FLEET_OTP_INTERVAL_S", 30)?,
            admin_password: env::var("FLEET_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".into()),
        })
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or::<i64>("FLEET_TEST_UNSET_KEY", 42).unwrap(), 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        std::env::set_var("FLEET_TEST_GARBAGE_KEY", "not-a-number");
        assert!(env_or::<i64>("FLEET_TEST_GARBAGE_KEY", 0).is_err());
        std::env::remove_var("FLEET_TEST_GARBAGE_KEY");
    }
}
