//! Signed, time-boxed share tokens granting unauthenticated access to a
//! device's remote-connection flow.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::services::error::ServiceError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareClaims {
    pub device_id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// `expiration_minutes = 0` means "use the configured maximum duration",
/// never "non-expiring". Anything above the maximum (or negative) is an
/// InvalidExpirationMinutes error.
pub fn issue(
    device_id: i64,
    expiration_minutes: i64,
    config: &AppConfig,
) -> Result<(String, DateTime<Utc>), ServiceError> {
    let minutes = match expiration_minutes {
        0 => config.share_url_max_minutes,
        m if m < 0 || m > config.share_url_max_minutes => {
            return Err(ServiceError::InvalidExpirationMinutes)
        }
        m => m,
    };

    let now = Utc::now();
    let expires_at = now + Duration::minutes(minutes);
    let claims = ShareClaims {
        device_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Internal(format!("share token encoding failed: {}", e)))?;

    Ok((token, expires_at))
}

pub fn verify(token: &str, config: &AppConfig) -> Result<ShareClaims, ServiceError> {
    decode::<ShareClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::ExpiredShareUrl,
        _ => ServiceError::NotAuthenticated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: String::new(),
            jwt_secret: "share-secret".into(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
            default_heartbeat_s: 300,
            max_tolerance_heartbeats: 2,
            share_url_max_minutes: 60,
            otp_secret: String::new(),
            otp_interval_s: 30,
            admin_password: "admin".into(),
        }
    }

    #[test]
    fn round_trip_carries_device_id() {
        let config = test_config();
        let (token, expires_at) = issue(42, 15, &config).unwrap();
        let claims = verify(&token, &config).unwrap();
        assert_eq!(claims.device_id, 42);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn zero_minutes_means_configured_maximum() {
        let config = test_config();
        let (_, expires_at) = issue(1, 0, &config).unwrap();
        let delta = expires_at - Utc::now();
        assert!(delta > Duration::minutes(59) && delta <= Duration::minutes(60));
    }

    #[test]
    fn over_maximum_is_rejected() {
        let config = test_config();
        assert!(matches!(
            issue(1, 61, &config),
            Err(ServiceError::InvalidExpirationMinutes)
        ));
        assert!(matches!(
            issue(1, -5, &config),
            Err(ServiceError::InvalidExpirationMinutes)
        ));
    }

    #[test]
    fn expired_token_reports_expired_share_url() {
        let config = test_config();
        // Hand-roll a token whose exp is far enough in the past to clear
        // the default validation leeway.
        let now = Utc::now();
        let claims = ShareClaims {
            device_id: 9,
            iat: (now - Duration::minutes(30)).timestamp(),
            exp: (now - Duration::minutes(10)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify(&token, &config),
            Err(ServiceError::ExpiredShareUrl)
        ));
    }
}
