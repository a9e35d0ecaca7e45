use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::User;
use crate::services::error::ServiceError;

pub mod otp;
pub mod password;
pub mod share;

/// Access-token claims: a signed snapshot of the authenticated user.
/// Refresh tokens are deliberately not JWTs; they are opaque random strings
/// persisted server-side and looked up by value.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub username: String,
    pub role_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_access_token(user: &User, config: &AppConfig) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role_id: user.role_id,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(config.access_token_ttl_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Internal(format!("token encoding failed: {}", e)))
}

pub fn verify_access_token(token: &str, config: &AppConfig) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ServiceError::NotAuthenticated)
}

/// 32 bytes of OS randomness, URL-safe base64. Looked up by value, so the
/// string itself is the whole credential.
pub fn new_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Audit;

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: String::new(),
            jwt_secret: "test-secret".into(),
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

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "carol".into(),
            hashed_password: String::new(),
            disabled: false,
            entity_id: 1,
            role_id: Some(2),
            audit: Audit {
                created_at: now,
                updated_at: now,
                created_by: None,
                updated_by: None,
            },
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = test_config();
        let token = issue_access_token(&test_user(), &config).unwrap();
        let claims = verify_access_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "carol");
        assert_eq!(claims.role_id, Some(2));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "different".into();
        let token = issue_access_token(&test_user(), &other).unwrap();
        assert!(matches!(
            verify_access_token(&token, &config),
            Err(ServiceError::NotAuthenticated)
        ));
    }

    #[test]
    fn refresh_tokens_are_unique_and_opaque() {
        let a = new_refresh_token();
        let b = new_refresh_token();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
    }
}
