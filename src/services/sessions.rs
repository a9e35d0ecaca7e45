use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::auth::{self, password};
use crate::config::AppConfig;
use crate::models::User;

use super::error::ServiceError;

#[derive(Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    pool: PgPool,
    config: Arc<AppConfig>,
}

impl SessionService {
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Self {
        Self { pool, config }
    }

    /// Unknown username, disabled account and wrong password all collapse
    /// into the same `InvalidCredentials` so login probes learn nothing.
    pub async fn login(&self, username: &str, plain_password: &str) -> Result<SessionTokens, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if user.disabled || !password::verify(plain_password, &user.hashed_password) {
            return Err(ServiceError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&user).await?;
        info!(user_id = user.id, username = %user.username, "login");
        Ok(tokens)
    }

    /// Rotates the refresh token: the presented one is consumed whether or
    /// not it is still valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ServiceError> {
        let row = sqlx::query_as::<_, (i64, chrono::DateTime<Utc>)>(
            "SELECT user_id, expires_at FROM refresh_tokens WHERE token = $1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::RefreshTokenNotValid)?;

        let (user_id, expires_at) = row;
        self.discard(refresh_token).await?;
        if expires_at < Utc::now() {
            return Err(ServiceError::RefreshTokenNotValid);
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::RefreshTokenNotValid)?;
        if user.disabled {
            return Err(ServiceError::RefreshTokenNotValid);
        }

        self.issue_pair(&user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), ServiceError> {
        self.discard(refresh_token).await
    }

    async fn issue_pair(&self, user: &User) -> Result<SessionTokens, ServiceError> {
        let access_token = auth::issue_access_token(user, &self.config)?;
        let refresh_token = auth::new_refresh_token();
        let expires_at = Utc::now() + Duration::days(self.config.refresh_token_ttl_days);

        sqlx::query("INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&refresh_token)
            .bind(user.id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    async fn discard(&self, refresh_token: &str) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
