use thiserror::Error;

/// Domain error taxonomy. Every service operation fails fast with one of
/// these before any mutation begins ("sanity checks" convention); the HTTP
/// layer maps them onto status codes in `crate::error`.
#[derive(Debug, Error)]
pub enum ServiceError {
    // Resource resolution failures (404).
    #[error("tenant not found")]
    TenantNotFound,
    #[error("folder not found")]
    FolderNotFound,
    #[error("device not found")]
    DeviceNotFound,
    #[error("tag not found")]
    TagNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("role not found")]
    RoleNotFound,

    // Business-rule violations (400).
    #[error("a tag named '{0}' already exists")]
    TagNameTaken(String),
    #[error("a folder named '{0}' already exists")]
    FolderNameTaken(String),
    #[error("a device named '{0}' already exists")]
    DeviceNameTaken(String),
    #[error("a tenant named '{0}' already exists")]
    TenantNameTaken(String),
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("invalid password")]
    InvalidPassword,
    #[error("invalid expiration minutes")]
    InvalidExpirationMinutes,
    #[error("heartbeat interval must be positive")]
    InvalidHeartbeatInterval,

    // Authentication vs. authorization: distinct kinds, never conflated.
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("permission denied")]
    PermissionDenied,

    // Domain-specific terminal conditions.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("refresh token is not valid")]
    RefreshTokenNotValid,
    #[error("invalid one-time code")]
    InvalidOtp,
    #[error("share URL has expired")]
    ExpiredShareUrl,
    #[error("device remote-access credentials are not configured")]
    DeviceCredentialsNotConfigured,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Map a unique-constraint violation onto the canonical NameTaken error
    /// for the operation; the database constraint is the authoritative guard
    /// behind every check-then-insert path.
    pub fn or_name_taken(err: sqlx::Error, taken: ServiceError) -> ServiceError {
        if let sqlx::Error::Database(ref db) = err {
            if db.kind() == sqlx::error::ErrorKind::UniqueViolation {
                return taken;
            }
        }
        ServiceError::Database(err)
    }
}
