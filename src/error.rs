use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed hook input: {0}")]
    ProtocolParse(String),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt hierarchy: {0}")]
    CorruptHierarchy(String),

    #[error("token lookup collision")]
    TokenLookupCollision,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid permission: {0}")]
    InvalidPermission(String),
}

impl Error {
    /// Collapses infrastructure failures into `BackendUnavailable`, leaving
    /// domain outcomes (not found, denied, validation...) untouched.
    #[must_use]
    pub fn into_backend(self) -> Error {
        match self {
            Error::Database(e) => Error::BackendUnavailable(e.to_string()),
            Error::Io(e) => Error::BackendUnavailable(e.to_string()),
            Error::Config(msg) => Error::BackendUnavailable(msg),
            other => other,
        }
    }

    /// True for errors caused by the caller rather than by the system.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::ProtocolParse(_)
                | Error::AuthenticationRequired
                | Error::PermissionDenied
                | Error::NotFound(_)
                | Error::Validation(_)
                | Error::Conflict(_)
                | Error::InvalidTokenFormat
                | Error::InvalidPermission(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
