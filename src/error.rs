//! Failure taxonomy shared by the gateway, the sync engine and the exporter.
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Feedly credentials are missing; set feedly.user_id and feedly.access_token")]
    ConfigMissing,
    #[error("Feedly access token expired")]
    AuthExpired,
    #[error("Feedly rate limit reached")]
    RateLimited,
    #[error("feedly error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid Feedly response: {0}")]
    Decode(String),
    #[error("failed to reach Feedly: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("document store error: {0}")]
    Store(#[from] std::io::Error),
    #[error("checkpoint store error: {0}")]
    Checkpoint(#[from] sqlx::Error),
    #[error("failed to assemble archive: {0}")]
    Assembly(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Assembly(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::Checkpoint(err.into())
    }
}
