use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),
    #[error("STORAGE_WRITE_FAILED: {0}")]
    StorageWriteFailed(String),
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("UNAUTHENTICATED: {0}")]
    Unauthenticated(String),
    #[error("UNSUPPORTED: {0}")]
    Unsupported(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn into_write_failure(self) -> Self {
        match self {
            Self::StorageUnavailable(message) => Self::StorageWriteFailed(message),
            other => other,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
