//! Error shared by the repository traits (chat, applications, alerts).

use crate::errors::AppError;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => AppError::Conflict("Record already exists".to_string()),
            RepositoryError::NotFound => AppError::NotFound("Record not found".to_string()),
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}
