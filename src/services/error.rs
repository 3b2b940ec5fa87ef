use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("media storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(#[from] rocket::tokio::task::JoinError),
}

impl ServiceError {
    /// Failures the user can act on, as opposed to store-level faults.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound(_) | ServiceError::Unauthorized(_) | ServiceError::Conflict(_)
        )
    }
}
