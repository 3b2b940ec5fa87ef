use crate::db::DbPool;

pub mod auth;
pub mod error;
pub mod media;
pub mod todos;
pub mod users;

pub use error::ServiceError;

/// Runs a store or hashing job on the blocking thread pool so request
/// workers stay free.
pub async fn blocking<T, F>(pool: &DbPool, job: F) -> Result<T, ServiceError>
where
    F: FnOnce(&DbPool) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    rocket::tokio::task::spawn_blocking(move || job(&pool)).await?
}
