use std::time::Duration;

use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::fairing::AdHoc;

use crate::config::Config;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// an R2D2 connection pool
pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Builds the pool and brings the schema up to date.
pub fn init_pool(database_url: &str, pool_size: u32) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: Duration::from_secs(5),
        }))
        .build(manager)
        .with_context(|| format!("failed to create database pool for {}", database_url))?;

    let mut conn = pool.get().context("failed to check out a migration connection")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;
    for version in applied {
        log::info!("applied migration {}", version);
    }

    Ok(pool)
}

// Fairing for attaching the pool to Rocket's managed state
pub fn stage(config: &Config) -> AdHoc {
    let database_url = config.database_url.clone();
    let pool_size = config.db_pool_size;
    AdHoc::try_on_ignite("Diesel SQLite Pool", move |rocket| async move {
        match init_pool(&database_url, pool_size) {
            Ok(pool) => Ok(rocket.manage(pool)),
            Err(e) => {
                log::error!("database unavailable: {:#}", e);
                Err(rocket)
            }
        }
    })
}

/// A pool over a scratch database that is removed with the pool.
#[cfg(test)]
pub(crate) struct TestPool {
    pool: DbPool,
    _dir: tempfile::TempDir,
}

#[cfg(test)]
impl std::ops::Deref for TestPool {
    type Target = DbPool;

    fn deref(&self) -> &DbPool {
        &self.pool
    }
}

#[cfg(test)]
pub(crate) fn test_pool() -> TestPool {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("todos.sqlite3");
    let pool = init_pool(path.to_str().expect("temp path is valid UTF-8"), 2).expect("test pool");
    TestPool { pool, _dir: dir }
}
