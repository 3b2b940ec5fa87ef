use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Application settings that live outside Rocket's own figment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub media_root: PathBuf,
    pub template_dir: PathBuf,
    pub session_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "todos.sqlite3".to_string(),
            db_pool_size: 8,
            media_root: PathBuf::from("media"),
            template_dir: PathBuf::from("templates"),
            session_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let db_pool_size = parse(&lookup, "DATABASE_POOL_SIZE", defaults.db_pool_size)?;
        if db_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_POOL_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }

        let session_ttl_hours = parse(&lookup, "SESSION_TTL_HOURS", defaults.session_ttl_hours)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        let bcrypt_cost = parse(&lookup, "BCRYPT_COST", defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: format!("{} is outside 4..=31", bcrypt_cost),
            });
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            db_pool_size,
            media_root: lookup("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root),
            template_dir: lookup("TEMPLATE_DIR").map(PathBuf::from).unwrap_or(defaults.template_dir),
            session_ttl_hours,
            bcrypt_cost,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "todos.sqlite3");
        assert_eq!(config.db_pool_size, 8);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = config_from(&[
            ("DATABASE_URL", "/tmp/app.db"),
            ("DATABASE_POOL_SIZE", "2"),
            ("MEDIA_ROOT", "/srv/media"),
            ("SESSION_TTL_HOURS", "1"),
            ("BCRYPT_COST", "4"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "/tmp/app.db");
        assert_eq!(config.db_pool_size, 2);
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.session_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(config_from(&[("BCRYPT_COST", "3")]).is_err());
        assert!(config_from(&[("DATABASE_POOL_SIZE", "0")]).is_err());
        assert!(config_from(&[("SESSION_TTL_HOURS", "-5")]).is_err());
        assert!(config_from(&[("DATABASE_POOL_SIZE", "many")]).is_err());
    }
}
