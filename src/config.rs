//! Runtime configuration from environment (`.env` is loaded by the binary via dotenvy).

use crate::error::AppError;
use std::str::FromStr;

/// Database connection settings.
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            host: "127.0.0.1".into(),
            port: 5432,
            user: "www-data".into(),
            password: "www-data".into(),
            database: "awesome".into(),
            charset: "utf8".into(),
            min_connections: 1,
            max_connections: 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db: DbConfig,
    pub session_secret: String,
    pub template_dir: String,
    pub static_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: "127.0.0.1:9000".into(),
            db: DbConfig::default(),
            session_secret: "Awesome".into(),
            template_dir: "templates".into(),
            static_dir: "static".into(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whatever is set in the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppConfig::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        Ok(AppConfig {
            bind_addr: text("BIND_ADDR", d.bind_addr),
            db: DbConfig {
                host: text("DB_HOST", d.db.host),
                port: parsed(&lookup, "DB_PORT", d.db.port)?,
                user: text("DB_USER", d.db.user),
                password: text("DB_PASSWORD", d.db.password),
                database: text("DB_NAME", d.db.database),
                charset: text("DB_CHARSET", d.db.charset),
                min_connections: parsed(&lookup, "DB_MIN_CONNECTIONS", d.db.min_connections)?,
                max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", d.db.max_connections)?,
            },
            session_secret: text("SESSION_SECRET", d.session_secret),
            template_dir: text("TEMPLATE_DIR", d.template_dir),
            static_dir: text("STATIC_DIR", d.static_dir),
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", key, raw))),
    }
}
