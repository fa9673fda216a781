//! Configuration loading and environment variable interpolation

use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Config, DatabaseBackend};

pub const CONFIG_FILENAME: &str = "simcha.toml";

/// Shortest signing secret accepted, in bytes
const MIN_SECRET_LEN: usize = 32;

/// Accepted range for `auth.cookie_max_age_days`
pub const COOKIE_MAX_AGE_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

/// Load configuration from simcha.toml
pub fn load_config() -> Result<Config> {
    let config_path = find_config_file()?;
    load_config_from_path(&config_path)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|_| Error::ConfigNotFound)?;
    let content = interpolate_env_vars(&content);
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations the server cannot safely run with
pub fn validate(config: &Config) -> Result<()> {
    if config.auth.secret.len() < MIN_SECRET_LEN {
        return Err(Error::Config(format!(
            "auth.secret must be at least {} bytes",
            MIN_SECRET_LEN
        )));
    }

    if !(4..=31).contains(&config.auth.bcrypt_cost) {
        return Err(Error::Config(format!(
            "auth.bcrypt_cost must be between 4 and 31, got {}",
            config.auth.bcrypt_cost
        )));
    }

    if !COOKIE_MAX_AGE_DAYS.contains(&config.auth.cookie_max_age_days) {
        return Err(Error::Config(format!(
            "auth.cookie_max_age_days must be between {} and {}, got {}",
            COOKIE_MAX_AGE_DAYS.start(),
            COOKIE_MAX_AGE_DAYS.end(),
            config.auth.cookie_max_age_days
        )));
    }

    if config.database.pool_size == 0 {
        return Err(Error::Config("database.pool_size must be at least 1".to_string()));
    }

    if config.database.backend == DatabaseBackend::Postgres && config.database.url.is_empty() {
        return Err(Error::Config(
            "database.url is required for the postgres backend".to_string(),
        ));
    }

    Ok(())
}

/// Find the configuration file, searching upward from current directory
fn find_config_file() -> Result<PathBuf> {
    let mut current = env::current_dir().map_err(|e| Error::Config(e.to_string()))?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(Error::ConfigNotFound);
        }
    }
}

/// Interpolate environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn interpolate_env_vars(content: &str) -> String {
    // Constant pattern
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern - this is a bug in the codebase");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Generate a default configuration file content
pub fn default_config_content() -> &'static str {
    r#"# Simcha Configuration

[server]
host = "0.0.0.0"
port = 3000
# Origin of the front end, enables credentialed CORS
# allowed_origin = "${DOMAIN}"

[database]
backend = "postgres"  # or "memory" for throwaway local runs
url = "${DB_CONNECTION}"
query_timeout_secs = 5
pool_size = 16

[auth]
# Signs the session cookie, at least 32 bytes
secret = "${APPLICATION_SECRET}"
bcrypt_cost = 12
cookie_name = "session"
cookie_secure = false
cookie_max_age_days = 30
"#
}
