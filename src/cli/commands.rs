//! CLI command implementations

use anyhow::Result;
use dialoguer::Password;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::{self, AppState};
use crate::cli::{error, info, success, warn};
use crate::config::{self, loader::CONFIG_FILENAME, Config, DatabaseBackend};
use crate::db::PgStore;
use crate::models::NewUser;

/// Write a default simcha.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILENAME);

    if config_path.exists() {
        warn(&format!("{} already exists", CONFIG_FILENAME));
        return Ok(());
    }

    let content = config::loader::default_config_content();
    fs::write(config_path, content)?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("Set DB_CONNECTION and APPLICATION_SECRET, then run 'simcha serve'");

    Ok(())
}

/// Start the HTTP API server
pub async fn serve(path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(path)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info(&format!("Starting server on {}:{}", host, port));
    api::run_server(config, &host, port).await?;
    Ok(())
}

/// Create the database schema
pub async fn migrate(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;

    if config.database.backend == DatabaseBackend::Memory {
        warn("The memory backend has no schema to migrate");
        return Ok(());
    }

    let store = PgStore::connect(&config.database).await?;
    store.migrate().await?;
    success("Database schema is up to date");
    Ok(())
}

/// Create a user account, prompting for the password
pub async fn create_user(path: Option<PathBuf>, email: &str) -> Result<()> {
    let config = load_config(path)?;
    if config.database.backend == DatabaseBackend::Memory {
        warn("Users created against the memory backend vanish when this command exits");
    }

    let password = Password::new().with_prompt("Password").interact()?;
    let confirmation_password = Password::new().with_prompt("Confirm password").interact()?;

    let state = AppState::from_config(config).await?;
    let new_user = NewUser {
        email: email.to_string(),
        password,
        confirmation_password,
    };

    match state.auth.register(new_user).await {
        Ok(user) => {
            success(&format!("Created user {} (id {})", user.email, user.id));
            Ok(())
        }
        Err(e) => {
            error(&format!("Failed to create user: {}", e));
            Err(e.into())
        }
    }
}

/// Log a user out of every device
pub async fn revoke_sessions(path: Option<PathBuf>, email: &str) -> Result<()> {
    let config = load_config(path)?;
    let state = AppState::from_config(config).await?;

    let revoked = state.auth.revoke_all(email).await?;
    success(&format!("Revoked {} session(s) for {}", revoked, email));
    Ok(())
}

// Helper functions

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => config::load_config_from_path(&path),
        None => config::load_config(),
    };
    config.map_err(|e| anyhow::anyhow!("{}", e))
}
