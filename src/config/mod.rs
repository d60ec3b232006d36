mod types;

pub use types::*;

use crate::error::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_PATH_VAR: &str = "BACKUP_CONFIG";

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".mongo_backup"))
        .unwrap_or_else(|| PathBuf::from(".mongo_backup"))
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Resolves the run configuration: optional TOML file, then process
/// environment on top, then validation.
pub fn load() -> Result<BackupConfig> {
    let mut config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) if !path.is_empty() => load_required(Path::new(&path))?,
        _ => load_from(&config_path())?,
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_from`], but a missing file is an error.
pub fn load_required(path: &Path) -> Result<BackupConfig> {
    if !path.exists() {
        return Err(BackupError::Config(format!(
            "{} points to {}, which does not exist",
            CONFIG_PATH_VAR,
            path.display()
        )));
    }
    load_from(path)
}

pub fn load_from(path: &Path) -> Result<BackupConfig> {
    if !path.exists() {
        debug!("Config file not found at {:?}, using defaults", path);
        return Ok(BackupConfig::default());
    }

    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path)?;
    let config: BackupConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Overlays environment values onto `config`. Empty values are treated as unset.
pub fn apply_env<F>(config: &mut BackupConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(user) = get("MONGO_USER") {
        config.database.username = user;
    }
    if let Some(password) = get("MONGO_PASSWORD") {
        config.database.password = password;
    }
    if let Some(bucket) = get("BACKUP_BUCKET") {
        config.upload.bucket = bucket;
    }
    if let Some(host) = get("MONGO_HOST") {
        config.database.host = host;
    }
    if let Some(port) = get("MONGO_PORT") {
        config.database.port = port.parse().map_err(|e| {
            BackupError::Config(format!("MONGO_PORT must be a port number: {:?}: {}", port, e))
        })?;
    }
    if let Some(name) = get("MONGO_DATABASE") {
        config.database.name = name;
    }
    if let Some(dir) = get("BACKUP_DIR") {
        config.local_backup_dir = PathBuf::from(dir);
    }
    Ok(())
}

pub fn validate(config: &BackupConfig) -> Result<()> {
    if config.database.password.is_empty() {
        return Err(BackupError::Config(
            "MONGO_PASSWORD environment variable is required".to_string(),
        ));
    }
    if config.upload.bucket.is_empty() {
        return Err(BackupError::Config(
            "BACKUP_BUCKET environment variable is required".to_string(),
        ));
    }
    if config.upload.timeout_secs == 0 {
        return Err(BackupError::Config(
            "upload.timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
