use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 10 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    pub auth_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            name: "go-mongodb".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            auth_database: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Executable invoked to produce the archive.
    pub program: String,
    pub file_prefix: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            program: "mongodump".to_string(),
            file_prefix: "mongodb-backup".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: String,
    pub object_prefix: String,
    pub source_tag: String,
    pub timeout_secs: u64,
    /// Base URL of the storage JSON API, overridable for emulators.
    pub endpoint: String,
    /// Skip bearer-token lookup entirely.
    pub anonymous: bool,
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            object_prefix: "backup".to_string(),
            source_tag: "mongodb-backup-script".to_string(),
            timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            endpoint: "https://storage.googleapis.com".to_string(),
            anonymous: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default = "default_backup_dir")]
    pub local_backup_dir: PathBuf,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dump: DumpConfig::default(),
            upload: UploadConfig::default(),
            local_backup_dir: default_backup_dir(),
        }
    }
}
