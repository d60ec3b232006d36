use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DumpOutput {
    pub archive_path: PathBuf,
    /// Combined stdout and stderr of the dump tool.
    pub output: String,
}

/// Writes a compressed archive of `db` to `archive_path`. Any error is fatal for the run.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    async fn dump_database(&self, db: &DatabaseConfig, archive_path: &Path) -> Result<DumpOutput>;
    fn engine_name(&self) -> &'static str;
}
