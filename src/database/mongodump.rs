use super::driver::{DumpOutput, DumpProducer};
use crate::config::{DatabaseConfig, DumpConfig};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub struct MongoDumpProducer {
    program: String,
}

impl MongoDumpProducer {
    pub fn new(config: &DumpConfig) -> Self {
        Self {
            program: config.program.clone(),
        }
    }

    fn command_args(db: &DatabaseConfig, archive_path: &Path) -> Vec<String> {
        vec![
            "--host".to_string(),
            db.host.clone(),
            "--port".to_string(),
            db.port.to_string(),
            "--username".to_string(),
            db.username.clone(),
            "--password".to_string(),
            db.password.clone(),
            "--authenticationDatabase".to_string(),
            db.auth_database.clone(),
            format!("--archive={}", archive_path.display()),
            "--gzip".to_string(),
        ]
    }

    fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
        let mut combined = String::from_utf8_lossy(stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(stderr));
        combined
    }
}

#[async_trait]
impl DumpProducer for MongoDumpProducer {
    async fn dump_database(&self, db: &DatabaseConfig, archive_path: &Path) -> Result<DumpOutput> {
        info!(
            "Running {} for database {} on {}:{}",
            self.program, db.name, db.host, db.port
        );

        let output = Command::new(&self.program)
            .args(Self::command_args(db, archive_path))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BackupError::Dump(format!("failed to execute {}: {}", self.program, e)))?;

        let combined = Self::combine_output(&output.stdout, &output.stderr);

        if !output.status.success() {
            return Err(BackupError::Dump(format!(
                "{} error: {}, output: {}",
                self.program, output.status, combined
            )));
        }

        debug!("{} finished with {}", self.program, output.status);

        Ok(DumpOutput {
            archive_path: archive_path.to_path_buf(),
            output: combined,
        })
    }

    fn engine_name(&self) -> &'static str {
        "MongoDB"
    }
}
