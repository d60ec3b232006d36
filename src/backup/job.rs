use crate::backup::inspect::inspect_artifact;
use crate::backup::naming::BackupTarget;
use crate::config::{self, BackupConfig};
use crate::database::DumpProducer;
use crate::error::{BackupError, Result};
use crate::upload::{ByteSource, ObjectMetadata, ObjectUploader, UploadRequest};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug)]
pub struct BackupReport {

    pub archive_path: PathBuf,

    pub bucket: String,

    pub object_name: String,

    pub file_size: Option<u64>,

    pub bytes_uploaded: u64,

    pub local_removed: bool,

    pub duration_secs: u64,
}

pub async fn execute_backup(
    config: &BackupConfig,
    producer: &dyn DumpProducer,
    uploader: &dyn ObjectUploader,
) -> Result<BackupReport> {
    execute_backup_at(config, producer, uploader, Utc::now()).await
}

/// Runs dump, inspect, upload and cleanup for the run stamped `timestamp`.
/// The local archive is only removed after the upload commits.
pub async fn execute_backup_at(
    config: &BackupConfig,
    producer: &dyn DumpProducer,
    uploader: &dyn ObjectUploader,
    timestamp: DateTime<Utc>,
) -> Result<BackupReport> {
    config::validate(config)?;

    let start = Instant::now();
    let target = BackupTarget::new(config, timestamp);

    info!(
        "Starting {} backup to {} (run {})",
        producer.engine_name(),
        target.archive_path.display(),
        target.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    fs::create_dir_all(&config.local_backup_dir).map_err(|e| {
        BackupError::Dump(format!(
            "failed to create backup directory {}: {}",
            config.local_backup_dir.display(),
            e
        ))
    })?;

    let dump = producer
        .dump_database(&config.database, &target.archive_path)
        .await?;
    info!("Dump output: {}", dump.output.trim_end());
    info!("Backup created successfully: {}", dump.archive_path.display());

    let artifact = inspect_artifact(&dump.archive_path);

    let mut metadata = ObjectMetadata::new(Utc::now(), &config.upload.source_tag);
    metadata.sha256 = artifact.sha256;

    let request = UploadRequest {
        bucket: config.upload.bucket.clone(),
        object_name: target.object_name.clone(),
        metadata,
        size: artifact.size,
        timeout: config.upload.timeout(),
    };

    info!(
        "Uploading backup to {} bucket: {}",
        uploader.name(),
        request.bucket
    );
    let bytes_uploaded = upload_artifact(uploader, &request, &dump.archive_path).await?;
    info!(
        "Backup uploaded successfully to gs://{}/{}",
        request.bucket, request.object_name
    );

    let local_removed = match fs::remove_file(&dump.archive_path) {
        Ok(()) => {
            info!("Local backup file removed");
            true
        }
        Err(e) => {
            warn!(
                "Could not remove local backup file {}: {}",
                dump.archive_path.display(),
                e
            );
            false
        }
    };

    info!("Backup completed successfully!");

    Ok(BackupReport {
        archive_path: dump.archive_path,
        bucket: request.bucket,
        object_name: request.object_name,
        file_size: artifact.size,
        bytes_uploaded,
        local_removed,
        duration_secs: start.elapsed().as_secs(),
    })
}

async fn upload_artifact(
    uploader: &dyn ObjectUploader,
    request: &UploadRequest,
    path: &Path,
) -> Result<u64> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| BackupError::Upload(format!("failed to open file: {}", e)))?;

    let source: ByteSource = Box::new(file);

    match tokio::time::timeout(request.timeout, uploader.upload(request, source)).await {
        Ok(result) => result,
        Err(_) => Err(BackupError::Upload(format!(
            "upload of {} did not complete within {} seconds",
            request.object_name,
            request.timeout.as_secs()
        ))),
    }
}
