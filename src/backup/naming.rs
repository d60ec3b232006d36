use crate::config::BackupConfig;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::PathBuf;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const ARCHIVE_EXTENSION: &str = "gz";

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn archive_name(prefix: &str, stamp: &str) -> String {
    format!("{}-{}.{}", prefix, stamp, ARCHIVE_EXTENSION)
}

/// Recovers the run timestamp from a name produced by [`archive_name`].
pub fn parse_archive_name(prefix: &str, name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')?;

    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Local and remote names for a single run, both derived from one timestamp.
#[derive(Debug, Clone)]
pub struct BackupTarget {
    pub timestamp: DateTime<Utc>,
    pub archive_path: PathBuf,
    pub object_name: String,
}

impl BackupTarget {
    pub fn new(config: &BackupConfig, timestamp: DateTime<Utc>) -> Self {
        let stamp = format_timestamp(timestamp);
        Self {
            timestamp,
            archive_path: config
                .local_backup_dir
                .join(archive_name(&config.dump.file_prefix, &stamp)),
            object_name: archive_name(&config.upload.object_prefix, &stamp),
        }
    }
}
