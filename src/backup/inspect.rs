use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ArtifactInfo {
    pub size: Option<u64>,
    pub sha256: Option<String>,
}

/// Best-effort size and checksum of the dump. Failures are logged, never returned.
pub fn inspect_artifact(path: &Path) -> ArtifactInfo {
    let size = match std::fs::metadata(path) {
        Ok(meta) => {
            let len = meta.len();
            info!(
                "Backup size: {} bytes ({:.2} MB)",
                len,
                len as f64 / 1024.0 / 1024.0
            );
            Some(len)
        }
        Err(e) => {
            warn!("Could not get file size: {}", e);
            None
        }
    };

    let sha256 = match calculate_sha256(path) {
        Ok(hash) => {
            info!("Backup SHA256: {}", hash);
            Some(hash)
        }
        Err(e) => {
            warn!("Could not checksum backup file: {}", e);
            None
        }
    };

    ArtifactInfo { size, sha256 }
}

pub fn calculate_sha256(file_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
