mod gcs;
mod uploader;

pub use gcs::GcsUploader;
pub use uploader::{ByteSource, ObjectMetadata, ObjectUploader, UploadRequest, GZIP_CONTENT_TYPE};

use crate::config::UploadConfig;
use crate::error::Result;

pub fn create_uploader(config: &UploadConfig) -> Result<Box<dyn ObjectUploader>> {
    Ok(Box::new(GcsUploader::new(config)?))
}
