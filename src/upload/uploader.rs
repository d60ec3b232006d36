use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::AsyncRead;

pub const GZIP_CONTENT_TYPE: &str = "application/gzip";

pub type ByteSource = Box<dyn AsyncRead + Send + Sync + Unpin>;

#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub created: DateTime<Utc>,
    pub source: String,
    pub sha256: Option<String>,
}

impl ObjectMetadata {
    pub fn new(created: DateTime<Utc>, source: &str) -> Self {
        Self {
            content_type: GZIP_CONTENT_TYPE.to_string(),
            created,
            source: source.to_string(),
            sha256: None,
        }
    }

    /// Custom key/value pairs stored on the object alongside its content type.
    pub fn custom(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(
            "created".to_string(),
            self.created.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        map.insert("source".to_string(), self.source.clone());
        if let Some(hash) = &self.sha256 {
            map.insert("sha256".to_string(), hash.clone());
        }
        map
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bucket: String,
    pub object_name: String,
    pub metadata: ObjectMetadata,
    /// Known length of the byte source, if the artifact could be inspected.
    pub size: Option<u64>,
    pub timeout: Duration,
}

/// Streams `source` into `bucket/object_name` and commits it. The object must
/// not become visible unless the commit succeeds. Returns bytes written.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest, source: ByteSource) -> Result<u64>;
    fn name(&self) -> &'static str;
}
