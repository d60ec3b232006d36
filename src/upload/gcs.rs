use super::uploader::{ByteSource, ObjectUploader, UploadRequest};
use crate::config::UploadConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

pub struct GcsUploader {
    endpoint: String,
    anonymous: bool,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    name: String,
    bucket: String,
    #[serde(default)]
    size: Option<String>,
}

impl GcsUploader {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("mongo-gcs-backup/1.0")
            .build()
            .map_err(|e| BackupError::Upload(format!("failed to create storage client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            anonymous: config.anonymous,
            client,
        })
    }

    fn session_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }

    fn object_resource(request: &UploadRequest) -> serde_json::Value {
        serde_json::json!({
            "name": request.object_name,
            "contentType": request.metadata.content_type,
            "metadata": request.metadata.custom(),
        })
    }

    async fn access_token(&self) -> Result<Option<String>> {
        if self.anonymous {
            return Ok(None);
        }

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.is_empty() {
                debug!("Using access token from {}", TOKEN_ENV_VAR);
                return Ok(Some(token));
            }
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| BackupError::Upload(format!("failed to create storage client: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::Upload(format!(
                "failed to create storage client: metadata server returned {} - {}",
                status, text
            )));
        }

        let token: AccessToken = response.json().await?;
        Ok(Some(token.access_token))
    }

    async fn start_session(&self, token: Option<&str>, request: &UploadRequest) -> Result<String> {
        let mut builder = self
            .client
            .post(self.session_url(&request.bucket))
            .query(&[("uploadType", "resumable"), ("name", request.object_name.as_str())])
            .header("X-Upload-Content-Type", request.metadata.content_type.as_str())
            .timeout(request.timeout)
            .json(&Self::object_resource(request));

        if let Some(size) = request.size {
            builder = builder.header("X-Upload-Content-Length", size);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackupError::Upload(format!("failed to open GCS writer: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::Upload(format!(
                "failed to open GCS writer for gs://{}/{}: {} - {}",
                request.bucket, request.object_name, status, text
            )));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                BackupError::Upload("failed to open GCS writer: no upload session returned".to_string())
            })
    }

    async fn put_content(
        &self,
        token: Option<&str>,
        session_uri: &str,
        request: &UploadRequest,
        source: ByteSource,
    ) -> Result<u64> {
        let written = Arc::new(AtomicU64::new(0));
        let counter = written.clone();
        let stream = ReaderStream::new(source).inspect_ok(move |chunk| {
            counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        });

        let mut builder = self
            .client
            .put(session_uri)
            .header(CONTENT_TYPE, request.metadata.content_type.as_str())
            .timeout(request.timeout)
            .body(Body::wrap_stream(stream));

        if let Some(size) = request.size {
            builder = builder.header(CONTENT_LENGTH, size);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackupError::Upload(format!("failed to write to GCS: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::Upload(format!(
                "failed to close GCS writer: {} - {}",
                status, text
            )));
        }

        let stored: StoredObject = response
            .json()
            .await
            .map_err(|e| BackupError::Upload(format!("failed to close GCS writer: {}", e)))?;
        debug!(
            "GCS committed gs://{}/{} ({} bytes reported)",
            stored.bucket,
            stored.name,
            stored.size.as_deref().unwrap_or("?")
        );

        Ok(written.load(Ordering::Relaxed))
    }

    /// Drops an unfinished session so no partial object lingers server-side.
    async fn cancel_session(&self, token: Option<&str>, session_uri: &str) {
        let mut builder = self.client.delete(session_uri).header(CONTENT_LENGTH, 0);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        match builder.send().await {
            Ok(response) => debug!("Upload session cancel returned {}", response.status()),
            Err(e) => warn!("Could not cancel upload session: {}", e),
        }
    }
}

#[async_trait]
impl ObjectUploader for GcsUploader {
    async fn upload(&self, request: &UploadRequest, source: ByteSource) -> Result<u64> {
        let token = self.access_token().await?;
        let token = token.as_deref();

        let session_uri = self.start_session(token, request).await?;
        debug!("Opened resumable upload session for {}", request.object_name);

        match self.put_content(token, &session_uri, request, source).await {
            Ok(written) => {
                info!("Uploaded {} bytes to GCS", written);
                Ok(written)
            }
            Err(e) => {
                self.cancel_session(token, &session_uri).await;
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Google Cloud Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::ObjectMetadata;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION_PATH: &str = "/upload/session/abc";

    fn request() -> UploadRequest {
        UploadRequest {
            bucket: "my-bucket".to_string(),
            object_name: "backup-20240102030405.gz".to_string(),
            metadata: ObjectMetadata::new(
                Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                "mongodb-backup-script",
            ),
            size: Some(0),
            timeout: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_session_url_trims_endpoint() {
        let uploader = GcsUploader::new(&UploadConfig {
            endpoint: "http://localhost:4443/".to_string(),
            ..UploadConfig::default()
        })
        .unwrap();

        assert_eq!(
            uploader.session_url("my-bucket"),
            "http://localhost:4443/upload/storage/v1/b/my-bucket/o"
        );
    }

    #[test]
    fn test_object_resource() {
        let resource = GcsUploader::object_resource(&request());

        assert_eq!(resource["name"], "backup-20240102030405.gz");
        assert_eq!(resource["contentType"], "application/gzip");
        assert_eq!(resource["metadata"]["created"], "2024-01-02T03:04:05Z");
        assert_eq!(resource["metadata"]["source"], "mongodb-backup-script");
    }

    #[tokio::test]
    async fn test_anonymous_skips_token_lookup() {
        let uploader = GcsUploader::new(&UploadConfig {
            anonymous: true,
            ..UploadConfig::default()
        })
        .unwrap();

        assert_eq!(uploader.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_to_open_writer() {
        let uploader = GcsUploader::new(&UploadConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            anonymous: true,
            ..UploadConfig::default()
        })
        .unwrap();

        let source: ByteSource = Box::new(tokio::io::empty());
        match uploader.upload(&request(), source).await {
            Err(BackupError::Upload(msg)) => assert!(msg.contains("failed to open GCS writer")),
            other => panic!("expected upload error, got {:?}", other),
        }
    }

    fn sized_request(size: Option<u64>) -> UploadRequest {
        UploadRequest {
            size,
            ..request()
        }
    }

    fn uploader_for(server: &MockServer) -> GcsUploader {
        GcsUploader::new(&UploadConfig {
            endpoint: server.uri(),
            anonymous: true,
            ..UploadConfig::default()
        })
        .unwrap()
    }

    fn source(bytes: &[u8]) -> ByteSource {
        Box::new(Cursor::new(bytes.to_vec()))
    }

    async fn mount_session(server: &MockServer, expected_size: Option<&str>) {
        let mut mock = Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/my-bucket/o"))
            .and(query_param("uploadType", "resumable"))
            .and(query_param("name", "backup-20240102030405.gz"))
            .and(header("x-upload-content-type", "application/gzip"))
            .and(body_partial_json(serde_json::json!({
                "name": "backup-20240102030405.gz",
                "contentType": "application/gzip",
                "metadata": { "source": "mongodb-backup-script" },
            })));
        if let Some(size) = expected_size {
            mock = mock.and(header("x-upload-content-length", size));
        }

        mock.respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}{}", server.uri(), SESSION_PATH)),
        )
        .expect(1)
        .mount(server)
        .await;
    }

    fn stored_object(size: &str) -> serde_json::Value {
        serde_json::json!({
            "name": "backup-20240102030405.gz",
            "bucket": "my-bucket",
            "size": size,
        })
    }

    #[tokio::test]
    async fn test_resumable_upload_commits_and_counts_bytes() {
        let server = MockServer::start().await;
        mount_session(&server, Some("5")).await;
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .and(header("content-type", "application/gzip"))
            .and(header("content-length", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_object("5")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(499))
            .expect(0)
            .mount(&server)
            .await;

        let written = uploader_for(&server)
            .upload(&sized_request(Some(5)), source(b"hello"))
            .await
            .unwrap();

        assert_eq!(written, 5);
        let put = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.method.as_str() == "PUT")
            .unwrap();
        assert_eq!(put.body, b"hello");
    }

    #[tokio::test]
    async fn test_failed_commit_cancels_session() {
        let server = MockServer::start().await;
        mount_session(&server, Some("5")).await;
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(499))
            .expect(1)
            .mount(&server)
            .await;

        let result = uploader_for(&server)
            .upload(&sized_request(Some(5)), source(b"hello"))
            .await;

        match result {
            Err(BackupError::Upload(msg)) => {
                assert!(msg.starts_with("failed to close GCS writer"), "{}", msg);
                assert!(msg.contains("503"));
                assert!(msg.contains("nope"));
            }
            other => panic!("expected upload error, got {:?}", other),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_missing_session_location_fails_to_open_writer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        match uploader_for(&server).upload(&request(), source(b"")).await {
            Err(BackupError::Upload(msg)) => assert!(msg.contains("no upload session")),
            other => panic!("expected upload error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_size_streams_without_content_length() {
        let server = MockServer::start().await;
        mount_session(&server, None).await;
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_object("11")))
            .expect(1)
            .mount(&server)
            .await;

        let written = uploader_for(&server)
            .upload(&sized_request(None), source(b"hello world"))
            .await
            .unwrap();

        assert_eq!(written, 11);
        let requests = server.received_requests().await.unwrap();
        let post = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
        assert!(!post.headers.contains_key("x-upload-content-length"));
        let put = requests.iter().find(|r| r.method.as_str() == "PUT").unwrap();
        assert!(!put.headers.contains_key("content-length"));
        assert_eq!(put.body, b"hello world");
    }
}
