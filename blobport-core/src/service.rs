//! Blob service facade: get, create and remove over one backend.

use crate::backend::{BackendParams, BlobBackend};
use crate::fetch::{HttpFetcher, RemoteFetcher};
use crate::operations::{
    CreateBlobOperation, CreateBlobOperationRequest, GetBlobOperation, GetBlobOperationRequest,
    RemoveBlobOperation, RemoveBlobOperationRequest,
};
use crate::{BlobError, Result};
use serde::Deserialize;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// Record field holding the blob identifier unless configured otherwise.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Result of `get` and `create`.
///
/// Serialises as `{<id_field>: id, uri, size}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub id: String,
    pub uri: String,
    pub size: u64,
    id_field: Arc<str>,
}

impl BlobRecord {
    pub fn id_field(&self) -> &str {
        &self.id_field
    }
}

impl Serialize for BlobRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.id_field.as_ref(), &self.id)?;
        map.serialize_entry("uri", &self.uri)?;
        map.serialize_entry("size", &self.size)?;
        map.end()
    }
}

/// Input to `create`: an inline data URI or a remote `http(s)` URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl SourceDescriptor {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: None,
            uri: Some(uri.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Per-call options for `create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateParams {
    /// Handed to the backend's write stream untouched.
    #[serde(default)]
    pub backend: BackendParams,
}

#[derive(Default)]
pub struct BlobServiceBuilder {
    backend: Option<Arc<dyn BlobBackend>>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    id_field: Option<String>,
}

impl BlobServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: Arc<dyn BlobBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    pub fn build(self) -> Result<BlobService> {
        let backend = self
            .backend
            .ok_or_else(|| BlobError::Config("`backend` must be provided".to_string()))?;

        let id_field = self
            .id_field
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());
        if id_field.trim().is_empty() {
            return Err(BlobError::Config("`id_field` cannot be empty".to_string()));
        }

        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));

        Ok(BlobService {
            id_field: Arc::from(id_field),
            get_blob: GetBlobOperation::new(backend.clone()),
            create_blob: CreateBlobOperation::new(backend.clone(), fetcher),
            remove_blob: RemoveBlobOperation::new(backend),
        })
    }
}

/// Stateless between calls; clones share the backend and fetcher.
#[derive(Clone)]
pub struct BlobService {
    id_field: Arc<str>,
    get_blob: GetBlobOperation,
    create_blob: CreateBlobOperation,
    remove_blob: RemoveBlobOperation,
}

impl BlobService {
    pub fn builder() -> BlobServiceBuilder {
        BlobServiceBuilder::new()
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Read a blob back as a base64 data URI.
    pub async fn get(&self, id: &str) -> Result<BlobRecord> {
        let result = self
            .get_blob
            .run(GetBlobOperationRequest { id: id.to_string() })
            .await?;

        Ok(self.record(result.id, result.uri, result.size))
    }

    /// Store the bytes behind `body.uri` and report the key they landed under.
    pub async fn create(&self, body: SourceDescriptor, params: CreateParams) -> Result<BlobRecord> {
        let SourceDescriptor { id, uri } = body;
        let uri = uri
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| BlobError::InvalidInput("uri is required".to_string()))?;

        let result = self
            .create_blob
            .run(CreateBlobOperationRequest {
                id,
                uri,
                params: params.backend,
            })
            .await?;

        tracing::info!("Created blob {} ({} bytes)", result.id, result.size);
        Ok(self.record(result.id, result.uri, result.size))
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.remove_blob
            .run(RemoveBlobOperationRequest { id: id.to_string() })
            .await?;

        tracing::info!("Removed blob {}", id);
        Ok(())
    }

    fn record(&self, id: String, uri: String, size: u64) -> BlobRecord {
        BlobRecord {
            id,
            uri,
            size,
            id_field: self.id_field.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, BlobSink, FsBackend, MemoryBackend};
    use crate::codec::{ByteStream, buffer_to_hash, decode_data_uri, encode_data_uri};
    use crate::error::BackendError;
    use crate::fetch::FetchStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned bodies; unknown URIs fail like a refused connection.
    #[derive(Default)]
    struct StubFetcher {
        bodies: HashMap<String, Vec<&'static [u8]>>,
        fail_midway: bool,
        stall_after_body: bool,
    }

    impl StubFetcher {
        fn with_body(mut self, uri: &str, chunks: Vec<&'static [u8]>) -> Self {
            self.bodies.insert(uri.to_string(), chunks);
            self
        }
    }

    #[async_trait]
    impl RemoteFetcher for StubFetcher {
        async fn fetch(&self, uri: &str) -> Result<FetchStream> {
            let chunks = self
                .bodies
                .get(uri)
                .ok_or_else(|| BlobError::Network(format!("connection refused: {}", uri)))?;

            let mut items: Vec<Result<Bytes>> = chunks
                .iter()
                .map(|chunk| Ok(Bytes::from_static(*chunk)))
                .collect();
            if self.fail_midway {
                items.push(Err(BlobError::Network("connection reset".to_string())));
            }

            if self.stall_after_body {
                return Ok(stream::iter(items).chain(stream::pending()).boxed());
            }
            Ok(stream::iter(items).boxed())
        }
    }

    /// Backend whose writes fail, counting how often a write stream is opened.
    #[derive(Default)]
    struct FailingBackend {
        opened: AtomicUsize,
    }

    struct FailingSink;

    #[async_trait]
    impl BlobSink for FailingSink {
        async fn write(&mut self, _chunk: Bytes) -> BackendResult<()> {
            Err(BackendError::Other("quota exceeded".to_string()))
        }

        async fn finish(self: Box<Self>) -> BackendResult<()> {
            Ok(())
        }

        async fn abort(self: Box<Self>) {}
    }

    #[async_trait]
    impl BlobBackend for FailingBackend {
        async fn open_read_stream(&self, key: &str) -> BackendResult<ByteStream> {
            Err(BackendError::NotFound(key.to_string()))
        }

        async fn open_write_stream(
            &self,
            _key: &str,
            _params: &BackendParams,
        ) -> BackendResult<Box<dyn BlobSink>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FailingSink))
        }

        async fn remove_key(&self, _key: &str) -> BackendResult<()> {
            Err(BackendError::Other("permission denied".to_string()))
        }
    }

    fn service_with(backend: Arc<dyn BlobBackend>, fetcher: StubFetcher) -> BlobService {
        BlobService::builder()
            .backend(backend)
            .fetcher(Arc::new(fetcher))
            .build()
            .unwrap()
    }

    fn memory_service() -> (MemoryBackend, BlobService) {
        let backend = MemoryBackend::new();
        let service = service_with(Arc::new(backend.clone()), StubFetcher::default());
        (backend, service)
    }

    #[test]
    fn test_builder_requires_backend() {
        let result = BlobService::builder().build();
        assert!(matches!(result, Err(BlobError::Config(_))));

        let result = BlobService::builder()
            .backend(Arc::new(MemoryBackend::new()))
            .id_field(" ")
            .build();
        assert!(matches!(result, Err(BlobError::Config(_))));
    }

    #[tokio::test]
    async fn test_inline_create_is_content_addressed() {
        let (_, service) = memory_service();
        let uri = encode_data_uri(b"same bytes", "image/png");

        let first = service
            .create(SourceDescriptor::new(uri.clone()), CreateParams::default())
            .await
            .unwrap();
        let second = service
            .create(SourceDescriptor::new(uri.clone()), CreateParams::default())
            .await
            .unwrap();

        assert_eq!(first.id, format!("{}.png", buffer_to_hash(b"same bytes")));
        assert_eq!(first.id, second.id);
        assert_eq!(first.uri, uri);
        assert_eq!(first.size, 10);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let (_, service) = memory_service();
        let data: Vec<u8> = (0..150_000).map(|i| (i % 253) as u8).collect();
        let uri = encode_data_uri(&data, "application/pdf");

        let created = service
            .create(SourceDescriptor::new(uri), CreateParams::default())
            .await
            .unwrap();
        assert!(created.id.ends_with(".pdf"));
        assert_eq!(created.size, data.len() as u64);

        let fetched = service.get(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.size, data.len() as u64);

        let decoded = decode_data_uri(&fetched.uri).unwrap();
        assert_eq!(decoded.mime_type, "application/pdf");
        assert_eq!(decoded.buffer.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_create_with_explicit_id_overwrites() {
        let (backend, service) = memory_service();

        for payload in [&b"first"[..], &b"second version"[..]] {
            let body = SourceDescriptor::new(encode_data_uri(payload, "text/plain"))
                .with_id("notes.txt");
            let record = service.create(body, CreateParams::default()).await.unwrap();
            assert_eq!(record.id, "notes.txt");
            assert_eq!(record.size, payload.len() as u64);
        }

        assert_eq!(backend.len().await, 1);
        let fetched = service.get("notes.txt").await.unwrap();
        assert_eq!(fetched.uri, encode_data_uri(b"second version", "text/plain"));
    }

    #[tokio::test]
    async fn test_remote_create_uses_last_path_segment() {
        let backend = MemoryBackend::new();
        let fetcher = StubFetcher::default()
            .with_body("http://host/a/b/file.png", vec![&b"remote "[..], &b"png "[..], &b"bytes"[..]]);
        let service = service_with(Arc::new(backend.clone()), fetcher);

        let record = service
            .create(
                SourceDescriptor::new("http://host/a/b/file.png"),
                CreateParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(record.id, "file.png");
        assert_eq!(record.uri, "http://host/a/b/file.png");
        assert_eq!(record.size, b"remote png bytes".len() as u64);

        let fetched = service.get("file.png").await.unwrap();
        assert_eq!(fetched.uri, encode_data_uri(b"remote png bytes", "image/png"));
    }

    #[tokio::test]
    async fn test_remote_fetch_failures_reject() {
        let backend = MemoryBackend::new();
        let fetcher = StubFetcher {
            fail_midway: true,
            ..StubFetcher::default()
        }
        .with_body("https://host/flaky.bin", vec![&b"partial"[..]]);
        let service = service_with(Arc::new(backend.clone()), fetcher);

        let result = service
            .create(
                SourceDescriptor::new("https://host/flaky.bin"),
                CreateParams::default(),
            )
            .await;
        assert!(matches!(result, Err(BlobError::Network(_))));

        let result = service
            .create(
                SourceDescriptor::new("https://host/unreachable.bin"),
                CreateParams::default(),
            )
            .await;
        assert!(matches!(result, Err(BlobError::Network(_))));

        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_missing_key_rejects_with_backend_read_error() {
        let (_, service) = memory_service();

        let error = service.get("missing-key").await.unwrap_err();
        assert!(matches!(error, BlobError::BackendRead { .. }));
        assert!(error.is_not_found());
        assert!(matches!(
            error.backend_source(),
            Some(BackendError::NotFound(key)) if key == "missing-key"
        ));
    }

    #[tokio::test]
    async fn test_remove_then_get_rejects() {
        let (_, service) = memory_service();
        let record = service
            .create(
                SourceDescriptor::new(encode_data_uri(b"short lived", "text/plain")),
                CreateParams::default(),
            )
            .await
            .unwrap();

        tokio_test::assert_ok!(service.remove(&record.id).await);

        let error = service.get(&record.id).await.unwrap_err();
        assert!(matches!(error, BlobError::BackendRead { .. }));

        // Backend decides what deleting a missing key means
        let error = service.remove(&record.id).await.unwrap_err();
        assert!(matches!(error, BlobError::BackendDelete { .. }));
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_uri_never_opens_write_stream() {
        let backend = Arc::new(FailingBackend::default());
        let service = service_with(backend.clone(), StubFetcher::default());

        let result = service
            .create(SourceDescriptor::new("not-a-uri"), CreateParams::default())
            .await;
        assert!(matches!(result, Err(BlobError::MalformedDataUri(_))));
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_uri_is_invalid_input() {
        let (_, service) = memory_service();

        for body in [
            SourceDescriptor::default(),
            SourceDescriptor::new("").with_id("x.png"),
        ] {
            let result = service.create(body, CreateParams::default()).await;
            assert!(matches!(result, Err(BlobError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_backend_failures_are_wrapped() {
        let backend = Arc::new(FailingBackend::default());
        let service = service_with(backend.clone(), StubFetcher::default());

        let error = service
            .create(
                SourceDescriptor::new(encode_data_uri(b"data", "text/plain")),
                CreateParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, BlobError::BackendWrite { .. }));
        assert_eq!(
            error.backend_source().map(|source| source.to_string()),
            Some("quota exceeded".to_string())
        );

        let error = service.remove("anything").await.unwrap_err();
        assert!(matches!(error, BlobError::BackendDelete { .. }));
        assert!(!error.is_not_found());
    }

    #[tokio::test]
    async fn test_record_serializes_with_configured_id_field() {
        let service = BlobService::builder()
            .backend(Arc::new(MemoryBackend::new()))
            .fetcher(Arc::new(StubFetcher::default()))
            .id_field("_id")
            .build()
            .unwrap();

        let record = service
            .create(
                SourceDescriptor::new("data:text/plain;base64,aGk=").with_id("hi.txt"),
                CreateParams {
                    backend: BackendParams::new(json!({"acl": "private"})),
                },
            )
            .await
            .unwrap();

        assert_eq!(record.id_field(), "_id");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"_id": "hi.txt", "uri": "data:text/plain;base64,aGk=", "size": 2})
        );
    }

    #[tokio::test]
    async fn test_dropped_create_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(temp_dir.path().to_path_buf()).unwrap();
        let fetcher = StubFetcher {
            stall_after_body: true,
            ..StubFetcher::default()
        }
        .with_body("http://host/big.bin", vec![&b"first chunk"[..]]);
        let service = service_with(Arc::new(backend), fetcher);

        let tmp_dir = temp_dir.path().join("tmp");
        let temp_files = || std::fs::read_dir(&tmp_dir).unwrap().count();

        for _ in 0..3 {
            let service = service.clone();
            let task = tokio::spawn(async move {
                service
                    .create(
                        SourceDescriptor::new("http://host/big.bin"),
                        CreateParams::default(),
                    )
                    .await
            });

            tokio::time::timeout(Duration::from_secs(5), async {
                while temp_files() == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();

            task.abort();
            assert!(task.await.unwrap_err().is_cancelled());
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while temp_files() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(!temp_dir.path().join("blobs").join("big.bin").exists());
    }
}
