use crate::backend::BackendParams;
use crate::codec::{buffer_to_hash, decode_data_uri, extension_for_mime, stream_from_buffer};
use crate::fetch::RemoteFetcher;
use crate::pipeline::{SourceStream, pipe_into_sink};
use crate::{BlobBackend, BlobError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct CreateBlobOperation {
    backend: Arc<dyn BlobBackend>,
    fetcher: Arc<dyn RemoteFetcher>,
}

#[derive(Debug, Clone)]
pub struct CreateBlobOperationRequest {
    /// Caller-chosen key; derived from the source when `None` or empty.
    pub id: Option<String>,
    pub uri: String,
    pub params: BackendParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobOrigin {
    Inline { mime_type: String },
    Remote,
}

#[derive(Debug, Clone)]
pub struct CreateBlobOperationResult {
    pub id: String,
    /// The source URI exactly as given.
    pub uri: String,
    pub size: u64,
    pub sha256: String,
    pub origin: BlobOrigin,
}

/// Remote sources are anything starting with `http`; everything else must be
/// a data URI.
pub fn is_remote_uri(uri: &str) -> bool {
    uri.starts_with("http")
}

/// Last `/`-separated segment of a remote URI.
pub fn derive_remote_id(uri: &str) -> Result<String> {
    let segment = uri.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return Err(BlobError::InvalidInput(format!(
            "cannot derive id from uri without a final path segment: {}",
            uri
        )));
    }

    Ok(segment.to_string())
}

/// `<sha256>.<extension>`, or the bare hash when the MIME type is unmapped.
pub fn derive_inline_id(buffer: &[u8], mime_type: &str) -> String {
    let hash = buffer_to_hash(buffer);
    match extension_for_mime(mime_type) {
        Some(extension) => format!("{}.{}", hash, extension),
        None => hash,
    }
}

impl CreateBlobOperation {
    pub fn new(backend: Arc<dyn BlobBackend>, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self { backend, fetcher }
    }

    pub async fn run(
        &self,
        request: CreateBlobOperationRequest,
    ) -> Result<CreateBlobOperationResult> {
        let CreateBlobOperationRequest { id, uri, params } = request;

        if uri.is_empty() {
            return Err(BlobError::InvalidInput("uri is required".to_string()));
        }

        let id = id.filter(|id| !id.is_empty());

        let (id, source, origin): (String, SourceStream, BlobOrigin) = if is_remote_uri(&uri) {
            let id = match id {
                Some(id) => id,
                None => derive_remote_id(&uri)?,
            };
            let source = self.fetcher.fetch(&uri).await?;
            (id, source, BlobOrigin::Remote)
        } else {
            let decoded = decode_data_uri(&uri)?;
            let id = id.unwrap_or_else(|| derive_inline_id(&decoded.buffer, &decoded.mime_type));
            (
                id,
                stream_from_buffer(decoded.buffer),
                BlobOrigin::Inline {
                    mime_type: decoded.mime_type,
                },
            )
        };

        let sink = self
            .backend
            .open_write_stream(&id, &params)
            .await
            .map_err(|source| BlobError::BackendWrite {
                key: id.clone(),
                source,
            })?;

        let outcome = pipe_into_sink(&id, source, sink).await?;

        tracing::debug!(
            "Stored blob {} ({} bytes, sha256={}, origin={:?})",
            id,
            outcome.size,
            outcome.sha256,
            origin
        );

        Ok(CreateBlobOperationResult {
            id,
            uri,
            size: outcome.size,
            sha256: outcome.sha256,
            origin,
        })
    }
}
