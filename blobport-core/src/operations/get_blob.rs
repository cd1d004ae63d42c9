use crate::codec::{DEFAULT_MIME_TYPE, encode_data_uri, mime_for_key};
use crate::{BlobBackend, BlobError, Result};
use bytes::BytesMut;
use futures_util::StreamExt;
use std::sync::Arc;

#[derive(Clone)]
pub struct GetBlobOperation {
    backend: Arc<dyn BlobBackend>,
}

#[derive(Debug, Clone)]
pub struct GetBlobOperationRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct GetBlobOperationResult {
    pub id: String,
    pub uri: String,
    pub mime_type: String,
    pub size: u64,
}

impl GetBlobOperation {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(&self, request: GetBlobOperationRequest) -> Result<GetBlobOperationResult> {
        let GetBlobOperationRequest { id } = request;

        if id.is_empty() {
            return Err(BlobError::InvalidInput("id is required".to_string()));
        }

        let mime_type = mime_for_key(&id).unwrap_or(DEFAULT_MIME_TYPE);

        let mut stream = self
            .backend
            .open_read_stream(&id)
            .await
            .map_err(|source| BlobError::BackendRead {
                key: id.clone(),
                source,
            })?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| BlobError::BackendRead {
                key: id.clone(),
                source,
            })?;
            buffer.extend_from_slice(&chunk);
        }

        let size = buffer.len() as u64;
        let uri = encode_data_uri(&buffer, mime_type);

        tracing::debug!("Read blob {} ({} bytes, {})", id, size, mime_type);

        Ok(GetBlobOperationResult {
            id,
            uri,
            mime_type: mime_type.to_string(),
            size,
        })
    }
}
