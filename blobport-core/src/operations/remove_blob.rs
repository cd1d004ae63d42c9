use crate::{BlobBackend, BlobError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct RemoveBlobOperation {
    backend: Arc<dyn BlobBackend>,
}

#[derive(Debug, Clone)]
pub struct RemoveBlobOperationRequest {
    pub id: String,
}

impl RemoveBlobOperation {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(&self, request: RemoveBlobOperationRequest) -> Result<()> {
        let RemoveBlobOperationRequest { id } = request;

        if id.is_empty() {
            return Err(BlobError::InvalidInput("id is required".to_string()));
        }

        self.backend
            .remove_key(&id)
            .await
            .map_err(|source| BlobError::BackendDelete {
                key: id.clone(),
                source,
            })?;

        tracing::debug!("Removed blob {}", id);
        Ok(())
    }
}
