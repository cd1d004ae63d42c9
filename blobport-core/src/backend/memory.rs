use super::{BackendParams, BackendResult, BlobBackend, BlobSink};
use crate::codec::{ByteStream, stream_from_buffer};
use crate::error::BackendError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local backend keeping every blob in a map.
///
/// Reading or removing an unknown key fails with [`BackendError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn open_read_stream(&self, key: &str) -> BackendResult<ByteStream> {
        let bytes = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.to_string()))?;

        Ok(stream_from_buffer(bytes))
    }

    async fn open_write_stream(
        &self,
        key: &str,
        _params: &BackendParams,
    ) -> BackendResult<Box<dyn BlobSink>> {
        Ok(Box::new(MemorySink {
            key: key.to_string(),
            objects: self.objects.clone(),
            staged: BytesMut::new(),
        }))
    }

    async fn remove_key(&self, key: &str) -> BackendResult<()> {
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }
}

struct MemorySink {
    key: String,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    staged: BytesMut,
}

#[async_trait]
impl BlobSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> BackendResult<()> {
        self.staged.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<()> {
        let MemorySink {
            key,
            objects,
            staged,
        } = *self;

        tracing::debug!("Stored blob {} in memory ({} bytes)", key, staged.len());
        objects.write().await.insert(key, staged.freeze());
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        tracing::debug!("Discarded staged memory blob {}", self.key);
    }
}
