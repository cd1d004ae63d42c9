use super::{BackendParams, BackendResult, BlobBackend, BlobSink};
use crate::codec::ByteStream;
use crate::error::BackendError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Field of the params bag this backend maps to the object's content type.
pub const CONTENT_TYPE_PARAM: &str = "content_type";

/// Backend over any `object_store` implementation (S3, local disk, memory).
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: None,
        }
    }

    /// Store every key below `prefix`.
    pub fn with_prefix(mut self, prefix: &str) -> BackendResult<Self> {
        let prefix = Path::parse(prefix)
            .map_err(|error| BackendError::InvalidKey(format!("{}: {}", prefix, error)))?;
        self.prefix = Some(prefix);
        Ok(self)
    }

    fn location(&self, key: &str) -> BackendResult<Path> {
        let path = Path::parse(key)
            .map_err(|error| BackendError::InvalidKey(format!("{}: {}", key, error)))?;
        if path.parts().next().is_none() {
            return Err(BackendError::InvalidKey(key.to_string()));
        }

        Ok(match &self.prefix {
            Some(prefix) => prefix.parts().chain(path.parts()).collect(),
            None => path,
        })
    }
}

#[async_trait]
impl BlobBackend for ObjectStoreBackend {
    async fn open_read_stream(&self, key: &str) -> BackendResult<ByteStream> {
        let location = self.location(key)?;
        let result = self.store.get(&location).await?;
        Ok(result.into_stream().map_err(BackendError::from).boxed())
    }

    async fn open_write_stream(
        &self,
        key: &str,
        params: &BackendParams,
    ) -> BackendResult<Box<dyn BlobSink>> {
        let location = self.location(key)?;

        let mut writer = BufWriter::new(self.store.clone(), location);
        if let Some(content_type) = params.get(CONTENT_TYPE_PARAM).and_then(|v| v.as_str()) {
            let mut attributes = Attributes::new();
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
            writer = writer.with_attributes(attributes);
        }

        Ok(Box::new(ObjectSink {
            key: key.to_string(),
            writer,
        }))
    }

    async fn remove_key(&self, key: &str) -> BackendResult<()> {
        let location = self.location(key)?;
        self.store.delete(&location).await?;
        Ok(())
    }
}

struct ObjectSink {
    key: String,
    writer: BufWriter,
}

#[async_trait]
impl BlobSink for ObjectSink {
    async fn write(&mut self, chunk: Bytes) -> BackendResult<()> {
        self.writer.write_all(&chunk).await?;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<()> {
        let ObjectSink { key, mut writer } = *self;
        writer.shutdown().await?;
        tracing::debug!("Stored blob {} in object store", key);
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        let ObjectSink { key, mut writer } = *self;
        if let Err(error) = writer.abort().await {
            tracing::warn!(
                "Failed to abort object store upload. key={} error={}",
                key,
                error
            );
        }
    }
}
