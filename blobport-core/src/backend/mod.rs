//! Storage backends for Blobport
//!
//! A backend is any key/value blob store reachable through a streaming
//! read/write contract. The service only talks to [`BlobBackend`], so the
//! in-memory, filesystem and object store implementations are
//! interchangeable.

pub mod factory;
pub mod fs;
pub mod memory;
pub mod object;

pub use factory::BackendBuilder;
pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use object::ObjectStoreBackend;

use crate::codec::ByteStream;
use crate::error::BackendError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Opaque options bag handed to [`BlobBackend::open_write_stream`].
///
/// The service never inspects it; a backend may.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendParams(Option<serde_json::Value>);

impl BackendParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self(Some(value))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        self.0.as_ref()
    }

    /// Top-level field of an object-shaped bag.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.as_ref().and_then(|value| value.get(field))
    }
}

impl From<serde_json::Value> for BackendParams {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Write half of a backend, opened per key.
///
/// Exactly one of `finish` or `abort` ends the sink. `finish` is the only
/// success signal: bytes written to a sink that is aborted or dropped must
/// not become visible under its key.
#[async_trait]
pub trait BlobSink: Send {
    /// Accept one chunk. Returns once the backend can take more.
    async fn write(&mut self, chunk: Bytes) -> BackendResult<()>;

    /// Commit everything written so far under the sink's key.
    async fn finish(self: Box<Self>) -> BackendResult<()>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>);
}

#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Open a stream over the bytes stored at `key`.
    ///
    /// Failures may surface either here or as an error item of the stream.
    async fn open_read_stream(&self, key: &str) -> BackendResult<ByteStream>;

    async fn open_write_stream(
        &self,
        key: &str,
        params: &BackendParams,
    ) -> BackendResult<Box<dyn BlobSink>>;

    /// Delete `key`. Deleting a missing key behaves however the store does.
    async fn remove_key(&self, key: &str) -> BackendResult<()>;
}
