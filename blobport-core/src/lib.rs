//! Blobport Core - content-addressed blob adapter over key/value backends
//!
//! Exposes get / create / remove over any streaming blob backend:
//! - Blobs come in as base64 data URIs or remote http(s) resources
//! - Inline blobs are keyed by the SHA256 of their bytes
//! - Bytes stream through a bounded, cancellable count/hash pipeline
//! - Reads come back as data URIs typed by the key's extension

pub mod backend;
pub mod codec;
pub mod error;
pub mod fetch;
pub mod operations;
pub mod pipeline;
pub mod service;

pub use backend::{
    BackendBuilder, BackendParams, BackendResult, BlobBackend, BlobSink, FsBackend, MemoryBackend,
    ObjectStoreBackend,
};
pub use codec::{
    ByteStream, DataUri, buffer_to_hash, decode_data_uri, encode_data_uri, extension_for_mime,
    mime_for_extension, mime_for_key, stream_from_buffer,
};
pub use error::{BackendError, BlobError, Result};
pub use fetch::{FetchStream, HttpFetcher, RemoteFetcher};
pub use pipeline::{PIPELINE_DEPTH, PipelineOutcome, pipe_into_sink};
pub use service::{
    BlobRecord, BlobService, BlobServiceBuilder, CreateParams, DEFAULT_ID_FIELD, SourceDescriptor,
};
