//! Codec layer for Blobport
//!
//! Pure conversions between byte buffers, data URIs, content hashes and
//! chunk streams. Nothing here performs I/O.

pub mod data_uri;
pub mod hash;
pub mod mime;
pub mod stream;

pub use data_uri::{DEFAULT_MIME_TYPE, DataUri, decode_data_uri, encode_data_uri};
pub use hash::{ContentDigest, buffer_to_hash};
pub use mime::{extension_for_mime, mime_for_extension, mime_for_key};
pub use stream::{ByteStream, STREAM_CHUNK_SIZE, stream_from_buffer};
