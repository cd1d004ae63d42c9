pub mod create_blob;
pub mod get_blob;
pub mod remove_blob;

pub use create_blob::{
    BlobOrigin, CreateBlobOperation, CreateBlobOperationRequest, CreateBlobOperationResult,
    derive_inline_id, derive_remote_id, is_remote_uri,
};
pub use get_blob::{GetBlobOperation, GetBlobOperationRequest, GetBlobOperationResult};
pub use remove_blob::{RemoveBlobOperation, RemoveBlobOperationRequest};
