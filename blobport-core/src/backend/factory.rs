use super::{BlobBackend, FsBackend, MemoryBackend, ObjectStoreBackend};
use crate::{BlobError, Result};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct BackendBuilder {
    backend: Option<String>,
    root: Option<PathBuf>,
    prefix: Option<String>,
    s3_bucket: Option<String>,
    s3_region: Option<String>,
    s3_endpoint: Option<String>,
    s3_access_key_id: Option<String>,
    s3_secret_access_key: Option<String>,
    s3_allow_http: bool,
}

impl BackendBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn s3_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.s3_bucket = Some(bucket.into());
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.s3_region = Some(region.into());
        self
    }

    pub fn s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.s3_endpoint = Some(endpoint.into());
        self
    }

    pub fn s3_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.s3_access_key_id = Some(access_key_id.into());
        self.s3_secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn s3_allow_http(mut self, allow: bool) -> Self {
        self.s3_allow_http = allow;
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(BlobError::Config("backend kind cannot be empty".to_string()));
        }

        Ok(backend)
    }

    fn resolve_root(&self, backend: &str) -> Result<PathBuf> {
        self.root
            .clone()
            .filter(|root| !root.as_os_str().is_empty())
            .ok_or_else(|| {
                BlobError::Config(format!("root path is required for {} backend", backend))
            })
    }

    fn resolve_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn wrap_object_store(&self, backend: ObjectStoreBackend) -> Result<Arc<dyn BlobBackend>> {
        let backend = match self.resolve_prefix() {
            Some(prefix) => backend
                .with_prefix(prefix)
                .map_err(|error| BlobError::Config(error.to_string()))?,
            None => backend,
        };
        Ok(Arc::new(backend))
    }

    pub fn build(&self) -> Result<Arc<dyn BlobBackend>> {
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            "memory" => Ok(Arc::new(MemoryBackend::new())),
            "fs" => {
                let root = self.resolve_root(&backend)?;
                let fs_backend = FsBackend::new(root).map_err(|error| {
                    BlobError::Config(format!("failed to prepare fs backend: {}", error))
                })?;
                Ok(Arc::new(fs_backend))
            }
            "local" => {
                let root = self.resolve_root(&backend)?;
                std::fs::create_dir_all(&root).map_err(|error| {
                    BlobError::Config(format!("failed to create {}: {}", root.display(), error))
                })?;
                let store = LocalFileSystem::new_with_prefix(&root)
                    .map_err(|error| BlobError::Config(error.to_string()))?;
                self.wrap_object_store(ObjectStoreBackend::new(Arc::new(store)))
            }
            "s3" => {
                let bucket = self.s3_bucket.as_deref().unwrap_or_default().trim();
                if bucket.is_empty() {
                    return Err(BlobError::Config(
                        "s3 bucket is required for s3 backend".to_string(),
                    ));
                }

                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(self.s3_allow_http);

                if let Some(region) = self.s3_region.as_deref() {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = self.s3_endpoint.as_deref() {
                    builder = builder.with_endpoint(endpoint);
                }
                if let (Some(key_id), Some(secret)) = (
                    self.s3_access_key_id.as_deref(),
                    self.s3_secret_access_key.as_deref(),
                ) {
                    builder = builder
                        .with_access_key_id(key_id)
                        .with_secret_access_key(secret);
                }

                let store = builder
                    .build()
                    .map_err(|error| BlobError::Config(error.to_string()))?;
                self.wrap_object_store(ObjectStoreBackend::new(Arc::new(store)))
            }
            other => Err(BlobError::Config(format!(
                "unsupported backend: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_backend() {
        assert!(BackendBuilder::new().backend(" Memory ").build().is_ok());
    }

    #[test]
    fn test_build_fs_backend_creates_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("data");

        BackendBuilder::new()
            .backend("fs")
            .root(&root)
            .build()
            .unwrap();

        assert!(root.join("blobs").is_dir());
    }

    #[test]
    fn test_build_local_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = BackendBuilder::new()
            .backend("local")
            .root(temp_dir.path())
            .prefix("blobs")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let cases = [
            BackendBuilder::new(),
            BackendBuilder::new().backend("  "),
            BackendBuilder::new().backend("fs"),
            BackendBuilder::new().backend("s3"),
            BackendBuilder::new().backend("ftp"),
        ];

        for builder in cases {
            assert!(
                matches!(builder.build(), Err(BlobError::Config(_))),
                "expected config error for {:?}",
                builder
            );
        }
    }
}
