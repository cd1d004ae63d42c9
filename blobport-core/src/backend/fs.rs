use super::{BackendParams, BackendResult, BlobBackend, BlobSink};
use crate::codec::{ByteStream, buffer_to_hash};
use crate::error::BackendError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// FsBackend stores each blob as one file.
/// Blobs live in {base_path}/blobs/{key}, in-flight writes in {base_path}/tmp
pub struct FsBackend {
    base_path: PathBuf,
    temp_seq: AtomicU64,
}

impl FsBackend {
    pub fn new(base_path: PathBuf) -> BackendResult<Self> {
        std::fs::create_dir_all(base_path.join("blobs"))?;
        std::fs::create_dir_all(base_path.join("tmp"))?;
        Ok(Self {
            base_path,
            temp_seq: AtomicU64::new(0),
        })
    }

    /// Get the base path for the store
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Get the path of a blob, rejecting keys that would escape the blobs dir
    fn blob_path(&self, key: &str) -> BackendResult<PathBuf> {
        let escapes = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\', '\0'])
            || Path::new(key).is_absolute();

        if escapes {
            return Err(BackendError::InvalidKey(key.to_string()));
        }

        Ok(self.base_path.join("blobs").join(key))
    }

    /// Temp names are bounded in length so any key that fits in blobs/ fits here
    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let key_hash = buffer_to_hash(key.as_bytes());
        self.base_path.join("tmp").join(format!(
            "{}.{}.{}.tmp",
            &key_hash[..16],
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl BlobBackend for FsBackend {
    async fn open_read_stream(&self, key: &str) -> BackendResult<ByteStream> {
        let path = self.blob_path(key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound(key.to_string()));
            }
            Err(error) => return Err(error.into()),
        };

        Ok(ReaderStream::new(file).map_err(BackendError::from).boxed())
    }

    async fn open_write_stream(
        &self,
        key: &str,
        _params: &BackendParams,
    ) -> BackendResult<Box<dyn BlobSink>> {
        let final_path = self.blob_path(key)?;
        let temp_path = self.temp_path(key);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FsSink {
            key: key.to_string(),
            file,
            temp_path,
            final_path,
        }))
    }

    async fn remove_key(&self, key: &str) -> BackendResult<()> {
        let path = self.blob_path(key)?;
        fs::remove_file(&path).await?;
        tracing::debug!("Removed blob {}", key);
        Ok(())
    }
}

struct FsSink {
    key: String,
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
}

#[async_trait]
impl BlobSink for FsSink {
    async fn write(&mut self, chunk: Bytes) -> BackendResult<()> {
        self.file.write_all(&chunk).await?;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<()> {
        let FsSink {
            key,
            mut file,
            temp_path,
            final_path,
        } = *self;

        // Write to temporary file first, then rename for atomicity
        let synced: std::io::Result<()> = async {
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(error) = synced {
            let _ = fs::remove_file(&temp_path).await;
            return Err(error.into());
        }

        if let Err(error) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(error.into());
        }

        tracing::debug!("Stored blob {} at {}", key, final_path.display());
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        let FsSink {
            key,
            file,
            temp_path,
            ..
        } = *self;
        drop(file);

        if let Err(error) = fs::remove_file(&temp_path).await {
            tracing::warn!(
                "Failed to remove temp file for aborted blob. key={} path={} error={}",
                key,
                temp_path.display(),
                error
            );
        }
    }
}
