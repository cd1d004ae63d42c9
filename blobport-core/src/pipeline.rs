//! Source -> count/hash -> sink streaming pipeline.
//!
//! The counting stage runs as its own task and hands chunks to the sink over
//! a bounded channel, so it can never be more than [`PIPELINE_DEPTH`] chunks
//! ahead of the sink. Both stages share a cancellation token that is fired
//! when the sink fails or when the pipeline future is dropped.

use crate::backend::{BackendResult, BlobSink};
use crate::codec::ContentDigest;
use crate::error::BackendError;
use crate::{BlobError, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Chunks allowed in flight between the counting stage and the sink.
pub const PIPELINE_DEPTH: usize = 4;

pub type SourceStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Bytes observed by the counting stage and written to the sink.
    pub size: u64,
    /// SHA256 hex digest of those bytes.
    pub sha256: String,
}

/// Drive `source` into `sink` and commit it.
///
/// Resolves once: `Ok` only after the sink's `finish` succeeded; on any
/// failure the sink is aborted and the first error is returned. Dropping the
/// returned future before it resolves aborts the sink in the background.
pub async fn pipe_into_sink(
    key: &str,
    source: SourceStream,
    sink: Box<dyn BlobSink>,
) -> Result<PipelineOutcome> {
    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();
    let mut sink = SinkGuard::new(key, sink);

    let (tx, mut rx) = mpsc::channel(PIPELINE_DEPTH);
    let counter = tokio::spawn(count_and_hash(source, tx, token.child_token()));

    let mut failure = None;
    while let Some(item) = rx.recv().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(error) => {
                failure = Some(error);
                break;
            }
        };

        if let Err(source) = sink.write(chunk).await {
            failure = Some(BlobError::BackendWrite {
                key: key.to_string(),
                source,
            });
            break;
        }
    }

    if let Some(error) = failure {
        token.cancel();
        drop(rx);
        sink.abort().await;
        let _ = counter.await;
        tracing::warn!("Pipeline for {} failed: {}", key, error);
        return Err(error);
    }

    let digest = match counter.await {
        Ok(digest) => digest,
        Err(join_error) => {
            sink.abort().await;
            return Err(BlobError::BackendWrite {
                key: key.to_string(),
                source: BackendError::Other(format!("pipeline task failed: {}", join_error)),
            });
        }
    };

    sink.finish()
        .await
        .map_err(|source| BlobError::BackendWrite {
            key: key.to_string(),
            source,
        })?;

    let (size, sha256) = digest.finalize();
    Ok(PipelineOutcome { size, sha256 })
}

/// Owns the sink until it is finished or aborted.
///
/// A guard dropped while still holding its sink spawns the sink's `abort`
/// on the current runtime.
struct SinkGuard {
    key: String,
    sink: Option<Box<dyn BlobSink>>,
}

impl SinkGuard {
    fn new(key: &str, sink: Box<dyn BlobSink>) -> Self {
        Self {
            key: key.to_string(),
            sink: Some(sink),
        }
    }

    async fn write(&mut self, chunk: Bytes) -> BackendResult<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.write(chunk).await,
            None => Err(BackendError::Other("sink already released".to_string())),
        }
    }

    async fn finish(mut self) -> BackendResult<()> {
        match self.sink.take() {
            Some(sink) => sink.finish().await,
            None => Ok(()),
        }
    }

    async fn abort(mut self) {
        if let Some(sink) = self.sink.take() {
            sink.abort().await;
        }
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        let Some(sink) = self.sink.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Pipeline for {} dropped, aborting sink", self.key);
                handle.spawn(sink.abort());
            }
            Err(_) => {
                tracing::warn!(
                    "Pipeline for {} dropped outside a runtime, sink not aborted",
                    self.key
                );
            }
        }
    }
}

async fn count_and_hash(
    mut source: SourceStream,
    tx: mpsc::Sender<Result<Bytes>>,
    token: CancellationToken,
) -> ContentDigest {
    let mut digest = ContentDigest::new();

    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            item = source.next() => item,
        };
        let Some(item) = item else {
            break;
        };

        let failed = item.is_err();
        if let Ok(chunk) = &item {
            digest.update(chunk);
        }

        let delivered = tokio::select! {
            biased;
            _ = token.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        };

        if failed || !delivered {
            break;
        }
    }

    digest
}
