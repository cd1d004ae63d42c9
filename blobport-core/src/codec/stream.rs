use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use crate::error::BackendError;

/// Stream of byte chunks as produced and consumed by backends.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, BackendError>>;

/// Largest chunk handed downstream by [`stream_from_buffer`].
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Wrap a buffer as a finite, single-shot stream of chunks.
///
/// Chunks are zero-copy slices of `buffer`. An empty buffer yields no chunks.
pub fn stream_from_buffer<E>(buffer: Bytes) -> BoxStream<'static, std::result::Result<Bytes, E>>
where
    E: Send + 'static,
{
    let len = buffer.len();
    let chunks = (0..len)
        .step_by(STREAM_CHUNK_SIZE)
        .map(move |start| Ok(buffer.slice(start..(start + STREAM_CHUNK_SIZE).min(len))));

    stream::iter(chunks).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_stream_from_buffer_preserves_bytes() {
        let data: Vec<u8> = (0..(STREAM_CHUNK_SIZE * 2 + 17))
            .map(|i| (i % 251) as u8)
            .collect();

        let chunks: Vec<Bytes> = stream_from_buffer::<BackendError>(Bytes::from(data.clone()))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), STREAM_CHUNK_SIZE);
        assert_eq!(chunks[2].len(), 17);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_stream_from_empty_buffer_is_empty() {
        let mut stream = stream_from_buffer::<BackendError>(Bytes::new());
        assert!(stream.next().await.is_none());
    }
}
