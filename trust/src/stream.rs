//! Pull-based byte stream abstraction
//!
//! Archive, signature, and key content all arrive as streams of byte
//! chunks, whether from an HTTP response body, a cached file, or an
//! in-memory buffer. Consumers pull chunks single-pass; any read or
//! transport error ends the stream with that error.

use std::path::Path;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::Stream;
use tokio::io::AsyncReadExt;

use crate::errors::{Result, TrustError};

/// Chunk size used when streaming files from disk
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// A pull-based stream of byte chunks
pub type ByteStream =
    std::pin::Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

/// Stream an HTTP response body
pub fn response_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map_err(TrustError::from)
        .boxed()
}

/// Stream an in-memory buffer as a single chunk
pub fn memory_stream(data: impl Into<Bytes>) -> ByteStream {
    let chunk = data.into();
    stream::iter([Ok(chunk)]).boxed()
}

/// Stream a file from disk in fixed-size chunks
pub fn file_stream(path: impl AsRef<Path>) -> ByteStream {
    let path = path.as_ref().to_path_buf();
    stream::once(async move {
        let file = tokio::fs::File::open(&path).await?;
        Ok::<_, TrustError>(stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; FILE_CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                Ok(None)
            } else {
                buf.truncate(n);
                Ok(Some((Bytes::from(buf), file)))
            }
        }))
    })
    .try_flatten()
    .boxed()
}

/// Drain a stream into memory
///
/// Only used for bounded content (keys, signatures); archives are never
/// collected this way.
pub async fn collect(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_stream_round_trip() {
        let data = b"chunked payload".to_vec();
        let collected = collect(memory_stream(data.clone())).await.unwrap();
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn test_file_stream_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let collected = collect(file_stream(&path)).await.unwrap();
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn test_file_stream_missing_file_errors() {
        let result = collect(file_stream("/nonexistent/archive.tgz")).await;
        assert!(matches!(result, Err(TrustError::Io(_))));
    }
}
