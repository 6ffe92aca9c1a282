use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::{
    chunk::{Chunk, ChunkPool},
    error::TransferError,
    io::{ChunkReader, IoParams, ReadStream},
};

/// Adapts a raw byte stream into a [`ChunkReader`].
///
/// Each call issues exactly one underlying read into a private scratch
/// buffer and wraps exactly the bytes returned into a fresh pool chunk.
/// No retries: short reads produce short chunks.
pub struct StreamChunkReader {
    stream: Box<dyn ReadStream>,
    scratch: Vec<u8>,
    pool: ChunkPool,
}

impl StreamChunkReader {
    pub fn new(stream: impl ReadStream + 'static) -> Self {
        Self::with_pool(stream, ChunkPool::default())
    }

    pub fn with_capacity(stream: impl ReadStream + 'static, capacity: usize) -> Self {
        Self::with_pool(stream, ChunkPool::new(capacity))
    }

    /// Share a pool with other adapters instead of owning one.
    pub fn with_pool(stream: impl ReadStream + 'static, pool: ChunkPool) -> Self {
        StreamChunkReader {
            stream: Box::new(stream),
            scratch: vec![0u8; pool.chunk_capacity()],
            pool,
        }
    }

    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }
}

#[async_trait]
impl ChunkReader for StreamChunkReader {
    async fn read(&mut self) -> Result<Option<Chunk>, TransferError> {
        let n = self
            .stream
            .read(&mut self.scratch)
            .await
            .map_err(TransferError::Read)?;
        if n == 0 {
            return Ok(None);
        }
        trace!(bytes = n, "read chunk from stream");
        Ok(Some(self.pool.copy_from(&self.scratch[..n])))
    }
}

/// A chunk source selected at construction time: either a raw byte stream
/// behind the scratch-buffer adapter, or a handle that already speaks
/// chunks and is forwarded untouched, with no copying in between.
pub enum ChunkSource {
    Adapted(StreamChunkReader),
    Native(Box<dyn ChunkReader>),
}

impl ChunkSource {
    pub fn stream(stream: impl ReadStream + 'static) -> Self {
        ChunkSource::Adapted(StreamChunkReader::new(stream))
    }

    pub fn stream_with_capacity(stream: impl ReadStream + 'static, capacity: usize) -> Self {
        ChunkSource::Adapted(StreamChunkReader::with_capacity(stream, capacity))
    }

    pub fn stream_with_params(stream: impl ReadStream + 'static, params: &IoParams) -> Self {
        Self::stream_with_capacity(stream, params.chunk_size)
    }

    pub fn native(reader: impl ChunkReader + 'static) -> Self {
        ChunkSource::Native(Box::new(reader))
    }
}

#[async_trait]
impl ChunkReader for ChunkSource {
    async fn read(&mut self) -> Result<Option<Chunk>, TransferError> {
        match self {
            ChunkSource::Adapted(r) => r.read().await,
            ChunkSource::Native(r) => r.read().await,
        }
    }
}

/// Exposes a [`ChunkReader`] as a plain sequential reader again.
///
/// Holds on to a partially consumed chunk across calls, releasing it only
/// once drained, so callers see one flat byte sequence no matter how the
/// producer chunked it.
pub struct ChunkByteReader<R> {
    source: R,
    pending: Option<Chunk>,
    offset: usize,
}

impl<R: ChunkReader> ChunkByteReader<R> {
    pub fn new(source: R) -> Self {
        ChunkByteReader {
            source,
            pending: None,
            offset: 0,
        }
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means end-of-stream (unless
    /// `buf` is empty).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(chunk) = &self.pending {
                let remaining = &chunk[self.offset..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.offset += n;
                if self.offset == chunk.len() {
                    self.pending = None;
                    self.offset = 0;
                }
                return Ok(n);
            }
            match self.source.read().await? {
                Some(chunk) if chunk.is_empty() => continue,
                Some(chunk) => {
                    self.pending = Some(chunk);
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
