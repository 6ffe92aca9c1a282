use std::time::Duration;

use async_trait::async_trait;

use crate::{chunk::Chunk, error::TransferError};

/// A producer of chunks.
#[async_trait]
pub trait ChunkReader: Send + Sync {
    /// Produce the next chunk. `Ok(None)` means the source reached
    /// end-of-stream; it is a terminal, non-error condition.
    async fn read(&mut self) -> Result<Option<Chunk>, TransferError>;
}

/// A [`ChunkReader`] whose reads can be bounded in time.
#[async_trait]
pub trait TimeoutChunkReader: ChunkReader {
    /// Like [`ChunkReader::read`], but returns
    /// [`TransferError::ReadTimeout`] if `limit` elapses with no data.
    async fn read_timeout(&mut self, limit: Duration) -> Result<Option<Chunk>, TransferError>;
}

#[async_trait]
impl<T: ChunkReader + ?Sized> TimeoutChunkReader for T {
    async fn read_timeout(&mut self, limit: Duration) -> Result<Option<Chunk>, TransferError> {
        match tokio::time::timeout(limit, self.read()).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::ReadTimeout),
        }
    }
}

/// A consumer of chunks.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    /// Consume one chunk. Ownership of the chunk transfers at the call;
    /// the writer releases it exactly once on every path, success or
    /// failure.
    async fn write(&mut self, chunk: Chunk) -> Result<(), TransferError>;

    /// Push any internally buffered bytes through to the underlying
    /// stream. Writers that never buffer need not override this.
    async fn flush(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    /// Flush, then shut down the underlying write half. Only call this on
    /// writers whose stream the caller owns outright.
    async fn shutdown(&mut self) -> Result<(), TransferError> {
        self.flush().await
    }
}
