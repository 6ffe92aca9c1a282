use std::io::{Error as IoError, ErrorKind as IoErrorKind};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::{
    chunk::{Chunk, ChunkPool},
    error::TransferError,
    io::{ChunkWriter, IoParams, WriteStream},
};

/// Default capacity of the merging writer's accumulation buffer.
pub const DEFAULT_MERGE_CAPACITY: usize = 4096;

/// Pass-through [`ChunkWriter`] over a raw byte stream.
///
/// Each chunk goes out in a single underlying write; a short write is an
/// error, never retried here.
pub struct StreamChunkWriter {
    stream: Box<dyn WriteStream>,
}

impl StreamChunkWriter {
    pub fn new(stream: impl WriteStream + 'static) -> Self {
        StreamChunkWriter {
            stream: Box::new(stream),
        }
    }
}

#[async_trait]
impl ChunkWriter for StreamChunkWriter {
    async fn write(&mut self, chunk: Chunk) -> Result<(), TransferError> {
        let n = self
            .stream
            .write(&chunk)
            .await
            .map_err(TransferError::Write)?;
        if n != chunk.len() {
            return Err(TransferError::Write(IoError::new(
                IoErrorKind::WriteZero,
                format!("partial write: {} of {} bytes", n, chunk.len()),
            )));
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransferError> {
        self.stream.flush().await.map_err(TransferError::Write)
    }

    async fn shutdown(&mut self) -> Result<(), TransferError> {
        self.stream.shutdown().await.map_err(TransferError::Write)
    }
}

/// [`ChunkWriter`] that coalesces small chunks before touching the stream.
///
/// Chunks are appended to an internal buffer; the stream only sees a write
/// when an incoming chunk would overflow the remaining capacity, when a
/// chunk alone exceeds the whole capacity (written straight through), or on
/// an explicit [`flush`](ChunkWriter::flush). Bytes always go out in
/// arrival order.
///
/// There is no implicit flush: callers must finish with `flush` or
/// `shutdown`, or buffered bytes are dropped (with a warning) when the
/// writer is.
pub struct MergingChunkWriter {
    stream: Box<dyn WriteStream>,
    buffer: Vec<u8>,
    capacity: usize,
}

impl MergingChunkWriter {
    pub fn new(stream: impl WriteStream + 'static) -> Self {
        Self::with_capacity(stream, DEFAULT_MERGE_CAPACITY)
    }

    pub fn with_capacity(stream: impl WriteStream + 'static, capacity: usize) -> Self {
        MergingChunkWriter {
            stream: Box::new(stream),
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes accepted but not yet written to the stream.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush_buffer(&mut self) -> Result<(), TransferError> {
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "flushing merged chunks");
            self.stream
                .write_all(&self.buffer)
                .await
                .map_err(TransferError::Write)?;
            self.buffer.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkWriter for MergingChunkWriter {
    async fn write(&mut self, chunk: Chunk) -> Result<(), TransferError> {
        if self.buffer.len() + chunk.len() > self.capacity {
            self.flush_buffer().await?;
        }
        if chunk.len() > self.capacity {
            self.stream
                .write_all(&chunk)
                .await
                .map_err(TransferError::Write)
        } else {
            self.buffer.extend_from_slice(&chunk);
            Ok(())
        }
    }

    async fn flush(&mut self) -> Result<(), TransferError> {
        self.flush_buffer().await?;
        self.stream.flush().await.map_err(TransferError::Write)
    }

    async fn shutdown(&mut self) -> Result<(), TransferError> {
        self.flush().await?;
        self.stream.shutdown().await.map_err(TransferError::Write)
    }
}

impl Drop for MergingChunkWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                bytes = self.buffer.len(),
                "merging writer dropped with unflushed bytes"
            );
        }
    }
}

/// A chunk sink selected at construction time: pass-through or merging over
/// a raw byte stream, or a handle that already consumes chunks, forwarded
/// untouched.
pub enum ChunkSink {
    Passthrough(StreamChunkWriter),
    Merging(MergingChunkWriter),
    Native(Box<dyn ChunkWriter>),
}

impl ChunkSink {
    pub fn stream(stream: impl WriteStream + 'static) -> Self {
        ChunkSink::Passthrough(StreamChunkWriter::new(stream))
    }

    pub fn merging(stream: impl WriteStream + 'static) -> Self {
        ChunkSink::Merging(MergingChunkWriter::new(stream))
    }

    pub fn merging_with_capacity(stream: impl WriteStream + 'static, capacity: usize) -> Self {
        ChunkSink::Merging(MergingChunkWriter::with_capacity(stream, capacity))
    }

    pub fn merging_with_params(stream: impl WriteStream + 'static, params: &IoParams) -> Self {
        Self::merging_with_capacity(stream, params.merge_buffer_size)
    }

    pub fn native(writer: impl ChunkWriter + 'static) -> Self {
        ChunkSink::Native(Box::new(writer))
    }
}

#[async_trait]
impl ChunkWriter for ChunkSink {
    async fn write(&mut self, chunk: Chunk) -> Result<(), TransferError> {
        match self {
            ChunkSink::Passthrough(w) => w.write(chunk).await,
            ChunkSink::Merging(w) => w.write(chunk).await,
            ChunkSink::Native(w) => w.write(chunk).await,
        }
    }

    async fn flush(&mut self) -> Result<(), TransferError> {
        match self {
            ChunkSink::Passthrough(w) => w.flush().await,
            ChunkSink::Merging(w) => w.flush().await,
            ChunkSink::Native(w) => w.flush().await,
        }
    }

    async fn shutdown(&mut self) -> Result<(), TransferError> {
        match self {
            ChunkSink::Passthrough(w) => w.shutdown().await,
            ChunkSink::Merging(w) => w.shutdown().await,
            ChunkSink::Native(w) => w.shutdown().await,
        }
    }
}

/// Exposes a [`ChunkWriter`] as a plain sequential writer again.
///
/// Each call wraps the bytes into one fresh pool chunk and forwards it.
/// Never buffers or merges; layer a [`MergingChunkWriter`] underneath for
/// that.
pub struct ChunkByteWriter<W> {
    sink: W,
    pool: ChunkPool,
}

impl<W: ChunkWriter> ChunkByteWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_pool(sink, ChunkPool::default())
    }

    pub fn with_pool(sink: W, pool: ChunkPool) -> Self {
        ChunkByteWriter { sink, pool }
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), TransferError> {
        self.sink.write(self.pool.copy_from(bytes)).await
    }

    pub async fn flush(&mut self) -> Result<(), TransferError> {
        self.sink.flush().await
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use std::task::{Context, Poll};
    use test_log::test;
    use tokio::io::AsyncWrite;

    // Accumulating sink that counts underlying write calls and can be
    // configured to fail or to accept short writes.
    #[derive(Default)]
    struct MockWriter {
        written: Arc<Mutex<Vec<u8>>>,
        write_calls: Arc<AtomicUsize>,
        max_write_size: Option<usize>,
        fail_with: Option<IoErrorKind>,
    }

    impl MockWriter {
        fn handles(&self) -> (Arc<Mutex<Vec<u8>>>, Arc<AtomicUsize>) {
            (self.written.clone(), self.write_calls.clone())
        }
    }

    impl AsyncWrite for MockWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<Result<usize, IoError>> {
            self.write_calls.fetch_add(1, Ordering::Relaxed);
            if let Some(kind) = self.fail_with {
                return Poll::Ready(Err(IoError::new(kind, "injected write failure")));
            }
            let n = match self.max_write_size {
                Some(max) => buf.len().min(max),
                None => buf.len(),
            };
            self.written.lock().unwrap().extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Result<(), IoError>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test(tokio::test)]
    async fn passthrough_writes_each_chunk_once() {
        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let mut writer = StreamChunkWriter::new(mock);
        let pool = ChunkPool::new(64);
        writer.write(pool.copy_from(b"one")).await.unwrap();
        writer.write(pool.copy_from(b"two")).await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"onetwo");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test(tokio::test)]
    async fn passthrough_rejects_short_writes() {
        let mock = MockWriter {
            max_write_size: Some(2),
            ..Default::default()
        };
        let mut writer = StreamChunkWriter::new(mock);
        let pool = ChunkPool::new(64);
        let err = writer.write(pool.copy_from(b"hello")).await.unwrap_err();
        match err {
            TransferError::Write(e) => assert_eq!(e.kind(), IoErrorKind::WriteZero),
            other => panic!("unexpected error: {other:?}"),
        }
        // The chunk must be released even on the failure path.
        assert_eq!(pool.in_flight(), 0);
    }

    #[test(tokio::test)]
    async fn merging_buffers_until_capacity() {
        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let mut writer = MergingChunkWriter::with_capacity(mock, 16);
        let pool = ChunkPool::new(64);
        writer.write(pool.copy_from(b"aaaa")).await.unwrap();
        writer.write(pool.copy_from(b"bbbb")).await.unwrap();
        writer.write(pool.copy_from(b"cccc")).await.unwrap();
        // Total fits the capacity: the stream has seen nothing yet.
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(writer.pending(), 12);
        writer.flush().await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"aaaabbbbcccc");
        assert_eq!(writer.pending(), 0);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test(tokio::test)]
    async fn merging_flushes_before_overflow() {
        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let mut writer = MergingChunkWriter::with_capacity(mock, 8);
        let pool = ChunkPool::new(64);
        writer.write(pool.copy_from(b"hello")).await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        // Would overflow: the first five bytes go out, the new chunk stays.
        writer.write(pool.copy_from(b"world")).await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"hello");
        assert_eq!(writer.pending(), 5);
        writer.flush().await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"helloworld");
    }

    #[test(tokio::test)]
    async fn merging_writes_oversized_chunks_directly() {
        let mock = MockWriter::default();
        let (written, _) = mock.handles();
        let mut writer = MergingChunkWriter::with_capacity(mock, 8);
        let pool = ChunkPool::new(64);
        writer.write(pool.copy_from(b"ab")).await.unwrap();
        writer
            .write(pool.copy_from(b"0123456789abcdef"))
            .await
            .unwrap();
        // Buffered prefix first, then the oversized chunk: order preserved.
        assert_eq!(&written.lock().unwrap()[..], b"ab0123456789abcdef");
        assert_eq!(writer.pending(), 0);
        assert_eq!(pool.in_flight(), 0);
    }

    // Collects formatted log output so tests can assert on emitted events.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn drop_discards_unflushed_bytes_with_a_warning() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let pool = ChunkPool::new(64);
        let mut writer = MergingChunkWriter::with_capacity(mock, 16);
        writer.write(pool.copy_from(b"stranded")).await.unwrap();
        assert_eq!(writer.pending(), 8);
        drop(writer);

        // The stream never saw the buffered bytes; they are simply gone.
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(written.lock().unwrap().is_empty());
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("unflushed"));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test(tokio::test)]
    async fn params_set_the_merge_capacity() {
        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let params = IoParams {
            chunk_size: 64,
            merge_buffer_size: 4,
        };
        let mut sink = ChunkSink::merging_with_params(mock, &params);
        let pool = ChunkPool::new(64);
        sink.write(pool.copy_from(b"abc")).await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        // The second chunk would overflow the configured capacity.
        sink.write(pool.copy_from(b"def")).await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"abc");
        sink.flush().await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"abcdef");
    }

    #[test(tokio::test)]
    async fn merging_releases_chunk_on_write_failure() {
        let mock = MockWriter {
            fail_with: Some(IoErrorKind::BrokenPipe),
            ..Default::default()
        };
        let mut writer = MergingChunkWriter::with_capacity(mock, 4);
        let pool = ChunkPool::new(64);
        // Oversized, so it goes straight to the failing stream.
        let err = writer
            .write(pool.copy_from(b"too large to buffer"))
            .await
            .unwrap_err();
        assert_eq!(err.io_error().map(|e| e.kind()), Some(IoErrorKind::BrokenPipe));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test(tokio::test)]
    async fn byte_writer_wraps_one_chunk_per_call() {
        let mock = MockWriter::default();
        let (written, calls) = mock.handles();
        let mut writer = ChunkByteWriter::new(ChunkSink::stream(mock));
        writer.write(b"ping").await.unwrap();
        writer.write(b"pong").await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"pingpong");
        // No merging here: one underlying write per call.
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
