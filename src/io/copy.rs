use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::{
    error::TransferError,
    io::{ChunkReader, ChunkSink, ChunkSource, ChunkWriter, TimeoutChunkReader},
    timer::ActivityTimer,
};

/// Relay chunks from `reader` to `writer` until the source ends.
///
/// End-of-stream terminates with `Ok(())`; every other read or write
/// failure terminates the relay and is returned as-is. The activity timer
/// is marked after each successful read, payload or not, so an external
/// watchdog can measure liveness. Empty chunks are released without
/// reaching the writer. No retries happen at this layer; callers decide
/// whether to reconnect and relay again.
pub async fn copy<R, W>(
    timer: &ActivityTimer,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), TransferError>
where
    R: ChunkReader + ?Sized,
    W: ChunkWriter + ?Sized,
{
    loop {
        let Some(chunk) = reader.read().await? else {
            debug!("source reached end of stream");
            return Ok(());
        };
        timer.mark();
        if chunk.is_empty() {
            continue;
        }
        // Ownership moves to the writer here; it releases the chunk
        // exactly once whether the write succeeds or fails.
        writer.write(chunk).await?;
    }
}

/// Like [`copy`], but every read must produce data (or end-of-stream)
/// within `read_timeout`, else the relay fails with
/// [`TransferError::ReadTimeout`].
pub async fn copy_with_timeout<R, W>(
    timer: &ActivityTimer,
    reader: &mut R,
    writer: &mut W,
    read_timeout: Duration,
) -> Result<(), TransferError>
where
    R: TimeoutChunkReader + ?Sized,
    W: ChunkWriter + ?Sized,
{
    loop {
        let Some(chunk) = reader.read_timeout(read_timeout).await? else {
            debug!("source reached end of stream");
            return Ok(());
        };
        timer.mark();
        if chunk.is_empty() {
            continue;
        }
        writer.write(chunk).await?;
    }
}

/// Relay both directions between two owned duplex streams.
///
/// One chunked relay per direction; when a direction finishes, its peer's
/// write half is shut down so the far end sees end-of-stream. A watchdog
/// fails the whole relay with [`TransferError::ReadTimeout`] once both
/// directions have been idle longer than `idle_timeout`. The first hard
/// error in either direction wins.
pub async fn copy_bidirectional<A, B>(
    a: A,
    b: B,
    idle_timeout: Duration,
) -> Result<(), TransferError>
where
    A: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
    B: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let a_to_b_timer = ActivityTimer::new();
    let b_to_a_timer = ActivityTimer::new();

    let mut a_source = ChunkSource::stream(a_read);
    let mut b_sink = ChunkSink::stream(b_write);
    let mut b_source = ChunkSource::stream(b_read);
    let mut a_sink = ChunkSink::stream(a_write);

    let a_to_b = async {
        copy(&a_to_b_timer, &mut a_source, &mut b_sink).await?;
        b_sink.shutdown().await
    };
    let b_to_a = async {
        copy(&b_to_a_timer, &mut b_source, &mut a_sink).await?;
        a_sink.shutdown().await
    };

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    tokio::pin!(a_to_b);
    tokio::pin!(b_to_a);

    let mut a_done = None;
    let mut b_done = None;
    while a_done.is_none() || b_done.is_none() {
        tokio::select! {
            biased;
            ret = (&mut a_to_b), if a_done.is_none() => a_done = Some(ret?),
            ret = (&mut b_to_a), if b_done.is_none() => b_done = Some(ret?),
            _ = interval.tick() => {
                if a_to_b_timer.is_idle(idle_timeout) && b_to_a_timer.is_idle(idle_timeout) {
                    debug!("both directions idle, giving up");
                    return Err(TransferError::ReadTimeout);
                }
            }
        }
    }
    Ok(())
}
