//! Pooled byte chunks.
//!
//! A [`Chunk`] is a unit of bytes checked out of a [`ChunkPool`]. Chunks are
//! owned values: whoever holds one is responsible for it, and dropping it
//! returns the backing buffer to its pool. There is no way to release a
//! chunk twice, or to read one after release.

use std::fmt;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use bytes::BytesMut;

/// Default capacity of a pooled chunk buffer, sized to swallow a full
/// socket read in one go.
pub const DEFAULT_CHUNK_CAPACITY: usize = 32 * 1024;

struct PoolShared {
    chunk_capacity: usize,
    free: Mutex<Vec<BytesMut>>,
    in_flight: AtomicUsize,
}

/// An arena of reusable byte buffers.
///
/// Cloning a pool is cheap and yields a handle to the same arena. Buffers
/// are recycled on chunk drop as long as they can still serve a
/// full-capacity checkout; anything smaller is simply freed.
#[derive(Clone)]
pub struct ChunkPool {
    shared: Arc<PoolShared>,
}

impl ChunkPool {
    pub fn new(chunk_capacity: usize) -> Self {
        ChunkPool {
            shared: Arc::new(PoolShared {
                chunk_capacity,
                free: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn chunk_capacity(&self) -> usize {
        self.shared.chunk_capacity
    }

    /// Number of chunks checked out and not yet released.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Relaxed)
    }

    /// Check out a chunk holding a copy of `src`.
    pub fn copy_from(&self, src: &[u8]) -> Chunk {
        let mut data = self.checkout(src.len());
        data.extend_from_slice(src);
        Chunk {
            data,
            pool: Arc::clone(&self.shared),
        }
    }

    fn checkout(&self, min_capacity: usize) -> BytesMut {
        let recycled = if min_capacity <= self.shared.chunk_capacity {
            self.shared.free.lock().ok().and_then(|mut free| free.pop())
        } else {
            None
        };
        self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
        recycled.unwrap_or_else(|| {
            BytesMut::with_capacity(min_capacity.max(self.shared.chunk_capacity))
        })
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        ChunkPool::new(DEFAULT_CHUNK_CAPACITY)
    }
}

impl fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkPool")
            .field("chunk_capacity", &self.shared.chunk_capacity)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// One unit of bytes, immutable once produced.
///
/// Ownership transfers from producer to consumer on hand-off; the final
/// holder releases it by dropping it (or calling [`Chunk::release`], which
/// is the same thing spelled out).
pub struct Chunk {
    data: BytesMut,
    pool: Arc<PoolShared>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the backing buffer to the pool. Equivalent to dropping.
    pub fn release(self) {}
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let mut data = std::mem::take(&mut self.data);
        data.clear();
        let prev = self.pool.in_flight.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "chunk released with no checkout on record");
        if data.capacity() >= self.pool.chunk_capacity
            && let Ok(mut free) = self.pool.free.lock()
        {
            free.push(data);
        }
    }
}

impl std::ops::Deref for Chunk {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk").field("len", &self.len()).finish()
    }
}
