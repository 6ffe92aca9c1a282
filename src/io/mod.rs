//! Chunked I/O adapters and the relay loop.
//!
//! This module converts between raw async byte streams and chunked
//! producers/consumers in both directions:
//! - [`StreamChunkReader`] / [`StreamChunkWriter`]: raw stream ↔ chunks
//! - [`MergingChunkWriter`]: chunks → raw stream, coalescing small writes
//! - [`ChunkByteReader`] / [`ChunkByteWriter`]: chunked handle back to a
//!   stream-shaped one
//! - [`ChunkSource`] / [`ChunkSink`]: construction-time dispatch between
//!   the adapters above and handles that already speak chunks natively
//! - [`copy`] and friends: the relay loop tying a source to a sink

mod chunked;
mod copy;
mod reader;
mod stream;
mod writer;

pub use chunked::{ChunkReader, ChunkWriter, TimeoutChunkReader};
pub use copy::{copy, copy_bidirectional, copy_with_timeout};
pub use reader::{ChunkByteReader, ChunkSource, StreamChunkReader};
pub use stream::{ReadStream, WriteStream};
pub use writer::{
    ChunkByteWriter, ChunkSink, DEFAULT_MERGE_CAPACITY, MergingChunkWriter, StreamChunkWriter,
};

use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_CHUNK_CAPACITY;

/// I/O tuning knobs, deserializable straight from an application config.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IoParams {
    /// Scratch buffer / chunk capacity for stream readers.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Accumulation buffer capacity for merging writers.
    #[serde(default = "default_merge_buffer_size")]
    pub merge_buffer_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_CAPACITY
}

fn default_merge_buffer_size() -> usize {
    DEFAULT_MERGE_CAPACITY
}

impl Default for IoParams {
    fn default() -> Self {
        IoParams {
            chunk_size: default_chunk_size(),
            merge_buffer_size: default_merge_buffer_size(),
        }
    }
}
