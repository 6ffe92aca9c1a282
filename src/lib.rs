//! chunkio
//!
//! A buffered, chunked I/O layer between raw async byte streams and
//! pipelines that work on poolable chunks of bytes. Adapters convert a
//! stream into a chunk producer or consumer (and back), a merging writer
//! amortizes many small writes into few large ones, and the copy engine
//! relays chunks from a source to a sink while keeping an activity timer
//! fresh for idle-timeout watchdogs.

pub mod chunk;
pub mod error;
pub mod io;
pub mod timer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types for convenience
pub use chunk::{Chunk, ChunkPool};
pub use error::TransferError;
pub use io::{
    ChunkByteReader, ChunkByteWriter, ChunkReader, ChunkSink, ChunkSource, ChunkWriter, IoParams,
    MergingChunkWriter, StreamChunkReader, StreamChunkWriter, TimeoutChunkReader, copy,
    copy_bidirectional, copy_with_timeout,
};
pub use timer::ActivityTimer;
