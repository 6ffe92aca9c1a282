use tokio::io::{AsyncRead, AsyncWrite};

/// Type-erased async byte source.
///
/// Blanket-implemented so any tokio reader (sockets, TLS wrappers, split
/// halves, in-memory pipes) can be boxed behind the chunk adapters. The
/// adapters never shut these streams down; closing stays with the owner.
pub trait ReadStream: AsyncRead + Send + Sync + Unpin {}
impl<T> ReadStream for T where T: AsyncRead + Send + Sync + Unpin {}

/// Type-erased async byte sink.
pub trait WriteStream: AsyncWrite + Send + Sync + Unpin {}
impl<T> WriteStream for T where T: AsyncWrite + Send + Sync + Unpin {}
