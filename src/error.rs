use std::{fmt, io};

/// Failure of a chunked read, write, or relay.
///
/// End-of-stream is deliberately not represented here: readers report it as
/// `Ok(None)` and the copy loop treats it as normal termination. Everything
/// in this enum is fatal to the operation that returned it.
#[derive(Debug)]
pub enum TransferError {
    /// No data arrived within the allowed window.
    ReadTimeout,
    /// The source stream failed.
    Read(io::Error),
    /// The sink stream failed.
    Write(io::Error),
}

impl TransferError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransferError::ReadTimeout)
    }

    /// The underlying I/O error, if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            TransferError::ReadTimeout => None,
            TransferError::Read(e) | TransferError::Write(e) => Some(e),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::ReadTimeout => write!(f, "timed out waiting for data"),
            TransferError::Read(e) => write!(f, "read failed: {}", e),
            TransferError::Write(e) => write!(f, "write failed: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::ReadTimeout => None,
            TransferError::Read(e) | TransferError::Write(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_are_distinguishable() {
        let read = TransferError::Read(io::Error::new(io::ErrorKind::ConnectionReset, "boom"));
        let write = TransferError::Write(io::Error::new(io::ErrorKind::BrokenPipe, "boom"));
        assert!(read.to_string().starts_with("read failed"));
        assert!(write.to_string().starts_with("write failed"));
        assert!(!read.is_timeout());
        assert!(TransferError::ReadTimeout.is_timeout());
        assert_eq!(
            read.io_error().map(|e| e.kind()),
            Some(io::ErrorKind::ConnectionReset)
        );
    }
}
