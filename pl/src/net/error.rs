//! Channel error types and their classification

use std::io;

use thiserror::Error;

use crate::wire::DecodeError;

/// How a caller should react to a failed channel operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Nothing available right now; try again next cycle
    Transient,
    /// The peer or network path went away; stop gracefully
    Gone,
    /// Anything else; terminate the owning loop
    Fatal,
}

/// Classify an I/O error from a socket operation
pub fn classify_io(err: &io::Error) -> ErrorClass {
    use io::ErrorKind::*;

    match err.kind() {
        WouldBlock | TimedOut | Interrupted => return ErrorClass::Transient,
        BrokenPipe | ConnectionReset | ConnectionAborted | ConnectionRefused | NotConnected | NetworkDown
        | NetworkUnreachable | HostUnreachable => return ErrorClass::Gone,
        _ => {}
    }

    // Kinds std does not map on every platform
    match err.raw_os_error() {
        Some(code) if code == nix::libc::ENETRESET || code == nix::libc::EHOSTDOWN => ErrorClass::Gone,
        _ => ErrorClass::Fatal,
    }
}

/// Errors from sending or receiving on the broadcast channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{op}: short datagram of {len} bytes")]
    ShortRead { op: &'static str, len: usize },

    #[error("{op}: sent {sent} of {expected} bytes")]
    ShortWrite {
        op: &'static str,
        sent: usize,
        expected: usize,
    },

    #[error("{op}: malformed datagram: {source}")]
    Malformed {
        op: &'static str,
        #[source]
        source: DecodeError,
    },
}

impl ChannelError {
    pub fn io(op: &'static str, source: io::Error) -> Self {
        ChannelError::Io { op, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ChannelError::Io { source, .. } => classify_io(source),
            ChannelError::ShortRead { .. } | ChannelError::ShortWrite { .. } | ChannelError::Malformed { .. } => {
                ErrorClass::Fatal
            }
        }
    }

    /// The peer or network path went away
    pub fn is_gone(&self) -> bool {
        self.class() == ErrorClass::Gone
    }

    /// A read timeout or would-block condition
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient() {
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(classify_io(&err), ErrorClass::Transient);
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_io(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_gone() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::NetworkUnreachable,
            io::ErrorKind::HostUnreachable,
        ] {
            assert_eq!(classify_io(&io::Error::from(kind)), ErrorClass::Gone, "{kind:?}");
        }
        let err = io::Error::from_raw_os_error(nix::libc::ENETRESET);
        assert_eq!(classify_io(&err), ErrorClass::Gone);
    }

    #[test]
    fn test_classify_fatal() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(classify_io(&err), ErrorClass::Fatal);
        let err = ChannelError::ShortRead { op: "recv", len: 7 };
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn test_error_message_names_operation() {
        let err = ChannelError::io("sendto", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().starts_with("sendto failed"));
        assert!(!err.is_gone());
    }
}
