//! Error types for xenstore-wire.

use thiserror::Error;

/// Main error type for all protocol operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent a header with an operation code outside the
    /// protocol's table.
    #[error("unknown xenstore operation: {0}")]
    UnknownOperation(u32),

    /// Framing-level protocol violation: advertised length above the
    /// maximum, or the stream ended mid-packet.
    #[error("failed to parse packet stream")]
    ParserFailed,

    /// The store reports the key does not exist.
    #[error("no such key: {0}")]
    Enoent(String),

    /// Transaction conflict; retry the whole transaction.
    #[error("transaction conflict, retry")]
    Eagain,

    /// The store rejected the request as ill-formed.
    #[error("invalid request")]
    Invalid,

    /// Any other store-reported error, by name.
    #[error("xenstore error: {0}")]
    Server(String),

    /// Local data error: a request that cannot be framed, or a reply
    /// whose payload does not match its operation.
    #[error("malformed data: {0}")]
    Data(String),

    /// The connection closed before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
