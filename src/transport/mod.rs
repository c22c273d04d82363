//! Transport module - concrete byte-channel substrates.
//!
//! The core is transport-agnostic: anything implementing tokio's
//! `AsyncRead`/`AsyncWrite` carries packets. This module supplies the
//! substrate the domain-0 socket interface actually uses.

#[cfg(unix)]
mod socket;

#[cfg(unix)]
pub use socket::{connect, xenstored_socket_path, SocketListener, DEFAULT_SOCKET_PATH};
