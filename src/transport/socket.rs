//! Unix-socket substrate for the xenstored socket interface.
//!
//! In domain 0, xenstored listens on a Unix socket; the returned
//! [`UnixStream`] satisfies the byte-channel contract and plugs straight
//! into [`PacketStream`](crate::PacketStream) or
//! [`Client`](crate::Client).
//!
//! # Example
//!
//! ```ignore
//! use xenstore_wire::transport;
//!
//! let socket = transport::connect(transport::xenstored_socket_path()).await?;
//! let client = xenstore_wire::Client::new(socket);
//! ```

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// Where xenstored listens when nothing says otherwise.
pub const DEFAULT_SOCKET_PATH: &str = "/run/xenstored/socket";

/// The socket path to use: `$XENSTORED_PATH` if set, the default
/// otherwise.
pub fn xenstored_socket_path() -> PathBuf {
    std::env::var_os("XENSTORED_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Connect to a store socket.
pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    Ok(UnixStream::connect(path).await?)
}

/// Server-side listener that unlinks its socket file on drop.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// Bind to a socket path, replacing any stale socket file.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Self { listener, path })
    }

    /// Accept one connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
