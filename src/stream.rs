//! Packet stream over a byte channel.
//!
//! [`PacketStream`] turns any ordered byte channel into a sequence of
//! whole packets. The channel only has to implement tokio's `AsyncRead`
//! and/or `AsyncWrite`; sockets, ring buffers, and in-memory pipes all
//! qualify. Reads may land on any byte boundary; the internal
//! [`Parser`] reassembles packets regardless of fragmentation.
//!
//! A stream is single-owner: one task reads, one task writes. Splitting
//! a duplex channel into halves and wrapping each in its own stream is
//! the intended way to do both concurrently.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> xenstore_wire::Result<()> {
//! use xenstore_wire::{request, PacketStream};
//!
//! let socket = tokio::net::UnixStream::connect("/run/xenstored/socket").await?;
//! let mut stream = PacketStream::new(socket);
//!
//! let req = request::read(0, "/vm").unwrap();
//! stream.send(&req).await?;
//! let reply = stream.recv().await?;
//! # Ok(())
//! # }
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{Packet, Parse, Parser, PAYLOAD_MAX};

/// A packet-framed view of a byte channel.
pub struct PacketStream<C> {
    chan: C,
}

impl<C> PacketStream<C> {
    /// Bind a stream to a channel.
    pub fn new(chan: C) -> Self {
        Self { chan }
    }

    /// A reference to the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.chan
    }

    /// Unwrap the stream, returning the channel.
    ///
    /// Only safe at a packet boundary; a partially received packet is
    /// lost with the parser.
    pub fn into_inner(self) -> C {
        self.chan
    }

    /// Serialize a packet and write it out whole.
    pub async fn send(&mut self, packet: &Packet) -> Result<()>
    where
        C: AsyncWrite + Unpin,
    {
        self.chan.write_all(&packet.to_bytes()).await?;
        self.chan.flush().await?;
        trace!(op = %packet.op(), rid = packet.rid(), len = packet.payload_len(), "sent packet");
        Ok(())
    }

    /// Receive the next packet.
    ///
    /// Reads at most `parser.pending()` bytes at a time, so no bytes of
    /// a following packet are ever consumed. End-of-stream on a packet
    /// boundary is [`Error::ConnectionClosed`]; mid-packet it is a
    /// framing failure ([`Error::ParserFailed`]).
    pub async fn recv(&mut self) -> Result<Packet>
    where
        C: AsyncRead + Unpin,
    {
        let mut parser = Parser::new();
        let mut buf = [0u8; PAYLOAD_MAX];
        let mut consumed = false;

        loop {
            let want = parser.pending();
            let n = self.chan.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(if consumed {
                    Error::ParserFailed
                } else {
                    Error::ConnectionClosed
                });
            }
            consumed = true;

            match parser.input(&buf[..n]) {
                Parse::NeedMoreData(_) => continue,
                Parse::Complete(packet) => {
                    trace!(
                        op = %packet.op(),
                        rid = packet.rid(),
                        len = packet.payload_len(),
                        "received packet"
                    );
                    return Ok(packet);
                }
                Parse::UnknownOperation(code) => return Err(Error::UnknownOperation(code)),
                Parse::Failed => return Err(Error::ParserFailed),
            }
        }
    }
}
