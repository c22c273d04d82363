//! # xenstore-wire
//!
//! Client/server library for the XenStore wire protocol: the
//! hierarchical key/value store the Xen hypervisor uses to exchange
//! configuration and control information between the privileged domain
//! and guests.
//!
//! ## Architecture
//!
//! - **Protocol core** ([`protocol`]): operation codes, the 16-byte
//!   little-endian header, the packet type, an incremental parser that
//!   accepts arbitrarily fragmented input, ACLs, and watch tokens.
//! - **Typed payloads** ([`request`], [`response`], [`unmarshal`]):
//!   constructors and projections binding each operation to its payload
//!   grammar.
//! - **Streams** ([`PacketStream`]): whole-packet send/receive over any
//!   tokio byte channel.
//! - **Client** ([`Client`]): request/reply correlation by request id
//!   and watch-event demultiplexing by token, over one channel.
//!
//! ## Example
//!
//! ```no_run
//! use xenstore_wire::{transport, Client};
//!
//! #[tokio::main]
//! async fn main() -> xenstore_wire::Result<()> {
//!     let socket = transport::connect(transport::xenstored_socket_path()).await?;
//!     let client = Client::new(socket);
//!
//!     for name in client.directory(0, "/local/domain").await? {
//!         let path = format!("/local/domain/{}/name", name);
//!         println!("{}: {}", name, client.read(0, &path).await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod request;
pub mod response;
pub mod transport;
pub mod unmarshal;

mod client;
mod stream;

pub use client::{response, Client, ClientConfig, Subscription, WatchEvent};
pub use error::{Error, Result};
pub use protocol::{Acl, Op, Packet, Parse, Parser, Perm, Token};
pub use stream::PacketStream;
