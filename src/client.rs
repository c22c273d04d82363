//! Correlation and the typed client.
//!
//! [`response`] is the correlation step every reply goes through: check
//! that the reply matches the request it is being paired with, turn
//! store-reported error names into typed errors, and project the payload.
//!
//! [`Client`] drives a full duplex channel: a spawned read loop parses
//! incoming packets and routes them — watch events by token to their
//! subscriber, everything else by request id to the caller awaiting it.
//! Requests from any number of tasks interleave freely; the write side is
//! serialized through one lock so packets hit the wire whole.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> xenstore_wire::Result<()> {
//! use xenstore_wire::{transport, Client};
//!
//! let socket = transport::connect(transport::xenstored_socket_path()).await?;
//! let client = Client::new(socket);
//!
//! client.write(0, "/foo", b"bar").await?;
//! let value = client.read(0, "/foo").await?;
//! assert_eq!(value, "bar");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::protocol::{errno, Acl, Op, Packet, Token};
use crate::request;
use crate::stream::PacketStream;
use crate::unmarshal;

/// Pair a received reply with the request it answers.
///
/// Verifies that `received` echoes the `rid` and `tid` of `sent`, maps
/// store-reported error names (`ENOENT`, `EAGAIN`, `EINVAL`, anything
/// else) to typed errors, and otherwise applies `unmarshal` to project
/// the payload. A projection mismatch is reported under `hint`.
///
/// The reply's operation type is not checked against an expectation; a
/// reply of the wrong type simply fails to unmarshal.
pub fn response<T>(
    hint: &str,
    sent: &Packet,
    received: &Packet,
    unmarshal: impl FnOnce(&Packet) -> Option<T>,
) -> Result<T> {
    if received.rid() != sent.rid() || received.tid() != sent.tid() {
        return Err(Error::Data(format!(
            "uncorrelated reply for {}: rid {} (sent {}), tid {} (sent {})",
            hint,
            received.rid(),
            sent.rid(),
            received.tid(),
            sent.tid()
        )));
    }

    if received.op() == Op::Error {
        let name = String::from_utf8_lossy(received.data()).into_owned();
        return Err(match name.as_str() {
            errno::ENOENT => Error::Enoent(hint.to_string()),
            errno::EAGAIN => Error::Eagain,
            errno::EINVAL => Error::Invalid,
            _ => Error::Server(name),
        });
    }

    unmarshal(received).ok_or_else(|| Error::Server(hint.to_string()))
}

/// Client tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of each watch subscription's event queue. Events
    /// arriving while the queue is full are dropped with a warning.
    pub watch_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { watch_queue: 32 }
    }
}

/// A change notification delivered to a watch subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// The path that changed.
    pub path: String,
    /// The subscriber's token, user projection.
    pub token: String,
}

/// A registered watch: the wire token (needed to unwatch) and the event
/// queue.
pub struct Subscription {
    pub token: Token,
    pub events: mpsc::Receiver<WatchEvent>,
}

/// Routing state shared between the read loop and request issuers.
#[derive(Default)]
struct Router {
    /// In-flight requests by rid.
    pending: Mutex<HashMap<u32, oneshot::Sender<Packet>>>,
    /// Watch subscribers by wire token.
    watches: Mutex<HashMap<String, mpsc::Sender<WatchEvent>>>,
}

impl Router {
    fn route(&self, packet: Packet) {
        if packet.op() == Op::WatchEvent {
            self.route_watch_event(&packet);
            return;
        }

        let waiter = self.pending.lock().unwrap().remove(&packet.rid());
        match waiter {
            // the caller may have given up; a dead oneshot is fine
            Some(tx) => drop(tx.send(packet)),
            None => warn!(rid = packet.rid(), op = %packet.op(), "reply with no waiting request"),
        }
    }

    fn route_watch_event(&self, packet: &Packet) {
        let fields = unmarshal::list(packet);
        let Some([path, token]) = fields.as_deref() else {
            warn!("malformed watch event payload");
            return;
        };

        let watches = self.watches.lock().unwrap();
        let Some(tx) = watches.get(token.as_str()) else {
            warn!(token = token.as_str(), "watch event for unknown token");
            return;
        };

        let event = WatchEvent {
            path: path.clone(),
            token: Token::from_wire(token).user().to_string(),
        };
        if tx.try_send(event).is_err() {
            warn!(token = token.as_str(), "watch queue full, dropping event");
        }
    }
}

/// A typed client over one byte channel.
pub struct Client {
    writer: AsyncMutex<PacketStream<Box<dyn AsyncWrite + Send + Unpin>>>,
    router: Arc<Router>,
    config: ClientConfig,
    reader: JoinHandle<()>,
}

impl Client {
    /// Bind a client to a duplex channel with default configuration.
    pub fn new(chan: impl AsyncRead + AsyncWrite + Send + Unpin + 'static) -> Client {
        Self::with_config(chan, ClientConfig::default())
    }

    /// Bind a client to a duplex channel.
    pub fn with_config(
        chan: impl AsyncRead + AsyncWrite + Send + Unpin + 'static,
        config: ClientConfig,
    ) -> Client {
        let (read_half, write_half) = tokio::io::split(chan);
        let router = Arc::new(Router::default());

        let reader = tokio::spawn(read_loop(
            PacketStream::new(Box::new(read_half) as Box<dyn AsyncRead + Send + Unpin>),
            router.clone(),
        ));

        Client {
            writer: AsyncMutex::new(PacketStream::new(Box::new(write_half))),
            router,
            config,
            reader,
        }
    }

    /// Whether the read loop has exited (connection gone).
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Read the value of a node.
    pub async fn read(&self, tid: u32, path: &str) -> Result<String> {
        let req = built(path, request::read(tid, path))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::string)
    }

    /// Write a value to a node.
    pub async fn write(&self, tid: u32, path: &str, value: &[u8]) -> Result<()> {
        let req = built(path, request::write(tid, path, value))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::unit)
    }

    /// List the children of a node.
    pub async fn directory(&self, tid: u32, path: &str) -> Result<Vec<String>> {
        let req = built(path, request::directory(tid, path))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::list)
    }

    /// Create a node.
    pub async fn mkdir(&self, tid: u32, path: &str) -> Result<()> {
        let req = built(path, request::mkdir(tid, path))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::unit)
    }

    /// Remove a node and its subtree.
    pub async fn rm(&self, tid: u32, path: &str) -> Result<()> {
        let req = built(path, request::rm(tid, path))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::unit)
    }

    /// Fetch the ACL attached to a node.
    pub async fn get_perms(&self, tid: u32, path: &str) -> Result<Acl> {
        let req = built(path, request::get_perms(tid, path))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::acl)
    }

    /// Replace the ACL attached to a node.
    pub async fn set_perms(&self, tid: u32, path: &str, acl: &Acl) -> Result<()> {
        let req = built(path, request::set_perms(tid, path, acl))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::unit)
    }

    /// Subscribe to changes under a path.
    ///
    /// The returned [`Subscription`] yields one [`WatchEvent`] per store
    /// notification, including the initial event the store fires on
    /// registration. Keep the subscription's token to [`unwatch`](Client::unwatch).
    pub async fn watch(&self, path: &str, user_token: &str) -> Result<Subscription> {
        let token = Token::from_user(user_token);
        let req = built(path, request::watch(path, &token))?;

        let (tx, events) = mpsc::channel(self.config.watch_queue);
        self.router
            .watches
            .lock()
            .unwrap()
            .insert(token.as_wire().to_string(), tx);

        let resp = match self.rpc(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                self.router.watches.lock().unwrap().remove(token.as_wire());
                return Err(e);
            }
        };
        if let Err(e) = response(path, &req, &resp, unmarshal::unit) {
            self.router.watches.lock().unwrap().remove(token.as_wire());
            return Err(e);
        }

        Ok(Subscription { token, events })
    }

    /// Cancel a watch. The token must be the one its subscription holds.
    pub async fn unwatch(&self, path: &str, token: &Token) -> Result<()> {
        let req = built(path, request::unwatch(path, token))?;
        let resp = self.rpc(&req).await?;
        response(path, &req, &resp, unmarshal::unit)?;
        self.router.watches.lock().unwrap().remove(token.as_wire());
        Ok(())
    }

    /// Open a transaction and return its id.
    pub async fn transaction_start(&self) -> Result<u32> {
        let req = built("transaction_start", request::transaction_start())?;
        let resp = self.rpc(&req).await?;
        response("transaction_start", &req, &resp, unmarshal::int32)
    }

    /// Close a transaction. On [`Error::Eagain`] the whole transaction
    /// must be retried from `transaction_start`.
    pub async fn transaction_end(&self, tid: u32, commit: bool) -> Result<()> {
        let req = built("transaction_end", request::transaction_end(tid, commit))?;
        let resp = self.rpc(&req).await?;
        response("transaction_end", &req, &resp, unmarshal::unit)
    }

    /// Ask for a domain's home path in the store.
    pub async fn get_domain_path(&self, domid: u32) -> Result<String> {
        let hint = format!("domid {}", domid);
        let req = built(&hint, request::get_domain_path(domid))?;
        let resp = self.rpc(&req).await?;
        response(&hint, &req, &resp, unmarshal::string)
    }

    /// Introduce a new domain to the store.
    pub async fn introduce(&self, domid: u32, mfn: u64, port: u32) -> Result<()> {
        let hint = format!("introduce domid {}", domid);
        let req = built(&hint, request::introduce(domid, mfn, port))?;
        let resp = self.rpc(&req).await?;
        response(&hint, &req, &resp, unmarshal::unit)
    }

    /// Release a domain's connection.
    pub async fn release(&self, domid: u32) -> Result<()> {
        self.domid_op("release", request::release(domid)).await
    }

    /// Resume a domain's connection after suspend.
    pub async fn resume(&self, domid: u32) -> Result<()> {
        self.domid_op("resume", request::resume(domid)).await
    }

    /// Ask whether a domain has been introduced.
    pub async fn is_introduced(&self, domid: u32) -> Result<bool> {
        let hint = format!("is_introduced domid {}", domid);
        let req = built(&hint, request::is_introduced(domid))?;
        let resp = self.rpc(&req).await?;
        response(&hint, &req, &resp, unmarshal::bool)
    }

    /// Point a stub domain at its target domain.
    pub async fn set_target(&self, domid: u32, target: u32) -> Result<()> {
        let hint = format!("set_target {} -> {}", domid, target);
        let req = built(&hint, request::set_target(domid, target))?;
        let resp = self.rpc(&req).await?;
        response(&hint, &req, &resp, unmarshal::unit)
    }

    /// Restrict this connection to a domain's privileges.
    pub async fn restrict(&self, domid: u32) -> Result<()> {
        self.domid_op("restrict", request::restrict(domid)).await
    }

    /// Send debug commands; the reply lines come back verbatim.
    pub async fn debug(&self, commands: &[&str]) -> Result<Vec<String>> {
        let req = built("debug", request::debug(commands))?;
        let resp = self.rpc(&req).await?;
        response("debug", &req, &resp, unmarshal::list)
    }

    async fn domid_op(&self, what: &str, packet: Option<Packet>) -> Result<()> {
        let req = built(what, packet)?;
        let resp = self.rpc(&req).await?;
        response(what, &req, &resp, unmarshal::unit)
    }

    /// Send a request and await its correlated reply.
    async fn rpc(&self, request: &Packet) -> Result<Packet> {
        let (tx, rx) = oneshot::channel();
        self.router
            .pending
            .lock()
            .unwrap()
            .insert(request.rid(), tx);

        let sent = {
            let mut writer = self.writer.lock().await;
            writer.send(request).await
        };
        if let Err(e) = sent {
            self.router.pending.lock().unwrap().remove(&request.rid());
            return Err(e);
        }

        rx.await.map_err(|_| Error::ConnectionClosed)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// A `None` from a request constructor means the inputs cannot be framed.
fn built(hint: &str, packet: Option<Packet>) -> Result<Packet> {
    packet.ok_or_else(|| Error::Data(format!("cannot frame request: {}", hint)))
}

/// Parse and route incoming packets until the channel dies.
async fn read_loop(mut stream: PacketStream<Box<dyn AsyncRead + Send + Unpin>>, router: Arc<Router>) {
    loop {
        match stream.recv().await {
            Ok(packet) => router.route(packet),
            Err(Error::ConnectionClosed) => {
                debug!("peer closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "read loop failed");
                break;
            }
        }
    }
    // waking every in-flight request by dropping its oneshot sender
    router.pending.lock().unwrap().clear();
    router.watches.lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response as resp;

    #[test]
    fn test_correlation_checks_rid_and_tid() {
        let sent = request::read(0, "/foo").unwrap();
        let other = request::read(0, "/foo").unwrap();
        let reply = resp::read(&other, b"value");

        match response("/foo", &sent, &reply, unmarshal::string) {
            Err(Error::Data(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_correlation_maps_error_names() {
        let sent = request::read(0, "/foo").unwrap();

        let enoent = resp::error(&sent, "ENOENT");
        match response("/foo", &sent, &enoent, unmarshal::string) {
            Err(Error::Enoent(key)) => assert_eq!(key, "/foo"),
            other => panic!("unexpected result: {:?}", other),
        }

        let eagain = resp::error(&sent, "EAGAIN");
        assert!(matches!(
            response("/foo", &sent, &eagain, unmarshal::string),
            Err(Error::Eagain)
        ));

        let einval = resp::error(&sent, "EINVAL");
        assert!(matches!(
            response("/foo", &sent, &einval, unmarshal::string),
            Err(Error::Invalid)
        ));

        let eacces = resp::error(&sent, "EACCES");
        match response("/foo", &sent, &eacces, unmarshal::string) {
            Err(Error::Server(name)) => assert_eq!(name, "EACCES"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_correlation_projects_payload() {
        let sent = request::read(0, "/foo").unwrap();
        let reply = resp::read(&sent, b"value");
        let value = response("/foo", &sent, &reply, unmarshal::string).unwrap();
        assert_eq!(value, "value");
    }

    #[test]
    fn test_unexpected_reply_type_fails_to_unmarshal() {
        // type is not checked directly; the projection rejects it
        let sent = request::read(0, "/foo").unwrap();
        let reply = Packet::new(sent.tid(), sent.rid(), Op::Directory, &b"a\0b\0"[..]);
        assert!(matches!(
            response("/foo", &sent, &reply, unmarshal::string),
            Err(Error::Server(_))
        ));
    }

    #[tokio::test]
    async fn test_client_rpc_over_duplex() {
        let (near, far) = tokio::io::duplex(4096);
        let client = Client::new(near);

        let server = tokio::spawn(async move {
            let mut stream = PacketStream::new(far);
            let req = stream.recv().await.unwrap();
            assert_eq!(req.op(), Op::Read);
            stream.send(&resp::read(&req, b"42")).await.unwrap();
            stream.into_inner()
        });

        let value = client.read(0, "/answer").await.unwrap();
        assert_eq!(value, "42");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_interleaved_requests() {
        let (near, far) = tokio::io::duplex(4096);
        let client = std::sync::Arc::new(Client::new(near));

        // answer both requests in reverse arrival order to prove rid
        // correlation, not arrival order, pairs them up
        let server = tokio::spawn(async move {
            let mut stream = PacketStream::new(far);
            let first = stream.recv().await.unwrap();
            let second = stream.recv().await.unwrap();
            let reply = |req: &Packet| {
                let path = match request::parse(req) {
                    Some(request::Payload::Read(path)) => path,
                    other => panic!("unexpected request: {:?}", other),
                };
                resp::read(req, path.to_uppercase().as_bytes())
            };
            stream.send(&reply(&second)).await.unwrap();
            stream.send(&reply(&first)).await.unwrap();
        });

        let (a, b) = tokio::join!(client.read(0, "/aa"), client.read(0, "/bb"));
        assert_eq!(a.unwrap(), "/AA");
        assert_eq!(b.unwrap(), "/BB");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_watch_event_routing() {
        let (near, far) = tokio::io::duplex(4096);
        let client = Client::new(near);

        let server = tokio::spawn(async move {
            let mut stream = PacketStream::new(far);
            let req = stream.recv().await.unwrap();
            let (path, token) = match request::parse(&req) {
                Some(request::Payload::Watch(path, token)) => (path, token),
                other => panic!("unexpected request: {:?}", other),
            };
            stream.send(&resp::ack(&req)).await.unwrap();
            stream
                .send(&resp::watch_event(&path, &token))
                .await
                .unwrap();
            stream.into_inner()
        });

        let mut sub = client.watch("/local/domain/1", "fe").await.unwrap();
        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.path, "/local/domain/1");
        assert_eq!(event.token, "fe");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_surfaces_enoent() {
        let (near, far) = tokio::io::duplex(4096);
        let client = Client::new(near);

        let server = tokio::spawn(async move {
            let mut stream = PacketStream::new(far);
            let req = stream.recv().await.unwrap();
            stream.send(&resp::error(&req, "ENOENT")).await.unwrap();
            stream.into_inner()
        });

        match client.read(0, "/missing").await {
            Err(Error::Enoent(key)) => assert_eq!(key, "/missing"),
            other => panic!("unexpected result: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_pending_request_fails_on_disconnect() {
        let (near, far) = tokio::io::duplex(4096);
        let client = Client::new(near);

        let server = tokio::spawn(async move {
            let mut stream = PacketStream::new(far);
            let _req = stream.recv().await.unwrap();
            // hang up without answering
        });

        match client.read(0, "/foo").await {
            Err(Error::ConnectionClosed) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        server.await.unwrap();
    }
}
