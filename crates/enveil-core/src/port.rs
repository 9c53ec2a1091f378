//! Named, bidirectional, asynchronous event channels between contexts.
//!
//! A [`Port`] connects exactly two endpoints. Messages are CBOR-encoded on
//! emit and decoded on receive, so neither side ever shares memory with the
//! other. Delivery is FIFO per port; there is no ordering across ports.
//!
//! # Lifecycle
//!
//! ```text
//! ┌───────────┐  disconnect() / remote gone  ┌──────────────┐
//! │ Connected │─────────────────────────────>│ Disconnected │
//! └───────────┘                              └──────────────┘
//! ```
//!
//! Disconnection is terminal and applies to both endpoints at once. The remote
//! side observes it exactly once, as [`Inbound::Disconnected`] after every
//! message sent before it. Emitting on either endpoint of a disconnected port
//! returns [`PortError::ChannelClosed`] and delivers nothing, whether or not
//! the remote side has received the disconnect yet.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use tokio::sync::{Notify, mpsc};

use crate::{Message, error::PortError};

/// What travels through the underlying channel.
#[derive(Debug)]
enum Envelope {
    Data(Bytes),
    Disconnect,
}

/// Something received from the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A decoded message.
    Message(Message),
    /// The remote endpoint disconnected. Delivered once.
    Disconnected,
}

/// Shared flags for the two halves of one endpoint.
struct EndpointState {
    /// We called `disconnect()`.
    local_closed: AtomicBool,
    /// Set by whichever endpoint disconnects or goes away first. Shared by
    /// both endpoints of the port.
    link_closed: Arc<AtomicBool>,
    /// Wakes a receiver parked in `recv()` on local disconnect.
    wake: Notify,
}

impl EndpointState {
    fn new(link_closed: Arc<AtomicBool>) -> Self {
        Self { local_closed: AtomicBool::new(false), link_closed, wake: Notify::new() }
    }
}

/// Releases a port name once both endpoints are dropped.
struct NameGuard {
    name: Arc<str>,
    live: Arc<Mutex<HashSet<String>>>,
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&*self.name);
        }
    }
}

type Listener = Box<dyn FnOnce() + Send>;

/// Sending half of a port.
pub struct PortSender {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope>,
    state: Arc<EndpointState>,
    _guard: Arc<NameGuard>,
}

impl PortSender {
    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether messages can still be delivered.
    pub fn is_connected(&self) -> bool {
        !self.state.link_closed.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Send a message to the remote endpoint.
    ///
    /// Fire-and-forget: success means the message was queued, not handled.
    pub fn emit(&self, message: &Message) -> Result<(), PortError> {
        if !self.is_connected() {
            return Err(self.closed());
        }

        let bytes = message.encode()?;
        tracing::trace!(port = %self.name, event = message.name(), "emit");
        self.tx.send(Envelope::Data(bytes)).map_err(|_| self.closed())
    }

    /// Disconnect both directions. Idempotent.
    pub fn disconnect(&self) {
        if self.state.local_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.link_closed.store(true, Ordering::Release);

        tracing::debug!(port = %self.name, "disconnect");
        // Remote may already be gone; nothing to notify then.
        let _ = self.tx.send(Envelope::Disconnect);
        self.state.wake.notify_one();
    }

    fn closed(&self) -> PortError {
        PortError::ChannelClosed { name: self.name.to_string() }
    }
}

impl Drop for PortSender {
    fn drop(&mut self) {
        // The remote can no longer answer anyone.
        self.state.link_closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for PortSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSender")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Receiving half of a port.
pub struct PortReceiver {
    name: Arc<str>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    state: Arc<EndpointState>,
    listeners: Vec<Listener>,
    /// `Inbound::Disconnected` already delivered.
    finished: bool,
    _guard: Arc<NameGuard>,
}

impl PortReceiver {
    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `listener` once when the remote disconnect is observed.
    pub fn add_disconnect_listener(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Next inbound item.
    ///
    /// Returns `None` after a local disconnect, or after
    /// [`Inbound::Disconnected`] has been delivered. Undecodable payloads are
    /// logged and skipped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            if self.finished || self.state.local_closed.load(Ordering::Acquire) {
                return None;
            }

            let envelope = tokio::select! {
                biased;
                () = self.state.wake.notified() => continue,
                envelope = self.rx.recv() => envelope,
            };

            match envelope {
                Some(Envelope::Data(bytes)) => match Message::decode(&bytes) {
                    Ok(message) => return Some(Inbound::Message(message)),
                    Err(e) => {
                        tracing::warn!(port = %self.name, error = %e, "dropping malformed message");
                    },
                },
                Some(Envelope::Disconnect) | None => return Some(self.remote_disconnected()),
            }
        }
    }

    fn remote_disconnected(&mut self) -> Inbound {
        self.finished = true;
        self.state.link_closed.store(true, Ordering::Release);
        self.rx.close();
        tracing::debug!(port = %self.name, "remote disconnected");

        for listener in self.listeners.drain(..) {
            listener();
        }
        Inbound::Disconnected
    }
}

impl fmt::Debug for PortReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortReceiver")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// One endpoint of a named channel.
#[derive(Debug)]
pub struct Port {
    sender: PortSender,
    receiver: PortReceiver,
}

impl Port {
    /// Two connected endpoints with a private name space.
    ///
    /// Use [`PortHub`] when names must be unique across live ports.
    pub fn pair(name: &str) -> (Self, Self) {
        Self::pair_in(name, Arc::new(Mutex::new(HashSet::new())))
    }

    fn pair_in(name: &str, live: Arc<Mutex<HashSet<String>>>) -> (Self, Self) {
        let name: Arc<str> = Arc::from(name);
        let guard = Arc::new(NameGuard { name: Arc::clone(&name), live });
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();

        let link_closed = Arc::new(AtomicBool::new(false));
        let a = Self::endpoint(&name, a_tx, a_rx, &guard, &link_closed);
        let b = Self::endpoint(&name, b_tx, b_rx, &guard, &link_closed);
        (a, b)
    }

    fn endpoint(
        name: &Arc<str>,
        tx: mpsc::UnboundedSender<Envelope>,
        rx: mpsc::UnboundedReceiver<Envelope>,
        guard: &Arc<NameGuard>,
        link_closed: &Arc<AtomicBool>,
    ) -> Self {
        let state = Arc::new(EndpointState::new(Arc::clone(link_closed)));
        Self {
            sender: PortSender {
                name: Arc::clone(name),
                tx,
                state: Arc::clone(&state),
                _guard: Arc::clone(guard),
            },
            receiver: PortReceiver {
                name: Arc::clone(name),
                rx,
                state,
                listeners: Vec::new(),
                finished: false,
                _guard: Arc::clone(guard),
            },
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Whether messages can still be delivered.
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// See [`PortSender::emit`].
    pub fn emit(&self, message: &Message) -> Result<(), PortError> {
        self.sender.emit(message)
    }

    /// See [`PortSender::disconnect`].
    pub fn disconnect(&self) {
        self.sender.disconnect();
    }

    /// See [`PortReceiver::recv`].
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.receiver.recv().await
    }

    /// See [`PortReceiver::add_disconnect_listener`].
    pub fn add_disconnect_listener(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.receiver.add_disconnect_listener(listener);
    }

    /// Split into independently owned halves.
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }
}

/// Connecting side of a named port space.
///
/// Content contexts call [`PortHub::connect`]; the background context takes
/// the matching endpoints from [`PortAcceptor::accept`]. A name is reserved
/// while either endpoint of its port is alive.
#[derive(Clone)]
pub struct PortHub {
    live: Arc<Mutex<HashSet<String>>>,
    accept_tx: mpsc::UnboundedSender<Port>,
}

/// Accepting side of a [`PortHub`].
#[derive(Debug)]
pub struct PortAcceptor {
    accept_rx: mpsc::UnboundedReceiver<Port>,
}

impl PortHub {
    /// New hub and its acceptor.
    pub fn new() -> (Self, PortAcceptor) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (Self { live: Arc::new(Mutex::new(HashSet::new())), accept_tx }, PortAcceptor {
            accept_rx,
        })
    }

    /// Open a uniquely named port to the background.
    pub fn connect(&self, name: &str) -> Result<Port, PortError> {
        {
            let mut live = self.live.lock().map_err(|_| PortError::NoListener)?;
            if !live.insert(name.to_owned()) {
                return Err(PortError::NameInUse { name: name.to_owned() });
            }
        }

        let (local, remote) = Port::pair_in(name, Arc::clone(&self.live));
        // On failure `remote` is dropped with the error and `local` below
        // releases the name.
        self.accept_tx.send(remote).map_err(|_| PortError::NoListener)?;
        tracing::debug!(port = name, "connected");
        Ok(local)
    }

    /// Whether a port with this name is alive.
    pub fn is_live(&self, name: &str) -> bool {
        self.live.lock().is_ok_and(|live| live.contains(name))
    }
}

impl fmt::Debug for PortHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortHub").finish_non_exhaustive()
    }
}

impl PortAcceptor {
    /// Next port opened by a content context. `None` once every hub is gone.
    pub async fn accept(&mut self) -> Option<Port> {
        self.accept_rx.recv().await
    }
}
