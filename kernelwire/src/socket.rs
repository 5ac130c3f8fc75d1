//! Channel sockets: the only layer that touches the transport.
//!
//! A [`ChannelSocket`] wraps one kernel channel connection. Its receive
//! loop lives in a spawned pump task; decoded traffic comes back to callers
//! through a flume event queue rather than callbacks, so listeners
//! subscribe by taking a receiver handle. Connection lifecycle is observed
//! separately through an armable monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use kernelwire_core::endpoint::Endpoint;
use kernelwire_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use kernelwire_zmtp::{drive, PumpExit, SocketCmd, SocketKind};

use crate::channel::Channel;
use crate::error::{Error, ProtocolError};
use crate::msg::Message;
use crate::sign::MessageSigner;
use crate::wire;

/// What a channel socket surfaces to its listeners.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A verified, decoded protocol message
    Message(Message),
    /// A frame batch that does not speak the envelope format (e.g. a bare
    /// topic-prefixed publish from a foreign peer); surfaced rather than
    /// silently dropped
    Raw(Vec<Bytes>),
    /// A per-message protocol failure or a transport failure
    Error(Error),
}

/// Monitor arming state shared with the pump task.
///
/// Arming after the connection is already up replays `Connected`
/// immediately, so readiness gating works no matter which side of the
/// establishment the caller lands on.
#[derive(Debug)]
struct MonitorState {
    armed: Mutex<Option<SocketEventSender>>,
    connected: Mutex<Option<Endpoint>>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            armed: Mutex::new(None),
            connected: Mutex::new(None),
        }
    }

    fn arm(&self) -> SocketMonitor {
        let (tx, rx) = create_monitor();
        if let Some(endpoint) = self.connected.lock().clone() {
            let _ = tx.send(SocketEvent::Connected(endpoint));
        }
        *self.armed.lock() = Some(tx);
        rx
    }

    fn disarm(&self) {
        *self.armed.lock() = None;
    }

    fn emit(&self, event: SocketEvent) {
        match &event {
            SocketEvent::Connected(endpoint) => {
                *self.connected.lock() = Some(endpoint.clone());
            }
            SocketEvent::ConnectFailed { .. } | SocketEvent::Disconnected(_) => {
                *self.connected.lock() = None;
            }
        }
        if let Some(tx) = self.armed.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// One connection to one kernel channel.
#[derive(Debug)]
pub struct ChannelSocket {
    channel: Channel,
    kind: SocketKind,
    identity: Mutex<String>,
    signer: MessageSigner,
    cmd_tx: flume::Sender<SocketCmd>,
    /// Surrendered to the first pump; `None` afterwards, which is what
    /// makes connect() idempotent and the receive loop at-most-once.
    cmd_rx: Mutex<Option<flume::Receiver<SocketCmd>>>,
    events_tx: flume::Sender<ChannelEvent>,
    events_rx: flume::Receiver<ChannelEvent>,
    monitor: Arc<MonitorState>,
    closed: Arc<AtomicBool>,
}

impl ChannelSocket {
    pub fn new(channel: Channel, signer: MessageSigner) -> Self {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            channel,
            kind: channel.socket_kind(),
            identity: Mutex::new(String::new()),
            signer,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            events_tx,
            events_rx,
            monitor: Arc::new(MonitorState::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn identity(&self) -> String {
        self.identity.lock().clone()
    }

    /// Set the routing identity presented to the kernel at connect time.
    ///
    /// On a dealer-kind socket this is the routing id the kernel addresses
    /// replies back to. Subscriber transports have no addressable identity;
    /// the value is kept but has no routing effect.
    pub fn set_identity(&self, identity: impl Into<String>) {
        *self.identity.lock() = identity.into();
    }

    /// Establish a topic filter (empty string = receive everything).
    ///
    /// No-op on dealer-kind sockets. May be called before connect(); the
    /// filter is delivered right after the handshake.
    pub fn subscribe(&self, topic: &str) {
        if self.kind != SocketKind::Sub {
            return;
        }
        let _ = self
            .cmd_tx
            .send(SocketCmd::Subscribe(Bytes::copy_from_slice(
                topic.as_bytes(),
            )));
    }

    /// Remove a topic filter.
    pub fn unsubscribe(&self, topic: &str) {
        if self.kind != SocketKind::Sub {
            return;
        }
        let _ = self
            .cmd_tx
            .send(SocketCmd::Unsubscribe(Bytes::copy_from_slice(
                topic.as_bytes(),
            )));
    }

    /// Arm connection-event notification and return the event stream.
    pub fn monitor(&self) -> SocketMonitor {
        self.monitor.arm()
    }

    /// Disarm notification without otherwise affecting the socket.
    pub fn unmonitor(&self) {
        self.monitor.disarm()
    }

    /// Initiate the transport connection and start the receive loop.
    ///
    /// Returns as soon as the pump is spawned; establishment is reported
    /// through the monitor. A second call while a loop is active is a
    /// no-op.
    pub fn connect(&self, endpoint: &str) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SocketClosed);
        }
        let endpoint: Endpoint = endpoint.parse()?;

        let Some(cmd_rx) = self.cmd_rx.lock().take() else {
            trace!("[{}] connect called again, receive loop already running", self.channel);
            return Ok(());
        };

        let channel = self.channel;
        let kind = self.kind;
        let identity = self.identity.lock().clone();
        let identity = (!identity.is_empty()).then(|| Bytes::from(identity.into_bytes()));
        let signer = self.signer.clone();
        let events_tx = self.events_tx.clone();
        let closed = Arc::clone(&self.closed);
        let monitor = Arc::clone(&self.monitor);

        debug!("[{}] connecting to {}", channel, endpoint);

        compio::runtime::spawn(async move {
            let on_connected = {
                let monitor = Arc::clone(&monitor);
                let endpoint = endpoint.clone();
                move || {
                    debug!("[{}] connected to {}", channel, endpoint);
                    monitor.emit(SocketEvent::Connected(endpoint));
                }
            };
            let on_message = {
                let events_tx = events_tx.clone();
                let signer = signer.clone();
                let closed = Arc::clone(&closed);
                move |frames: Vec<Bytes>| {
                    if closed.load(Ordering::SeqCst) {
                        return;
                    }
                    deliver(channel, &signer, &events_tx, frames);
                }
            };

            let exit = drive(&endpoint, kind, identity, cmd_rx, on_connected, on_message).await;

            match exit {
                PumpExit::ConnectFailed(e) => {
                    debug!("[{}] connect to {} failed: {}", channel, endpoint, e);
                    monitor.emit(SocketEvent::ConnectFailed {
                        endpoint,
                        reason: e.to_string(),
                    });
                    if !closed.load(Ordering::SeqCst) {
                        let _ = events_tx.send(ChannelEvent::Error(Error::Transport(e)));
                    }
                }
                PumpExit::Transport(e) => {
                    monitor.emit(SocketEvent::Disconnected(endpoint));
                    // Expected during teardown; suppressed once closed
                    if !closed.load(Ordering::SeqCst) {
                        warn!("[{}] transport error: {}", channel, e);
                        let _ = events_tx.send(ChannelEvent::Error(Error::Transport(e)));
                    }
                }
                PumpExit::PeerClosed => {
                    debug!("[{}] peer closed connection", channel);
                    monitor.emit(SocketEvent::Disconnected(endpoint));
                }
                PumpExit::LocalClose => {}
            }
        })
        .detach();

        Ok(())
    }

    /// Encode, sign and transmit a message.
    ///
    /// No-op when closed. Encode and transmission failures surface as
    /// [`ChannelEvent::Error`], not as a return value: sends are
    /// fire-and-forget with asynchronous failure reporting.
    pub fn send(&self, message: Message) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        match wire::encode(&message, &self.signer) {
            Ok(frames) => {
                if self.cmd_tx.send(SocketCmd::Send(frames)).is_err() {
                    let _ = self.events_tx.send(ChannelEvent::Error(Error::SocketClosed));
                }
            }
            Err(e) => {
                let _ = self.events_tx.send(ChannelEvent::Error(Error::Protocol(e)));
            }
        }
    }

    /// The decoded-traffic event queue.
    ///
    /// Events arrive in per-socket receive order. Cloned receivers compete
    /// for events; use one consumer per socket.
    pub fn events(&self) -> flume::Receiver<ChannelEvent> {
        self.events_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the socket and release the transport. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[{}] closing", self.channel);
        let _ = self.cmd_tx.send(SocketCmd::Close);
    }
}

/// Per-batch delivery policy:
/// - decodes as a verified envelope → `Message`
/// - no delimiter (does not speak the envelope format) → `Raw`
/// - speaks the format but fails verification/parsing → `Error`, so
///   consumers never act on unauthenticated content
fn deliver(
    channel: Channel,
    signer: &MessageSigner,
    events_tx: &flume::Sender<ChannelEvent>,
    frames: Vec<Bytes>,
) {
    match wire::decode(&frames, signer) {
        Ok(message) => {
            trace!("[{}] decoded {:?} message", channel, message.header.msg_type);
            let _ = events_tx.send(ChannelEvent::Message(message));
        }
        Err(ProtocolError::MissingDelimiter) => {
            trace!("[{}] non-envelope batch of {} frames", channel, frames.len());
            let _ = events_tx.send(ChannelEvent::Raw(frames));
        }
        Err(e) => {
            warn!("[{}] rejected envelope: {}", channel, e);
            let _ = events_tx.send(ChannelEvent::Error(Error::Protocol(e)));
        }
    }
}
