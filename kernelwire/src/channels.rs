//! The channel multiplexer: N channel sockets, one bidirectional stream.
//!
//! Inbound, every socket's decoded messages are tagged with their channel
//! name and merged into a single delivery queue (order preserved per
//! socket, interleaved across sockets). Outbound, the tag selects the
//! destination socket and session defaults are stamped into the header
//! before transmission.
//!
//! The stream is deliberately split into two separately ownable halves, a
//! [`MainChannelSender`] and a [`MainChannelReceiver`], so read and write
//! lifecycles cannot couple accidentally. Dropping the sender tears the
//! sockets down; the receiver then drains whatever was already delivered.

use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use tracing::{trace, warn};

use crate::channel::Channel;
use crate::error::{ConfigError, Error};
use crate::msg::Message;
use crate::socket::{ChannelEvent, ChannelSocket};

/// Per-connection values injected into every outbound header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session: String,
    pub username: String,
}

/// A message plus the channel it arrived on / should leave through.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMessage {
    pub channel: Channel,
    pub message: Message,
}

/// Mapping from channel to its socket; built once, never mutated.
pub type ChannelSet<T = ChannelSocket> = HashMap<Channel, T>;

/// The multiplexer's view of a socket: send, listen, close.
///
/// [`ChannelSocket`] is the production implementation; tests plug in
/// recording fakes.
pub trait ChannelTransport {
    /// Fire-and-forget transmit; failures surface on the event queue.
    fn send(&self, message: Message);
    /// The socket's decoded-traffic event queue.
    fn events(&self) -> flume::Receiver<ChannelEvent>;
    /// Release the transport. Must be idempotent.
    fn close(&self);
}

impl ChannelTransport for ChannelSocket {
    fn send(&self, message: Message) {
        ChannelSocket::send(self, message);
    }

    fn events(&self) -> flume::Receiver<ChannelEvent> {
        ChannelSocket::events(self)
    }

    fn close(&self) {
        ChannelSocket::close(self);
    }
}

/// Outbound half: routes tagged messages to their channel socket and owns
/// teardown.
pub struct MainChannelSender<T: ChannelTransport = ChannelSocket> {
    sockets: ChannelSet<T>,
    defaults: Option<SessionInfo>,
    closed: AtomicBool,
}

/// Inbound half: the merged, per-socket-ordered delivery queue.
pub struct MainChannelReceiver {
    rx: flume::Receiver<TaggedMessage>,
}

/// Compose a set of channel sockets into one bidirectional stream.
///
/// Spawns one fan-in task per socket; each tags arriving messages with the
/// socket's channel and pushes them into an unbounded merged queue (a slow
/// consumer grows the queue; that is the accepted trade-off of this model).
/// Routing idents are stripped before delivery: they are transport
/// metadata, not message content. `Raw` and `Error` socket events are
/// logged, not forwarded.
pub fn create_main_channel<T>(
    sockets: ChannelSet<T>,
    defaults: Option<SessionInfo>,
) -> (MainChannelSender<T>, MainChannelReceiver)
where
    T: ChannelTransport + 'static,
{
    let (merged_tx, merged_rx) = flume::unbounded();

    for (&channel, socket) in &sockets {
        let events = socket.events();
        let merged_tx = merged_tx.clone();
        compio::runtime::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                match event {
                    ChannelEvent::Message(mut message) => {
                        message.idents.clear();
                        if merged_tx.send(TaggedMessage { channel, message }).is_err() {
                            // Receiver gone; nothing left to deliver to
                            break;
                        }
                    }
                    ChannelEvent::Raw(frames) => {
                        trace!("[{}] ignoring {}-frame raw batch", channel, frames.len());
                    }
                    ChannelEvent::Error(e) => {
                        warn!("[{}] channel error: {}", channel, e);
                    }
                }
            }
        })
        .detach();
    }

    let sender = MainChannelSender {
        sockets,
        defaults,
        closed: AtomicBool::new(false),
    };

    (sender, MainChannelReceiver { rx: merged_rx })
}

impl<T: ChannelTransport> MainChannelSender<T> {
    /// Route a tagged message to its channel socket.
    ///
    /// Session defaults win for `session` and `username`; every other
    /// header field passes through unchanged, and absent sections go out
    /// as empty mappings.
    pub fn send(&self, tagged: TaggedMessage) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SocketClosed);
        }
        let socket = self
            .sockets
            .get(&tagged.channel)
            .ok_or(ConfigError::UnwiredChannel(tagged.channel))?;

        socket.send(apply_session_defaults(tagged.message, self.defaults.as_ref()));
        Ok(())
    }

    /// Close every owned socket exactly once, no matter how often this is
    /// called.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for socket in self.sockets.values() {
            socket.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<T: ChannelTransport> Drop for MainChannelSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl MainChannelReceiver {
    /// Next tagged message, or `None` once every socket is gone and the
    /// queue is drained.
    pub async fn recv(&self) -> Option<TaggedMessage> {
        self.rx.recv_async().await.ok()
    }

    /// Non-suspending variant of [`recv`](Self::recv).
    pub fn try_recv(&self) -> Option<TaggedMessage> {
        self.rx.try_recv().ok()
    }

    /// Messages currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

fn apply_session_defaults(mut message: Message, defaults: Option<&SessionInfo>) -> Message {
    if let Some(defaults) = defaults {
        message.header.session = Some(defaults.session.clone());
        message.header.username = Some(defaults.username.clone());
    }
    message
}
