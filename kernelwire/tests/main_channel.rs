//! Multiplexer behavior over fake channel transports, mirroring how the
//! kernel-facing sockets plug in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use kernelwire::{
    create_main_channel, Channel, ChannelEvent, ChannelSet, ChannelTransport, Error, Header,
    Message, SessionInfo, TaggedMessage,
};
use parking_lot::Mutex;
use serde_json::json;

/// Recording fake with an externally drivable event queue.
struct FakeSocket {
    sent: Arc<Mutex<Vec<Message>>>,
    close_calls: Arc<AtomicUsize>,
    events_rx: flume::Receiver<ChannelEvent>,
}

/// Handles that stay behind when the socket moves into the channel set.
struct FakeHandles {
    sent: Arc<Mutex<Vec<Message>>>,
    close_calls: Arc<AtomicUsize>,
    events_tx: flume::Sender<ChannelEvent>,
}

impl FakeSocket {
    fn new() -> (Self, FakeHandles) {
        let (events_tx, events_rx) = flume::unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let close_calls = Arc::new(AtomicUsize::new(0));
        let handles = FakeHandles {
            sent: Arc::clone(&sent),
            close_calls: Arc::clone(&close_calls),
            events_tx: events_tx.clone(),
        };
        (
            Self {
                sent,
                close_calls,
                events_rx,
            },
            handles,
        )
    }
}

impl FakeHandles {
    fn emit(&self, message: Message) {
        self.events_tx.send(ChannelEvent::Message(message)).unwrap();
    }
}

impl ChannelTransport for FakeSocket {
    fn send(&self, message: Message) {
        self.sent.lock().push(message);
    }

    fn events(&self) -> flume::Receiver<ChannelEvent> {
        self.events_rx.clone()
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn message_with_type(msg_type: &str) -> Message {
    Message {
        header: Header {
            msg_type: Some(msg_type.to_string()),
            ..Header::default()
        },
        ..Message::default()
    }
}

#[compio::test]
async fn fan_in_tags_messages_with_their_channel() {
    let (shell, shell_handles) = FakeSocket::new();
    let (iopub, iopub_handles) = FakeSocket::new();

    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);
    sockets.insert(Channel::Iopub, iopub);

    let (_sender, receiver) = create_main_channel(sockets, None);

    shell_handles.emit(message_with_type("execute_reply"));
    iopub_handles.emit(message_with_type("status"));

    let mut received = vec![
        receiver.recv().await.unwrap(),
        receiver.recv().await.unwrap(),
    ];
    // No ordering promise across sockets; normalize before asserting
    received.sort_by_key(|tagged| tagged.channel.as_str());

    assert_eq!(received[0].channel, Channel::Iopub);
    assert_eq!(received[0].message.header.msg_type.as_deref(), Some("status"));
    assert_eq!(received[1].channel, Channel::Shell);
    assert_eq!(
        received[1].message.header.msg_type.as_deref(),
        Some("execute_reply")
    );
}

#[compio::test]
async fn fan_in_preserves_per_socket_order() {
    let (shell, handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (_sender, receiver) = create_main_channel(sockets, None);

    for i in 0..3 {
        handles.emit(message_with_type(&format!("msg-{i}")));
    }

    for i in 0..3 {
        let tagged = receiver.recv().await.unwrap();
        assert_eq!(
            tagged.message.header.msg_type.as_deref(),
            Some(format!("msg-{i}").as_str())
        );
    }
}

#[compio::test]
async fn fan_in_strips_routing_idents() {
    let (shell, handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (_sender, receiver) = create_main_channel(sockets, None);

    let mut message = message_with_type("execute_reply");
    message.idents = vec![Bytes::from_static(b"routing-id")];
    handles.emit(message);

    let tagged = receiver.recv().await.unwrap();
    assert!(tagged.message.idents.is_empty());
}

#[compio::test]
async fn outbound_fills_header_defaults() {
    let (shell, handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (sender, _receiver) = create_main_channel(
        sockets,
        Some(SessionInfo {
            session: "spinning".to_string(),
            username: "dj".to_string(),
        }),
    );

    sender
        .send(TaggedMessage {
            channel: Channel::Shell,
            message: Message::default(),
        })
        .unwrap();

    let sent = handles.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header.session.as_deref(), Some("spinning"));
    assert_eq!(sent[0].header.username.as_deref(), Some("dj"));
    assert!(sent[0].content.is_empty());
    assert!(sent[0].metadata.is_empty());
    assert!(sent[0].parent_header.is_empty());
}

#[compio::test]
async fn outbound_defaults_win_but_other_fields_pass_through() {
    let (shell, handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (sender, _receiver) = create_main_channel(
        sockets,
        Some(SessionInfo {
            session: "spinning".to_string(),
            username: "dj".to_string(),
        }),
    );

    let mut content = serde_json::Map::new();
    content.insert("applesauce".to_string(), json!("mcgee"));

    sender
        .send(TaggedMessage {
            channel: Channel::Shell,
            message: Message {
                header: Header {
                    msg_id: Some("XYZ".to_string()),
                    msg_type: Some("random".to_string()),
                    username: Some("kitty".to_string()),
                    date: Some("2024-01-01T00:00:00Z".to_string()),
                    version: Some("3".to_string()),
                    ..Header::default()
                },
                content,
                ..Message::default()
            },
        })
        .unwrap();

    let sent = handles.sent.lock();
    let header = &sent[0].header;
    assert_eq!(header.username.as_deref(), Some("dj"));
    assert_eq!(header.session.as_deref(), Some("spinning"));
    assert_eq!(header.msg_id.as_deref(), Some("XYZ"));
    assert_eq!(header.msg_type.as_deref(), Some("random"));
    assert_eq!(header.date.as_deref(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(header.version.as_deref(), Some("3"));
    assert_eq!(sent[0].content.get("applesauce"), Some(&json!("mcgee")));
}

#[compio::test]
async fn outbound_rejects_unwired_channel() {
    let (shell, _handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (sender, _receiver) = create_main_channel(sockets, None);

    let err = sender
        .send(TaggedMessage {
            channel: Channel::Iopub,
            message: Message::default(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[compio::test]
async fn close_closes_every_socket_exactly_once() {
    let (shell, shell_handles) = FakeSocket::new();
    let (iopub, iopub_handles) = FakeSocket::new();

    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);
    sockets.insert(Channel::Iopub, iopub);

    let (sender, _receiver) = create_main_channel(sockets, None);

    sender.close();
    sender.close();
    sender.close();

    assert_eq!(shell_handles.close_calls.load(Ordering::SeqCst), 1);
    assert_eq!(iopub_handles.close_calls.load(Ordering::SeqCst), 1);

    // Sending after teardown is an error, not a silent drop
    assert!(matches!(
        sender.send(TaggedMessage {
            channel: Channel::Shell,
            message: Message::default(),
        }),
        Err(Error::SocketClosed)
    ));
}

#[compio::test]
async fn dropping_the_sender_closes_sockets() {
    let (shell, handles) = FakeSocket::new();
    let mut sockets: ChannelSet<FakeSocket> = ChannelSet::new();
    sockets.insert(Channel::Shell, shell);

    let (sender, _receiver) = create_main_channel(sockets, None);
    drop(sender);

    assert_eq!(handles.close_calls.load(Ordering::SeqCst), 1);
}
