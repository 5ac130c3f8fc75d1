//! Per-connection driver ("pump").
//!
//! One pump == one kernel channel connection. The pump owns the stream for
//! its whole life:
//! - dial the endpoint, perform the ZMTP handshake
//! - read loop: bytes → frames → multipart messages → `on_message` callback
//! - write loop: `SocketCmd`s from a flume channel → frames → stream
//!
//! The two loops run concurrently on cloned stream handles and are raced
//! against each other; whichever finishes first (peer EOF, transport error,
//! or a local close command) tears the connection down. In-flight reads may
//! be dropped at teardown, which is the documented "hard close" behavior.
//!
//! The pump carries no protocol knowledge beyond ZMTP: envelope decoding and
//! signature checks happen in the caller's `on_message`.

use bytes::{BufMut, Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use compio::net::TcpStream;
use compio::runtime::TryClone;
use kernelwire_core::endpoint::Endpoint;
use kernelwire_core::tcp::enable_tcp_nodelay;
use std::io;
use tracing::{debug, trace};

use crate::codec::{encode_multipart, Frame, FrameDecoder};
use crate::handshake::{perform_handshake, SocketKind};
use crate::multipart::MultipartBuffer;

/// Read granularity for the receive loop.
const READ_CHUNK: usize = 8192;

/// Multipart assembly limits.
const MAX_FRAMES: usize = 128;
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Commands accepted by a running pump.
#[derive(Debug)]
pub enum SocketCmd {
    /// Transmit a multipart message
    Send(Vec<Bytes>),
    /// Establish a topic filter (SUB only; empty = everything)
    Subscribe(Bytes),
    /// Remove a topic filter
    Unsubscribe(Bytes),
    /// Tear the connection down
    Close,
}

/// How a pump ended.
#[derive(Debug)]
pub enum PumpExit {
    /// The endpoint could not be dialed or the handshake failed
    ConnectFailed(io::Error),
    /// The peer closed the connection (EOF)
    PeerClosed,
    /// A `Close` command arrived, or every command sender was dropped
    LocalClose,
    /// The transport failed mid-connection
    Transport(io::Error),
}

/// Dial `endpoint`, handshake as `kind`, then run the connection until it
/// ends.
///
/// `on_connected` fires exactly once, after the handshake completes and
/// before any message can be delivered; callers use it to resolve readiness
/// gating. `on_message` fires once per complete inbound multipart message,
/// in transport delivery order.
pub async fn drive<C, F>(
    endpoint: &Endpoint,
    kind: SocketKind,
    identity: Option<Bytes>,
    cmd_rx: flume::Receiver<SocketCmd>,
    on_connected: C,
    on_message: F,
) -> PumpExit
where
    C: FnOnce(),
    F: FnMut(Vec<Bytes>),
{
    debug!("[{}] dialing {}", kind, endpoint);

    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = match TcpStream::connect(addr).await {
                Ok(s) => s,
                Err(e) => return PumpExit::ConnectFailed(e),
            };
            if let Err(e) = enable_tcp_nodelay(&stream) {
                debug!("[{}] could not set TCP_NODELAY: {}", kind, e);
            }
            let reader = match stream.try_clone() {
                Ok(r) => r,
                Err(e) => return PumpExit::ConnectFailed(e),
            };
            run_connection(stream, reader, kind, identity, cmd_rx, on_connected, on_message).await
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => {
            use compio::net::UnixStream;

            let stream = match UnixStream::connect(path).await {
                Ok(s) => s,
                Err(e) => return PumpExit::ConnectFailed(e),
            };
            let reader = match stream.try_clone() {
                Ok(r) => r,
                Err(e) => return PumpExit::ConnectFailed(e),
            };
            run_connection(stream, reader, kind, identity, cmd_rx, on_connected, on_message).await
        }
    }
}

/// Handshake on the write handle, then race the read and write loops.
async fn run_connection<S, C, F>(
    mut writer: S,
    reader: S,
    kind: SocketKind,
    identity: Option<Bytes>,
    cmd_rx: flume::Receiver<SocketCmd>,
    on_connected: C,
    on_message: F,
) -> PumpExit
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: FnOnce(),
    F: FnMut(Vec<Bytes>),
{
    if let Err(e) = perform_handshake(&mut writer, kind.as_str(), identity.as_deref()).await {
        return PumpExit::ConnectFailed(e);
    }

    on_connected();

    let read = std::pin::pin!(read_loop(reader, kind, on_message));
    let write = std::pin::pin!(write_loop(writer, kind, cmd_rx));

    // Whichever loop ends first decides the exit; the loser future is
    // dropped, cancelling its in-flight operation.
    match futures::future::select(read, write).await {
        futures::future::Either::Left((exit, _)) | futures::future::Either::Right((exit, _)) => {
            exit
        }
    }
}

async fn read_loop<S, F>(mut stream: S, kind: SocketKind, mut on_message: F) -> PumpExit
where
    S: AsyncRead + Unpin,
    F: FnMut(Vec<Bytes>),
{
    let decoder = FrameDecoder::new();
    let mut assembly = MultipartBuffer::new(MAX_FRAMES, MAX_MESSAGE_BYTES);
    let mut recv_buf = BytesMut::new();

    loop {
        let chunk = vec![0u8; READ_CHUNK];
        let BufResult(res, chunk) = stream.read(chunk).await;

        let n = match res {
            Ok(0) => {
                trace!("[{}] peer closed connection", kind);
                return PumpExit::PeerClosed;
            }
            Ok(n) => n,
            Err(e) => return PumpExit::Transport(e),
        };

        recv_buf.extend_from_slice(&chunk[..n]);

        loop {
            match decoder.decode(&mut recv_buf) {
                Ok(Some(frame)) => {
                    if frame.is_command() {
                        // NULL sessions exchange no commands after READY;
                        // ignore strays rather than desync on them.
                        trace!("[{}] ignoring stray command frame", kind);
                        continue;
                    }
                    match assembly.push_frame(frame) {
                        Ok(Some(msg)) => {
                            trace!("[{}] received {} frames", kind, msg.len());
                            on_message(msg);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            // Frame accounting is lost once a message is
                            // dropped mid-assembly; treat as fatal.
                            return PumpExit::Transport(io::Error::new(
                                io::ErrorKind::InvalidData,
                                e,
                            ));
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => return PumpExit::Transport(e.into()),
            }
        }
    }
}

async fn write_loop<S>(
    mut stream: S,
    kind: SocketKind,
    cmd_rx: flume::Receiver<SocketCmd>,
) -> PumpExit
where
    S: AsyncWrite + Unpin,
{
    let mut write_buf = BytesMut::new();

    loop {
        let cmd = match cmd_rx.recv_async().await {
            Ok(cmd) => cmd,
            Err(_) => return PumpExit::LocalClose,
        };

        match cmd {
            SocketCmd::Send(frames) => {
                trace!("[{}] sending {} frames", kind, frames.len());
                encode_multipart(&frames, &mut write_buf);
            }
            SocketCmd::Subscribe(topic) => {
                trace!("[{}] subscribing to {:?}", kind, topic);
                encode_subscription(0x01, &topic, &mut write_buf);
            }
            SocketCmd::Unsubscribe(topic) => {
                trace!("[{}] unsubscribing from {:?}", kind, topic);
                encode_subscription(0x00, &topic, &mut write_buf);
            }
            SocketCmd::Close => {
                trace!("[{}] close command received", kind);
                return PumpExit::LocalClose;
            }
        }

        let buf = write_buf.split().to_vec();
        let BufResult(res, _) = stream.write_all(buf).await;
        if let Err(e) = res {
            return PumpExit::Transport(e);
        }
    }
}

/// ZMTP 3.0 subscription: a data frame whose body is `0x01` (subscribe) or
/// `0x00` (unsubscribe) followed by the topic prefix.
fn encode_subscription(op: u8, topic: &[u8], out: &mut BytesMut) {
    let mut body = BytesMut::with_capacity(topic.len() + 1);
    body.put_u8(op);
    body.extend_from_slice(topic);
    Frame::data(body.freeze(), false).encode_into(out);
}
