//! Socket factory and verified connection gating.

use tracing::debug;

use kernelwire_core::monitor::{SocketEvent, SocketMonitor};
use kernelwire_zmtp::SocketKind;

use crate::channel::Channel;
use crate::config::ConnectionInfo;
use crate::error::Error;
use crate::sign::{MessageSigner, SignatureScheme};
use crate::socket::ChannelSocket;

/// Create a connected socket for a kernel channel.
///
/// Resolves the transport socket kind from the channel, builds a signer
/// from the configured scheme and key, assigns the routing identity, forms
/// the endpoint string, connects, and on subscriber-kind sockets installs
/// the receive-all filter. Callers wanting a narrower iopub filter can
/// `unsubscribe("")` and re-subscribe afterwards.
///
/// Configuration problems (unsupported scheme, missing port) fail here,
/// synchronously. Transport establishment is asynchronous; gate on it with
/// [`verified_connect`] when readiness matters.
pub fn create_socket(
    channel: Channel,
    identity: &str,
    config: &ConnectionInfo,
) -> Result<ChannelSocket, Error> {
    let scheme = SignatureScheme::parse(&config.signature_scheme)?;
    let signer = MessageSigner::new(scheme, config.key.clone());

    let socket = ChannelSocket::new(channel, signer);
    socket.set_identity(identity);

    let endpoint = config.endpoint_for(channel)?;
    debug!("[{}] creating socket for {}", channel, endpoint);
    socket.connect(&endpoint)?;

    if channel.socket_kind() == SocketKind::Sub {
        socket.subscribe("");
    }

    Ok(socket)
}

/// The connection-gating seam: anything that can be monitored and
/// connected.
///
/// [`ChannelSocket`] is the production implementation; tests drive
/// [`verified_connect`] with fakes that signal establishment at different
/// moments.
pub trait MonitoredSocket {
    /// Arm connection-event notification.
    fn monitor(&self) -> SocketMonitor;
    /// Disarm notification without otherwise affecting the socket.
    fn unmonitor(&self);
    /// Initiate the transport connection.
    fn connect(&self, endpoint: &str) -> Result<(), Error>;
}

impl MonitoredSocket for ChannelSocket {
    fn monitor(&self) -> SocketMonitor {
        ChannelSocket::monitor(self)
    }

    fn unmonitor(&self) {
        ChannelSocket::unmonitor(self)
    }

    fn connect(&self, endpoint: &str) -> Result<(), Error> {
        ChannelSocket::connect(self, endpoint)
    }
}

/// Connect and resolve only once the transport has actually signalled
/// establishment.
///
/// The monitor is armed strictly before `connect`, so a transport that
/// reports establishment synchronously during `connect` cannot race the
/// listener; the event sits in the armed channel until awaited. Waits for
/// exactly one connection event, then disarms and resolves.
///
/// No retry and no timeout live here; callers wanting a connection
/// deadline race this against an external timer.
pub async fn verified_connect<S>(socket: &S, endpoint: &str) -> Result<(), Error>
where
    S: MonitoredSocket + ?Sized,
{
    let events = socket.monitor();
    socket.connect(endpoint)?;

    let result = loop {
        match events.recv_async().await {
            Ok(SocketEvent::Connected(_)) => break Ok(()),
            Ok(SocketEvent::ConnectFailed { reason, .. }) => {
                break Err(Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    reason,
                )))
            }
            // A stale disconnect from a previous life of the transport
            Ok(SocketEvent::Disconnected(_)) => continue,
            Err(_) => break Err(Error::SocketClosed),
        }
    };

    socket.unmonitor();
    result
}
