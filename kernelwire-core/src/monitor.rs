//! Socket event monitoring.
//!
//! Provides event streams for tracking socket lifecycle events like
//! connections, connect failures, and disconnections.

use crate::endpoint::Endpoint;
use std::fmt;

/// Socket lifecycle events.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Socket successfully connected to a peer.
    Connected(Endpoint),

    /// Connection attempt failed.
    ConnectFailed { endpoint: Endpoint, reason: String },

    /// Socket disconnected from a peer.
    Disconnected(Endpoint),
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "Connected to {ep}"),
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "Connect failed for {endpoint}: {reason}")
            }
            Self::Disconnected(ep) => write!(f, "Disconnected from {ep}"),
        }
    }
}

/// Handle for receiving socket events.
///
/// This is a channel receiver that provides a stream of socket lifecycle events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Internal sender for socket events.
///
/// This is exposed publicly to allow socket implementations to emit events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_socket_event_display() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let event = SocketEvent::Connected(Endpoint::Tcp(addr));
        assert_eq!(event.to_string(), "Connected to tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        sender
            .send(SocketEvent::Connected(Endpoint::Tcp(addr)))
            .unwrap();

        let event = receiver.recv().unwrap();
        assert!(matches!(event, SocketEvent::Connected(_)));
    }

    #[test]
    fn test_events_buffer_until_received() {
        // A monitor armed before the event fires must still observe it,
        // even if the receiver is polled later.
        let (sender, receiver) = create_monitor();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        sender
            .send(SocketEvent::Connected(Endpoint::Tcp(addr)))
            .unwrap();
        drop(sender);

        assert!(matches!(receiver.recv(), Ok(SocketEvent::Connected(_))));
        assert!(receiver.recv().is_err());
    }
}
