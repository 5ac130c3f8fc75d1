//! # Kernelwire
//!
//! A client-side transport for the Jupyter kernel wire protocol: connects
//! the four protocol channels (shell, control, stdin, iopub) of a running
//! kernel, frames and HMAC-signs outgoing messages, verifies and decodes
//! incoming ones, and exposes everything as one multiplexed bidirectional
//! message stream.
//!
//! ## Layering
//!
//! - **`kernelwire-core`**: endpoints, socket monitors, TCP tuning
//! - **`kernelwire-zmtp`**: the ZMTP 3.0 client transport (DEALER / SUB)
//! - **`kernelwire`** (this crate): the protocol surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kernelwire::{
//!     create_main_channel, create_socket, verified_connect, Channel, ChannelSet,
//!     ConnectionInfo, SessionInfo, TaggedMessage,
//! };
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Produced by whatever read the kernel's connection file
//!     let config: ConnectionInfo = serde_json::from_str(r#"{
//!         "ip": "127.0.0.1", "transport": "tcp",
//!         "signature_scheme": "hmac-sha256", "key": "secret",
//!         "shell_port": 53794, "iopub_port": 53797,
//!         "control_port": 53796, "stdin_port": 53795
//!     }"#)?;
//!
//!     let mut sockets = ChannelSet::new();
//!     for channel in Channel::ALL {
//!         let socket = create_socket(channel, &format!("{channel}-front"), &config)?;
//!         verified_connect(&socket, &config.endpoint_for(channel)?).await?;
//!         sockets.insert(channel, socket);
//!     }
//!
//!     let (sender, receiver) = create_main_channel(
//!         sockets,
//!         Some(SessionInfo {
//!             session: "session-1".into(),
//!             username: "user".into(),
//!         }),
//!     );
//!
//!     sender.send(TaggedMessage {
//!         channel: Channel::Shell,
//!         message: Default::default(),
//!     })?;
//!
//!     while let Some(tagged) = receiver.recv().await {
//!         println!("[{}] {:?}", tagged.channel, tagged.message.header.msg_type);
//!     }
//!     Ok(())
//! }
//! ```

// Allow some pedantic lints
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod channel;
pub mod channels;
pub mod config;
pub mod connect;
pub mod error;
pub mod msg;
pub mod sign;
pub mod socket;
pub mod wire;

// Re-export the public surface for clean imports
pub use channel::Channel;
pub use channels::{
    create_main_channel, ChannelSet, ChannelTransport, MainChannelReceiver, MainChannelSender,
    SessionInfo, TaggedMessage,
};
pub use config::{ConnectionInfo, Transport};
pub use connect::{create_socket, verified_connect, MonitoredSocket};
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use msg::{Header, Message};
pub use sign::{MessageSigner, SignatureScheme};
pub use socket::{ChannelEvent, ChannelSocket};

// Re-exports from the lower layers that appear in this crate's API
pub use kernelwire_core::endpoint::Endpoint;
pub use kernelwire_core::monitor::{SocketEvent, SocketMonitor};
pub use kernelwire_zmtp::SocketKind;

/// Development helper: initialize tracing subscriber when `RUST_LOG` is set.
///
/// Tests can call `kernelwire::dev_tracing::init_tracing()` to enable
/// structured logging for debugging. This is a no-op when `RUST_LOG` is not
/// set or when a global subscriber is already installed.
pub mod dev_tracing {
    pub fn init_tracing() {
        use std::env;

        if env::var("RUST_LOG").is_ok() {
            // Best-effort: try to init a fmt subscriber from env filter.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init();
        }
    }
}
