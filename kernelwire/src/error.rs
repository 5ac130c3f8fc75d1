//! Kernelwire error types.
//!
//! Three families with different blast radii:
//! - [`ConfigError`]: wrong inputs at socket-creation time; surfaced
//!   synchronously, never retried.
//! - [`ProtocolError`]: a single bad envelope; local to that message, the
//!   receive loop keeps going.
//! - Transport failures: carried as `io::Error` inside [`Error::Transport`]
//!   and reported through `error` events, since sends are fire-and-forget.

use std::io;
use thiserror::Error;

use crate::channel::Channel;
use kernelwire_core::endpoint::EndpointError;

/// Configuration problems detected while wiring a socket up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The channel name is not one of shell/control/stdin/iopub
    #[error("unknown channel name: {0:?}")]
    UnknownChannel(String),

    /// The connection info has no port entry for the requested channel
    #[error("no port configured for channel \"{0}\"")]
    MissingPort(Channel),

    /// The signature scheme is not one this client can compute
    #[error("unsupported signature scheme: {0:?}")]
    UnsupportedScheme(String),

    /// The channel is valid but absent from this multiplexer's channel set
    #[error("channel \"{0}\" is not part of this channel set")]
    UnwiredChannel(Channel),
}

/// Per-message envelope failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No `<IDS|MSG>` delimiter frame in the batch
    #[error("missing <IDS|MSG> delimiter frame")]
    MissingDelimiter,

    /// Delimiter present but fewer than the five envelope frames follow
    #[error("truncated envelope: {got} frames after the delimiter, expected at least 5")]
    TruncatedEnvelope { got: usize },

    /// The transmitted signature does not match the recomputed one
    #[error("message signature mismatch")]
    SignatureMismatch,

    /// One of the four JSON sections failed to serialize or parse
    #[error("malformed {section} section: {source}")]
    MalformedSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Umbrella error for the public surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Operation attempted on a socket that was already closed
    #[error("socket closed")]
    SocketClosed,
}

/// Result type alias for kernelwire operations.
pub type Result<T> = std::result::Result<T, Error>;
