//! Kernel connection configuration.
//!
//! A `ConnectionInfo` is handed in by whatever read the kernel's connection
//! file (reading it from disk is out of scope here); the field names match
//! the connection-file JSON, so external collaborators can deserialize
//! straight into it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::Channel;
use crate::error::ConfigError;

/// Transport a kernel is reachable over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Ipc,
}

impl Transport {
    /// IPC endpoints join the base path and port with `-` instead of the
    /// TCP `host:port` form: `ipc:///tmp/kernel-5555`.
    const fn port_delimiter(self) -> char {
        match self {
            Self::Tcp => ':',
            Self::Ipc => '-',
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Ipc => "ipc",
        })
    }
}

/// Immutable connection parameters for one running kernel.
///
/// Invariant: every channel a caller requests must have a corresponding
/// port entry, or socket creation fails with [`ConfigError::MissingPort`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Bound IP for tcp, base path for ipc
    pub ip: String,
    pub transport: Transport,
    /// Scheme name as connection files spell it, e.g. `"hmac-sha256"`
    pub signature_scheme: String,
    /// Shared secret; empty means unsigned (local/trusted testing only)
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iopub_port: Option<u16>,
    /// Present in connection files; no heartbeat channel is served here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_port: Option<u16>,
}

impl ConnectionInfo {
    /// Port for a channel, or `ConfigError::MissingPort`.
    ///
    /// Port 0 counts as missing, matching connection files that zero out
    /// unused channels.
    pub fn port_for(&self, channel: Channel) -> Result<u16, ConfigError> {
        let port = match channel {
            Channel::Shell => self.shell_port,
            Channel::Control => self.control_port,
            Channel::Stdin => self.stdin_port,
            Channel::Iopub => self.iopub_port,
        };
        match port {
            Some(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::MissingPort(channel)),
        }
    }

    /// Form the connection endpoint string for a channel:
    /// `{transport}://{ip}{delimiter}{port}`.
    pub fn endpoint_for(&self, channel: Channel) -> Result<String, ConfigError> {
        let port = self.port_for(channel)?;
        Ok(format!(
            "{}://{}{}{}",
            self.transport,
            self.ip,
            self.transport.port_delimiter(),
            port
        ))
    }
}
