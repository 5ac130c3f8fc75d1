//! The four logical kernel channels and their transport socket kinds.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use kernelwire_zmtp::SocketKind;

/// One of the four protocol channels a front-end speaks to a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Execute/introspect requests and replies
    Shell,
    /// Interrupt/shutdown and other out-of-band control
    Control,
    /// Input requests from the kernel back to the front-end
    Stdin,
    /// Broadcast output (streams, display data, status)
    Iopub,
}

impl Channel {
    /// All four channels, in the order connection files list their ports.
    pub const ALL: [Channel; 4] = [
        Channel::Shell,
        Channel::Control,
        Channel::Stdin,
        Channel::Iopub,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Control => "control",
            Self::Stdin => "stdin",
            Self::Iopub => "iopub",
        }
    }

    /// The fixed channel → transport socket kind table: iopub is the one
    /// broadcast channel; everything else is request/reply.
    #[must_use]
    pub const fn socket_kind(&self) -> SocketKind {
        match self {
            Self::Iopub => SocketKind::Sub,
            Self::Shell | Self::Control | Self::Stdin => SocketKind::Dealer,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(Self::Shell),
            "control" => Ok(Self::Control),
            "stdin" => Ok(Self::Stdin),
            "iopub" => Ok(Self::Iopub),
            other => Err(ConfigError::UnknownChannel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_kind_table() {
        assert_eq!(Channel::Iopub.socket_kind(), SocketKind::Sub);
        assert_eq!(Channel::Shell.socket_kind(), SocketKind::Dealer);
        assert_eq!(Channel::Control.socket_kind(), SocketKind::Dealer);
        assert_eq!(Channel::Stdin.socket_kind(), SocketKind::Dealer);
    }

    #[test]
    fn test_name_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let err = "bogus".parse::<Channel>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChannel(name) if name == "bogus"));
    }
}
