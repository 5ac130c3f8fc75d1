//! Kernelwire Core
//!
//! This crate contains the transport-agnostic building blocks shared by the
//! kernelwire client stack:
//! - Endpoint addressing for TCP and IPC transports (`endpoint`)
//! - Socket lifecycle event monitoring (`monitor`)
//! - TCP utilities for low-latency networking (`tcp`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod endpoint;
pub mod monitor;
pub mod tcp;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::endpoint::{Endpoint, EndpointError};
    pub use crate::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
    pub use crate::tcp::enable_tcp_nodelay;
}
