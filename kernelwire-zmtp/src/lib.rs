//! # Kernelwire ZMTP
//!
//! Client-side `ZeroMQ` (ZMTP 3.0, NULL mechanism) transport used by the
//! kernelwire Jupyter client.
//!
//! ## Overview
//!
//! A Jupyter front-end only ever *connects*; the kernel owns the bound side.
//! This crate therefore implements exactly the two client socket kinds the
//! protocol needs:
//! - **DEALER**: bidirectional, addressable via a routing identity
//!   (shell / control / stdin channels)
//! - **SUB**: receive-only with topic filtering (iopub channel)
//!
//! The building blocks are deliberately small:
//! - [`codec`]: ZMTP frame encode/decode
//! - [`greeting`]: the fixed 64-byte greeting
//! - [`handshake`]: greeting + READY exchange, carrying `Socket-Type` and
//!   `Identity`
//! - [`multipart`]: frame-to-message assembly with resource limits
//! - [`pump`]: the per-connection driver task; commands in over a flume
//!   channel, complete multipart messages out through a callback
//!
//! Protocol envelopes (signing, JSON sections) live a layer up, in the
//! `kernelwire` crate; nothing in this crate knows about Jupyter.

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod codec;
pub mod greeting;
pub mod handshake;
pub mod multipart;
pub mod pump;

// Re-export the types downstream code touches for a clean API
pub use codec::{Frame, FrameDecoder, WireError};
pub use handshake::SocketKind;
pub use pump::{drive, PumpExit, SocketCmd};
