//! Synchronous ZMTP handshake, performed before the connection pump starts.
//!
//! Completing the greeting and READY exchange up front means the pump only
//! ever sees data traffic, and the caller gets a definite "established"
//! point to report through its monitor.

use crate::codec::{WireError, FLAG_COMMAND, FLAG_LONG};
use crate::greeting::{build_greeting, validate_greeting, GREETING_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io;
use tracing::debug;

/// READY commands are small; anything bigger is a confused peer.
const MAX_READY_SIZE: usize = 512;

/// The two client socket kinds a Jupyter front-end uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Bidirectional, addressable: shell / control / stdin
    Dealer,
    /// Receive-only, topic-filtered: iopub
    Sub,
}

impl SocketKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dealer => "DEALER",
            Self::Sub => "SUB",
        }
    }
}

impl std::fmt::Display for SocketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful handshake
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub peer_socket_type: String,
    pub peer_identity: Option<Bytes>,
}

/// Perform the complete ZMTP NULL handshake on the stream.
///
/// Both peers send their greeting eagerly and then read the other's, so the
/// same exchange works for whichever side of the connection calls it; test
/// peers reuse it with `"ROUTER"` / `"PUB"` socket types.
///
/// Sequence:
/// 1. Send our 64-byte greeting, read and validate the peer's
/// 2. Send READY with `Socket-Type` (and `Identity`, when given)
/// 3. Read and parse the peer's READY
pub async fn perform_handshake<S>(
    stream: &mut S,
    socket_type: &str,
    identity: Option<&[u8]>,
) -> io::Result<HandshakeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("[{}] starting handshake", socket_type);

    // Step 1: greeting exchange
    let BufResult(write_res, _) = stream.write_all(build_greeting().to_vec()).await;
    write_res?;

    let greeting_buf = [0u8; GREETING_SIZE];
    let BufResult(read_res, greeting_buf) = stream.read_exact(greeting_buf).await;
    read_res?;
    validate_greeting(&greeting_buf)?;

    // Step 2: send READY
    let ready = encode_ready_frame(socket_type, identity);
    let BufResult(write_res, _) = stream.write_all(ready.to_vec()).await;
    write_res?;

    // Step 3: read peer READY
    let header_buf = [0u8; 2];
    let BufResult(read_res, header_buf) = stream.read_exact(header_buf).await;
    read_res?;

    let flags = header_buf[0];
    if (flags & FLAG_COMMAND) == 0 {
        return Err(WireError::BadHandshake("expected COMMAND frame, got data").into());
    }

    let body_len = if (flags & FLAG_LONG) != 0 {
        let len_buf = [0u8; 8];
        let BufResult(read_res, len_buf) = stream.read_exact(len_buf).await;
        read_res?;
        u64::from_be_bytes(len_buf) as usize
    } else {
        header_buf[1] as usize
    };

    if body_len > MAX_READY_SIZE {
        return Err(WireError::BadHandshake("READY body too large").into());
    }

    let body_buf = vec![0u8; body_len];
    let BufResult(read_res, body_buf) = stream.read_exact(body_buf).await;
    read_res?;

    let outcome = parse_ready(&Bytes::from(body_buf))?;
    debug!(
        peer_socket_type = %outcome.peer_socket_type,
        "[{}] handshake complete", socket_type
    );

    Ok(outcome)
}

/// Build a complete READY command frame (header + body).
///
/// READY grammar (ZMTP/37):
/// - 1 byte: command name length
/// - "READY"
/// - Repeated properties:
///   - 1 byte: property name length
///   - property name
///   - 4 bytes: value length (BE)
///   - value
fn encode_ready_frame(socket_type: &str, identity: Option<&[u8]>) -> Bytes {
    let mut body = BytesMut::new();

    // Command name
    body.put_u8(5);
    body.extend_from_slice(b"READY");

    // Mandatory: Socket-Type
    put_property(&mut body, "Socket-Type", socket_type.as_bytes());

    // Optional: Identity (the routing identity DEALER replies route back on)
    if let Some(id) = identity {
        put_property(&mut body, "Identity", id);
    }

    crate::codec::encode_frame(FLAG_COMMAND, &body.freeze())
}

/// Helper: encode a READY property
#[inline]
fn put_property(dst: &mut BytesMut, name: &str, value: &[u8]) {
    let name_bytes = name.as_bytes();

    dst.put_u8(name_bytes.len() as u8);
    dst.extend_from_slice(name_bytes);

    dst.put_u32(value.len() as u32);
    dst.extend_from_slice(value);
}

/// Parse a READY command body into socket type and optional identity.
fn parse_ready(body: &Bytes) -> Result<HandshakeOutcome, WireError> {
    if body.len() < 6 || body[0] as usize != 5 || &body[1..6] != b"READY" {
        return Err(WireError::BadHandshake("not a READY command"));
    }

    let mut offset = 6;
    let mut socket_type = None;
    let mut identity = None;

    while offset < body.len() {
        let key_len = body[offset] as usize;
        offset += 1;

        if offset + key_len > body.len() {
            break;
        }
        let key = &body[offset..offset + key_len];
        offset += key_len;

        if offset + 4 > body.len() {
            break;
        }
        let value_len = u32::from_be_bytes([
            body[offset],
            body[offset + 1],
            body[offset + 2],
            body[offset + 3],
        ]) as usize;
        offset += 4;

        if offset + value_len > body.len() {
            break;
        }
        let value_start = offset;
        let value_end = offset + value_len;
        offset += value_len;

        match key {
            b"Socket-Type" => {
                socket_type = std::str::from_utf8(&body[value_start..value_end])
                    .ok()
                    .map(str::to_owned);
            }
            b"Identity" => {
                // Zero-copy: slice the existing Bytes instead of copying
                identity = Some(body.slice(value_start..value_end));
            }
            _ => {
                // Ignore unknown properties
            }
        }
    }

    let peer_socket_type =
        socket_type.ok_or(WireError::BadHandshake("READY missing Socket-Type"))?;

    Ok(HandshakeOutcome {
        peer_socket_type,
        peer_identity: identity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameDecoder;

    fn ready_body(socket_type: &str, identity: Option<&[u8]>) -> Bytes {
        let frame = encode_ready_frame(socket_type, identity);
        let decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&frame[..]);
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(decoded.is_command());
        decoded.payload
    }

    #[test]
    fn test_ready_roundtrip_with_identity() {
        let body = ready_body("DEALER", Some(b"shell-1234"));
        let outcome = parse_ready(&body).unwrap();
        assert_eq!(outcome.peer_socket_type, "DEALER");
        assert_eq!(outcome.peer_identity.as_deref(), Some(&b"shell-1234"[..]));
    }

    #[test]
    fn test_ready_roundtrip_without_identity() {
        let body = ready_body("SUB", None);
        let outcome = parse_ready(&body).unwrap();
        assert_eq!(outcome.peer_socket_type, "SUB");
        assert!(outcome.peer_identity.is_none());
    }

    #[test]
    fn test_non_ready_command_rejected() {
        let body = Bytes::from_static(b"\x05ERROR");
        assert!(parse_ready(&body).is_err());
    }

    #[test]
    fn test_missing_socket_type_rejected() {
        let body = Bytes::from_static(b"\x05READY");
        assert!(matches!(
            parse_ready(&body),
            Err(WireError::BadHandshake(_))
        ));
    }

    #[test]
    fn test_socket_kind_names() {
        assert_eq!(SocketKind::Dealer.as_str(), "DEALER");
        assert_eq!(SocketKind::Sub.as_str(), "SUB");
    }
}
