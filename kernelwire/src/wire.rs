//! The envelope codec: lossless mapping between a [`Message`] and a flat
//! sequence of binary frames.
//!
//! Frame order is fixed:
//!
//! ```text
//! [ident frames...] <IDS|MSG> signature header parent_header metadata content [buffers...]
//! ```
//!
//! The delimiter is a literal token marking the boundary between routing
//! idents (a variable-length prefix added by intermediary routing sockets)
//! and the signed envelope. No I/O happens here; sockets feed frame batches
//! in and get owned messages out.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::msg::{Header, Message};
use crate::sign::MessageSigner;

/// Literal delimiter frame between idents and the envelope.
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

/// Number of envelope frames following the delimiter.
const ENVELOPE_FRAMES: usize = 5;

/// Encode a message into wire frames, signing the four JSON sections.
pub fn encode(message: &Message, signer: &MessageSigner) -> Result<Vec<Bytes>, ProtocolError> {
    let header = to_json("header", &message.header)?;
    let parent_header = to_json("parent_header", &message.parent_header)?;
    let metadata = to_json("metadata", &message.metadata)?;
    let content = to_json("content", &message.content)?;

    let signature = signer.sign(&[&header[..], &parent_header[..], &metadata[..], &content[..]]);

    let mut frames =
        Vec::with_capacity(message.idents.len() + 1 + ENVELOPE_FRAMES + message.buffers.len());
    frames.extend(message.idents.iter().cloned());
    frames.push(Bytes::from_static(DELIMITER));
    frames.push(Bytes::from(signature.into_bytes()));
    frames.push(Bytes::from(header));
    frames.push(Bytes::from(parent_header));
    frames.push(Bytes::from(metadata));
    frames.push(Bytes::from(content));
    frames.extend(message.buffers.iter().cloned());

    Ok(frames)
}

/// Decode wire frames into a message, verifying the signature when the
/// signer carries a key.
///
/// The input is never mutated; idents and buffers are cheap `Bytes` clones.
pub fn decode(frames: &[Bytes], signer: &MessageSigner) -> Result<Message, ProtocolError> {
    let delimiter = frames
        .iter()
        .position(|frame| frame.as_ref() == DELIMITER)
        .ok_or(ProtocolError::MissingDelimiter)?;

    let envelope = &frames[delimiter + 1..];
    if envelope.len() < ENVELOPE_FRAMES {
        return Err(ProtocolError::TruncatedEnvelope {
            got: envelope.len(),
        });
    }

    let signature = &envelope[0];
    let header = &envelope[1];
    let parent_header = &envelope[2];
    let metadata = &envelope[3];
    let content = &envelope[4];

    // Verify before parsing: unauthenticated bytes never reach serde.
    signer.verify(
        &[&header[..], &parent_header[..], &metadata[..], &content[..]],
        &signature[..],
    )?;

    Ok(Message {
        idents: frames[..delimiter].to_vec(),
        header: from_json("header", header)?,
        parent_header: from_json("parent_header", parent_header)?,
        metadata: from_json("metadata", metadata)?,
        content: from_json("content", content)?,
        buffers: frames[delimiter + 1 + ENVELOPE_FRAMES..].to_vec(),
    })
}

fn to_json<T: serde::Serialize>(
    section: &'static str,
    value: &T,
) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(|source| ProtocolError::MalformedSection { section, source })
}

fn from_json<T: serde::de::DeserializeOwned>(
    section: &'static str,
    raw: &Bytes,
) -> Result<T, ProtocolError> {
    serde_json::from_slice(raw).map_err(|source| ProtocolError::MalformedSection { section, source })
}
