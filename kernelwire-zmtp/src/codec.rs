use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// ZMTP frame flags
pub const FLAG_MORE: u8 = 0x01;
pub const FLAG_LONG: u8 = 0x02;
pub const FLAG_COMMAND: u8 = 0x04;

/// Default cap on a single frame body. Jupyter messages carry arbitrary
/// binary buffers, so the limit is generous but finite.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// ZMTP wire errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("protocol violation: reserved flag bits set")]
    ReservedBits,

    #[error("protocol violation: frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: u64, max: usize },

    #[error("malformed greeting")]
    BadGreeting,

    #[error("malformed handshake command: {0}")]
    BadHandshake(&'static str),
}

impl From<WireError> for std::io::Error {
    fn from(e: WireError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    }
}

/// Result type alias for ZMTP operations
pub type Result<T> = std::result::Result<T, WireError>;

/// A decoded ZMTP frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub flags: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame
    pub const fn data(payload: Bytes, more: bool) -> Self {
        let mut flags = 0;
        if more {
            flags |= FLAG_MORE;
        }
        Self { flags, payload }
    }

    /// Create a command frame
    pub const fn command(payload: Bytes) -> Self {
        Self {
            flags: FLAG_COMMAND,
            payload,
        }
    }

    #[inline]
    pub const fn more(&self) -> bool {
        (self.flags & FLAG_MORE) != 0
    }

    #[inline]
    pub const fn is_command(&self) -> bool {
        (self.flags & FLAG_COMMAND) != 0
    }

    /// Append the encoded frame (header + body) to `out`.
    ///
    /// Layout:
    /// - Flags (1 byte, LONG bit derived from the body length)
    /// - Size (1 byte if <= 255, else 8 bytes BE)
    /// - Body
    pub fn encode_into(&self, out: &mut BytesMut) {
        let len = self.payload.len();
        if len <= 255 {
            out.extend_from_slice(&[self.flags & !FLAG_LONG, len as u8]);
        } else {
            out.extend_from_slice(&[self.flags | FLAG_LONG]);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
        out.extend_from_slice(&self.payload);
    }
}

/// Encode a complete frame into a standalone buffer.
///
/// Used for protocol commands (greeting follow-ups, READY, subscriptions),
/// which are small and infrequent.
pub fn encode_frame(flags: u8, body: &Bytes) -> Bytes {
    let mut out = BytesMut::with_capacity(9 + body.len());
    Frame {
        flags,
        payload: body.clone(),
    }
    .encode_into(&mut out);
    out.freeze()
}

/// Encode a multipart message: MORE set on every frame but the last.
pub fn encode_multipart(frames: &[Bytes], out: &mut BytesMut) {
    let last = frames.len().saturating_sub(1);
    for (i, payload) in frames.iter().enumerate() {
        Frame::data(payload.clone(), i != last).encode_into(out);
    }
}

/// ZMTP frame decoder over an accumulation buffer.
///
/// The caller appends raw stream bytes to a single `BytesMut` and calls
/// [`FrameDecoder::decode`] until it returns `None`. A frame is only
/// consumed from the buffer once it is complete, so partial reads need no
/// reassembly state here.
#[derive(Debug)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Decode a single frame from `src`.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` → frame decoded and consumed from `src`
    /// - `Ok(None)` → need more data, `src` untouched
    /// - `Err` → protocol violation
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < 2 {
            return Ok(None);
        }

        let flags = src[0];

        // Reserved bits must be zero (bits 3-7)
        if (flags & 0xF8) != 0 {
            return Err(WireError::ReservedBits);
        }

        let is_long = (flags & FLAG_LONG) != 0;
        let header_len = if is_long { 9 } else { 2 };

        if src.len() < header_len {
            return Ok(None);
        }

        let body_len = if is_long {
            let mut size_bytes = &src[1..9];
            let size = size_bytes.get_u64();

            // MSB must be zero in ZMTP 3.x
            if size > 0x7FFF_FFFF_FFFF_FFFF || size > self.max_frame_size as u64 {
                return Err(WireError::FrameTooLarge {
                    size,
                    max: self.max_frame_size,
                });
            }

            size as usize
        } else {
            src[1] as usize
        };

        if src.len() < header_len + body_len {
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src.split_to(body_len).freeze();
        Ok(Some(Frame { flags, payload }))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &FrameDecoder, bytes: &[u8]) -> Vec<Frame> {
        let mut buf = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_short_frame_roundtrip() {
        let mut out = BytesMut::new();
        Frame::data(Bytes::from_static(b"hello"), false).encode_into(&mut out);

        let decoder = FrameDecoder::new();
        let frames = feed(&decoder, &out);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, Bytes::from_static(b"hello"));
        assert!(!frames[0].more());
        assert!(!frames[0].is_command());
    }

    #[test]
    fn test_long_frame_roundtrip() {
        let body = vec![0x42u8; 300];
        let mut out = BytesMut::new();
        Frame::data(Bytes::from(body.clone()), true).encode_into(&mut out);
        // LONG bit set, 8-byte size
        assert_eq!(out[0] & FLAG_LONG, FLAG_LONG);

        let decoder = FrameDecoder::new();
        let frames = feed(&decoder, &out);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], &body[..]);
        assert!(frames[0].more());
    }

    #[test]
    fn test_partial_frame_needs_more_data() {
        let mut out = BytesMut::new();
        Frame::data(Bytes::from_static(b"split me"), false).encode_into(&mut out);

        let decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&out[..3]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        // Nothing consumed while incomplete
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&out[3..]);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload, Bytes::from_static(b"split me"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multipart_encode_sets_more_flags() {
        let frames = vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ];
        let mut out = BytesMut::new();
        encode_multipart(&frames, &mut out);

        let decoder = FrameDecoder::new();
        let decoded = feed(&decoder, &out);
        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].more());
        assert!(decoded[1].more());
        assert!(!decoded[2].more());
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&[0x80u8, 0x00][..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(WireError::ReservedBits)
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let decoder = FrameDecoder::with_max_frame_size(16);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[FLAG_LONG]);
        buf.extend_from_slice(&1024u64.to_be_bytes());
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(WireError::FrameTooLarge { .. })
        ));
    }
}
