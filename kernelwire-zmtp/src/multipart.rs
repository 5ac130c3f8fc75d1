use crate::codec::Frame;
use bytes::Bytes;
use smallvec::SmallVec;
use thiserror::Error;

/// Errors produced by `MultipartBuffer`
#[derive(Debug, Error)]
pub enum MultipartError {
    /// Message exceeded configured frame count
    #[error("multipart message exceeded {0} frames")]
    TooManyFrames(usize),
    /// Message exceeded configured byte size
    #[error("multipart message exceeded {0} bytes")]
    TooLarge(usize),
}

/// Collects ZMTP frames until a complete multipart message is formed.
///
/// Invariants:
/// - Frames are appended in-order
/// - A message completes when `MORE == false`
/// - Limits are enforced eagerly to prevent DoS
///
/// This type is **not** thread-safe by design; it is owned by a single
/// connection's read loop.
pub struct MultipartBuffer {
    // Jupyter envelopes are typically 7 frames (ident + delimiter + 5),
    // so the inline capacity covers the common case without heap traffic.
    frames: SmallVec<[Bytes; 8]>,
    byte_count: usize,

    max_frames: usize,
    max_bytes: usize,
}

impl MultipartBuffer {
    /// Create a new buffer with limits.
    ///
    /// Example safe defaults:
    /// - max_frames = 128
    /// - max_bytes  = 64 MiB
    pub fn new(max_frames: usize, max_bytes: usize) -> Self {
        Self {
            frames: SmallVec::new(),
            byte_count: 0,
            max_frames,
            max_bytes,
        }
    }

    /// Push a frame into the buffer.
    ///
    /// Returns:
    /// - `Ok(None)` if the message is not complete
    /// - `Ok(Some(frames))` if a full message was assembled
    /// - `Err(MultipartError)` on resource violation (partial message discarded)
    pub fn push_frame(&mut self, frame: Frame) -> Result<Option<Vec<Bytes>>, MultipartError> {
        if self.frames.len() + 1 > self.max_frames {
            self.reset();
            return Err(MultipartError::TooManyFrames(self.max_frames));
        }

        self.byte_count += frame.payload.len();
        if self.byte_count > self.max_bytes {
            self.reset();
            return Err(MultipartError::TooLarge(self.max_bytes));
        }

        let more = frame.more();
        self.frames.push(frame.payload);

        if more {
            // Waiting for more frames
            Ok(None)
        } else {
            // Message complete
            let msg: Vec<Bytes> = self.frames.drain(..).collect();
            self.byte_count = 0;
            Ok(Some(msg))
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.frames.clear();
        self.byte_count = 0;
    }
}
