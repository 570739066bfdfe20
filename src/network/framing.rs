//! Length-Delimited Framing
//!
//! Stream transports don't preserve message boundaries, so each encoded
//! message is prefixed with its length as a 4-byte big-endian integer.
//!
//! Reads are non-blocking: bytes are pushed into a [`FrameDecoder`] as they
//! arrive and complete frames are pulled out once fully buffered.

use thiserror::Error;

/// Largest accepted frame payload (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Length prefix size in bytes.
const HEADER_LEN: usize = 4;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Incremental frame reassembly.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull the next complete frame, if one is buffered.
    ///
    /// An oversized length prefix is an error; the stream cannot be
    /// resynchronised after it.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buf[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(len));
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }
        let frame = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buf.drain(..HEADER_LEN + len);
        Ok(Some(frame))
    }

    /// Bytes buffered but not yet returned.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Framing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame exceeds [`MAX_FRAME_SIZE`].
    #[error("frame too large: {0} bytes (max 65536)")]
    TooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_big_endian() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(frame, [0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_partial_reads() {
        let mut stream = encode_frame(b"first").unwrap();
        stream.extend(encode_frame(b"").unwrap());
        stream.extend(encode_frame(b"second").unwrap());

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        // one byte at a time
        for byte in stream {
            decoder.extend(&[byte]);
            while let Some(frame) = decoder.next_frame().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![b"first".to_vec(), Vec::new(), b"second".to_vec()]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_oversized() {
        let big = vec![0u8; MAX_FRAME_SIZE + 1];
        assert_eq!(encode_frame(&big), Err(FrameError::TooLarge(MAX_FRAME_SIZE + 1)));
        assert!(encode_frame(&big[..MAX_FRAME_SIZE]).is_ok());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&u32::MAX.to_be_bytes());
        assert_eq!(decoder.next_frame(), Err(FrameError::TooLarge(u32::MAX as usize)));
    }
}
