//! Byte-at-a-time input sources.

use std::collections::VecDeque;

/// Non-blocking source of inbound bytes.
///
/// Returns `None` when no byte is available right now. That says nothing about
/// whether more bytes will arrive later; connection liveness is the socket's
/// concern, not the parser's.
pub trait ByteSource {
    /// Take the next available byte, if any.
    fn read_byte(&mut self) -> Option<u8>;
}

impl ByteSource for &[u8] {
    fn read_byte(&mut self) -> Option<u8> {
        let (&byte, rest) = self.split_first()?;
        *self = rest;
        Some(byte)
    }
}

impl ByteSource for VecDeque<u8> {
    fn read_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}
