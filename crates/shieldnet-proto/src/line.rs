//! Outbound line encoding.
//!
//! Lines are CRLF terminated. Floats use a fixed layout: ten significant
//! integer+fraction digits, right aligned to a width of ten, so `3.14159`
//! becomes `3.141590118`. Integer digits take priority; values of ten or more
//! integer digits are written with no fraction at all.
//!
//! [`FloatLine`] formats into a stack buffer of [`FloatLine::CAPACITY`] bytes.
//! The widest possible output is `-` followed by the 39 integer digits of
//! `f32::MAX` plus the terminator, well inside the buffer, and the writer
//! refuses rather than overruns if that bound were ever wrong.

use std::fmt::{self, Write as _};

use crate::{
    errors::{ProtocolError, Result},
    parser::{END_MARKER, START_MARKER},
};

/// Terminator appended to every outbound line.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Minimum field width of a formatted float.
pub const FLOAT_WIDTH: usize = 10;

/// Integer plus fraction digits in a formatted float.
pub const FLOAT_DIGITS: usize = 10;

/// A float rendered as one CRLF-terminated line.
#[derive(Clone, Copy)]
pub struct FloatLine {
    buf: [u8; Self::CAPACITY],
    len: usize,
}

impl FloatLine {
    /// Size of the backing buffer.
    pub const CAPACITY: usize = 48;

    /// Format `value` into a fixed-width line.
    pub fn format(value: f32) -> Result<Self> {
        let mut line = Self { buf: [0; Self::CAPACITY], len: 0 };

        let width = FLOAT_WIDTH;
        let written = if value.is_finite() {
            let precision = FLOAT_DIGITS.saturating_sub(integer_digits(value));
            write!(line, "{value:>width$.precision$}")
        } else {
            write!(line, "{value:>width$}")
        };
        written.map_err(|_| ProtocolError::LineOverflow { capacity: Self::CAPACITY })?;

        line.push(LINE_TERMINATOR)
            .map_err(|()| ProtocolError::LineOverflow { capacity: Self::CAPACITY })?;
        Ok(line)
    }

    /// Encoded line, including the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Formatted number without the terminator or padding.
    pub fn value_str(&self) -> &str {
        let body = &self.buf[..self.len - LINE_TERMINATOR.len()];
        // Only `fmt` output and ASCII are ever written
        std::str::from_utf8(body).map_or("", str::trim_start)
    }

    fn push(&mut self, bytes: &[u8]) -> std::result::Result<(), ()> {
        let end = self.len + bytes.len();
        let slot = self.buf.get_mut(self.len..end).ok_or(())?;
        slot.copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }
}

impl fmt::Write for FloatLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s.as_bytes()).map_err(|()| fmt::Error)
    }
}

impl fmt::Debug for FloatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FloatLine").field(&self.value_str()).finish()
    }
}

/// Number of digits before the decimal point, at least one.
fn integer_digits(value: f32) -> usize {
    let mut magnitude = f64::from(value.abs());
    let mut digits = 1;
    while magnitude >= 10.0 {
        magnitude /= 10.0;
        digits += 1;
    }
    digits
}

/// Write `body` wrapped in start and end markers.
///
/// Bodies containing either marker are rejected since the wire format has no
/// escaping.
pub fn write_frame<W: std::io::Write>(out: &mut W, body: &[u8]) -> Result<()> {
    if let Some(offset) = body.iter().position(|&b| b == START_MARKER || b == END_MARKER) {
        return Err(ProtocolError::MarkerInBody { marker: body[offset], offset });
    }

    let io = |e: std::io::Error| ProtocolError::Io(e.to_string());
    out.write_all(&[START_MARKER]).map_err(io)?;
    out.write_all(body).map_err(io)?;
    out.write_all(&[END_MARKER]).map_err(io)?;
    out.flush().map_err(io)
}
