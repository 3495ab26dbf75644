//! Streaming frame parser.
//!
//! # State Machine
//!
//! ```text
//!            '<'                      '>'
//! ┌──────┐ ───────> ┌───────────┐ ───────> frame ready
//! │ Idle │          │ Receiving │          (back to Idle)
//! └──────┘ <─────── └───────────┘
//!   ↺ other bytes     ↺ body bytes (stored, cursor clamped)
//! ```
//!
//! # Buffer
//!
//! One fixed buffer of `N` bytes holds the body of the frame in progress. The
//! cursor saturates at `N - 1`: once a body is longer than that, every further
//! byte overwrites the last slot, and the end marker then replaces that slot
//! with the NUL terminator. A completed body therefore always holds exactly
//! `min(len, N - 1)` leading bytes of what was sent.
//!
//! The parser holds at most one completed frame. While the ready flag is set,
//! [`FrameParser::scan`] consumes nothing, so the frame stays intact until the
//! consumer calls [`FrameParser::clear`].

use crate::source::ByteSource;

/// Byte that opens a frame.
pub const START_MARKER: u8 = b'<';

/// Byte that closes a frame.
pub const END_MARKER: u8 = b'>';

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for a start marker
    Idle,
    /// Accumulating body bytes until the end marker
    Receiving,
}

/// Effect of feeding a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Byte arrived outside a frame and was dropped
    Discarded,
    /// Start marker seen, frame opened
    Started,
    /// Body byte stored at the cursor
    Stored,
    /// Body byte overwrote the last slot because the buffer is full
    Clamped,
    /// End marker seen, frame ready
    Completed,
}

/// Single-buffer streaming parser for `<body>` frames.
#[derive(Debug, Clone)]
pub struct FrameParser<const N: usize> {
    buffer: [u8; N],
    state: ParserState,
    cursor: usize,
    /// Body length of the ready frame
    len: usize,
    ready: bool,
    /// Current (or ready) frame overflowed the buffer
    clamped: bool,
}

impl<const N: usize> FrameParser<N> {
    /// Buffer capacity, including the terminator slot.
    pub const CAPACITY: usize = N;

    /// Longest body that survives intact.
    pub const MAX_BODY: usize = N - 1;

    /// Create an idle parser with an empty buffer.
    pub const fn new() -> Self {
        const { assert!(N > 0, "frame buffer needs room for the terminator") };
        Self {
            buffer: [0; N],
            state: ParserState::Idle,
            cursor: 0,
            len: 0,
            ready: false,
            clamped: false,
        }
    }

    /// Current scanner state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Write position inside the buffer.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a completed frame is waiting to be consumed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the ready frame was clamped.
    pub fn was_clamped(&self) -> bool {
        self.ready && self.clamped
    }

    /// Body of the ready frame, without the terminator.
    pub fn frame(&self) -> Option<&[u8]> {
        self.ready.then(|| &self.buffer[..self.len])
    }

    /// Body of the ready frame followed by its NUL terminator.
    pub fn terminated(&self) -> Option<&[u8]> {
        self.ready.then(|| &self.buffer[..=self.len])
    }

    /// Body of the ready frame as UTF-8, if it is valid.
    pub fn frame_str(&self) -> Option<&str> {
        self.frame().and_then(|body| std::str::from_utf8(body).ok())
    }

    /// Drop the ready flag so scanning resumes.
    ///
    /// The buffer contents are left in place; they are overwritten by the
    /// next frame.
    pub fn clear(&mut self) {
        self.ready = false;
        self.clamped = false;
    }

    /// Feed one byte through the state machine.
    ///
    /// This ignores the ready flag. A frame completed while another is ready
    /// overwrites it, which is why [`Self::scan`] stops feeding once a frame
    /// is ready.
    pub fn push(&mut self, byte: u8) -> Feed {
        match self.state {
            ParserState::Idle if byte == START_MARKER => {
                self.state = ParserState::Receiving;
                self.clamped = false;
                Feed::Started
            },
            ParserState::Idle => Feed::Discarded,
            ParserState::Receiving if byte == END_MARKER => {
                self.buffer[self.cursor] = 0;
                self.len = self.cursor;
                self.cursor = 0;
                self.state = ParserState::Idle;
                self.ready = true;
                Feed::Completed
            },
            ParserState::Receiving => {
                self.buffer[self.cursor] = byte;
                self.cursor += 1;
                if self.cursor >= N {
                    self.cursor = N - 1;
                    self.clamped = true;
                    Feed::Clamped
                } else if self.clamped {
                    Feed::Clamped
                } else {
                    Feed::Stored
                }
            },
        }
    }

    /// Drain sources in order until a frame becomes ready.
    ///
    /// Each source is read until it runs dry or a frame completes. Once a
    /// frame is ready, no further byte is taken from any source. Returns
    /// whether a frame is ready when the scan ends, including one that was
    /// already ready before the call.
    pub fn scan<'a, S, I>(&mut self, sources: I) -> bool
    where
        S: ByteSource + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut S>,
    {
        for source in sources {
            while !self.ready {
                let Some(byte) = source.read_byte() else { break };
                self.push(byte);
            }
            if self.ready {
                break;
            }
        }
        self.ready
    }
}

impl<const N: usize> Default for FrameParser<N> {
    fn default() -> Self {
        Self::new()
    }
}
