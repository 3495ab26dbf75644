//! Wire format for the shieldnet frame protocol.
//!
//! Inbound traffic is an ASCII byte stream in which a frame is a start marker
//! (`<`), an arbitrary body, and an end marker (`>`). There is no length
//! prefix, no checksum and no escaping, so the parser is a two-state scanner
//! over a fixed-capacity buffer.
//!
//! Outbound traffic is line oriented: plain text or a fixed-format decimal
//! float, each terminated by CRLF.
//!
//! Nothing in this crate allocates. Buffers are sized by const generics or by
//! constants that cover the worst case.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod line;
pub mod parser;
pub mod source;

pub use errors::{ProtocolError, Result};
pub use line::{FloatLine, LINE_TERMINATOR, write_frame};
pub use parser::{END_MARKER, Feed, FrameParser, ParserState, START_MARKER};
pub use source::ByteSource;
