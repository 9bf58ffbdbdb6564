use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown memory state code 0x{0:X}")]
    MemoryStateCode(u8),

    #[error("Unexpected legacy enum envelope tag byte 0x{0:X}")]
    EnvelopeTag(u8),

    #[error("Invalid object stream marker 0x{found:X}, expected 0x{expected:X}")]
    ObjectStreamMarker { expected: u8, found: u8 },

    #[error("Legacy enum envelope names unexpected class {0}")]
    EnvelopeClassName(String),

    #[error("Found a non-UTF-8 string on the wire")]
    StringEncoding(#[from] FromUtf8Error),

    #[error(
        "Encountered an IO error while reading the input stream ({})",
        .0.kind()
    )]
    Io(#[from] io::Error),
}
