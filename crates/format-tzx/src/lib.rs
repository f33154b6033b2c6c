//! TZX tape images.
//!
//! TZX encodes tape signals as T-state-accurate pulse sequences. This crate
//! parses and writes the container, flattens blocks into a level/duration
//! signal, and encodes a recorded signal back into blocks.
//!
//! Reference: <https://worldofspectrum.net/TZXformat.html>

mod file;
mod signal;
mod write;

pub use file::{TzxBlock, TzxFile};
pub use signal::{Pulse, encode_pulses, ms_to_tacts, signal_segments};

use thiserror::Error;

/// Errors raised while decoding a TZX image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TzxError {
    #[error("TZX file too short for header (need 10 bytes, got {0})")]
    TooShort(usize),

    #[error("invalid TZX magic (expected \"ZXTape!\" + 0x1A)")]
    BadMagic,

    #[error("truncated TZX {context} at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        context: String,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown TZX block ${id:02X} at offset {offset} with no way to determine length")]
    UnknownBlock { id: u8, offset: usize },

    #[error("TZX archive info block too short")]
    ArchiveInfoTooShort,
}
