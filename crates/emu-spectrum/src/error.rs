//! Machine and tape errors.

use format_tzx::TzxError;
use thiserror::Error;

/// Failure while preparing tape content for playback or storing a recording.
#[derive(Debug, Error)]
pub enum TapeError {
    #[error("tape I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed tape content: {0}")]
    Format(#[from] TzxError),
}

/// Failure surfaced by the machine.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Tape(#[from] TapeError),

    #[error("ROM image is {len} bytes, at most 16384 fit")]
    RomTooLarge { len: usize },
}
