//! Where tape content comes from and where recordings go.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::PathBuf;
use std::rc::Rc;

use format_tzx::{Pulse, encode_pulses};

/// Supplies a TZX image each time the machine starts loading.
pub trait TapeContentProvider {
    /// Forget any read in progress so the next `content` starts over.
    fn reset(&mut self);

    fn content(&mut self) -> io::Result<Box<dyn Read>>;
}

/// Receives the MIC pulse log when the machine stops saving.
pub trait TapeSaveProvider {
    fn save_pulses(&mut self, pulses: &[Pulse]) -> io::Result<()>;
}

/// TZX image held in memory.
#[derive(Debug, Clone)]
pub struct BytesContentProvider {
    data: Vec<u8>,
    reads: usize,
}

impl BytesContentProvider {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, reads: 0 }
    }

    /// Number of times the content was handed out since the last reset.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl TapeContentProvider for BytesContentProvider {
    fn reset(&mut self) {
        self.reads = 0;
    }

    fn content(&mut self) -> io::Result<Box<dyn Read>> {
        self.reads += 1;
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

/// TZX image read from disk each time loading starts.
#[derive(Debug, Clone)]
pub struct FileContentProvider {
    path: PathBuf,
}

impl FileContentProvider {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TapeContentProvider for FileContentProvider {
    fn reset(&mut self) {}

    fn content(&mut self) -> io::Result<Box<dyn Read>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Encodes each recording as a TZX image.
///
/// Clones share their recordings, so a caller can keep one handle and give
/// another to the tape device.
#[derive(Debug, Clone, Default)]
pub struct TzxSaveProvider {
    recordings: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl TzxSaveProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded images, oldest first.
    #[must_use]
    pub fn recordings(&self) -> Vec<Vec<u8>> {
        self.recordings.borrow().clone()
    }

    #[must_use]
    pub fn last_recording(&self) -> Option<Vec<u8>> {
        self.recordings.borrow().last().cloned()
    }
}

impl TapeSaveProvider for TzxSaveProvider {
    fn save_pulses(&mut self, pulses: &[Pulse]) -> io::Result<()> {
        let image = encode_pulses(pulses).to_bytes();
        log::debug!("Recorded {} pulses into {} TZX bytes", pulses.len(), image.len());
        self.recordings.borrow_mut().push(image);
        Ok(())
    }
}
