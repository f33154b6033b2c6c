//! TZX playback.
//!
//! The whole image is parsed and flattened into level segments before
//! playback starts. Playback then walks the segments with a forward-only
//! cursor: the CPU only ever asks about the current or a later tact.

use std::io::Read;

use format_tzx::{Pulse, TzxFile};

use crate::error::TapeError;

pub struct TzxPlayer {
    reader: Option<Box<dyn Read>>,
    cpu_frequency: u32,
    segments: Vec<Pulse>,
    index: usize,
    start_tact: u64,
    /// End of the current segment, relative to `start_tact`.
    segment_end: u64,
    eof: bool,
}

impl TzxPlayer {
    #[must_use]
    pub fn new(reader: Box<dyn Read>, cpu_frequency: u32) -> Self {
        Self {
            reader: Some(reader),
            cpu_frequency,
            segments: Vec::new(),
            index: 0,
            start_tact: 0,
            segment_end: 0,
            eof: false,
        }
    }

    /// Read and parse the whole image.
    pub fn read_content(&mut self) -> Result<(), TapeError> {
        let Some(mut reader) = self.reader.take() else {
            return Ok(());
        };
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let file = TzxFile::parse(&data)?;
        self.segments = file.signal(self.cpu_frequency);
        log::debug!(
            "Tape image: {} blocks, {} signal segments",
            file.blocks.len(),
            self.segments.len()
        );
        Ok(())
    }

    /// Start playback at `tact`.
    pub fn init_play(&mut self, tact: u64) {
        self.start_tact = tact;
        self.index = 0;
        self.segment_end = self.segments.first().map_or(0, |s| s.length);
        self.eof = self.segments.is_empty();
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    #[must_use]
    pub fn segments(&self) -> &[Pulse] {
        &self.segments
    }

    /// EAR level at `tact`. Low once the signal has run out.
    pub fn get_ear_bit(&mut self, tact: u64) -> bool {
        if self.eof {
            return false;
        }
        let offset = tact.saturating_sub(self.start_tact);
        while offset >= self.segment_end {
            self.index += 1;
            let Some(next) = self.segments.get(self.index) else {
                self.eof = true;
                return false;
            };
            self.segment_end += next.length;
        }
        self.segments[self.index].level
    }
}
