//! TZX container: header and block list.
//!
//! A TZX file starts with a 10-byte header (`"ZXTape!" + 0x1A + major + minor`)
//! followed by a sequence of blocks. Each block starts with an ID byte that
//! determines its structure.

use crate::TzxError;

/// A parsed TZX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzxFile {
    pub major: u8,
    pub minor: u8,
    pub blocks: Vec<TzxBlock>,
}

/// A single TZX block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TzxBlock {
    /// Block $10: Standard speed data (ROM timing).
    StandardSpeed { pause_ms: u16, data: Vec<u8> },
    /// Block $11: Turbo speed data (custom timing).
    TurboSpeed {
        pilot_pulse: u16,
        sync1: u16,
        sync2: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// Block $12: Pure tone (repeated single pulse).
    PureTone { pulse_len: u16, count: u16 },
    /// Block $13: Pulse sequence (arbitrary pulse lengths).
    PulseSequence { pulses: Vec<u16> },
    /// Block $14: Pure data (no pilot or sync, just data bits).
    PureData {
        zero_pulse: u16,
        one_pulse: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// Block $15: Direct recording, one level per sample bit.
    DirectRecording {
        tacts_per_sample: u16,
        pause_ms: u16,
        used_bits: u8,
        data: Vec<u8>,
    },
    /// Block $20: Pause, or stop the tape when the duration is zero.
    Pause { duration_ms: u16 },
    /// Block $21: Group start.
    GroupStart { name: String },
    /// Block $22: Group end.
    GroupEnd,
    /// Block $24: Loop start.
    LoopStart { repetitions: u16 },
    /// Block $25: Loop end.
    LoopEnd,
    /// Block $2A: Stop the tape if in 48K mode.
    StopIf48K,
    /// Block $2B: Set signal level.
    SetSignalLevel { level: bool },
    /// Block $30: Text description.
    TextDescription { text: String },
    /// Block $31: Message shown for `display_secs` seconds.
    Message { display_secs: u8, text: String },
    /// Block $32: Archive info.
    ArchiveInfo { entries: Vec<(u8, String)> },
    /// Block the player does not interpret. Skipped on read, dropped on write.
    Unknown { block_id: u8 },
}

/// TZX header magic: "ZXTape!" + 0x1A.
pub(crate) const MAGIC: &[u8; 8] = b"ZXTape!\x1A";

pub(crate) const MAJOR_VERSION: u8 = 1;
pub(crate) const MINOR_VERSION: u8 = 20;

impl TzxFile {
    /// An empty file with the current format revision.
    #[must_use]
    pub fn new(blocks: Vec<TzxBlock>) -> Self {
        Self {
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            blocks,
        }
    }

    /// Parse a TZX file from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or a block is malformed.
    pub fn parse(data: &[u8]) -> Result<Self, TzxError> {
        if data.len() < 10 {
            return Err(TzxError::TooShort(data.len()));
        }
        if &data[0..8] != MAGIC {
            return Err(TzxError::BadMagic);
        }

        let mut cursor = Cursor { data, pos: 10 };
        let mut blocks = Vec::new();
        while !cursor.at_end() {
            let block_id = cursor.u8("block id")?;
            let block = match block_id {
                0x10 => cursor.standard_speed()?,
                0x11 => cursor.turbo_speed()?,
                0x12 => TzxBlock::PureTone {
                    pulse_len: cursor.u16("Pure Tone")?,
                    count: cursor.u16("Pure Tone")?,
                },
                0x13 => cursor.pulse_sequence()?,
                0x14 => cursor.pure_data()?,
                0x15 => cursor.direct_recording()?,
                0x20 => TzxBlock::Pause {
                    duration_ms: cursor.u16("Pause")?,
                },
                0x21 => TzxBlock::GroupStart {
                    name: cursor.short_text("Group Start")?,
                },
                0x22 => TzxBlock::GroupEnd,
                0x24 => TzxBlock::LoopStart {
                    repetitions: cursor.u16("Loop Start")?,
                },
                0x25 => TzxBlock::LoopEnd,
                0x2A => {
                    // 4-byte block length, always 0.
                    cursor.take(4, "Stop If 48K")?;
                    TzxBlock::StopIf48K
                }
                0x2B => {
                    // 4-byte block length (always 1) + 1-byte level.
                    let body = cursor.take(5, "Set Signal Level")?;
                    TzxBlock::SetSignalLevel { level: body[4] != 0 }
                }
                0x30 => TzxBlock::TextDescription {
                    text: cursor.short_text("Text Description")?,
                },
                0x31 => TzxBlock::Message {
                    display_secs: cursor.u8("Message")?,
                    text: cursor.short_text("Message")?,
                },
                0x32 => cursor.archive_info()?,
                _ => cursor.skip_unknown(block_id)?,
            };
            blocks.push(block);
        }

        Ok(Self {
            major: data[8],
            minor: data[9],
            blocks,
        })
    }
}

impl Default for TzxFile {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, context: &str) -> Result<&'a [u8], TzxError> {
        if n > self.remaining() {
            return Err(TzxError::Truncated {
                context: context.to_string(),
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, context: &str) -> Result<u8, TzxError> {
        Ok(self.take(1, context)?[0])
    }

    fn u16(&mut self, context: &str) -> Result<u16, TzxError> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, context: &str) -> Result<usize, TzxError> {
        let b = self.take(3, context)?;
        Ok(usize::from(b[0]) | (usize::from(b[1]) << 8) | (usize::from(b[2]) << 16))
    }

    /// Length-prefixed (1 byte) text.
    fn short_text(&mut self, context: &str) -> Result<String, TzxError> {
        let len = usize::from(self.u8(context)?);
        let bytes = self.take(len, context)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn standard_speed(&mut self) -> Result<TzxBlock, TzxError> {
        let pause_ms = self.u16("Standard Speed header")?;
        let len = usize::from(self.u16("Standard Speed header")?);
        let data = self.take(len, "Standard Speed data")?.to_vec();
        Ok(TzxBlock::StandardSpeed { pause_ms, data })
    }

    fn turbo_speed(&mut self) -> Result<TzxBlock, TzxError> {
        const CTX: &str = "Turbo Speed header";
        // Truncation errors report the full header size.
        if self.remaining() < 18 {
            self.take(18, CTX)?;
        }
        let pilot_pulse = self.u16(CTX)?;
        let sync1 = self.u16(CTX)?;
        let sync2 = self.u16(CTX)?;
        let zero_pulse = self.u16(CTX)?;
        let one_pulse = self.u16(CTX)?;
        let pilot_count = self.u16(CTX)?;
        let used_bits = self.u8(CTX)?;
        let pause_ms = self.u16(CTX)?;
        let len = self.u24(CTX)?;
        let data = self.take(len, "Turbo Speed data")?.to_vec();
        Ok(TzxBlock::TurboSpeed {
            pilot_pulse,
            sync1,
            sync2,
            zero_pulse,
            one_pulse,
            pilot_count,
            used_bits,
            pause_ms,
            data,
        })
    }

    fn pulse_sequence(&mut self) -> Result<TzxBlock, TzxError> {
        let count = usize::from(self.u8("Pulse Sequence count")?);
        let bytes = self.take(count * 2, "Pulse Sequence data")?;
        let pulses = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(TzxBlock::PulseSequence { pulses })
    }

    fn pure_data(&mut self) -> Result<TzxBlock, TzxError> {
        const CTX: &str = "Pure Data header";
        if self.remaining() < 10 {
            self.take(10, CTX)?;
        }
        let zero_pulse = self.u16(CTX)?;
        let one_pulse = self.u16(CTX)?;
        let used_bits = self.u8(CTX)?;
        let pause_ms = self.u16(CTX)?;
        let len = self.u24(CTX)?;
        let data = self.take(len, "Pure Data data")?.to_vec();
        Ok(TzxBlock::PureData {
            zero_pulse,
            one_pulse,
            used_bits,
            pause_ms,
            data,
        })
    }

    fn direct_recording(&mut self) -> Result<TzxBlock, TzxError> {
        const CTX: &str = "Direct Recording header";
        if self.remaining() < 8 {
            self.take(8, CTX)?;
        }
        let tacts_per_sample = self.u16(CTX)?;
        let pause_ms = self.u16(CTX)?;
        let used_bits = self.u8(CTX)?;
        let len = self.u24(CTX)?;
        let data = self.take(len, "Direct Recording data")?.to_vec();
        Ok(TzxBlock::DirectRecording {
            tacts_per_sample,
            pause_ms,
            used_bits,
            data,
        })
    }

    fn archive_info(&mut self) -> Result<TzxBlock, TzxError> {
        let len = usize::from(self.u16("Archive Info header")?);
        let body = self.take(len, "Archive Info data")?;
        let Some((&count, mut rest)) = body.split_first() else {
            return Err(TzxError::ArchiveInfoTooShort);
        };

        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let [id, text_len, tail @ ..] = rest else {
                break;
            };
            let text_len = usize::from(*text_len).min(tail.len());
            let (text, next) = tail.split_at(text_len);
            entries.push((*id, String::from_utf8_lossy(text).into_owned()));
            rest = next;
        }
        Ok(TzxBlock::ArchiveInfo { entries })
    }

    /// Skip a block this crate does not interpret, using the length scheme
    /// of its ID or a 4-byte length prefix as a last resort.
    fn skip_unknown(&mut self, block_id: u8) -> Result<TzxBlock, TzxError> {
        let start = self.pos;
        let data = self.data;
        let peek = |offset: usize, width: usize| -> Option<usize> {
            let bytes = data.get(start + offset..start + offset + width)?;
            Some(
                bytes
                    .iter()
                    .rev()
                    .fold(0usize, |acc, &b| (acc << 8) | usize::from(b)),
            )
        };
        let truncated = |context: &str, needed: usize| TzxError::Truncated {
            context: context.to_string(),
            offset: start,
            needed,
            remaining: data.len() - start,
        };

        let skip = match block_id {
            // $18 CSW recording, $19 generalized data: 4-byte block length.
            0x18 | 0x19 => 4 + peek(0, 4).ok_or_else(|| truncated("block length", 4))?,
            // $23: Jump to block, signed 2-byte offset.
            0x23 => 2,
            // $26: Call sequence, 2-byte count of 2-byte offsets.
            0x26 => 2 + 2 * peek(0, 2).ok_or_else(|| truncated("Call Sequence count", 2))?,
            // $27: Return from sequence, no body.
            0x27 => 0,
            // $28: Select block, 2-byte length prefix.
            0x28 => 2 + peek(0, 2).ok_or_else(|| truncated("Select Block length", 2))?,
            // $33: Hardware type, 1-byte count of 3-byte entries.
            0x33 => 1 + 3 * peek(0, 1).ok_or_else(|| truncated("Hardware Type count", 1))?,
            // $34: Emulation info.
            0x34 => 8,
            // $35: Custom info, 16-byte ID then 4-byte length.
            0x35 => 20 + peek(16, 4).ok_or_else(|| truncated("Custom Info header", 20))?,
            // $40: Snapshot, type byte then 3-byte length.
            0x40 => 4 + peek(1, 3).ok_or_else(|| truncated("Snapshot header", 4))?,
            // $5A: Glue block.
            0x5A => 9,
            _ => match peek(0, 4) {
                Some(len) => 4 + len,
                None => {
                    return Err(TzxError::UnknownBlock {
                        id: block_id,
                        offset: start - 1,
                    });
                }
            },
        };

        self.take(skip, &format!("Unknown block ${block_id:02X}"))?;
        log::debug!("Skipped TZX block ${block_id:02X} ({skip} bytes)");
        Ok(TzxBlock::Unknown { block_id })
    }
}
