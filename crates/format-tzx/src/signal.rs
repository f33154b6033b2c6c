//! Conversion between TZX blocks and a flat EAR/MIC level signal.
//!
//! Every signal-producing block is a run of pulses. A pulse toggles the
//! level and then holds it for its length in T-states. Each data bit is
//! **two** equal pulses, transmitted MSB first within each byte.

#![allow(clippy::cast_possible_truncation)]

use crate::file::{TzxBlock, TzxFile};

const PILOT_PULSE: u16 = 2168;
const SYNC1_PULSE: u16 = 667;
const SYNC2_PULSE: u16 = 735;
const ZERO_PULSE: u16 = 855;
const ONE_PULSE: u16 = 1710;
const HEADER_PILOT_COUNT: u16 = 8063;
const DATA_PILOT_COUNT: u16 = 3223;

/// Most pulses a `$13` block can carry.
const MAX_SEQUENCE_PULSES: usize = 255;

/// A stretch of constant signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub level: bool,
    /// Duration in T-states.
    pub length: u64,
}

/// Convert milliseconds to T-states at `cpu_frequency`.
#[must_use]
pub fn ms_to_tacts(ms: u16, cpu_frequency: u32) -> u64 {
    u64::from(ms) * u64::from(cpu_frequency) / 1000
}

/// Flatten blocks into level segments.
///
/// The signal starts low. Adjacent segments of equal level are merged, so
/// consecutive segments always alternate. Loops are expanded. A zero-length
/// pause or a stop-if-48K block ends the signal.
#[must_use]
pub fn signal_segments(blocks: &[TzxBlock], cpu_frequency: u32) -> Vec<Pulse> {
    let mut signal = SignalBuilder::default();
    let mut loops: Vec<(usize, u16)> = Vec::new();
    let mut index = 0;

    while let Some(block) = blocks.get(index) {
        index += 1;
        match block {
            TzxBlock::StandardSpeed { pause_ms, data } => {
                if let Some(&flag) = data.first() {
                    let pilot_count = if flag < 0x80 {
                        HEADER_PILOT_COUNT
                    } else {
                        DATA_PILOT_COUNT
                    };
                    signal.tone(PILOT_PULSE, pilot_count);
                    signal.toggle(SYNC1_PULSE);
                    signal.toggle(SYNC2_PULSE);
                    signal.data(ZERO_PULSE, ONE_PULSE, 8, data);
                }
                signal.pause(*pause_ms, cpu_frequency);
            }
            TzxBlock::TurboSpeed {
                pilot_pulse,
                sync1,
                sync2,
                zero_pulse,
                one_pulse,
                pilot_count,
                used_bits,
                pause_ms,
                data,
            } => {
                signal.tone(*pilot_pulse, *pilot_count);
                signal.toggle(*sync1);
                signal.toggle(*sync2);
                signal.data(*zero_pulse, *one_pulse, *used_bits, data);
                signal.pause(*pause_ms, cpu_frequency);
            }
            TzxBlock::PureTone { pulse_len, count } => signal.tone(*pulse_len, *count),
            TzxBlock::PulseSequence { pulses } => {
                for &pulse in pulses {
                    signal.toggle(pulse);
                }
            }
            TzxBlock::PureData {
                zero_pulse,
                one_pulse,
                used_bits,
                pause_ms,
                data,
            } => {
                signal.data(*zero_pulse, *one_pulse, *used_bits, data);
                signal.pause(*pause_ms, cpu_frequency);
            }
            TzxBlock::DirectRecording {
                tacts_per_sample,
                pause_ms,
                used_bits,
                data,
            } => {
                signal.samples(*tacts_per_sample, *used_bits, data);
                signal.pause(*pause_ms, cpu_frequency);
            }
            TzxBlock::Pause { duration_ms: 0 } | TzxBlock::StopIf48K => break,
            TzxBlock::Pause { duration_ms } => signal.pause(*duration_ms, cpu_frequency),
            TzxBlock::LoopStart { repetitions } => loops.push((index, *repetitions)),
            TzxBlock::LoopEnd => {
                if let Some((start, remaining)) = loops.pop()
                    && remaining > 1
                {
                    loops.push((start, remaining - 1));
                    index = start;
                }
            }
            TzxBlock::SetSignalLevel { level } => signal.level = *level,
            TzxBlock::GroupStart { .. }
            | TzxBlock::GroupEnd
            | TzxBlock::TextDescription { .. }
            | TzxBlock::Message { .. }
            | TzxBlock::ArchiveInfo { .. }
            | TzxBlock::Unknown { .. } => {}
        }
    }

    signal.segments
}

impl TzxFile {
    /// Flatten this file's blocks; see [`signal_segments`].
    #[must_use]
    pub fn signal(&self, cpu_frequency: u32) -> Vec<Pulse> {
        signal_segments(&self.blocks, cpu_frequency)
    }
}

#[derive(Default)]
struct SignalBuilder {
    level: bool,
    segments: Vec<Pulse>,
}

impl SignalBuilder {
    fn toggle(&mut self, length: u16) {
        self.level = !self.level;
        self.hold(u64::from(length));
    }

    fn hold(&mut self, length: u64) {
        if length == 0 {
            return;
        }
        match self.segments.last_mut() {
            Some(last) if last.level == self.level => last.length += length,
            _ => self.segments.push(Pulse {
                level: self.level,
                length,
            }),
        }
    }

    fn tone(&mut self, pulse_len: u16, count: u16) {
        for _ in 0..count {
            self.toggle(pulse_len);
        }
    }

    /// `used_bits` applies to the last byte; 0 is read as 8.
    fn data(&mut self, zero_pulse: u16, one_pulse: u16, used_bits: u8, data: &[u8]) {
        let last_bits = if used_bits == 0 { 8 } else { used_bits.min(8) };
        for (i, &byte) in data.iter().enumerate() {
            let bits = if i + 1 == data.len() { last_bits } else { 8 };
            for bit in 0..bits {
                let pulse = if byte & (0x80 >> bit) != 0 {
                    one_pulse
                } else {
                    zero_pulse
                };
                self.toggle(pulse);
                self.toggle(pulse);
            }
        }
    }

    /// Each bit is a sample: the level itself, held for `tacts_per_sample`.
    fn samples(&mut self, tacts_per_sample: u16, used_bits: u8, data: &[u8]) {
        let last_bits = if used_bits == 0 { 8 } else { used_bits.min(8) };
        for (i, &byte) in data.iter().enumerate() {
            let bits = if i + 1 == data.len() { last_bits } else { 8 };
            for bit in 0..bits {
                self.level = byte & (0x80 >> bit) != 0;
                self.hold(u64::from(tacts_per_sample));
            }
        }
    }

    fn pause(&mut self, ms: u16, cpu_frequency: u32) {
        if ms == 0 {
            return;
        }
        self.level = false;
        self.hold(ms_to_tacts(ms, cpu_frequency));
    }
}

/// Encode a recorded level signal as TZX blocks.
///
/// The output is a `$2B` set-level block followed by `$13` pulse sequences
/// of at most 255 pulses. A pulse longer than 65 535 T-states is split, and
/// a `$2B` block is inserted so the next chunk keeps the same level.
/// Flattening the result reproduces `pulses` exactly (zero-length pulses
/// are dropped).
#[must_use]
pub fn encode_pulses(pulses: &[Pulse]) -> TzxFile {
    let mut blocks = Vec::new();
    let mut sequence: Vec<u16> = Vec::new();
    let mut current: Option<bool> = None;

    let flush = |blocks: &mut Vec<TzxBlock>, sequence: &mut Vec<u16>| {
        if !sequence.is_empty() {
            blocks.push(TzxBlock::PulseSequence {
                pulses: std::mem::take(sequence),
            });
        }
    };

    for pulse in pulses.iter().filter(|p| p.length > 0) {
        let mut remaining = pulse.length;
        while remaining > 0 {
            let chunk = remaining.min(u64::from(u16::MAX));
            // A pulse toggles before holding, so the level ahead of it must
            // be the opposite one.
            if current != Some(!pulse.level) {
                flush(&mut blocks, &mut sequence);
                blocks.push(TzxBlock::SetSignalLevel {
                    level: !pulse.level,
                });
            }
            sequence.push(chunk as u16);
            current = Some(pulse.level);
            if sequence.len() == MAX_SEQUENCE_PULSES {
                flush(&mut blocks, &mut sequence);
            }
            remaining -= chunk;
        }
    }
    flush(&mut blocks, &mut sequence);

    log::trace!("Encoded {} pulses into {} TZX blocks", pulses.len(), blocks.len());
    TzxFile::new(blocks)
}
