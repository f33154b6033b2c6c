//! TZX serialisation.

#![allow(clippy::cast_possible_truncation)]

use crate::file::{MAGIC, TzxBlock, TzxFile};

impl TzxFile {
    /// Serialise to TZX bytes.
    ///
    /// [`TzxBlock::Unknown`] carries no payload and is omitted. Lengths that
    /// overflow their field are clamped to the field width and the payload
    /// truncated to match.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.push(self.major);
        out.push(self.minor);
        for block in &self.blocks {
            write_block(&mut out, block);
        }
        out
    }
}

fn write_block(out: &mut Vec<u8>, block: &TzxBlock) {
    match block {
        TzxBlock::StandardSpeed { pause_ms, data } => {
            out.push(0x10);
            push_u16(out, *pause_ms);
            let data = clamp(data, usize::from(u16::MAX));
            push_u16(out, data.len() as u16);
            out.extend_from_slice(data);
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
            out.push(0x11);
            for value in [*pilot_pulse, *sync1, *sync2, *zero_pulse, *one_pulse, *pilot_count] {
                push_u16(out, value);
            }
            out.push(*used_bits);
            push_u16(out, *pause_ms);
            push_payload_u24(out, data);
        }
        TzxBlock::PureTone { pulse_len, count } => {
            out.push(0x12);
            push_u16(out, *pulse_len);
            push_u16(out, *count);
        }
        TzxBlock::PulseSequence { pulses } => {
            out.push(0x13);
            let pulses = clamp(pulses, usize::from(u8::MAX));
            out.push(pulses.len() as u8);
            for &pulse in pulses {
                push_u16(out, pulse);
            }
        }
        TzxBlock::PureData {
            zero_pulse,
            one_pulse,
            used_bits,
            pause_ms,
            data,
        } => {
            out.push(0x14);
            push_u16(out, *zero_pulse);
            push_u16(out, *one_pulse);
            out.push(*used_bits);
            push_u16(out, *pause_ms);
            push_payload_u24(out, data);
        }
        TzxBlock::DirectRecording {
            tacts_per_sample,
            pause_ms,
            used_bits,
            data,
        } => {
            out.push(0x15);
            push_u16(out, *tacts_per_sample);
            push_u16(out, *pause_ms);
            out.push(*used_bits);
            push_payload_u24(out, data);
        }
        TzxBlock::Pause { duration_ms } => {
            out.push(0x20);
            push_u16(out, *duration_ms);
        }
        TzxBlock::GroupStart { name } => {
            out.push(0x21);
            push_short_text(out, name);
        }
        TzxBlock::GroupEnd => out.push(0x22),
        TzxBlock::LoopStart { repetitions } => {
            out.push(0x24);
            push_u16(out, *repetitions);
        }
        TzxBlock::LoopEnd => out.push(0x25),
        TzxBlock::StopIf48K => {
            out.push(0x2A);
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        TzxBlock::SetSignalLevel { level } => {
            out.push(0x2B);
            out.extend_from_slice(&1u32.to_le_bytes());
            out.push(u8::from(*level));
        }
        TzxBlock::TextDescription { text } => {
            out.push(0x30);
            push_short_text(out, text);
        }
        TzxBlock::Message { display_secs, text } => {
            out.push(0x31);
            out.push(*display_secs);
            push_short_text(out, text);
        }
        TzxBlock::ArchiveInfo { entries } => {
            let entries = clamp(entries, usize::from(u8::MAX));
            let mut body = vec![entries.len() as u8];
            for (id, text) in entries {
                body.push(*id);
                push_short_text(&mut body, text);
            }
            out.push(0x32);
            push_u16(out, body.len() as u16);
            out.extend_from_slice(&body);
        }
        TzxBlock::Unknown { block_id } => {
            log::warn!("Dropping uninterpreted TZX block ${block_id:02X} on write");
        }
    }
}

fn clamp<T>(items: &[T], max: usize) -> &[T] {
    &items[..items.len().min(max)]
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_payload_u24(out: &mut Vec<u8>, data: &[u8]) {
    let data = clamp(data, 0xFF_FFFF);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes()[..3]);
    out.extend_from_slice(data);
}

fn push_short_text(out: &mut Vec<u8>, text: &str) {
    let bytes = clamp(text.as_bytes(), usize::from(u8::MAX));
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
}
