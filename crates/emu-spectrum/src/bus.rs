//! Spectrum bus: memory and I/O routing.
//!
//! The bus connects the Z80 CPU to memory and the port-mapped devices. The
//! 48K ULA answers every even port; odd ports float high.
//!
//! # Port $FE
//!
//! Write: bits 0-2 border colour, bit 3 MIC (tape out), bit 4 EAR (beeper).
//! Read: bits 0-4 keyboard half-rows selected by A8-A15, bit 6 EAR (tape
//! in), bits 5 and 7 always 1.

#![allow(clippy::cast_possible_truncation)]

use emu_core::Bus;

use crate::beeper::BeeperDevice;
use crate::border::BorderDevice;
use crate::keyboard::KeyboardDevice;
use crate::memory::Memory48K;
use crate::tape::TapeDevice;

/// The Spectrum bus, implementing `emu_core::Bus`.
///
/// Owns memory and every device the CPU reaches through a port. The CPU
/// borrows the bus for one cycle at a time, so the machine can drive the
/// same devices between instructions.
pub struct SpectrumBus {
    pub memory: Memory48K,
    pub keyboard: KeyboardDevice,
    pub border: BorderDevice,
    pub beeper: BeeperDevice,
    pub tape: TapeDevice,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: Memory48K, beeper: BeeperDevice, tape: TapeDevice) -> Self {
        Self {
            memory,
            keyboard: KeyboardDevice::new(),
            border: BorderDevice::new(),
            beeper,
            tape,
        }
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }

    fn io_read(&mut self, port: u16, tact: u64) -> u8 {
        if port & 0x01 != 0 {
            return 0xFF;
        }
        let mut value = self.keyboard.line_status((port >> 8) as u8);
        if !self.tape.get_ear_bit(tact, &mut self.beeper) {
            value &= !0x40;
        }
        value
    }

    fn io_write(&mut self, port: u16, value: u8, tact: u64) {
        if port & 0x01 != 0 {
            return;
        }
        self.border.set_colour(value & 0x07);
        self.beeper.process_ear_bit(value & 0x10 != 0, tact);
        self.tape.process_mic_bit(value & 0x08 != 0, tact);
    }
}
