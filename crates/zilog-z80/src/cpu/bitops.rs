//! `CB` page: shifts, rotates and single-bit operations, plus the
//! `DD CB d op` / `FD CB d op` indexed forms.

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};

use super::Z80;

impl Z80 {
    pub(super) fn execute_bit<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let y = (op >> 3) & 7;
        let z = op & 7;

        if z == 6 {
            let address = self.regs.hl();
            let value = self.read_byte(bus, address);
            self.internal(1);
            match op >> 6 {
                // BIT n,(HL) takes X/Y from MEMPTR.
                1 => self.bit_test(y, value, (self.regs.wz >> 8) as u8),
                kind => {
                    let result = self.bit_result(kind, y, value);
                    self.write_byte(bus, address, result);
                }
            }
            return;
        }

        let value = self.reg8(z);
        match op >> 6 {
            1 => self.bit_test(y, value, value),
            kind => {
                let result = self.bit_result(kind, y, value);
                self.set_reg8(z, result);
            }
        }
    }

    /// `DD CB d op`: the displacement and the opcode are plain memory reads,
    /// so only the two prefix bytes refresh R.
    pub(super) fn execute_indexed_bit<B: Bus>(&mut self, bus: &mut B) {
        let displacement = self.fetch_byte(bus) as i8;
        let op = self.fetch_byte(bus);
        self.internal(2);
        let address = self.index_reg().wrapping_add_signed(i16::from(displacement));
        self.regs.wz = address;

        let y = (op >> 3) & 7;
        let z = op & 7;
        let value = self.read_byte(bus, address);
        self.internal(1);

        match op >> 6 {
            1 => self.bit_test(y, value, (address >> 8) as u8),
            kind => {
                let result = self.bit_result(kind, y, value);
                self.write_byte(bus, address, result);
                // Undocumented: the result is also copied into a register.
                if z != 6 {
                    self.set_reg8(z, result);
                }
            }
        }
    }

    /// Shift (kind 0), RES (kind 2) or SET (kind 3). Only shifts touch F.
    fn bit_result(&mut self, kind: u8, y: u8, value: u8) -> u8 {
        match kind {
            0 => {
                let carry = self.regs.f & CF != 0;
                let result = alu::shift(y, value, carry);
                self.set_f(result.flags);
                result.value
            }
            2 => value & !(1 << y),
            _ => value | (1 << y),
        }
    }

    fn bit_test(&mut self, bit: u8, value: u8, xy_source: u8) {
        let tested = value & (1 << bit);
        let mut flags = (self.regs.f & CF) | HF | (xy_source & (XF | YF));
        if tested == 0 {
            flags |= ZF | PF;
        }
        if tested & 0x80 != 0 {
            flags |= SF;
        }
        self.set_f(flags);
    }
}
