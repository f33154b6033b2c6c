//! `ED` page. Opcodes without a defined meaning behave as an 8-tact NOP.

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};

use super::Z80;

impl Z80 {
    pub(super) fn execute_extended<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let y = (op >> 3) & 7;
        let p = y >> 1;

        match op {
            // IN r,(C); ED 70 only sets flags
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let port = self.regs.bc();
                let value = self.port_in(bus, port);
                self.regs.wz = port.wrapping_add(1);
                if y != 6 {
                    self.set_reg8(y, value);
                }
                self.set_f((self.regs.f & CF) | sz53p(value));
            }

            // OUT (C),r; ED 71 outputs 0
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let port = self.regs.bc();
                let value = if y == 6 { 0 } else { self.reg8(y) };
                self.port_out(bus, port, value);
                self.regs.wz = port.wrapping_add(1);
            }

            // SBC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                self.internal(7);
                let hl = self.regs.hl();
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::sbc16(hl, self.reg16(p), carry);
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(result);
                self.set_f(flags);
            }

            // ADC HL,rr
            0x4A | 0x5A | 0x6A | 0x7A => {
                self.internal(7);
                let hl = self.regs.hl();
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::adc16(hl, self.reg16(p), carry);
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(result);
                self.set_f(flags);
            }

            // LD (nn),rr
            0x43 | 0x53 | 0x63 | 0x73 => {
                let address = self.fetch_word(bus);
                let value = self.reg16(p);
                self.write_word(bus, address, value);
                self.regs.wz = address.wrapping_add(1);
            }

            // LD rr,(nn)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let address = self.fetch_word(bus);
                let value = self.read_word(bus, address);
                self.set_reg16(p, value);
                self.regs.wz = address.wrapping_add(1);
            }

            // NEG (and its mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.set_f(result.flags);
            }

            // RETN / RETI (and mirrors); both restore IFF1 from IFF2
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
                self.regs.iff1 = self.regs.iff2;
            }

            // IM 0/1/2 (and mirrors)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x76 | 0x7E => {
                self.regs.im = match y & 3 {
                    0 | 1 => 0,
                    2 => 1,
                    _ => 2,
                };
            }

            // LD I,A
            0x47 => {
                self.internal(1);
                self.regs.i = self.regs.a;
            }

            // LD R,A
            0x4F => {
                self.internal(1);
                self.regs.r = self.regs.a;
            }

            // LD A,I / LD A,R: P/V reflects IFF2
            0x57 | 0x5F => {
                self.internal(1);
                self.regs.a = if op == 0x57 { self.regs.i } else { self.regs.r };
                let iff2 = if self.regs.iff2 { PF } else { 0 };
                self.set_f((self.regs.f & CF) | sz53(self.regs.a) | iff2);
                self.ld_a_ir = true;
            }

            // RRD
            0x67 => {
                let address = self.regs.hl();
                let value = self.read_byte(bus, address);
                self.internal(4);
                let a = self.regs.a;
                self.write_byte(bus, address, (a << 4) | (value >> 4));
                self.regs.a = (a & 0xF0) | (value & 0x0F);
                self.regs.wz = address.wrapping_add(1);
                self.set_f((self.regs.f & CF) | sz53p(self.regs.a));
            }

            // RLD
            0x6F => {
                let address = self.regs.hl();
                let value = self.read_byte(bus, address);
                self.internal(4);
                let a = self.regs.a;
                self.write_byte(bus, address, (value << 4) | (a & 0x0F));
                self.regs.a = (a & 0xF0) | (value >> 4);
                self.regs.wz = address.wrapping_add(1);
                self.set_f((self.regs.f & CF) | sz53p(self.regs.a));
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.block_load(bus, y),

            // CPI / CPD / CPIR / CPDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.block_compare(bus, y),

            // INI / IND / INIR / INDR
            0xA2 | 0xAA | 0xB2 | 0xBA => self.block_in(bus, y),

            // OUTI / OUTD / OTIR / OTDR
            0xA3 | 0xAB | 0xB3 | 0xBB => self.block_out(bus, y),

            _ => {}
        }
    }

    /// Bit 3 of the opcode selects decrement; bit 4 selects repeat.
    fn block_step(y: u8) -> u16 {
        if y & 1 == 0 { 1 } else { 0xFFFF }
    }

    /// Rewind PC onto the `ED` prefix so the instruction runs again.
    fn repeat_block(&mut self) {
        self.internal(5);
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.wz = self.regs.pc.wrapping_add(1);
    }

    fn block_load<B: Bus>(&mut self, bus: &mut B, y: u8) {
        let step = Self::block_step(y);
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = self.read_byte(bus, hl);
        self.write_byte(bus, de, value);
        self.internal(2);
        self.regs.set_hl(hl.wrapping_add(step));
        self.regs.set_de(de.wrapping_add(step));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let n = value.wrapping_add(self.regs.a);
        let mut flags = (self.regs.f & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF);
        if bc != 0 {
            flags |= PF;
        }
        self.set_f(flags);

        if y >= 6 && bc != 0 {
            self.repeat_block();
        }
    }

    fn block_compare<B: Bus>(&mut self, bus: &mut B, y: u8) {
        let step = Self::block_step(y);
        let hl = self.regs.hl();
        let value = self.read_byte(bus, hl);
        self.internal(5);
        self.regs.set_hl(hl.wrapping_add(step));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        self.regs.wz = self.regs.wz.wrapping_add(step);

        let a = self.regs.a;
        let result = a.wrapping_sub(value);
        let half = (a ^ value ^ result) & HF;
        let n = result.wrapping_sub(u8::from(half != 0));
        let mut flags = (self.regs.f & CF) | NF | half | (result & SF) | (n & XF) | ((n << 4) & YF);
        if result == 0 {
            flags |= ZF;
        }
        if bc != 0 {
            flags |= PF;
        }
        self.set_f(flags);

        if y >= 6 && bc != 0 && result != 0 {
            self.repeat_block();
        }
    }

    fn block_in<B: Bus>(&mut self, bus: &mut B, y: u8) {
        let step = Self::block_step(y);
        self.internal(1);
        let port = self.regs.bc();
        let value = self.port_in(bus, port);
        self.regs.wz = port.wrapping_add(step);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let hl = self.regs.hl();
        self.write_byte(bus, hl, value);
        self.regs.set_hl(hl.wrapping_add(step));

        let k = u16::from(value) + u16::from(self.regs.c.wrapping_add(step as u8));
        self.block_io_flags(value, k);

        if y >= 6 && self.regs.b != 0 {
            self.repeat_block();
        }
    }

    fn block_out<B: Bus>(&mut self, bus: &mut B, y: u8) {
        let step = Self::block_step(y);
        self.internal(1);
        let hl = self.regs.hl();
        let value = self.read_byte(bus, hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let port = self.regs.bc();
        self.port_out(bus, port, value);
        self.regs.set_hl(hl.wrapping_add(step));
        self.regs.wz = port.wrapping_add(step);

        let k = u16::from(value) + u16::from(self.regs.l);
        self.block_io_flags(value, k);

        if y >= 6 && self.regs.b != 0 {
            self.repeat_block();
        }
    }

    fn block_io_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.b;
        let mut flags = sz53(b);
        if value & 0x80 != 0 {
            flags |= NF;
        }
        if k > 0xFF {
            flags |= HF | CF;
        }
        if parity((k as u8 & 7) ^ b) {
            flags |= PF;
        }
        self.set_f(flags);
    }
}
