//! Unprefixed instructions, also reached through the `DD`/`FD` prefixes.
//!
//! Under an index prefix every use of HL becomes IX/IY, H/L become the index
//! halves, and `(HL)` becomes `(IX+d)`. Instructions that name `(IX+d)` and
//! H or L together keep the real H and L.

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};

use super::{IndexMode, Z80};

impl Z80 {
    pub(super) fn execute_main<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;

        match op {
            // NOP
            0x00 => {}

            // EX AF,AF'
            0x08 => self.regs.exchange_af(),

            // DJNZ e
            0x10 => {
                self.internal(1);
                let offset = self.fetch_byte(bus);
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.internal(5);
                    self.relative_jump(offset);
                }
            }

            // JR e
            0x18 => {
                let offset = self.fetch_byte(bus);
                self.internal(5);
                self.relative_jump(offset);
            }

            // JR cc,e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch_byte(bus);
                if self.condition(y - 4) {
                    self.internal(5);
                    self.relative_jump(offset);
                }
            }

            // LD rr,nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_reg16(p, value);
            }

            // ADD HL,rr (09=BC, 19=DE, 29=HL, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.internal(7);
                let hl = self.index_reg();
                let rr = self.reg16(p);
                self.regs.wz = hl.wrapping_add(1);
                let (result, flags) = alu::add16(hl, rr);
                self.set_index_reg(result);
                self.set_f((self.regs.f & (SF | ZF | PF)) | flags);
            }

            // LD (BC),A / LD (DE),A
            0x02 | 0x12 => {
                let address = if op == 0x02 { self.regs.bc() } else { self.regs.de() };
                self.write_byte(bus, address, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | (address.wrapping_add(1) & 0xFF);
            }

            // LD A,(BC) / LD A,(DE)
            0x0A | 0x1A => {
                let address = if op == 0x0A { self.regs.bc() } else { self.regs.de() };
                self.regs.a = self.read_byte(bus, address);
                self.regs.wz = address.wrapping_add(1);
            }

            // LD (nn),HL
            0x22 => {
                let address = self.fetch_word(bus);
                let value = self.index_reg();
                self.write_word(bus, address, value);
                self.regs.wz = address.wrapping_add(1);
            }

            // LD HL,(nn)
            0x2A => {
                let address = self.fetch_word(bus);
                let value = self.read_word(bus, address);
                self.set_index_reg(value);
                self.regs.wz = address.wrapping_add(1);
            }

            // LD (nn),A
            0x32 => {
                let address = self.fetch_word(bus);
                self.write_byte(bus, address, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | (address.wrapping_add(1) & 0xFF);
            }

            // LD A,(nn)
            0x3A => {
                let address = self.fetch_word(bus);
                self.regs.a = self.read_byte(bus, address);
                self.regs.wz = address.wrapping_add(1);
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 | 0x0B | 0x1B | 0x2B | 0x3B => {
                self.internal(2);
                let value = self.reg16(p);
                let value = if op & 0x08 == 0 {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                self.set_reg16(p, value);
            }

            // INC (HL) / DEC (HL)
            0x34 | 0x35 => {
                let address = self.operand_address(bus);
                let value = self.read_byte(bus, address);
                self.internal(1);
                let result = if op == 0x34 { alu::inc8(value) } else { alu::dec8(value) };
                self.write_byte(bus, address, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // INC r / DEC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C | 0x05 | 0x0D | 0x15 | 0x1D | 0x25
            | 0x2D | 0x3D => {
                let value = self.reg8_indexed(y);
                let result = if z == 4 { alu::inc8(value) } else { alu::dec8(value) };
                self.set_reg8_indexed(y, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD (HL),n
            0x36 => {
                if self.index == IndexMode::Hl {
                    let value = self.fetch_byte(bus);
                    self.write_byte(bus, self.regs.hl(), value);
                } else {
                    // Displacement and operand are fetched back to back.
                    let displacement = self.fetch_byte(bus) as i8;
                    let value = self.fetch_byte(bus);
                    self.internal(2);
                    let address = self.index_reg().wrapping_add_signed(i16::from(displacement));
                    self.regs.wz = address;
                    self.write_byte(bus, address, value);
                }
            }

            // LD r,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.fetch_byte(bus);
                self.set_reg8_indexed(y, value);
            }

            // RLCA / RRCA / RLA / RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let carry = self.regs.f & CF != 0;
                let result = alu::shift(y, self.regs.a, carry);
                self.regs.a = result.value;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF)) | (result.value & (XF | YF)) | (result.flags & CF),
                );
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.set_f(result.flags);
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (XF | YF)),
                );
            }

            // SCF
            0x37 => {
                let xy = ((self.last_flags ^ self.regs.f) | self.regs.a) & (XF | YF);
                self.set_f((self.regs.f & (SF | ZF | PF)) | CF | xy);
            }

            // CCF
            0x3F => {
                let xy = ((self.last_flags ^ self.regs.f) | self.regs.a) & (XF | YF);
                let old_carry = self.regs.f & CF != 0;
                let carry_bits = if old_carry { HF } else { CF };
                self.set_f((self.regs.f & (SF | ZF | PF)) | carry_bits | xy);
            }

            // HALT
            0x76 => {
                self.regs.halted = true;
            }

            // LD (HL),r
            0x70..=0x77 => {
                let address = self.operand_address(bus);
                let value = self.reg8(z);
                self.write_byte(bus, address, value);
            }

            // LD r,(HL)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let address = self.operand_address(bus);
                let value = self.read_byte(bus, address);
                self.set_reg8(y, value);
            }

            // LD r,r'
            0x40..=0x7F => {
                let value = self.reg8_indexed(z);
                self.set_reg8_indexed(y, value);
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP (HL)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let address = self.operand_address(bus);
                let value = self.read_byte(bus, address);
                self.alu_a(y, value);
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP r
            0x80..=0xBF => {
                let value = self.reg8_indexed(z);
                self.alu_a(y, value);
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                self.internal(1);
                if self.condition(y) {
                    self.regs.pc = self.pop(bus);
                    self.regs.wz = self.regs.pc;
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop(bus);
                if op == 0xF1 {
                    self.regs.set_af(value);
                } else {
                    self.set_reg16(p, value);
                }
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
            }

            // EXX
            0xD9 => self.regs.exchange_main(),

            // JP (HL)
            0xE9 => self.regs.pc = self.index_reg(),

            // LD SP,HL
            0xF9 => {
                self.internal(2);
                self.regs.sp = self.index_reg();
            }

            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                if self.condition(y) {
                    self.regs.pc = target;
                }
            }

            // JP nn
            0xC3 => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                self.regs.pc = target;
            }

            // OUT (n),A
            0xD3 => {
                let low = self.fetch_byte(bus);
                let port = u16::from(self.regs.a) << 8 | u16::from(low);
                self.port_out(bus, port, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | u16::from(low.wrapping_add(1));
            }

            // IN A,(n)
            0xDB => {
                let low = self.fetch_byte(bus);
                let port = u16::from(self.regs.a) << 8 | u16::from(low);
                self.regs.a = self.port_in(bus, port);
                self.regs.wz = port.wrapping_add(1);
            }

            // EX (SP),HL
            0xE3 => {
                let sp = self.regs.sp;
                let lo = self.read_byte(bus, sp);
                let hi = self.read_byte(bus, sp.wrapping_add(1));
                self.internal(1);
                let [old_lo, old_hi] = self.index_reg().to_le_bytes();
                self.write_byte(bus, sp.wrapping_add(1), old_hi);
                self.write_byte(bus, sp, old_lo);
                self.internal(2);
                let value = u16::from_le_bytes([lo, hi]);
                self.set_index_reg(value);
                self.regs.wz = value;
            }

            // EX DE,HL (never affected by an index prefix)
            0xEB => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }

            // EI
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_pending = true;
            }

            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                if self.condition(y) {
                    self.internal(1);
                    let pc = self.regs.pc;
                    self.push(bus, pc);
                    self.regs.pc = target;
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                self.internal(1);
                let value = if op == 0xF5 { self.regs.af() } else { self.reg16(p) };
                self.push(bus, value);
            }

            // CALL nn
            0xCD => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                self.internal(1);
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = target;
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch_byte(bus);
                self.alu_a(y, value);
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.internal(1);
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = u16::from(y) * 8;
                self.regs.wz = self.regs.pc;
            }

            // Prefix bytes are consumed by the cycle dispatcher.
            0xCB | 0xDD | 0xED | 0xFD => {}
        }
    }

    /// Accumulator ALU operation selected by bits 3-5 of the opcode.
    pub(super) fn alu_a(&mut self, operation: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        let result = match operation & 7 {
            0 => alu::add8(a, value, false),
            1 => alu::add8(a, value, carry),
            2 => alu::sub8(a, value, false),
            3 => alu::sub8(a, value, carry),
            4 => alu::and8(a, value),
            5 => alu::xor8(a, value),
            6 => alu::or8(a, value),
            _ => alu::cp8(a, value),
        };
        self.regs.a = result.value;
        self.set_f(result.flags);
    }
}

#[cfg(test)]
mod tests {
    use crate::flags::{CF, PF, SF, ZF};
    use crate::Z80;
    use emu_core::{Bus, SimpleBus};

    /// Run `program` at $0000 until HALT, returning the CPU, bus and tacts
    /// consumed (HALT included).
    fn run_until_halt(program: &[u8]) -> (Z80, SimpleBus, u64) {
        let mut bus = SimpleBus::new();
        bus.load(0x0000, program);
        let mut cpu = Z80::new();
        cpu.regs.sp = 0xFF00;
        for _ in 0..10_000 {
            cpu.execute_instruction(&mut bus);
            if cpu.regs.halted {
                break;
            }
        }
        let tacts = cpu.tacts();
        (cpu, bus, tacts)
    }

    fn tacts_of(program: &[u8]) -> u32 {
        let mut bus = SimpleBus::new();
        bus.load(0x0000, program);
        let mut cpu = Z80::new();
        cpu.regs.sp = 0xFF00;
        cpu.regs.ix = 0x4000;
        cpu.regs.iy = 0x4000;
        cpu.execute_instruction(&mut bus)
    }

    #[test]
    fn double_and_conditional_return() {
        let program = [
            0x3E, 0x32, // LD A,$32
            0xCD, 0x06, 0x00, // CALL $0006
            0x76, // HALT
            0x87, // ADD A,A
            0xF0, // RET P
        ];
        let (cpu, _, tacts) = run_until_halt(&program);
        assert_eq!(cpu.regs.a, 0x64);
        assert_eq!(cpu.regs.f & (SF | ZF | PF | CF), 0);
        assert_eq!(cpu.regs.pc, 0x0006);
        assert_eq!(cpu.regs.sp, 0xFF00);
        assert_eq!(tacts, 43);
    }

    #[test]
    fn unprefixed_cycle_costs() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 4),             // NOP
            (&[0x01, 0x00, 0x00], 10), // LD BC,nn
            (&[0x03], 6),             // INC BC
            (&[0x09], 11),            // ADD HL,BC
            (&[0x22, 0x00, 0x80], 16), // LD (nn),HL
            (&[0x32, 0x00, 0x80], 13), // LD (nn),A
            (&[0x34], 11),            // INC (HL)
            (&[0x36, 0x00], 10),      // LD (HL),n
            (&[0x18, 0x00], 12),      // JR e
            (&[0x10, 0xFE], 13),      // DJNZ e, taken (B=0 wraps to $FF)
            (&[0x7E], 7),             // LD A,(HL)
            (&[0xC0], 5),             // RET NZ, not taken
            (&[0xC1], 10),            // POP BC
            (&[0xC5], 11),            // PUSH BC
            (&[0xC4, 0x00, 0x80], 10), // CALL NZ,nn, not taken
            (&[0xCC, 0x00, 0x80], 17), // CALL Z,nn, taken
            (&[0xC8], 11),            // RET Z, taken
            (&[0xCD, 0x00, 0x80], 17), // CALL nn
            (&[0xD3, 0xFE], 11),      // OUT (n),A
            (&[0xDB, 0xFE], 11),      // IN A,(n)
            (&[0xE3], 19),            // EX (SP),HL
            (&[0xF9], 6),             // LD SP,HL
            (&[0xFF], 11),            // RST $38
        ];
        for &(program, expected) in cases {
            assert_eq!(tacts_of(program), expected, "program {program:02X?}");
        }
    }

    #[test]
    fn jr_nz_not_taken_after_reset() {
        // Power-on F is $FF, so Z is set and JR NZ falls through.
        assert_eq!(tacts_of(&[0x20, 0x10]), 7);
    }

    #[test]
    fn index_prefixed_cycle_costs() {
        let cases: &[(&[u8], u32)] = &[
            (&[0xDD, 0x21, 0x00, 0x00], 14), // LD IX,nn
            (&[0xDD, 0x7E, 0x05], 19),       // LD A,(IX+5)
            (&[0xDD, 0x77, 0x05], 19),       // LD (IX+5),A
            (&[0xDD, 0x36, 0x05, 0xAA], 19), // LD (IX+5),n
            (&[0xDD, 0x34, 0x05], 23),       // INC (IX+5)
            (&[0xDD, 0x86, 0x05], 19),       // ADD A,(IX+5)
            (&[0xFD, 0x09], 15),             // ADD IY,BC
            (&[0xFD, 0xE5], 15),             // PUSH IY
            (&[0xDD, 0xE9], 8),              // JP (IX)
            (&[0xDD, 0x00], 8),              // DD NOP
        ];
        for &(program, expected) in cases {
            assert_eq!(tacts_of(program), expected, "program {program:02X?}");
        }
    }

    #[test]
    fn index_halves_and_displacement() {
        let program = [
            0xDD, 0x21, 0x00, 0x40, // LD IX,$4000
            0xDD, 0x26, 0x12, // LD IXH,$12
            0xDD, 0x2E, 0x34, // LD IXL,$34
            0x26, 0x99, // LD H,$99
            0xDD, 0x74, 0xFF, // LD (IX-1),H
            0x76, // HALT
        ];
        let (cpu, mut bus, _) = run_until_halt(&program);
        assert_eq!(cpu.regs.ix, 0x1234);
        assert_eq!(cpu.regs.h, 0x99);
        assert_eq!(bus.read(0x1233), 0x99);
    }

    #[test]
    fn ex_de_hl_ignores_index_prefix() {
        let program = [
            0x21, 0x11, 0x11, // LD HL,$1111
            0x11, 0x22, 0x22, // LD DE,$2222
            0xDD, 0xEB, // EX DE,HL (DD ignored)
            0x76,
        ];
        let (cpu, _, _) = run_until_halt(&program);
        assert_eq!(cpu.regs.hl(), 0x2222);
        assert_eq!(cpu.regs.de(), 0x1111);
    }

    #[test]
    fn djnz_loop_counts_down() {
        let program = [
            0x06, 0x03, // LD B,3
            0x3C, // INC A
            0x10, 0xFD, // DJNZ -3
            0x76,
        ];
        let (cpu, _, tacts) = run_until_halt(&program);
        assert_eq!(cpu.regs.b, 0);
        // A starts at $FF and wraps.
        assert_eq!(cpu.regs.a, 0x02);
        // LD B,n 7 + 3 * INC 4 + 2 * DJNZ 13 + DJNZ 8 + HALT 4
        assert_eq!(tacts, 7 + 12 + 26 + 8 + 4);
    }

    #[test]
    fn push_pop_af_round_trip() {
        let program = [
            0x01, 0x34, 0x12, // LD BC,$1234
            0xC5, // PUSH BC
            0xF1, // POP AF
            0x76,
        ];
        let (cpu, _, _) = run_until_halt(&program);
        assert_eq!(cpu.regs.af(), 0x1234);
        assert_eq!(cpu.regs.sp, 0xFF00);
    }

    #[test]
    fn scf_ccf_toggle_carry() {
        let program = [
            0xAF, // XOR A
            0x37, // SCF
            0x3F, // CCF
            0x76,
        ];
        let (cpu, _, _) = run_until_halt(&program);
        assert_eq!(cpu.regs.f & CF, 0);
        assert_ne!(cpu.regs.f & crate::flags::HF, 0);
        assert_ne!(cpu.regs.f & ZF, 0);
    }

    #[test]
    fn io_port_sees_accumulator_high_byte() {
        struct PortLog {
            inner: SimpleBus,
            writes: Vec<(u16, u8, u64)>,
        }
        impl Bus for PortLog {
            fn read(&mut self, address: u16) -> u8 {
                self.inner.read(address)
            }
            fn write(&mut self, address: u16, value: u8) {
                self.inner.write(address, value);
            }
            fn io_write(&mut self, port: u16, value: u8, tact: u64) {
                self.writes.push((port, value, tact));
            }
        }
        let mut bus = PortLog {
            inner: SimpleBus::new(),
            writes: Vec::new(),
        };
        // LD A,$07; OUT ($FE),A
        bus.inner.load(0, &[0x3E, 0x07, 0xD3, 0xFE]);
        let mut cpu = Z80::new();
        cpu.execute_instruction(&mut bus);
        cpu.execute_instruction(&mut bus);
        // Port write lands one tact into the I/O cycle: 7 + 4 + 3 + 1.
        assert_eq!(bus.writes, vec![(0x07FE, 0x07, 15)]);
    }
}
