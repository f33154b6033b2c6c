//! Z80 CPU core with per-machine-cycle tact accounting.
//!
//! Prefix bytes (`CB`, `ED`, `DD`, `FD`) run as cycles of their own. Between
//! a prefix and the opcode it modifies the core reports itself as being in
//! op execution, so callers only act on instruction boundaries.

mod bitops;
mod execute;
mod extended;

use emu_core::{Bus, Cpu};

use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;

/// Which register stands in for HL in the current instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexMode {
    Hl,
    Ix,
    Iy,
}

/// Prefix state carried from one cycle to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    None,
    Bit,
    Extended,
    Index,
}

/// Z80 CPU.
///
/// The CPU does not own the bus. Each cycle borrows it, so the machine can
/// hand the same bus to its devices between instructions.
pub struct Z80 {
    pub(crate) regs: Registers,
    /// Tacts consumed since creation. Survives reset.
    tacts: u64,
    prefix: Prefix,
    index: IndexMode,
    in_op: bool,
    /// Level of the maskable interrupt line.
    int_line: bool,
    nmi_pending: bool,
    /// Set by `EI`; blocks acceptance until one more instruction has run.
    ei_pending: bool,
    /// Set whenever an instruction writes F.
    flags_written: bool,
    /// F as left by the previous instruction if it wrote F, otherwise 0.
    last_flags: u8,
    /// The last instruction was `LD A,I` or `LD A,R`.
    ld_a_ir: bool,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            tacts: 0,
            prefix: Prefix::None,
            index: IndexMode::Hl,
            in_op: false,
            int_line: false,
            nmi_pending: false,
            ei_pending: false,
            flags_written: false,
            last_flags: 0,
            ld_a_ir: false,
        }
    }

    #[must_use]
    pub const fn regs(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register access for loaders and debuggers.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub const fn tacts(&self) -> u64 {
        self.tacts
    }

    /// True between a prefix byte and the end of the instruction it belongs to.
    #[must_use]
    pub const fn is_in_op_execution(&self) -> bool {
        self.in_op
    }

    /// Drive the maskable interrupt line.
    pub fn set_int_line(&mut self, active: bool) {
        self.int_line = active;
    }

    #[must_use]
    pub const fn int_line(&self) -> bool {
        self.int_line
    }

    /// Latch a non-maskable interrupt for the next instruction boundary.
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Run one machine cycle group: either a prefix byte, a complete
    /// instruction, an interrupt acknowledge or one halted NOP.
    ///
    /// Returns the tacts consumed.
    pub fn execute_cpu_cycle<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.tacts;

        if !self.in_op {
            if self.nmi_pending {
                self.nmi_pending = false;
                self.accept_nmi(bus);
                return self.elapsed_since(start);
            }
            if self.int_line && self.regs.iff1 && !self.ei_pending {
                self.accept_interrupt(bus);
                return self.elapsed_since(start);
            }
            self.ei_pending = false;
            self.flags_written = false;
            self.ld_a_ir = false;
            if self.regs.halted {
                self.refresh();
                self.tacts += 4;
                self.last_flags = 0;
                return 4;
            }
        }

        let op = self.fetch_opcode(bus);
        match self.prefix {
            Prefix::None => match op {
                0xCB => self.enter_prefix(Prefix::Bit),
                0xED => self.enter_prefix(Prefix::Extended),
                0xDD => self.enter_index(IndexMode::Ix),
                0xFD => self.enter_index(IndexMode::Iy),
                _ => {
                    self.execute_main(bus, op);
                    self.complete_instruction();
                }
            },
            Prefix::Index => match op {
                0xDD => self.enter_index(IndexMode::Ix),
                0xFD => self.enter_index(IndexMode::Iy),
                0xED => {
                    self.index = IndexMode::Hl;
                    self.enter_prefix(Prefix::Extended);
                }
                0xCB => {
                    self.execute_indexed_bit(bus);
                    self.complete_instruction();
                }
                _ => {
                    self.execute_main(bus, op);
                    self.complete_instruction();
                }
            },
            Prefix::Bit => {
                self.execute_bit(bus, op);
                self.complete_instruction();
            }
            Prefix::Extended => {
                self.execute_extended(bus, op);
                self.complete_instruction();
            }
        }

        self.elapsed_since(start)
    }

    /// Run cycles until the next instruction boundary. Returns the tacts consumed.
    pub fn execute_instruction<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let mut total = self.execute_cpu_cycle(bus);
        while self.in_op {
            total += self.execute_cpu_cycle(bus);
        }
        total
    }

    /// Length of the instruction at PC if it is call-like, 0 otherwise.
    ///
    /// Call-like means control returns to the following instruction once the
    /// instruction completes: `CALL`, `RST`, `HALT` and the repeating block
    /// instructions.
    pub fn call_instruction_length<B: Bus>(&self, bus: &mut B) -> u16 {
        let pc = self.regs.pc;
        let op = bus.read(pc);
        if op == 0xCD || op & 0xC7 == 0xC4 {
            return 3;
        }
        if op & 0xC7 == 0xC7 || op == 0x76 {
            return 1;
        }
        if op == 0xED {
            let next = bus.read(pc.wrapping_add(1));
            if matches!(next, 0xB0..=0xB3 | 0xB8..=0xBB) {
                return 2;
            }
        }
        0
    }

    /// Power-on reset. The tact counter keeps running.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.prefix = Prefix::None;
        self.index = IndexMode::Hl;
        self.in_op = false;
        self.int_line = false;
        self.nmi_pending = false;
        self.ei_pending = false;
        self.flags_written = false;
        self.last_flags = 0;
        self.ld_a_ir = false;
    }

    #[cfg(feature = "test-utils")]
    pub fn set_ei_pending(&mut self, pending: bool) {
        self.ei_pending = pending;
    }

    #[cfg(feature = "test-utils")]
    #[must_use]
    pub fn ei_pending(&self) -> bool {
        self.ei_pending
    }

    /// Seed the F value the previous instruction is taken to have written.
    #[cfg(feature = "test-utils")]
    pub fn set_last_flags(&mut self, value: u8) {
        self.last_flags = value;
    }

    #[cfg(feature = "test-utils")]
    pub fn set_ld_a_ir(&mut self, value: bool) {
        self.ld_a_ir = value;
    }

    #[cfg(feature = "test-utils")]
    #[must_use]
    pub fn ld_a_ir(&self) -> bool {
        self.ld_a_ir
    }

    // =========================================================================
    // Cycle bookkeeping
    // =========================================================================

    fn elapsed_since(&self, start: u64) -> u32 {
        (self.tacts - start) as u32
    }

    fn enter_prefix(&mut self, prefix: Prefix) {
        self.prefix = prefix;
        self.in_op = true;
    }

    fn enter_index(&mut self, index: IndexMode) {
        self.index = index;
        self.enter_prefix(Prefix::Index);
    }

    fn complete_instruction(&mut self) {
        self.prefix = Prefix::None;
        self.index = IndexMode::Hl;
        self.in_op = false;
        self.last_flags = if self.flags_written { self.regs.f } else { 0 };
    }

    /// Bump the 7-bit memory refresh counter; bit 7 is preserved.
    fn refresh(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    /// Common to every acknowledge. On the NMOS Z80 an interrupt taken
    /// straight after `LD A,I` or `LD A,R` leaves P/V reset.
    fn begin_acknowledge(&mut self) {
        self.regs.halted = false;
        if self.ld_a_ir {
            self.regs.f &= !PF;
            self.ld_a_ir = false;
        }
    }

    /// Maskable interrupt acknowledge: 13 tacts in IM 0/1, 19 in IM 2.
    fn accept_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.begin_acknowledge();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.refresh();
        // Acknowledge M1 with two wait states, then one internal tact.
        self.internal(7);
        let pc = self.regs.pc;
        self.push(bus, pc);
        if self.regs.im == 2 {
            // The 48K data bus floats at 0xFF during acknowledge.
            let vector = u16::from(self.regs.i) << 8 | 0xFF;
            let lo = self.read_byte(bus, vector);
            let hi = self.read_byte(bus, vector.wrapping_add(1));
            self.regs.pc = u16::from_le_bytes([lo, hi]);
        } else {
            self.regs.pc = 0x0038;
        }
        self.regs.wz = self.regs.pc;
        self.last_flags = 0;
    }

    /// Non-maskable interrupt: 11 tacts, IFF2 keeps the old IFF1.
    fn accept_nmi<B: Bus>(&mut self, bus: &mut B) {
        self.begin_acknowledge();
        self.regs.iff1 = false;
        self.refresh();
        self.internal(5);
        let pc = self.regs.pc;
        self.push(bus, pc);
        self.regs.pc = 0x0066;
        self.regs.wz = self.regs.pc;
        self.last_flags = 0;
    }

    // =========================================================================
    // Bus access with tact accounting
    // =========================================================================

    /// Opcode fetch (M1): 4 tacts and a refresh.
    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let op = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.refresh();
        self.tacts += 4;
        op
    }

    fn read_byte<B: Bus>(&mut self, bus: &mut B, address: u16) -> u8 {
        self.tacts += 3;
        bus.read(address)
    }

    fn write_byte<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8) {
        self.tacts += 3;
        bus.write(address, value);
    }

    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read_byte(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read_word<B: Bus>(&mut self, bus: &mut B, address: u16) -> u16 {
        let lo = self.read_byte(bus, address);
        let hi = self.read_byte(bus, address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word<B: Bus>(&mut self, bus: &mut B, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(bus, address, lo);
        self.write_byte(bus, address.wrapping_add(1), hi);
    }

    fn internal(&mut self, tacts: u32) {
        self.tacts += u64::from(tacts);
    }

    /// Port read: 4 tacts, sampled one tact into the cycle.
    fn port_in<B: Bus>(&mut self, bus: &mut B, port: u16) -> u8 {
        self.tacts += 1;
        let value = bus.io_read(port, self.tacts);
        self.tacts += 3;
        value
    }

    /// Port write: 4 tacts, driven one tact into the cycle.
    fn port_out<B: Bus>(&mut self, bus: &mut B, port: u16, value: u8) {
        self.tacts += 1;
        bus.io_write(port, value, self.tacts);
        self.tacts += 3;
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(bus, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(bus, self.regs.sp, lo);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_byte(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read_byte(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    fn set_f(&mut self, value: u8) {
        self.regs.f = value;
        self.flags_written = true;
    }

    /// HL, IX or IY depending on the active prefix.
    fn index_reg(&self) -> u16 {
        match self.index {
            IndexMode::Hl => self.regs.hl(),
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    fn set_index_reg(&mut self, value: u16) {
        match self.index {
            IndexMode::Hl => self.regs.set_hl(value),
            IndexMode::Ix => self.regs.ix = value,
            IndexMode::Iy => self.regs.iy = value,
        }
    }

    /// 8-bit register by its 3-bit code, without index substitution.
    /// Code 6, `(HL)`, is never passed here.
    fn reg8(&self, code: u8) -> u8 {
        match code & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            _ => self.regs.a,
        }
    }

    fn set_reg8(&mut self, code: u8, value: u8) {
        match code & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            _ => self.regs.a = value,
        }
    }

    /// 8-bit register where H and L become IXH/IXL or IYH/IYL under a prefix.
    fn reg8_indexed(&self, code: u8) -> u8 {
        match (code & 7, self.index) {
            (4, IndexMode::Ix) => (self.regs.ix >> 8) as u8,
            (5, IndexMode::Ix) => self.regs.ix as u8,
            (4, IndexMode::Iy) => (self.regs.iy >> 8) as u8,
            (5, IndexMode::Iy) => self.regs.iy as u8,
            (code, _) => self.reg8(code),
        }
    }

    fn set_reg8_indexed(&mut self, code: u8, value: u8) {
        match (code & 7, self.index) {
            (4, IndexMode::Ix) => self.regs.ix = (self.regs.ix & 0x00FF) | u16::from(value) << 8,
            (5, IndexMode::Ix) => self.regs.ix = (self.regs.ix & 0xFF00) | u16::from(value),
            (4, IndexMode::Iy) => self.regs.iy = (self.regs.iy & 0x00FF) | u16::from(value) << 8,
            (5, IndexMode::Iy) => self.regs.iy = (self.regs.iy & 0xFF00) | u16::from(value),
            (code, _) => self.set_reg8(code, value),
        }
    }

    /// Register pair by its 2-bit code: BC, DE, HL (or IX/IY), SP.
    fn reg16(&self, code: u8) -> u16 {
        match code & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_reg(),
            _ => self.regs.sp,
        }
    }

    fn set_reg16(&mut self, code: u8, value: u16) {
        match code & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_index_reg(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition code by its 3-bit code: NZ, Z, NC, C, PO, PE, P, M.
    fn condition(&self, code: u8) -> bool {
        let f = self.regs.f;
        match code & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    /// Address of the `(HL)` operand: HL itself, or `(IX+d)`/`(IY+d)` with the
    /// displacement fetched and the 5-tact address computation charged.
    fn operand_address<B: Bus>(&mut self, bus: &mut B) -> u16 {
        if self.index == IndexMode::Hl {
            return self.regs.hl();
        }
        let displacement = self.fetch_byte(bus) as i8;
        self.internal(5);
        let address = self.index_reg().wrapping_add_signed(i16::from(displacement));
        self.regs.wz = address;
        address
    }

    /// Relative jump target from the current PC.
    fn relative_jump(&mut self, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(offset as i8));
        self.regs.wz = self.regs.pc;
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn execute_instruction<B: Bus>(&mut self, bus: &mut B) -> u32 {
        Z80::execute_instruction(self, bus)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn tacts(&self) -> u64 {
        self.tacts
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn reset(&mut self) {
        Z80::reset(self);
    }
}
