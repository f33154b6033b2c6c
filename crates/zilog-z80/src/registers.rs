//! Z80 register set.

use crate::flags::{CF, HF, NF, PF, SF, ZF};

/// Complete Z80 programmer-visible state plus WZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    /// MEMPTR. Leaks into the X/Y flags of `BIT n,(HL)`.
    pub wz: u16,

    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode, 0 to 2.
    pub im: u8,
    pub halted: bool,
}

impl Default for Registers {
    /// Power-on values.
    fn default() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            a_alt: 0,
            f_alt: 0,
            b_alt: 0,
            c_alt: 0,
            d_alt: 0,
            e_alt: 0,
            h_alt: 0,
            l_alt: 0,
            ix: 0,
            iy: 0,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            wz: 0,
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
        }
    }
}

impl Registers {
    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_af(&mut self, value: u16) {
        [self.a, self.f] = value.to_be_bytes();
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    /// `EX AF,AF'`
    pub fn exchange_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_alt);
        std::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// `EXX`
    pub fn exchange_main(&mut self) {
        std::mem::swap(&mut self.b, &mut self.b_alt);
        std::mem::swap(&mut self.c, &mut self.c_alt);
        std::mem::swap(&mut self.d, &mut self.d_alt);
        std::mem::swap(&mut self.e, &mut self.e_alt);
        std::mem::swap(&mut self.h, &mut self.h_alt);
        std::mem::swap(&mut self.l, &mut self.l_alt);
    }

    #[must_use]
    pub const fn sign(&self) -> bool {
        self.f & SF != 0
    }

    #[must_use]
    pub const fn zero(&self) -> bool {
        self.f & ZF != 0
    }

    #[must_use]
    pub const fn half_carry(&self) -> bool {
        self.f & HF != 0
    }

    #[must_use]
    pub const fn parity_overflow(&self) -> bool {
        self.f & PF != 0
    }

    #[must_use]
    pub const fn subtract(&self) -> bool {
        self.f & NF != 0
    }

    #[must_use]
    pub const fn carry(&self) -> bool {
        self.f & CF != 0
    }
}
