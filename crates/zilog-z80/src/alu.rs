//! Arithmetic and logic primitives.
//!
//! Each function returns the result together with the complete flag byte it
//! produces. Callers merge in any flags the instruction leaves untouched.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let value = wide as u8;
    let mut flags = sz53(value);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    if (a ^ b) & 0x80 == 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult { value, flags }
}

#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);
    let mut flags = sz53(value) | NF;
    if a & 0x0F < (b & 0x0F) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// Compare: a subtraction whose X/Y flags come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let diff = sub8(a, b, false);
    AluResult {
        value: a,
        flags: (diff.flags & !(XF | YF)) | (b & (XF | YF)),
    }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult {
        value,
        flags: sz53p(value) | HF,
    }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

/// Increment. The caller preserves the old carry.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let mut flags = sz53(value);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// Decrement. The caller preserves the old carry.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let mut flags = sz53(value) | NF;
    if a & 0x0F == 0 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// The eight CB-page shifts, selected by bits 3-5 of the opcode:
/// RLC, RRC, RL, RR, SLA, SRA, SLL, SRL.
#[must_use]
pub fn shift(kind: u8, a: u8, carry: bool) -> AluResult {
    let (value, out) = match kind & 7 {
        0 => (a.rotate_left(1), a & 0x80 != 0),
        1 => (a.rotate_right(1), a & 0x01 != 0),
        2 => ((a << 1) | u8::from(carry), a & 0x80 != 0),
        3 => ((a >> 1) | (u8::from(carry) << 7), a & 0x01 != 0),
        4 => (a << 1, a & 0x80 != 0),
        5 => ((a >> 1) | (a & 0x80), a & 0x01 != 0),
        6 => ((a << 1) | 1, a & 0x80 != 0),
        _ => (a >> 1, a & 0x01 != 0),
    };
    AluResult {
        value,
        flags: sz53p(value) | if out { CF } else { 0 },
    }
}

/// `ADD HL,rr`: only H, C and X/Y change; the caller keeps S, Z and P/V.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (XF | YF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let wide = u32::from(a) + u32::from(b) + u32::from(c);
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (SF | XF | YF);
    if value == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);
    let mut flags = NF | (((value >> 8) as u8) & (SF | XF | YF));
    if value == 0 {
        flags |= ZF;
    }
    if a & 0x0FFF < (b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        flags |= CF;
    }
    (value, flags)
}

/// Decimal adjust after an addition or subtraction, given the current F.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let subtract = f & NF != 0;
    let mut correction = 0u8;
    let mut carry = f & CF != 0;
    if f & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let value = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        f & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut flags = sz53p(value) | (f & NF);
    if half {
        flags |= HF;
    }
    if carry {
        flags |= CF;
    }
    AluResult { value, flags }
}
