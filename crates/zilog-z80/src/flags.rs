//! Z80 flag register bits and precomputed flag tables.

pub const SF: u8 = 0b1000_0000;
pub const ZF: u8 = 0b0100_0000;
/// Undocumented copy of result bit 5.
pub const YF: u8 = 0b0010_0000;
pub const HF: u8 = 0b0001_0000;
/// Undocumented copy of result bit 3.
pub const XF: u8 = 0b0000_1000;
pub const PF: u8 = 0b0000_0100;
pub const NF: u8 = 0b0000_0010;
pub const CF: u8 = 0b0000_0001;

/// S, Z and the undocumented X/Y bits for every byte value.
const SZ53: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let value = i as u8;
        let mut f = value & (SF | YF | XF);
        if value == 0 {
            f |= ZF;
        }
        table[i] = f;
        i += 1;
    }
    table
};

/// [`SZ53`] plus even parity in P/V.
const SZ53P: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut f = SZ53[i];
        if (i as u8).count_ones() % 2 == 0 {
            f |= PF;
        }
        table[i] = f;
        i += 1;
    }
    table
};

#[must_use]
pub const fn sz53(value: u8) -> u8 {
    SZ53[value as usize]
}

#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    SZ53P[value as usize]
}

/// True when `value` has an even number of set bits.
#[must_use]
pub const fn parity(value: u8) -> bool {
    SZ53P[value as usize] & PF != 0
}
