//! Tact cost of every opcode on every instruction page.

use emu_core::SimpleBus;
use zilog_z80::{CF, PF, SF, ZF, Z80};

/// Unprefixed costs. Conditional opcodes hold the not-taken cost and
/// prefix bytes hold 0.
#[rustfmt::skip]
const MAIN: [u32; 256] = [
//  0   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
    4, 10,  7,  6,  4,  4,  7,  4,  4, 11,  7,  6,  4,  4,  7,  4, // 0
    8, 10,  7,  6,  4,  4,  7,  4, 12, 11,  7,  6,  4,  4,  7,  4, // 1
    7, 10, 16,  6,  4,  4,  7,  4,  7, 11, 16,  6,  4,  4,  7,  4, // 2
    7, 10, 13,  6, 11, 11, 10,  4,  7, 11, 13,  6,  4,  4,  7,  4, // 3
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 4
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 5
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 6
    7,  7,  7,  7,  7,  7,  4,  7,  4,  4,  4,  4,  4,  4,  7,  4, // 7
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 8
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 9
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // A
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // B
    5, 10, 10, 10, 10, 11,  7, 11,  5, 10, 10,  0, 10, 17,  7, 11, // C
    5, 10, 10, 11, 10, 11,  7, 11,  5,  4, 10, 11, 10,  0,  7, 11, // D
    5, 10, 10, 19, 10, 11,  7, 11,  5,  4, 10,  4, 10,  0,  7, 11, // E
    5, 10, 10,  4, 10, 11,  7, 11,  5,  6, 10,  4, 10,  0,  7, 11, // F
];

const PREFIXES: [u8; 4] = [0xCB, 0xDD, 0xED, 0xFD];

/// Flag tested by each condition pair: NZ/Z, NC/C, PO/PE, P/M.
const CONDITION_FLAGS: [u8; 4] = [ZF, CF, PF, SF];

/// Registers that select the outcome of a data-dependent instruction.
#[derive(Clone, Copy)]
struct Setup {
    a: u8,
    f: u8,
    bc: u16,
}

const DEFAULT: Setup = Setup {
    a: 0x00,
    f: 0x00,
    bc: 0x0101,
};

/// Run one instruction from $0000 and return the tacts it took.
fn cost(bytes: &[u8], setup: Setup) -> u32 {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, bytes);
    let mut cpu = Z80::new();
    let regs = cpu.regs_mut();
    regs.a = setup.a;
    regs.f = setup.f;
    regs.set_bc(setup.bc);
    regs.set_de(0xA000);
    regs.set_hl(0x9000);
    regs.ix = 0x9000;
    regs.iy = 0x9000;
    regs.sp = 0x8000;
    cpu.execute_instruction(&mut bus)
}

/// Cost of JR cc, RET cc, JP cc and CALL cc when the condition holds.
fn taken_cost(op: u8) -> Option<u32> {
    match op {
        0x20 | 0x28 | 0x30 | 0x38 => Some(12),
        _ if op & 0xC7 == 0xC0 => Some(11),
        _ if op & 0xC7 == 0xC2 => Some(10),
        _ if op & 0xC7 == 0xC4 => Some(17),
        _ => None,
    }
}

fn condition_holds(op: u8, f: u8) -> bool {
    let mut code = (op >> 3) & 7;
    if op & 0xC0 == 0 {
        // JR cc only encodes NZ, Z, NC and C.
        code -= 4;
    }
    let set = f & CONDITION_FLAGS[usize::from(code >> 1)] != 0;
    if code & 1 == 0 { !set } else { set }
}

fn unprefixed_cost(op: u8, f: u8) -> u32 {
    match taken_cost(op) {
        Some(taken) if condition_holds(op, f) => taken,
        _ => MAIN[usize::from(op)],
    }
}

fn indexed_cost(op: u8, f: u8) -> u32 {
    match op {
        // INC/DEC (IX+d)
        0x34 | 0x35 => 23,
        // LD (IX+d),n
        0x36 => 19,
        // LD r,(IX+d), LD (IX+d),r and ALU (IX+d)
        0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E | 0x70..=0x75 | 0x77 | 0x86 | 0x8E
        | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => 19,
        // Everything else costs the prefix fetch on top.
        _ => unprefixed_cost(op, f) + 4,
    }
}

fn bit_cost(op: u8) -> u32 {
    match (op & 7, op >> 6) {
        (6, 1) => 12,
        (6, _) => 15,
        _ => 8,
    }
}

fn extended_cost(op: u8) -> u32 {
    match op {
        0x47 | 0x4F | 0x57 | 0x5F => 9,
        0x67 | 0x6F => 18,
        0x40..=0x7F => match op & 7 {
            0 | 1 => 12,
            2 => 15,
            3 => 20,
            5 => 14,
            _ => 8,
        },
        0xA0..=0xA3 | 0xA8..=0xAB | 0xB0..=0xB3 | 0xB8..=0xBB => 16,
        _ => 8,
    }
}

/// Registers for the last pass of a block instruction: BC counts the
/// transfers and compares, B the port transfers.
fn final_iteration(op: u8) -> Setup {
    let bc = if op & 0x02 == 0 { 0x0001 } else { 0x0101 };
    Setup {
        a: 0xFF,
        bc,
        ..DEFAULT
    }
}

#[test]
fn unprefixed_page() {
    for op in (0..=0xFFu8).filter(|op| !PREFIXES.contains(op)) {
        for f in [0x00, 0xFF] {
            let setup = Setup { f, ..DEFAULT };
            assert_eq!(
                cost(&[op], setup),
                unprefixed_cost(op, f),
                "opcode {op:02X} with F={f:02X}"
            );
        }
    }
}

#[test]
fn conditional_branches_taken_and_not_taken() {
    let conditional: Vec<u8> = (0..=0xFFu8).filter(|&op| taken_cost(op).is_some()).collect();
    assert_eq!(conditional.len(), 28);
    for op in conditional {
        let outcomes: Vec<bool> = [0x00, 0xFF]
            .into_iter()
            .map(|f| condition_holds(op, f))
            .collect();
        // Each condition holds under exactly one of the two flag values.
        assert_eq!(outcomes.iter().filter(|&&held| held).count(), 1, "opcode {op:02X}");
    }
    assert_eq!(cost(&[0x20, 0x00], Setup { f: 0x00, ..DEFAULT }), 12);
    assert_eq!(cost(&[0x20, 0x00], Setup { f: ZF, ..DEFAULT }), 7);
    assert_eq!(cost(&[0xD8], Setup { f: CF, ..DEFAULT }), 11);
    assert_eq!(cost(&[0xD8], Setup { f: 0x00, ..DEFAULT }), 5);
    assert_eq!(cost(&[0xFC, 0x00, 0x00], Setup { f: SF, ..DEFAULT }), 17);
    assert_eq!(cost(&[0xFC, 0x00, 0x00], Setup { f: 0x00, ..DEFAULT }), 10);
}

#[test]
fn djnz_taken_and_not_taken() {
    assert_eq!(cost(&[0x10, 0x00], Setup { bc: 0x0200, ..DEFAULT }), 13);
    assert_eq!(cost(&[0x10, 0x00], Setup { bc: 0x0100, ..DEFAULT }), 8);
    // B wraps from 0 to $FF and loops.
    assert_eq!(cost(&[0x10, 0x00], Setup { bc: 0x0000, ..DEFAULT }), 13);
}

#[test]
fn bit_page() {
    for op in 0..=0xFFu8 {
        assert_eq!(cost(&[0xCB, op], DEFAULT), bit_cost(op), "opcode CB {op:02X}");
    }
}

#[test]
fn extended_page() {
    for op in 0..=0xFFu8 {
        assert_eq!(
            cost(&[0xED, op], final_iteration(op)),
            extended_cost(op),
            "opcode ED {op:02X}"
        );
    }
}

#[test]
fn block_instructions_repeat_and_finish() {
    let repeating = [0xB0u8, 0xB1, 0xB2, 0xB3, 0xB8, 0xB9, 0xBA, 0xBB];
    for op in repeating {
        let again = Setup {
            a: 0xFF,
            bc: 0x0202,
            ..DEFAULT
        };
        assert_eq!(cost(&[0xED, op], again), 21, "ED {op:02X} repeating");
        assert_eq!(cost(&[0xED, op], final_iteration(op)), 16, "ED {op:02X} final");
    }
    // CPIR stops on a match even with BC left over.
    let found = Setup {
        a: 0x00,
        bc: 0x0202,
        ..DEFAULT
    };
    assert_eq!(cost(&[0xED, 0xB1], found), 16);
    assert_eq!(cost(&[0xED, 0xB9], found), 16);
}

#[test]
fn index_pages() {
    for prefix in [0xDD, 0xFD] {
        for op in (0..=0xFFu8).filter(|op| !PREFIXES.contains(op)) {
            for f in [0x00, 0xFF] {
                let setup = Setup { f, ..DEFAULT };
                assert_eq!(
                    cost(&[prefix, op, 0x05, 0x00], setup),
                    indexed_cost(op, f),
                    "opcode {prefix:02X} {op:02X} with F={f:02X}"
                );
            }
        }
    }
}

#[test]
fn indexed_bit_pages() {
    for prefix in [0xDD, 0xFD] {
        for op in 0..=0xFFu8 {
            let expected = if op >> 6 == 1 { 20 } else { 23 };
            assert_eq!(
                cost(&[prefix, 0xCB, 0x05, op], DEFAULT),
                expected,
                "opcode {prefix:02X} CB 05 {op:02X}"
            );
        }
    }
}
