//! Instruction-stepped Zilog Z80 CPU emulator.
//!
//! Tacts are charged per machine cycle, so port accesses observe the tact at
//! which they happen inside an instruction.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
