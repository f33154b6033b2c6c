//! CPU core trait.

use crate::Bus;

/// An instruction-stepped CPU core.
///
/// The bus is passed in, not owned, so the machine can share it with its
/// peripheral devices between instructions.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Run one complete instruction, including any prefix bytes and a
    /// pending interrupt acknowledge. Returns the tacts consumed.
    fn execute_instruction<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Tacts consumed since the CPU was created.
    fn tacts(&self) -> u64;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}
