//! Stepping helpers built on [`Spectrum48::run_cycle`].
//!
//! Stops only happen with an active debug info provider attached.

use emu_core::{CancellationToken, ClockSource};

use crate::error::MachineError;
use crate::spectrum::{DebugStepMode, ExecuteCycleOptions, Spectrum48};

/// Execute exactly one instruction.
pub fn step_into<C: ClockSource>(
    machine: &mut Spectrum48<C>,
    token: &CancellationToken,
) -> Result<bool, MachineError> {
    machine.run_cycle(token, ExecuteCycleOptions::debugger(DebugStepMode::StepInto))
}

/// Execute one instruction, running call-like instructions to their return.
pub fn step_over<C: ClockSource>(
    machine: &mut Spectrum48<C>,
    token: &CancellationToken,
) -> Result<bool, MachineError> {
    machine.run_cycle(token, ExecuteCycleOptions::debugger(DebugStepMode::StepOver))
}

/// Run until the next user breakpoint.
pub fn run_to_breakpoint<C: ClockSource>(
    machine: &mut Spectrum48<C>,
    token: &CancellationToken,
) -> Result<bool, MachineError> {
    machine.run_cycle(
        token,
        ExecuteCycleOptions::debugger(DebugStepMode::StopAtBreakpoint),
    )
}

/// Step over instructions until the current routine returns to its caller.
///
/// The routine has returned once SP sits above its value at the start.
/// Returns `Ok(false)` if cancelled first.
pub fn step_out<C: ClockSource>(
    machine: &mut Spectrum48<C>,
    token: &CancellationToken,
) -> Result<bool, MachineError> {
    let start_sp = machine.cpu().regs().sp;
    loop {
        if !step_over(machine, token)? {
            return Ok(false);
        }
        let sp = machine.cpu().regs().sp;
        if unwound(start_sp, sp) {
            log::debug!(
                "Stepped out to PC=${:04X} (SP ${start_sp:04X} -> ${sp:04X})",
                machine.cpu().regs().pc
            );
            return Ok(true);
        }
    }
}

/// SP moved up from `start`, allowing for wrap at the top of memory.
fn unwound(start: u16, sp: u16) -> bool {
    (sp.wrapping_sub(start) as i16) > 0
}
