//! ULA frame interrupt.
//!
//! The ULA pulls INT low once per frame at a fixed frame tact. The line
//! stays asserted long enough for the longest instruction (23 tacts) to
//! finish, so the CPU always gets a chance to see it, and is then revoked
//! until the next frame.

use zilog_z80::Z80;

use crate::devices::{FrameBoundDevice, FrameInfo, SpectrumDevice};

/// Tacts of the longest Z80 instruction.
pub const LONGEST_OP_TACTS: u32 = 23;

pub struct InterruptDevice {
    interrupt_tact: u32,
    raised: bool,
    revoked: bool,
}

impl InterruptDevice {
    #[must_use]
    pub fn new(interrupt_tact: u32) -> Self {
        Self {
            interrupt_tact,
            raised: false,
            revoked: false,
        }
    }

    #[must_use]
    pub fn interrupt_tact(&self) -> u32 {
        self.interrupt_tact
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Drive the CPU's INT line for the given frame tact.
    pub fn check_for_interrupt(&mut self, cpu: &mut Z80, frame_tact: u32) {
        if self.revoked || frame_tact < self.interrupt_tact {
            return;
        }
        if frame_tact > self.interrupt_tact + LONGEST_OP_TACTS {
            self.revoked = true;
            cpu.set_int_line(false);
            return;
        }
        if !self.raised {
            self.raised = true;
            cpu.set_int_line(true);
        }
    }
}

impl SpectrumDevice for InterruptDevice {
    fn reset(&mut self) {
        self.raised = false;
        self.revoked = false;
    }

    fn as_frame_bound(&mut self) -> Option<&mut dyn FrameBoundDevice> {
        Some(self)
    }
}

impl FrameBoundDevice for InterruptDevice {
    fn on_new_frame(&mut self, _frame: &FrameInfo) {
        self.raised = false;
        self.revoked = false;
    }

    fn on_frame_completed(&mut self, _frame: &FrameInfo) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_within_window_then_revoked() {
        let mut device = InterruptDevice::new(32);
        let mut cpu = Z80::new();

        device.check_for_interrupt(&mut cpu, 31);
        assert!(!cpu.int_line());

        device.check_for_interrupt(&mut cpu, 40);
        assert!(cpu.int_line());
        assert!(device.is_raised());

        device.check_for_interrupt(&mut cpu, 32 + LONGEST_OP_TACTS + 1);
        assert!(!cpu.int_line());
        assert!(device.is_revoked());

        // Stays quiet for the rest of the frame.
        device.check_for_interrupt(&mut cpu, 40);
        assert!(!cpu.int_line());
    }

    #[test]
    fn new_frame_rearms() {
        let mut device = InterruptDevice::new(32);
        let mut cpu = Z80::new();
        device.check_for_interrupt(&mut cpu, 100);
        assert!(device.is_revoked());

        device.on_new_frame(&FrameInfo {
            frame_count: 1,
            frame_start_tact: 69_888,
            frame_tacts: 69_888,
        });
        device.check_for_interrupt(&mut cpu, 32);
        assert!(cpu.int_line());
    }
}
