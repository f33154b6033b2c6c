//! Top-level Spectrum 48K machine.
//!
//! # Frame loop
//!
//! [`Spectrum48::run_cycle`] executes instructions until a stop condition is
//! met or the token is cancelled. After every CPU cycle the screen catches up
//! to the current frame tact, then the tape device looks at the program
//! counter. One frame is 69 888 tacts on the 48K; when it completes, the
//! frame-bound devices are notified and the loop waits on the clock source
//! until the matching wall-clock time before starting the next frame.
//!
//! Tacts an instruction runs past the frame end are carried into the next
//! frame, so the frame grid never drifts.

#![allow(clippy::cast_possible_truncation)]

use emu_core::{CancellationToken, ClockSource};
use zilog_z80::Z80;

use crate::beeper::BeeperDevice;
use crate::bus::SpectrumBus;
use crate::config::SpectrumConfig;
use crate::debug::{DebugInfoProvider, FrameTimings, NoopDebugInfoProvider};
use crate::devices::{FrameBoundDevice, FrameInfo, MachineInfo, SpectrumDevice};
use crate::error::MachineError;
use crate::interrupt::InterruptDevice;
use crate::keyboard::KeyboardDevice;
use crate::memory::Memory48K;
use crate::screen::ScreenDevice;
use crate::tape::TapeDevice;

/// What ends a call to [`Spectrum48::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmulationMode {
    /// Run until cancelled.
    #[default]
    Continuous,
    /// Stop once the CPU executes HALT.
    UntilHalt,
    /// Stop at the end of the current frame.
    UntilFrameEnds,
    /// Stop where the debug step mode says so.
    Debugger,
}

/// Granularity of a debugger run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugStepMode {
    #[default]
    StopAtBreakpoint,
    /// Execute exactly one instruction.
    StepInto,
    /// Like `StepInto`, but run call-like instructions to their return.
    StepOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteCycleOptions {
    pub emulation_mode: EmulationMode,
    pub debug_step_mode: DebugStepMode,
}

impl ExecuteCycleOptions {
    #[must_use]
    pub const fn new(emulation_mode: EmulationMode) -> Self {
        Self {
            emulation_mode,
            debug_step_mode: DebugStepMode::StopAtBreakpoint,
        }
    }

    #[must_use]
    pub const fn debugger(debug_step_mode: DebugStepMode) -> Self {
        Self {
            emulation_mode: EmulationMode::Debugger,
            debug_step_mode,
        }
    }
}

/// ZX Spectrum 48K.
pub struct Spectrum48<C: ClockSource> {
    cpu: Z80,
    bus: SpectrumBus,
    screen: ScreenDevice,
    /// Re-rendered on demand while a debugging session is paused.
    shadow_screen: ScreenDevice,
    interrupt: InterruptDevice,
    clock: C,
    debug_info: Box<dyn DebugInfoProvider>,
    machine: MachineInfo,
    /// CPU tact at which the current frame started.
    last_frame_start: u64,
    /// Last frame tact drawn by the screen; `None` before the first.
    last_rendered_tact: Option<u32>,
    frame_count: u64,
    /// A frame completed and the next one has not been opened yet.
    frame_pending: bool,
    /// Return address watched by step-over.
    imminent_breakpoint: Option<u16>,
}

impl<C: ClockSource> Spectrum48<C> {
    /// Create a machine with the given configuration, paced by `clock`.
    pub fn new(config: &SpectrumConfig, clock: C) -> Result<Self, MachineError> {
        let machine = MachineInfo {
            cpu_frequency: config.cpu_frequency,
            frame_tacts: config.screen.frame_tacts(),
            audio_sample_rate: config.audio_sample_rate,
        };

        let mut memory = Memory48K::new();
        memory.fill_rom(&config.rom)?;
        let beeper = BeeperDevice::new(&machine);
        let tape = TapeDevice::new(&config.tape, config.cpu_frequency);

        let mut spectrum = Self {
            cpu: Z80::new(),
            bus: SpectrumBus::new(memory, beeper, tape),
            screen: ScreenDevice::new(&config.screen),
            shadow_screen: ScreenDevice::new(&config.screen),
            interrupt: InterruptDevice::new(config.interrupt_tact),
            clock,
            debug_info: Box::new(NoopDebugInfoProvider::default()),
            machine,
            last_frame_start: 0,
            last_rendered_tact: None,
            frame_count: 0,
            frame_pending: false,
            imminent_breakpoint: None,
        };
        for device in spectrum.devices() {
            device.attach(&machine);
        }
        spectrum.shadow_screen.attach(&machine);
        Ok(spectrum)
    }

    /// Every device owned by the machine, in frame notification order.
    fn devices(&mut self) -> [&mut dyn SpectrumDevice; 6] {
        [
            &mut self.bus.beeper,
            &mut self.screen,
            &mut self.interrupt,
            &mut self.bus.border,
            &mut self.bus.keyboard,
            &mut self.bus.tape,
        ]
    }

    /// Power-on reset. The tact counter keeps running and RAM is kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.last_rendered_tact = None;
        self.frame_pending = false;
        self.imminent_breakpoint = None;
        for device in self.devices() {
            device.reset();
        }
        self.shadow_screen.reset();
        log::info!("Machine reset at tact {}", self.cpu.tacts());
    }

    /// Replace the debug info provider. The default one never stops.
    pub fn set_debug_info_provider(&mut self, provider: Box<dyn DebugInfoProvider>) {
        self.debug_info = provider;
    }

    #[must_use]
    pub fn debug_info(&self) -> &dyn DebugInfoProvider {
        self.debug_info.as_ref()
    }

    pub fn debug_info_mut(&mut self) -> &mut dyn DebugInfoProvider {
        self.debug_info.as_mut()
    }

    /// Run until the mode's stop condition is met or `token` is cancelled.
    ///
    /// Returns `Ok(true)` when a stop condition ended the run and
    /// `Ok(false)` when cancellation did.
    ///
    /// # Errors
    ///
    /// Tape content that cannot be read or parsed when loading starts.
    pub fn run_cycle(
        &mut self,
        token: &CancellationToken,
        options: ExecuteCycleOptions,
    ) -> Result<bool, MachineError> {
        if options != ExecuteCycleOptions::debugger(DebugStepMode::StepOver) {
            self.imminent_breakpoint = None;
        }
        let cycle_start = self.clock.counter();
        let mut cycle_frames: u64 = 0;
        if options.emulation_mode == EmulationMode::Continuous {
            self.last_rendered_tact = None;
        }
        if self.frame_pending {
            self.start_new_frame();
        } else {
            self.last_frame_start = self.cpu.tacts();
        }
        let mut executed: i64 = -1;
        let frame_tacts = self.machine.frame_tacts;

        while !token.is_cancelled() {
            let frame_start_counter = self.clock.counter();
            let mut cpu_counts = 0;
            let mut render_counts = 0;

            loop {
                if !self.cpu.is_in_op_execution() {
                    if token.is_cancelled() {
                        self.imminent_breakpoint = None;
                        return Ok(false);
                    }
                    executed += 1;
                    if options.emulation_mode == EmulationMode::Debugger
                        && self.is_debug_stop(options.debug_step_mode, executed)
                    {
                        log::debug!(
                            "Debug stop ({:?}) at PC=${:04X}",
                            options.debug_step_mode,
                            self.cpu.regs().pc
                        );
                        let frame = self.frame_info();
                        self.screen.on_frame_completed(&frame);
                        return Ok(true);
                    }
                }

                let frame_tact = self.current_frame_tact();
                self.interrupt.check_for_interrupt(&mut self.cpu, frame_tact);

                let cpu_start = self.clock.counter();
                self.cpu.execute_cpu_cycle(&mut self.bus);
                cpu_counts += self.clock.counter() - cpu_start;

                let frame_tact = self.current_frame_tact();
                let render_start = self.clock.counter();
                self.render_to(frame_tact);
                render_counts += self.clock.counter() - render_start;

                if options.emulation_mode == EmulationMode::UntilHalt && self.cpu.regs().halted {
                    return Ok(true);
                }

                self.bus
                    .tape
                    .set_tape_mode(self.cpu.regs().pc, self.cpu.tacts())?;

                if !self.cpu.is_in_op_execution() && self.current_frame_tact() >= frame_tacts {
                    break;
                }
            }

            cycle_frames += 1;
            self.frame_count += 1;

            let timings = FrameTimings::from_counts(
                cpu_counts,
                render_counts,
                self.clock.counter() - frame_start_counter,
                self.clock.frequency(),
            );
            log::trace!(
                "Frame {}: {:.3} ms (cpu {:.3}, render {:.3}, other {:.3})",
                self.frame_count,
                timings.frame_ms,
                timings.cpu_ms,
                timings.render_ms,
                timings.utility_ms
            );
            self.debug_info.on_frame_timings(&timings);

            let completed = self.frame_info();
            for device in self.devices() {
                if let Some(frame_bound) = device.as_frame_bound() {
                    frame_bound.on_frame_completed(&completed);
                }
            }
            self.frame_pending = true;

            if options.emulation_mode == EmulationMode::UntilFrameEnds {
                return Ok(true);
            }

            let next_frame = cycle_start + self.physical_frame_counts(cycle_frames);
            self.clock.wait_until(next_frame, token);
            self.start_new_frame();
        }
        self.imminent_breakpoint = None;
        Ok(false)
    }

    /// Open the frame following a completed one, carrying overrun tacts.
    fn start_new_frame(&mut self) {
        let remaining = self.current_frame_tact() % self.machine.frame_tacts;
        self.last_frame_start = self.cpu.tacts() - u64::from(remaining);
        if remaining > 0 {
            log::debug!("Frame overrun: {remaining} tacts carried into the next frame");
        }

        let new_frame = self.frame_info();
        for device in self.devices() {
            if let Some(frame_bound) = device.as_frame_bound() {
                frame_bound.on_new_frame(&new_frame);
            }
        }
        self.frame_pending = false;
        self.last_rendered_tact = None;
        self.render_to(remaining);
    }

    /// Whether a debugger run stops before the next instruction.
    fn is_debug_stop(&mut self, step_mode: DebugStepMode, executed: i64) -> bool {
        if !self.debug_info.is_active() {
            return false;
        }
        let pc = self.cpu.regs().pc;
        match step_mode {
            DebugStepMode::StepInto => executed > 0,
            DebugStepMode::StopAtBreakpoint => {
                executed > 0 && self.debug_info.breakpoints().contains(&pc)
            }
            DebugStepMode::StepOver => {
                if let Some(target) = self.imminent_breakpoint {
                    if target == pc {
                        log::debug!("Step-over reached return address ${target:04X}");
                        self.imminent_breakpoint = None;
                        return true;
                    }
                    return false;
                }
                let mut just_created = false;
                let length = self.cpu.call_instruction_length(&mut self.bus);
                if length > 0 {
                    let target = pc.wrapping_add(length);
                    log::debug!("Step-over armed at ${target:04X}");
                    self.imminent_breakpoint = Some(target);
                    just_created = true;
                }
                executed > 0 && (self.imminent_breakpoint.is_none() || just_created)
            }
        }
    }

    /// Render frame tacts after the last rendered one through `frame_tact`.
    fn render_to(&mut self, frame_tact: u32) {
        let from = self.last_rendered_tact.map_or(0, |t| t + 1);
        self.screen
            .render_screen(from, frame_tact, &self.bus.memory, self.bus.border.colour());
        self.last_rendered_tact = Some(frame_tact);
    }

    /// Clock-source counts from the cycle start to the end of `frames` frames.
    fn physical_frame_counts(&self, frames: u64) -> u64 {
        let counts = u128::from(frames)
            * u128::from(self.machine.frame_tacts)
            * u128::from(self.clock.frequency())
            / u128::from(self.machine.cpu_frequency.max(1));
        counts as u64
    }

    fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame_count: self.frame_count,
            frame_start_tact: self.last_frame_start,
            frame_tacts: self.machine.frame_tacts,
        }
    }

    /// Re-render the whole shadow screen from current memory.
    pub fn refresh_shadow_screen(&mut self) {
        let frame = self.frame_info();
        self.shadow_screen.on_new_frame(&frame);
        self.shadow_screen.render_screen(
            0,
            self.machine.frame_tacts - 1,
            &self.bus.memory,
            self.bus.border.colour(),
        );
    }

    /// CPU write to memory. ROM stays intact.
    pub fn write_memory(&mut self, address: u16, value: u8) {
        self.bus.memory.write(address, value);
    }

    /// Copy a block into RAM at `address`.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        self.bus.memory.load(address, data);
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn frame_tacts(&self) -> u32 {
        self.machine.frame_tacts
    }

    /// Tacts since the current frame started.
    #[must_use]
    pub fn current_frame_tact(&self) -> u32 {
        (self.cpu.tacts() - self.last_frame_start) as u32
    }

    #[must_use]
    pub fn last_rendered_tact(&self) -> Option<u32> {
        self.last_rendered_tact
    }

    #[must_use]
    pub fn imminent_breakpoint(&self) -> Option<u16> {
        self.imminent_breakpoint
    }

    #[must_use]
    pub fn machine_info(&self) -> &MachineInfo {
        &self.machine
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn screen(&self) -> &ScreenDevice {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ScreenDevice {
        &mut self.screen
    }

    #[must_use]
    pub fn shadow_screen(&self) -> &ScreenDevice {
        &self.shadow_screen
    }

    #[must_use]
    pub fn interrupt(&self) -> &InterruptDevice {
        &self.interrupt
    }

    #[must_use]
    pub fn tape(&self) -> &TapeDevice {
        &self.bus.tape
    }

    pub fn tape_mut(&mut self) -> &mut TapeDevice {
        &mut self.bus.tape
    }

    #[must_use]
    pub fn beeper(&self) -> &BeeperDevice {
        &self.bus.beeper
    }

    pub fn beeper_mut(&mut self) -> &mut BeeperDevice {
        &mut self.bus.beeper
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardDevice {
        &mut self.bus.keyboard
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
