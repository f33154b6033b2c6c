//! Tact-accurate ZX Spectrum 48K emulator.
//!
//! The machine runs the Z80 one CPU cycle at a time and lets the devices
//! catch up to the CPU's tact counter between cycles: the screen renders
//! incrementally, the interrupt device raises INT at its frame tact, and
//! the tape device follows the ROM's load and save routines. Frames are
//! paced against a host [`emu_core::ClockSource`] and can be stepped for
//! debugging.

mod beeper;
mod border;
mod bus;
mod config;
pub mod debug;
pub mod debugger;
mod devices;
mod error;
mod interrupt;
mod keyboard;
mod memory;
mod screen;
mod spectrum;
pub mod tape;

pub use beeper::{AudioSink, BeeperDevice};
pub use border::BorderDevice;
pub use bus::SpectrumBus;
pub use config::{ScreenConfiguration, SpectrumConfig, TapeConfig};
pub use debug::{BreakpointDebugInfo, DebugInfoProvider, FrameTimings, NoopDebugInfoProvider};
pub use devices::{FrameBoundDevice, FrameInfo, MachineInfo, SpectrumDevice};
pub use error::{MachineError, TapeError};
pub use interrupt::{InterruptDevice, LONGEST_OP_TACTS};
pub use keyboard::{KeyboardDevice, SpectrumKey};
pub use memory::Memory48K;
pub use screen::{PALETTE, PixelRenderer, ScreenDevice};
pub use spectrum::{DebugStepMode, EmulationMode, ExecuteCycleOptions, Spectrum48};
pub use tape::{TapeDevice, TapeMode};
