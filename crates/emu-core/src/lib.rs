//! Core traits and types for tact-accurate emulation.
//!
//! Every component synchronises against a single monotonic tact counter
//! owned by the CPU. Wall-clock pacing goes through a [`ClockSource`] and
//! cooperative cancellation through a [`CancellationToken`].

mod bus;
mod cancel;
mod clock;
mod cpu;

pub use bus::{Bus, SimpleBus};
pub use cancel::CancellationToken;
pub use clock::{ClockSource, SystemClock, VirtualClock};
pub use cpu::Cpu;
