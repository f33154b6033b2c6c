//! Device capability traits.
//!
//! Every peripheral implements [`SpectrumDevice`]. Devices that follow the
//! video frame also expose [`FrameBoundDevice`] through
//! [`SpectrumDevice::as_frame_bound`]; the machine asks for the capability
//! instead of knowing each device's concrete type.

/// Machine-wide parameters handed to devices when they are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineInfo {
    pub cpu_frequency: u32,
    pub frame_tacts: u32,
    pub audio_sample_rate: u32,
}

/// The frame a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frames completed so far, including this one on completion.
    pub frame_count: u64,
    /// Absolute tact at which the frame started.
    pub frame_start_tact: u64,
    pub frame_tacts: u32,
}

impl FrameInfo {
    /// Absolute tact one past the frame's last tact.
    #[must_use]
    pub fn frame_end_tact(&self) -> u64 {
        self.frame_start_tact + u64::from(self.frame_tacts)
    }
}

pub trait SpectrumDevice {
    /// Return to the power-on state.
    fn reset(&mut self);

    /// Called once when the machine takes ownership of the device, and
    /// again on machine reset.
    fn attach(&mut self, machine: &MachineInfo) {
        let _ = machine;
        self.reset();
    }

    fn as_frame_bound(&mut self) -> Option<&mut dyn FrameBoundDevice> {
        None
    }
}

pub trait FrameBoundDevice {
    fn on_new_frame(&mut self, frame: &FrameInfo);

    fn on_frame_completed(&mut self, frame: &FrameInfo);
}
