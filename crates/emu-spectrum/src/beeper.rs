//! Beeper: 1-bit audio from port $FE bit 4.
//!
//! EAR level changes are recorded with their absolute tact during the frame.
//! When the frame completes, the level is integrated over each sample's tact
//! window, so toggling faster than the sample rate still averages out to a
//! smooth waveform.

use crate::devices::{FrameBoundDevice, FrameInfo, MachineInfo, SpectrumDevice};

/// Output range is -AMPLITUDE..+AMPLITUDE.
const AMPLITUDE: f32 = 0.5;

/// Receives one frame of samples at a time.
pub trait AudioSink {
    fn on_frame_samples(&mut self, samples: &[f32]);
}

pub struct BeeperDevice {
    ear: bool,
    /// Level at the start of the frame being collected.
    frame_start_ear: bool,
    transitions: Vec<(u64, bool)>,
    samples_per_frame: usize,
    samples: Vec<f32>,
    sink: Option<Box<dyn AudioSink>>,
}

impl BeeperDevice {
    #[must_use]
    pub fn new(machine: &MachineInfo) -> Self {
        Self {
            ear: false,
            frame_start_ear: false,
            transitions: Vec::new(),
            samples_per_frame: samples_per_frame(machine),
            samples: Vec::new(),
            sink: None,
        }
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.sink = Some(sink);
    }

    #[must_use]
    pub fn ear(&self) -> bool {
        self.ear
    }

    #[must_use]
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Samples produced for the last completed frame.
    #[must_use]
    pub fn frame_samples(&self) -> &[f32] {
        &self.samples
    }

    /// Record the EAR level at `tact`. Repeats of the current level are ignored.
    pub fn process_ear_bit(&mut self, ear: bool, tact: u64) {
        if ear != self.ear {
            self.transitions.push((tact, ear));
            self.ear = ear;
        }
    }

    fn render_samples(&mut self, frame: &FrameInfo) {
        let end = frame.frame_end_tact();
        let split = self.transitions.partition_point(|&(tact, _)| tact < end);
        let mut level = self.frame_start_ear;
        self.samples.clear();

        if self.samples_per_frame > 0 {
            let tacts_per_sample = f64::from(frame.frame_tacts) / self.samples_per_frame as f64;
            let mut pending = self.transitions[..split].iter().peekable();

            for index in 0..self.samples_per_frame {
                let window_start = index as f64 * tacts_per_sample;
                let window_end = window_start + tacts_per_sample;
                let mut position = window_start;
                let mut high = 0.0;

                while let Some(&&(tact, new_level)) = pending.peek() {
                    let at = tact.saturating_sub(frame.frame_start_tact) as f64;
                    if at >= window_end {
                        break;
                    }
                    if at > position {
                        if level {
                            high += at - position;
                        }
                        position = at;
                    }
                    level = new_level;
                    pending.next();
                }
                if level {
                    high += window_end - position;
                }

                let ratio = high / tacts_per_sample;
                self.samples.push((ratio * 2.0 - 1.0) as f32 * AMPLITUDE);
            }
        }

        if let Some(&(_, last)) = self.transitions[..split].last() {
            level = last;
        }
        self.transitions.drain(..split);
        self.frame_start_ear = level;
    }
}

fn samples_per_frame(machine: &MachineInfo) -> usize {
    if machine.cpu_frequency == 0 {
        return 0;
    }
    (u64::from(machine.audio_sample_rate) * u64::from(machine.frame_tacts)
        / u64::from(machine.cpu_frequency)) as usize
}

impl SpectrumDevice for BeeperDevice {
    fn reset(&mut self) {
        self.ear = false;
        self.frame_start_ear = false;
        self.transitions.clear();
        self.samples.clear();
    }

    fn attach(&mut self, machine: &MachineInfo) {
        self.samples_per_frame = samples_per_frame(machine);
        self.reset();
    }

    fn as_frame_bound(&mut self) -> Option<&mut dyn FrameBoundDevice> {
        Some(self)
    }
}

impl FrameBoundDevice for BeeperDevice {
    fn on_new_frame(&mut self, frame: &FrameInfo) {
        let start = frame.frame_start_tact;
        self.transitions.retain(|&(tact, _)| tact >= start);
    }

    fn on_frame_completed(&mut self, frame: &FrameInfo) {
        self.render_samples(frame);
        if let Some(sink) = self.sink.as_mut() {
            sink.on_frame_samples(&self.samples);
        }
    }
}
