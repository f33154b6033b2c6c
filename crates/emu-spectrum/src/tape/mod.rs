//! Tape device.
//!
//! Watches the program counter for the ROM's tape routines. Reaching
//! `LD-BYTES` starts playing the current content through the EAR bit;
//! reaching `SA-BYTES` starts recording MIC level changes. Either operation
//! ends on the error restart, on end of tape, or (when saving) after a long
//! stretch without MIC activity.

mod player;
mod provider;

pub use player::TzxPlayer;
pub use provider::{
    BytesContentProvider, FileContentProvider, TapeContentProvider, TapeSaveProvider,
    TzxSaveProvider,
};

use format_tzx::Pulse;

use crate::beeper::BeeperDevice;
use crate::config::TapeConfig;
use crate::devices::{MachineInfo, SpectrumDevice};
use crate::error::TapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeMode {
    Passive,
    Save,
    Load,
}

pub struct TapeDevice {
    config: TapeConfig,
    cpu_frequency: u32,
    mode: TapeMode,
    content: Option<Box<dyn TapeContentProvider>>,
    save: Option<Box<dyn TapeSaveProvider>>,
    player: Option<TzxPlayer>,
    mic: bool,
    save_start_tact: u64,
    last_mic_activity: u64,
    pulses: Vec<Pulse>,
}

impl TapeDevice {
    #[must_use]
    pub fn new(config: &TapeConfig, cpu_frequency: u32) -> Self {
        Self {
            config: config.clone(),
            cpu_frequency,
            mode: TapeMode::Passive,
            content: None,
            save: None,
            player: None,
            mic: true,
            save_start_tact: 0,
            last_mic_activity: 0,
            pulses: Vec::new(),
        }
    }

    pub fn set_content_provider(&mut self, provider: Box<dyn TapeContentProvider>) {
        self.content = Some(provider);
    }

    pub fn set_save_provider(&mut self, provider: Box<dyn TapeSaveProvider>) {
        self.save = Some(provider);
    }

    #[must_use]
    pub fn mode(&self) -> TapeMode {
        self.mode
    }

    #[must_use]
    pub fn mic_bit(&self) -> bool {
        self.mic
    }

    /// Tact at which the current or last recording started.
    #[must_use]
    pub fn save_start_tact(&self) -> u64 {
        self.save_start_tact
    }

    /// MIC pulses of the current or last recording.
    #[must_use]
    pub fn recorded_pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Evaluate mode transitions for the instruction boundary at `pc`.
    pub fn set_tape_mode(&mut self, pc: u16, tacts: u64) -> Result<(), TapeError> {
        match self.mode {
            TapeMode::Passive => {
                if pc == self.config.load_start_address {
                    self.enter_load(tacts)?;
                } else if pc == self.config.save_bytes_address {
                    self.enter_save(tacts);
                }
            }
            TapeMode::Save => {
                let silent = tacts.saturating_sub(self.last_mic_activity);
                if pc == self.config.error_address {
                    self.leave_save()?;
                } else if silent > self.config.save_silence_timeout {
                    log::debug!("No MIC activity for {silent} tacts, stopping recording");
                    self.leave_save()?;
                }
            }
            TapeMode::Load => {
                let eof = self.player.as_ref().is_none_or(TzxPlayer::is_eof);
                if eof || pc == self.config.error_address {
                    self.leave_load(eof);
                }
            }
        }
        Ok(())
    }

    /// Record a MIC level written to port $FE.
    pub fn process_mic_bit(&mut self, mic: bool, tacts: u64) {
        if self.mode != TapeMode::Save || mic == self.mic {
            return;
        }
        self.pulses.push(Pulse {
            level: self.mic,
            length: tacts.saturating_sub(self.last_mic_activity),
        });
        self.mic = mic;
        self.last_mic_activity = tacts;
    }

    /// EAR level read from port $FE. High unless a tape is playing.
    pub fn get_ear_bit(&mut self, tacts: u64, beeper: &mut BeeperDevice) -> bool {
        if self.mode != TapeMode::Load {
            return true;
        }
        let Some(player) = self.player.as_mut() else {
            return true;
        };
        let ear = player.get_ear_bit(tacts);
        beeper.process_ear_bit(ear, tacts);
        ear
    }

    fn enter_load(&mut self, tacts: u64) -> Result<(), TapeError> {
        let Some(provider) = self.content.as_mut() else {
            return Ok(());
        };
        let cpu_frequency = self.cpu_frequency;
        let read = provider.content().map_err(TapeError::from).and_then(|content| {
            let mut player = TzxPlayer::new(content, cpu_frequency);
            player.read_content().map(|()| player)
        });
        let mut player = match read {
            Ok(player) => player,
            Err(err) => {
                log::warn!("Cannot play tape content: {err}");
                provider.reset();
                return Err(err);
            }
        };
        player.init_play(tacts);
        self.player = Some(player);
        self.mode = TapeMode::Load;
        log::info!("Tape playback started at tact {tacts}");
        Ok(())
    }

    fn leave_load(&mut self, eof: bool) {
        self.player = None;
        if let Some(provider) = self.content.as_mut() {
            provider.reset();
        }
        self.mode = TapeMode::Passive;
        log::info!(
            "Tape playback stopped ({})",
            if eof { "end of tape" } else { "error restart" }
        );
    }

    fn enter_save(&mut self, tacts: u64) {
        self.mode = TapeMode::Save;
        self.mic = true;
        self.save_start_tact = tacts;
        self.last_mic_activity = tacts;
        self.pulses.clear();
        log::info!("Tape recording started at tact {tacts}");
    }

    fn leave_save(&mut self) -> Result<(), TapeError> {
        self.mode = TapeMode::Passive;
        log::info!("Tape recording stopped with {} pulses", self.pulses.len());
        if let Some(save) = self.save.as_mut() {
            save.save_pulses(&self.pulses)?;
        }
        Ok(())
    }
}

impl SpectrumDevice for TapeDevice {
    fn reset(&mut self) {
        if let Some(provider) = self.content.as_mut() {
            provider.reset();
        }
        self.player = None;
        self.mode = TapeMode::Passive;
        self.mic = true;
        self.save_start_tact = 0;
        self.last_mic_activity = 0;
        self.pulses.clear();
    }

    fn attach(&mut self, machine: &MachineInfo) {
        self.cpu_frequency = machine.cpu_frequency;
        self.reset();
    }
}
