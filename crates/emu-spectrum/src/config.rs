//! Machine configuration.

/// Screen timing for one frame, in CPU tacts and pixels.
///
/// A frame starts with vertical sync. Each line starts with its display
/// section, followed by the right border, horizontal retrace and the left
/// border of the next visible row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConfiguration {
    pub vertical_sync_lines: u32,
    pub nonvisible_border_top_lines: u32,
    pub border_top_lines: u32,
    pub display_lines: u32,
    pub border_bottom_lines: u32,
    pub nonvisible_border_bottom_lines: u32,
    /// Tacts of the display section of a line (two pixels per tact).
    pub display_line_tacts: u32,
    pub border_right_tacts: u32,
    pub horizontal_blanking_tacts: u32,
    pub border_left_tacts: u32,
}

impl ScreenConfiguration {
    /// 48K PAL: 224 tacts per line, 312 lines, 69 888 tacts per frame.
    #[must_use]
    pub const fn spectrum_48k() -> Self {
        Self {
            vertical_sync_lines: 8,
            nonvisible_border_top_lines: 8,
            border_top_lines: 48,
            display_lines: 192,
            border_bottom_lines: 48,
            nonvisible_border_bottom_lines: 8,
            display_line_tacts: 128,
            border_right_tacts: 24,
            horizontal_blanking_tacts: 48,
            border_left_tacts: 24,
        }
    }

    #[must_use]
    pub const fn line_tacts(&self) -> u32 {
        self.display_line_tacts
            + self.border_right_tacts
            + self.horizontal_blanking_tacts
            + self.border_left_tacts
    }

    #[must_use]
    pub const fn lines_per_frame(&self) -> u32 {
        self.vertical_sync_lines
            + self.nonvisible_border_top_lines
            + self.border_top_lines
            + self.display_lines
            + self.border_bottom_lines
            + self.nonvisible_border_bottom_lines
    }

    #[must_use]
    pub const fn frame_tacts(&self) -> u32 {
        self.line_tacts() * self.lines_per_frame()
    }

    /// First line shown in the pixel buffer (top border).
    #[must_use]
    pub const fn first_visible_line(&self) -> u32 {
        self.vertical_sync_lines + self.nonvisible_border_top_lines
    }

    #[must_use]
    pub const fn first_display_line(&self) -> u32 {
        self.first_visible_line() + self.border_top_lines
    }

    /// Frame tact of the top-left display pixel.
    #[must_use]
    pub const fn first_display_pixel_tact(&self) -> u32 {
        self.first_display_line() * self.line_tacts()
    }

    /// Pixel buffer width: left border, display and right border.
    #[must_use]
    pub const fn screen_width(&self) -> usize {
        ((self.border_left_tacts + self.display_line_tacts + self.border_right_tacts) * 2) as usize
    }

    /// Pixel buffer height: top border, display and bottom border.
    #[must_use]
    pub const fn screen_height(&self) -> usize {
        (self.border_top_lines + self.display_lines + self.border_bottom_lines) as usize
    }
}

impl Default for ScreenConfiguration {
    fn default() -> Self {
        Self::spectrum_48k()
    }
}

/// ROM entry points and timeouts that drive the tape state machine.
///
/// The defaults match the 48K ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeConfig {
    /// `LD-BYTES` body; reaching it starts playback.
    pub load_start_address: u16,
    /// `SA-BYTES`; reaching it starts recording.
    pub save_bytes_address: u16,
    /// `RST 08` error restart; reaching it aborts any tape operation.
    pub error_address: u16,
    /// Tacts without MIC activity after which recording stops.
    pub save_silence_timeout: u64,
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self {
            load_start_address: 0x056C,
            save_bytes_address: 0x04C2,
            error_address: 0x0008,
            save_silence_timeout: 17_500_000,
        }
    }
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumConfig {
    /// ROM image, at most 16 384 bytes. Shorter images are zero padded.
    pub rom: Vec<u8>,
    pub cpu_frequency: u32,
    /// Frame tact at which the ULA raises INT.
    pub interrupt_tact: u32,
    pub screen: ScreenConfiguration,
    pub tape: TapeConfig,
    pub audio_sample_rate: u32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            rom: Vec::new(),
            cpu_frequency: 3_500_000,
            interrupt_tact: 32,
            screen: ScreenConfiguration::spectrum_48k(),
            tape: TapeConfig::default(),
            audio_sample_rate: 44_100,
        }
    }
}
