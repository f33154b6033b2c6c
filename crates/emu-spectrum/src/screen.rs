//! Screen (ULA video) device.
//!
//! The beam position is a pure function of the frame tact, so a table built
//! once per configuration says what each tact draws: two border pixels, two
//! display pixels, or nothing (sync, retrace). The machine renders
//! incrementally after every CPU cycle, which keeps border effects and
//! mid-frame display writes where the real ULA would show them.
//!
//! # Screen memory layout
//!
//! Bitmap at $4000-$57FF (6144 bytes), attributes at $5800-$5AFF (768 bytes).
//! Bitmap address: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`
//! Attribute address: `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`
//!
//! The pixel buffer holds palette indices (`bright << 3 | colour`); map them
//! through [`PALETTE`] for ARGB output.

use crate::config::ScreenConfiguration;
use crate::devices::{FrameBoundDevice, FrameInfo, SpectrumDevice};
use crate::memory::Memory48K;

/// ARGB32 palette: 8 normal colours, then 8 bright ones.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000, 0xFF00_00CD, 0xFFCD_0000, 0xFFCD_00CD,
    0xFF00_CD00, 0xFF00_CDCD, 0xFFCD_CD00, 0xFFCD_CDCD,
    0xFF00_0000, 0xFF00_00FF, 0xFFFF_0000, 0xFFFF_00FF,
    0xFF00_FF00, 0xFF00_FFFF, 0xFFFF_FF00, 0xFFFF_FFFF,
];

/// Frames between FLASH phase changes.
const FLASH_FRAMES: u64 = 16;

/// Receives each completed frame.
pub trait PixelRenderer {
    fn render_frame(&mut self, pixels: &[u8], width: usize, height: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TactAction {
    /// Sync or retrace.
    Idle,
    Border {
        offset: usize,
    },
    Display {
        offset: usize,
        pixel_address: u16,
        attr_address: u16,
        /// Bit of the bitmap byte that holds the first of the two pixels.
        bit: u8,
    },
}

pub struct ScreenDevice {
    config: ScreenConfiguration,
    table: Vec<TactAction>,
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    frame_count: u64,
    flash_phase: bool,
    renderer: Option<Box<dyn PixelRenderer>>,
}

impl ScreenDevice {
    #[must_use]
    pub fn new(config: &ScreenConfiguration) -> Self {
        let width = config.screen_width();
        let height = config.screen_height();
        Self {
            config: config.clone(),
            table: build_render_table(config),
            pixels: vec![0; width * height],
            width,
            height,
            frame_count: 0,
            flash_phase: false,
            renderer: None,
        }
    }

    pub fn set_pixel_renderer(&mut self, renderer: Box<dyn PixelRenderer>) {
        self.renderer = Some(renderer);
    }

    #[must_use]
    pub fn configuration(&self) -> &ScreenConfiguration {
        &self.config
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Palette index at (x, y) of the pixel buffer.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    #[must_use]
    pub fn flash_phase(&self) -> bool {
        self.flash_phase
    }

    /// Draw frame tacts `from..=to`. Tacts past the frame end are ignored.
    pub fn render_screen(&mut self, from: u32, to: u32, memory: &Memory48K, border: u8) {
        let last = to.min(self.config.frame_tacts().saturating_sub(1));
        if from > last {
            return;
        }
        for tact in from..=last {
            match self.table[tact as usize] {
                TactAction::Idle => {}
                TactAction::Border { offset } => {
                    self.pixels[offset] = border;
                    self.pixels[offset + 1] = border;
                }
                TactAction::Display {
                    offset,
                    pixel_address,
                    attr_address,
                    bit,
                } => {
                    let bitmap = memory.read(pixel_address);
                    let attr = memory.read(attr_address);
                    self.pixels[offset] = self.pixel_colour(bitmap, attr, bit);
                    self.pixels[offset + 1] = self.pixel_colour(bitmap, attr, bit - 1);
                }
            }
        }
    }

    /// Decode attribute byte `FBPPPIII` for one bitmap bit.
    fn pixel_colour(&self, bitmap: u8, attr: u8, bit: u8) -> u8 {
        let mut ink = bitmap & (1 << bit) != 0;
        if attr & 0x80 != 0 && self.flash_phase {
            ink = !ink;
        }
        let bright = (attr >> 3) & 0x08;
        let colour = if ink { attr & 0x07 } else { (attr >> 3) & 0x07 };
        bright | colour
    }
}

fn build_render_table(config: &ScreenConfiguration) -> Vec<TactAction> {
    let line_tacts = config.line_tacts();
    let display_end = config.display_line_tacts;
    let border_right_end = display_end + config.border_right_tacts;
    let blanking_end = border_right_end + config.horizontal_blanking_tacts;
    let left_border_pixels = config.border_left_tacts * 2;

    let first_visible = config.first_visible_line();
    let first_display = config.first_display_line();
    let display_rows = first_display..first_display + config.display_lines;
    let visible_rows = first_visible..first_visible + config.screen_height() as u32;
    let width = config.screen_width();

    (0..config.frame_tacts())
        .map(|tact| {
            let line = tact / line_tacts;
            let column = tact % line_tacts;

            // The left border is drawn at the end of the previous line.
            let (row, x, display_section) = if column < display_end {
                (line, left_border_pixels + column * 2, true)
            } else if column < border_right_end {
                (line, left_border_pixels + column * 2, false)
            } else if column < blanking_end {
                return TactAction::Idle;
            } else {
                (line + 1, (column - blanking_end) * 2, false)
            };

            if !visible_rows.contains(&row) {
                return TactAction::Idle;
            }
            let offset = (row - first_visible) as usize * width + x as usize;

            if display_section && display_rows.contains(&row) {
                let y = (row - first_display) as u16;
                let char_col = (column / 4) as u16;
                TactAction::Display {
                    offset,
                    pixel_address: 0x4000
                        | ((y & 0xC0) << 5)
                        | ((y & 0x07) << 8)
                        | ((y & 0x38) << 2)
                        | char_col,
                    attr_address: 0x5800 | ((y >> 3) << 5) | char_col,
                    bit: 7 - (column % 4) as u8 * 2,
                }
            } else {
                TactAction::Border { offset }
            }
        })
        .collect()
}

impl SpectrumDevice for ScreenDevice {
    fn reset(&mut self) {
        self.pixels.fill(0);
        self.frame_count = 0;
        self.flash_phase = false;
    }

    fn as_frame_bound(&mut self) -> Option<&mut dyn FrameBoundDevice> {
        Some(self)
    }
}

impl FrameBoundDevice for ScreenDevice {
    fn on_new_frame(&mut self, _frame: &FrameInfo) {
        self.frame_count += 1;
        if self.frame_count % FLASH_FRAMES == 0 {
            self.flash_phase = !self.flash_phase;
        }
    }

    fn on_frame_completed(&mut self, _frame: &FrameInfo) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render_frame(&self.pixels, self.width, self.height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameInfo = FrameInfo {
        frame_count: 0,
        frame_start_tact: 0,
        frame_tacts: 69_888,
    };

    fn make_screen() -> (ScreenDevice, Memory48K) {
        (
            ScreenDevice::new(&ScreenConfiguration::spectrum_48k()),
            Memory48K::new(),
        )
    }

    #[test]
    fn table_covers_frame() {
        let (screen, _) = make_screen();
        assert_eq!(screen.table.len(), 69_888);
        let display = screen
            .table
            .iter()
            .filter(|a| matches!(a, TactAction::Display { .. }))
            .count();
        // 192 lines of 128 tacts.
        assert_eq!(display, 192 * 128);
        let drawn = screen
            .table
            .iter()
            .filter(|a| !matches!(a, TactAction::Idle))
            .count();
        assert_eq!(drawn * 2, 352 * 288);
    }

    #[test]
    fn first_display_tact_addresses_top_left() {
        let (screen, _) = make_screen();
        assert_eq!(
            screen.table[14_336],
            TactAction::Display {
                offset: 48 * 352 + 48,
                pixel_address: 0x4000,
                attr_address: 0x5800,
                bit: 7,
            }
        );
    }

    #[test]
    fn display_addresses_follow_ula_layout() {
        let (screen, _) = make_screen();
        // Display line 9 (third-0, char row 1, pixel row 1), last column pair.
        let tact = (64 + 9) * 224 + 127;
        match screen.table[tact] {
            TactAction::Display {
                pixel_address,
                attr_address,
                bit,
                ..
            } => {
                assert_eq!(pixel_address, 0x4000 | 0x0100 | 0x0020 | 31);
                assert_eq!(attr_address, 0x5800 + 32 + 31);
                assert_eq!(bit, 1);
            }
            other => panic!("expected display tact, got {other:?}"),
        }
    }

    #[test]
    fn renders_ink_and_paper() {
        let (mut screen, mut memory) = make_screen();
        memory.write(0x4000, 0b1000_0000);
        // Paper white, ink blue, bright.
        memory.write(0x5800, 0x40 | (7 << 3) | 1);
        screen.render_screen(14_336, 14_336, &memory, 2);
        assert_eq!(screen.pixel(48, 48), 8 | 1);
        assert_eq!(screen.pixel(49, 48), 8 | 7);
    }

    #[test]
    fn left_border_belongs_to_next_row() {
        let (mut screen, memory) = make_screen();
        let line_63_left_border = 63 * 224 + 200;
        screen.render_screen(line_63_left_border, line_63_left_border + 23, &memory, 5);
        assert!((0..48).all(|x| screen.pixel(x, 48) == 5));
        assert_eq!(screen.pixel(0, 47), 0);
    }

    #[test]
    fn render_clamps_to_frame_end() {
        let (mut screen, memory) = make_screen();
        screen.render_screen(69_880, 80_000, &memory, 1);
        screen.render_screen(10, 5, &memory, 1);
    }

    #[test]
    fn flash_swaps_every_sixteen_frames() {
        let (mut screen, mut memory) = make_screen();
        memory.write(0x4000, 0xFF);
        memory.write(0x5800, 0x80 | (7 << 3));
        for _ in 0..15 {
            screen.on_new_frame(&FRAME);
        }
        screen.render_screen(14_336, 14_336, &memory, 0);
        assert_eq!(screen.pixel(48, 48), 0);
        screen.on_new_frame(&FRAME);
        assert!(screen.flash_phase());
        screen.render_screen(14_336, 14_336, &memory, 0);
        assert_eq!(screen.pixel(48, 48), 7);
    }

    #[test]
    fn renderer_gets_completed_frame() {
        struct Capture(std::rc::Rc<std::cell::Cell<(usize, usize)>>);
        impl PixelRenderer for Capture {
            fn render_frame(&mut self, pixels: &[u8], width: usize, height: usize) {
                assert_eq!(pixels.len(), width * height);
                self.0.set((width, height));
            }
        }

        let seen = std::rc::Rc::new(std::cell::Cell::new((0, 0)));
        let (mut screen, _) = make_screen();
        screen.set_pixel_renderer(Box::new(Capture(std::rc::Rc::clone(&seen))));
        screen.on_frame_completed(&FRAME);
        assert_eq!(seen.get(), (352, 288));
    }
}
