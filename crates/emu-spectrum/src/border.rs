//! Border colour latch (port $FE bits 0-2).

use crate::devices::SpectrumDevice;

/// White, as left by the ROM after power-up.
const POWER_ON_COLOUR: u8 = 7;

pub struct BorderDevice {
    colour: u8,
}

impl BorderDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            colour: POWER_ON_COLOUR,
        }
    }

    #[must_use]
    pub fn colour(&self) -> u8 {
        self.colour
    }

    /// Only the low three bits are used.
    pub fn set_colour(&mut self, colour: u8) {
        self.colour = colour & 0x07;
    }
}

impl Default for BorderDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumDevice for BorderDevice {
    fn reset(&mut self) {
        self.colour = POWER_ON_COLOUR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_is_masked() {
        let mut border = BorderDevice::new();
        border.set_colour(0xFA);
        assert_eq!(border.colour(), 2);
        border.reset();
        assert_eq!(border.colour(), 7);
    }
}
