//! ZX Spectrum keyboard.
//!
//! The keyboard is an 8×5 matrix of half-rows, read via port $FE. The high
//! byte of the port address selects which half-rows to scan: each cleared
//! bit (A8-A15) enables one half-row, so several rows can be scanned at once.
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Caps Shift, Z, X, C, V        |
//! | A9       | 1   | A, S, D, F, G                 |
//! | A10      | 2   | Q, W, E, R, T                 |
//! | A11      | 3   | 1, 2, 3, 4, 5                 |
//! | A12      | 4   | 0, 9, 8, 7, 6                 |
//! | A13      | 5   | P, O, I, U, Y                 |
//! | A14      | 6   | Enter, L, K, J, H             |
//! | A15      | 7   | Space, Sym Shift, M, N, B     |
//!
//! A pressed key reads as 0 (active low). Bits 5-7 read as 1.

use crate::devices::SpectrumDevice;

/// Logical key on the 48K keyboard, declared in matrix order.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumKey {
    CapsShift, Z, X, C, V,
    A, S, D, F, G,
    Q, W, E, R, T,
    N1, N2, N3, N4, N5,
    N0, N9, N8, N7, N6,
    P, O, I, U, Y,
    Enter, L, K, J, H,
    Space, SymShift, M, N, B,
}

impl SpectrumKey {
    /// Every key, in matrix order.
    #[rustfmt::skip]
    #[allow(clippy::enum_glob_use)]
    pub const ALL: [Self; 40] = {
        use SpectrumKey::*;
        [
            CapsShift, Z, X, C, V,
            A, S, D, F, G,
            Q, W, E, R, T,
            N1, N2, N3, N4, N5,
            N0, N9, N8, N7, N6,
            P, O, I, U, Y,
            Enter, L, K, J, H,
            Space, SymShift, M, N, B,
        ]
    };

    /// (half-row, bit) position in the matrix.
    #[must_use]
    pub const fn matrix(self) -> (usize, u8) {
        let index = self as usize;
        (index / 5, (index % 5) as u8)
    }
}

/// Keyboard matrix state.
pub struct KeyboardDevice {
    /// Bits 0-4 per half-row, 1 = pressed.
    rows: [u8; 8],
}

impl KeyboardDevice {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: [0; 8] }
    }

    pub fn press(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.rows[row] |= 1 << bit;
    }

    pub fn release(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.rows[row] &= !(1 << bit);
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    #[must_use]
    pub fn is_pressed(&self, key: SpectrumKey) -> bool {
        let (row, bit) = key.matrix();
        self.rows[row] & (1 << bit) != 0
    }

    /// Port $FE keyboard bits for the half-rows selected by `addr_high`.
    ///
    /// The matrix is passive, so with several keys down current can flow
    /// through shared columns into unselected rows ("ghosting"). Rows
    /// reachable that way contribute their columns too.
    #[must_use]
    pub fn line_status(&self, addr_high: u8) -> u8 {
        let mut active_rows = !addr_high;
        let columns = loop {
            let columns = self.columns_of(active_rows);
            let reachable = (0..8)
                .filter(|&row| self.rows[row] & columns != 0)
                .fold(active_rows, |acc, row| acc | (1 << row));
            if reachable == active_rows {
                break columns;
            }
            active_rows = reachable;
        };
        (!columns & 0x1F) | 0xE0
    }

    fn columns_of(&self, row_mask: u8) -> u8 {
        (0..8)
            .filter(|&row| row_mask & (1 << row) != 0)
            .fold(0, |acc, row| acc | self.rows[row])
    }
}

impl Default for KeyboardDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumDevice for KeyboardDevice {
    fn reset(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_positions() {
        assert_eq!(SpectrumKey::CapsShift.matrix(), (0, 0));
        assert_eq!(SpectrumKey::G.matrix(), (1, 4));
        assert_eq!(SpectrumKey::N6.matrix(), (4, 4));
        assert_eq!(SpectrumKey::Enter.matrix(), (6, 0));
        assert_eq!(SpectrumKey::B.matrix(), (7, 4));
        assert!(SpectrumKey::ALL
            .iter()
            .enumerate()
            .all(|(i, key)| key.matrix() == (i / 5, (i % 5) as u8)));
    }

    #[test]
    fn no_keys_pressed() {
        let kbd = KeyboardDevice::new();
        assert_eq!(kbd.line_status(0x00), 0xFF);
    }

    #[test]
    fn single_key_pressed() {
        let mut kbd = KeyboardDevice::new();
        kbd.press(SpectrumKey::A);
        assert_eq!(kbd.line_status(0xFD), 0xFE);
        // Another half-row does not see it.
        assert_eq!(kbd.line_status(0xFE), 0xFF);
        kbd.release(SpectrumKey::A);
        assert_eq!(kbd.line_status(0xFD), 0xFF);
    }

    #[test]
    fn multiple_rows_are_combined() {
        let mut kbd = KeyboardDevice::new();
        kbd.press(SpectrumKey::CapsShift);
        kbd.press(SpectrumKey::N0);
        assert_eq!(kbd.line_status(0xEE) & 0x1F, 0x1E);
    }

    #[test]
    fn ghost_three_corners_produces_fourth() {
        let mut kbd = KeyboardDevice::new();
        kbd.press(SpectrumKey::CapsShift);
        kbd.press(SpectrumKey::Z);
        kbd.press(SpectrumKey::A);
        // Row 1 alone: A is down, S appears through the shared column.
        assert_eq!(kbd.line_status(0xFD) & 0x1F, 0x1C);
    }

    #[test]
    fn no_ghost_without_shared_axis() {
        let mut kbd = KeyboardDevice::new();
        kbd.press(SpectrumKey::CapsShift);
        kbd.press(SpectrumKey::S);
        assert_eq!(kbd.line_status(0xFE) & 0x1F, 0x1E);
        assert_eq!(kbd.line_status(0xFD) & 0x1F, 0x1D);
    }

    #[test]
    fn reset_releases_everything() {
        let mut kbd = KeyboardDevice::new();
        kbd.press(SpectrumKey::Space);
        assert!(kbd.is_pressed(SpectrumKey::Space));
        kbd.reset();
        assert!(!kbd.is_pressed(SpectrumKey::Space));
    }
}
