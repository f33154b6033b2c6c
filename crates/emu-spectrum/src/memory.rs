//! 48K memory map.

use crate::error::MachineError;

const ROM_SIZE: usize = 0x4000;
const RAM_SIZE: usize = 0xC000;

/// 48K Spectrum memory: 16K ROM + 48K RAM.
///
/// Layout:
/// - $0000-$3FFF: ROM (CPU writes ignored)
/// - $4000-$5AFF: Display file and attributes
/// - $5B00-$FFFF: General RAM
pub struct Memory48K {
    rom: Box<[u8; ROM_SIZE]>,
    ram: Box<[u8; RAM_SIZE]>,
}

impl Memory48K {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rom: Box::new([0; ROM_SIZE]),
            ram: Box::new([0; RAM_SIZE]),
        }
    }

    /// Replace the ROM contents. Images shorter than 16K are zero padded.
    pub fn fill_rom(&mut self, image: &[u8]) -> Result<(), MachineError> {
        if image.len() > ROM_SIZE {
            return Err(MachineError::RomTooLarge { len: image.len() });
        }
        self.rom.fill(0);
        self.rom[..image.len()].copy_from_slice(image);
        Ok(())
    }

    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        let address = usize::from(address);
        if address < ROM_SIZE {
            self.rom[address]
        } else {
            self.ram[address - ROM_SIZE]
        }
    }

    /// CPU write. ROM writes are silently ignored.
    pub fn write(&mut self, address: u16, value: u8) {
        let address = usize::from(address);
        if address >= ROM_SIZE {
            self.ram[address - ROM_SIZE] = value;
        }
    }

    /// Copy `data` into RAM at `address`, wrapping at 64K and skipping ROM.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            self.write(address.wrapping_add(offset as u16), byte);
        }
    }

    /// Clear RAM. ROM is kept.
    pub fn clear_ram(&mut self) {
        self.ram.fill(0);
    }
}

impl Default for Memory48K {
    fn default() -> Self {
        Self::new()
    }
}
