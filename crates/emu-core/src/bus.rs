//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU reaches memory and ports through this trait. Port accesses carry
/// the tact at which the access happens so devices can timestamp signal
/// changes without a back-reference to the CPU.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte from an I/O port. Unmapped ports float high.
    fn io_read(&mut self, port: u16, tact: u64) -> u8 {
        let _ = (port, tact);
        0xFF
    }

    /// Write a byte to an I/O port.
    fn io_write(&mut self, port: u16, value: u8, tact: u64) {
        let _ = (port, value, tact);
    }
}

/// Flat 64K RAM bus with no port devices.
///
/// Used by CPU tests and headless tools that only need memory.
pub struct SimpleBus {
    memory: Box<[u8; 0x10000]>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x10000]),
        }
    }

    /// Copy `data` into memory starting at `address`, wrapping at 64K.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let addr = address.wrapping_add(offset as u16);
            self.memory[usize::from(addr)] = byte;
        }
    }

    /// Fill the whole address space with `value`.
    pub fn fill(&mut self, value: u8) {
        self.memory.fill(value);
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }
}
