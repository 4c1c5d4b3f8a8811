//! Lviv system bus.
//!
//! The i8080 sees memory through the bank router and ports through the
//! 8255 register file. Port writes can change the memory mapping (media
//! port bit 1, extended mode register), so every memory access asks the
//! ports for the current [`PageMapping`](crate::memory::PageMapping).

use emu_core::{Bus, IoBus};

use crate::error::{AccessFault, Result};
use crate::io::IoPorts;
use crate::memory::{Memory, TransferMode, TransferTarget};

/// Owns memory and the port space.
pub struct LvivBus {
    pub memory: Memory,
    pub io: IoPorts,
}

impl LvivBus {
    #[must_use]
    pub fn new(memory: Memory, io: IoPorts) -> Self {
        Self { memory, io }
    }

    /// Read through the current mapping without access checks.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory.peek(address, self.io.mapping())
    }

    /// Copy `source[offset..]` into `begin..=end` as the CPU would see it.
    pub fn transfer(&mut self, begin: u16, end: u16, source: &[u8], offset: usize) -> Result<usize> {
        let target = TransferTarget::Mapped(self.io.mapping());
        self.memory.transfer(begin, end, source, offset, target, TransferMode::Write)
    }

    /// The 16K VRAM bank, whatever is mapped.
    #[must_use]
    pub fn vram(&self) -> &[u8] {
        self.memory.vram_bank().data()
    }
}

impl Bus for LvivBus {
    type Fault = AccessFault;

    fn read(&mut self, address: u16) -> std::result::Result<u8, AccessFault> {
        self.memory.read(address, self.io.mapping())
    }

    fn write(&mut self, address: u16, value: u8) -> std::result::Result<(), AccessFault> {
        let mapping = self.io.mapping();
        self.memory.write(address, value, mapping)
    }

    fn tick(&mut self, cycles: u32) {
        self.io.beeper.tick(cycles);
    }
}

impl IoBus for LvivBus {
    fn input(&mut self, port: u8) -> u8 {
        self.io.input(port)
    }

    fn output(&mut self, port: u8, value: u8) {
        self.io.output(port, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beeper::Beeper;
    use crate::config::LvivConfig;
    use crate::io::MEDIA_PORT;
    use crate::keyboard::Keyboard;

    fn make_bus() -> LvivBus {
        let config = LvivConfig::default();
        let beeper = Beeper::new(&config.beeper, &config.cpu);
        LvivBus::new(
            Memory::new(&config.memory),
            IoPorts::new(&config.io, &config.beeper, beeper, Keyboard::new()),
        )
    }

    #[test]
    fn media_port_pages_vram_in_and_out() {
        let mut bus = make_bus();
        bus.write(0x4000, 0x11).expect("ram");

        bus.output(MEDIA_PORT, 0xFD);
        bus.write(0x4000, 0x22).expect("vram");
        assert_eq!(bus.vram()[0], 0x22);
        assert_eq!(bus.read(0x4000), Ok(0x22));

        bus.output(MEDIA_PORT, 0xFF);
        assert_eq!(bus.read(0x4000), Ok(0x11));
    }

    #[test]
    fn words_are_little_endian() {
        let mut bus = make_bus();
        bus.write_word(0xBEAB, 0x1234).expect("ram");
        assert_eq!(bus.read(0xBEAB), Ok(0x34));
        assert_eq!(bus.read_word(0xBEAB), Ok(0x1234));
    }

    #[test]
    fn tick_advances_beeper_clock() {
        let mut bus = make_bus();
        bus.tick(12);
        bus.tick(30);
        assert_eq!(bus.io.beeper.clock(), 42);
    }
}
