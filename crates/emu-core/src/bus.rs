//! Memory and I/O bus interfaces for 8080-family machines.

/// Memory bus seen by the CPU.
///
/// Accesses are fallible: a machine may refuse a read or write (a
/// write-protected ROM page under a strict fault policy, for example) and
/// the CPU core is expected to stop and propagate the fault.
pub trait Bus {
    /// Fault raised when an access is refused.
    type Fault;

    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> Result<u8, Self::Fault>;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Fault>;

    /// Advance the machine clock by `cycles` CPU cycles.
    ///
    /// The CPU calls this once per executed instruction so that
    /// peripherals timestamping events (the beeper) see the current
    /// frame-relative cycle count.
    fn tick(&mut self, cycles: u32);

    /// Read a little-endian word.
    fn read_word(&mut self, address: u16) -> Result<u16, Self::Fault> {
        let lo = self.read(address)?;
        let hi = self.read(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Write a little-endian word.
    fn write_word(&mut self, address: u16, value: u16) -> Result<(), Self::Fault> {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo)?;
        self.write(address.wrapping_add(1), hi)
    }
}

/// A bus with a separate 8-bit I/O port space (`IN`/`OUT` on the 8080).
pub trait IoBus: Bus {
    /// Read a byte from an I/O port.
    fn input(&mut self, port: u8) -> u8;

    /// Write a byte to an I/O port.
    fn output(&mut self, port: u8, value: u8);
}
