//! Intel 8255 Programmable Peripheral Interface.
//!
//! The PPI exposes four registers selected by address lines A0–A1:
//!
//! | A1 A0 | Register             |
//! |-------|----------------------|
//! | 0 0   | Port A               |
//! | 0 1   | Port B               |
//! | 1 0   | Port C               |
//! | 1 1   | Control word (write) |
//!
//! A byte written to the control word register is either a mode set
//! (bit 7 = 1) or a single-bit set/reset command on port C (bit 7 = 0).
//! The datasheet is explicit that the control word cannot be read back;
//! machines differ in what a read of that address actually returns, so
//! that choice is left to the system bus.
//!
//! This crate only decodes. Register storage and the side effects of a
//! port write belong to the machine, which knows what is wired to each
//! port line.

/// One of the four PPI registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    PortA,
    PortB,
    PortC,
    Control,
}

impl Register {
    /// Decode the register from the low two address lines.
    #[must_use]
    pub const fn from_address(address: u8) -> Self {
        match address & 0x03 {
            0 => Register::PortA,
            1 => Register::PortB,
            2 => Register::PortC,
            _ => Register::Control,
        }
    }
}

/// Port C single-bit set/reset command (control word with bit 7 clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSetReset {
    /// Bit index 0–7, from control word bits 1–3.
    pub bit: u8,
    /// Set (`true`) or clear (`false`), from control word bit 0.
    pub set: bool,
}

impl BitSetReset {
    /// Mask selecting the addressed bit.
    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << self.bit
    }

    /// Apply the command to a port C value.
    #[must_use]
    pub const fn apply(self, value: u8) -> u8 {
        if self.set {
            value | self.mask()
        } else {
            value & !self.mask()
        }
    }
}

/// A decoded control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWord {
    /// Bit 7 set. Port directions are not modelled: every line is treated
    /// as a latched output, so the machine only needs to know a mode set
    /// is not a bit command.
    ModeSet,
    BitSetReset(BitSetReset),
}

impl ControlWord {
    /// Decode a byte written to the control word register.
    #[must_use]
    pub const fn decode(value: u8) -> Self {
        if value & 0x80 == 0 {
            ControlWord::BitSetReset(BitSetReset {
                bit: (value & 0x0E) >> 1,
                set: value & 0x01 != 0,
            })
        } else {
            ControlWord::ModeSet
        }
    }
}
