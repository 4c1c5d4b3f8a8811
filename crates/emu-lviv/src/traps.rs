//! ROM traps.
//!
//! Tape loading is not emulated at the signal level. Instead the BASIC
//! ROM's BLOAD and CLOAD entry points are trapped: when PC reaches one of
//! them the machine copies the attached file straight into memory and
//! steers the ROM to its post-load path, or to its I/O error handler.
//!
//! | Address | Trap |
//! |---------|------|
//! | 0xDD94  | BLOAD: load a binary (0xD0) block |
//! | 0xE50B  | CLOAD: load a BASIC (0xD3) block |
//! | 0xE55E  | CLOAD tail: skip to 0xE561 |

use std::collections::BTreeMap;

use emu_core::IoBus;

use crate::cpu::{self, Registers};
use crate::error::AccessFault;

pub const BLOAD_ENTRY: u16 = 0xDD94;
pub const CLOAD_ENTRY: u16 = 0xE50B;
pub const CLOAD_TAIL: u16 = 0xE55E;

/// ROM routine called before resuming a load.
const LOAD_PROLOGUE: u16 = 0xE48A;
const BLOAD_RESUME: u16 = 0xDD61;
const CLOAD_RESUME: u16 = 0xE26D;
/// ROM "I/O error" handler; expects HL, DE, BC on the stack.
const IO_ERROR: u16 = 0xE4C7;

/// What a trapped address does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    BinaryLoad,
    CassetteLoad,
    /// Continue at another address.
    Jump(u16),
}

/// Result of servicing a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapAction {
    /// Nothing executed; the trap fires again when the CPU retries this
    /// address (a file load is still pending).
    NoOp,
    /// The trap replaced the instruction; registers have been updated.
    Handled,
}

/// Trapped addresses.
#[derive(Debug, Clone, Default)]
pub struct TrapTable {
    entries: BTreeMap<u16, TrapKind>,
}

impl TrapTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Traps for the stock BASIC ROM.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.insert(BLOAD_ENTRY, TrapKind::BinaryLoad);
        table.insert(CLOAD_ENTRY, TrapKind::CassetteLoad);
        table.insert(CLOAD_TAIL, TrapKind::Jump(0xE561));
        table
    }

    pub fn insert(&mut self, address: u16, kind: TrapKind) {
        self.entries.insert(address, kind);
    }

    #[must_use]
    pub fn get(&self, address: u16) -> Option<TrapKind> {
        self.entries.get(&address).copied()
    }

    #[must_use]
    pub fn contains(&self, address: u16) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }
}

/// After a successful load: call the ROM prologue, then continue at the
/// load routine's post-read path.
pub fn enter_loader<B: IoBus<Fault = AccessFault>>(
    registers: &mut Registers,
    bus: &mut B,
    kind: TrapKind,
) -> Result<(), AccessFault> {
    let resume = match kind {
        TrapKind::BinaryLoad => BLOAD_RESUME,
        TrapKind::CassetteLoad => CLOAD_RESUME,
        TrapKind::Jump(target) => {
            registers.pc = target;
            return Ok(());
        }
    };
    cpu::gosub(registers, bus, LOAD_PROLOGUE)?;
    registers.pc = resume;
    Ok(())
}

/// Push HL, DE, BC and jump to the ROM's I/O error handler.
pub fn raise_io_error<B: IoBus<Fault = AccessFault>>(registers: &mut Registers, bus: &mut B) -> Result<(), AccessFault> {
    let (hl, de, bc) = (registers.hl(), registers.de(), registers.bc());
    cpu::push_word(registers, bus, hl)?;
    cpu::push_word(registers, bus, de)?;
    cpu::push_word(registers, bus, bc)?;
    registers.pc = IO_ERROR;
    Ok(())
}
