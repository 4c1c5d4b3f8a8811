//! Tape file blocks.
//!
//! A tape file starts with a 16-byte header; byte 0x09 is the block type
//! and bytes 0x0A–0x0F the file name.
//!
//! | Offset | Binary (0xD0)        | BASIC (0xD3)      |
//! |--------|----------------------|-------------------|
//! | 0x10   | begin address (le16) | program bytes...  |
//! | 0x12   | end address (le16)   |                   |
//! | 0x14   | start address (le16) |                   |
//! | 0x16   | data bytes...        |                   |
//!
//! Loading writes straight into memory and into the BASIC ROM's work area,
//! leaving it as the ROM's own loader would.

use emu_core::Bus;

use crate::bus::LvivBus;
use crate::error::{FormatError, Result};

/// Offset of the file type byte in tape and snapshot files.
pub const FILE_TYPE_OFFSET: usize = 0x09;
pub const TYPE_BINARY: u8 = 0xD0;
pub const TYPE_BASIC: u8 = 0xD3;

/// ROM work area receiving the 6-byte file name.
const NAME_BEGIN: u16 = 0xBE92;
const NAME_END: u16 = 0xBE97;
const NAME_OFFSET: usize = 0x0A;

/// BLOAD relocation offset set by the ROM.
const BLOAD_OFFSET: u16 = 0xBEAB;
const BLOAD_BEGIN: u16 = 0xBEA4;
const BLOAD_END: u16 = 0xBEA6;
const BLOAD_START: u16 = 0xBEA9;

/// BASIC program start and end pointers.
const BASIC_BEGIN: u16 = 0x0243;
const BASIC_END: u16 = 0x0245;

fn word_at(data: &[u8], offset: usize) -> Result<u16> {
    match data.get(offset..offset + 2) {
        Some(&[lo, hi]) => Ok(u16::from_le_bytes([lo, hi])),
        _ => Err(FormatError::Truncated {
            format: "tape",
            expected: offset + 2,
            actual: data.len(),
        }
        .into()),
    }
}

/// Block type of a tape or snapshot file.
#[must_use]
pub fn file_type(data: &[u8]) -> Option<u8> {
    data.get(FILE_TYPE_OFFSET).copied()
}

/// Load a binary block at its recorded address plus the ROM's relocation
/// offset. Returns `false` if the block is not binary or does not fit.
pub fn bload(bus: &mut LvivBus, data: &[u8]) -> bool {
    if file_type(data) != Some(TYPE_BINARY) {
        return false;
    }
    match try_bload(bus, data) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("tape: BLOAD failed: {e}");
            false
        }
    }
}

fn try_bload(bus: &mut LvivBus, data: &[u8]) -> Result<()> {
    let offset = bus.read_word(BLOAD_OFFSET)?;
    let begin = word_at(data, 0x10)?.wrapping_add(offset);
    let end = word_at(data, 0x12)?.wrapping_add(offset);
    let start = word_at(data, 0x14)?;

    bus.transfer(NAME_BEGIN, NAME_END, data, NAME_OFFSET)?;
    bus.write_word(BLOAD_BEGIN, begin)?;
    bus.write_word(BLOAD_END, end)?;
    bus.write_word(BLOAD_START, start)?;
    bus.transfer(begin, end, data, 0x16)?;
    log::info!("tape: BLOAD {begin:#06X}-{end:#06X}, start {start:#06X}");
    Ok(())
}

/// Load a BASIC block at the program start pointer. Returns `false` if the
/// block is not BASIC or does not fit.
pub fn cload(bus: &mut LvivBus, data: &[u8]) -> bool {
    if file_type(data) != Some(TYPE_BASIC) {
        return false;
    }
    match try_cload(bus, data) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("tape: CLOAD failed: {e}");
            false
        }
    }
}

fn try_cload(bus: &mut LvivBus, data: &[u8]) -> Result<()> {
    let begin = bus.read_word(BASIC_BEGIN)?;
    // Program bytes run from 0x10 to the end of the file.
    let Some(length) = data.len().checked_sub(0x10).filter(|&n| n > 0) else {
        return Err(FormatError::Truncated {
            format: "tape",
            expected: 0x11,
            actual: data.len(),
        }
        .into());
    };
    let Ok(last) = u16::try_from(length - 1) else {
        return Err(FormatError::TooLarge {
            format: "tape",
            limit: 0x10 + 0x1_0000,
            actual: data.len(),
        }
        .into());
    };
    let end = begin.wrapping_add(last);

    bus.transfer(NAME_BEGIN, NAME_END, data, NAME_OFFSET)?;
    bus.write_word(BASIC_END, end)?;
    bus.transfer(begin, end, data, 0x10)?;
    log::info!("tape: CLOAD {begin:#06X}-{end:#06X}");
    Ok(())
}
