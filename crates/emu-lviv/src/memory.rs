//! Banked memory.
//!
//! The i8080 sees a 64K address space split into four 16K windows. Each
//! window is backed by one [`MemoryBank`]; which bank depends on the media
//! port (VRAM paged in or not) and, on the 144K/256K maps, the extended
//! mode port.
//!
//! Bank layout (index: role, window):
//!
//! | index | role | window |
//! |-------|------|--------|
//! | 0–2   | RAM  | 0–2    |
//! | 3     | ROM  | 3      |
//! | 4     | VRAM | 1      |
//! | 5–8   | RAM  | 3 (144K and 256K, extension bank 0) |
//! | 9–20  | RAM  | 3 (256K only, extension banks 1–3) |

use crate::config::{MemoryConfig, MemoryMap};
use crate::error::{AccessFault, AccessKind, RangeFault, Result};

/// Size of one bank.
pub const BANK_SIZE: usize = 0x4000;

/// What a bank is wired as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankRole {
    Rom,
    Vram,
    Ram,
}

/// A single 16K page.
///
/// Addresses are masked to the bank's 14-bit window, so any 16-bit address
/// can be passed in.
#[derive(Debug, Clone)]
pub struct MemoryBank {
    begin: u16,
    role: BankRole,
    readable: bool,
    writable: bool,
    strict: bool,
    data: Box<[u8]>,
}

impl MemoryBank {
    #[must_use]
    pub fn new(begin: u16, role: BankRole, strict: bool) -> Self {
        Self {
            begin,
            role,
            readable: true,
            writable: role != BankRole::Rom,
            strict,
            data: vec![0; BANK_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn begin(&self) -> u16 {
        self.begin
    }

    #[must_use]
    pub fn role(&self) -> BankRole {
        self.role
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn set_readable(&mut self, readable: bool) {
        self.readable = readable;
    }

    pub fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    /// Read a byte. A non-readable bank faults in strict mode; otherwise the
    /// stored byte is returned after logging.
    pub fn read(&self, address: u16) -> std::result::Result<u8, AccessFault> {
        if !self.readable {
            self.refuse(AccessKind::Read, address)?;
        }
        Ok(self.peek(address))
    }

    /// Write a byte. Writes to a non-writable bank fault in strict mode and
    /// are dropped otherwise.
    pub fn write(&mut self, address: u16, value: u8) -> std::result::Result<(), AccessFault> {
        if self.writable {
            self.data[Self::offset(address)] = value;
            Ok(())
        } else {
            self.refuse(AccessKind::Write, address)
        }
    }

    /// Program a ROM byte, bypassing write protection. Only ROM banks accept
    /// burns.
    pub fn burn(&mut self, address: u16, value: u8) -> std::result::Result<(), AccessFault> {
        match self.role {
            BankRole::Rom => {
                self.data[Self::offset(address)] = value;
                Ok(())
            }
            BankRole::Vram | BankRole::Ram => self.refuse(AccessKind::Burn, address),
        }
    }

    /// Read without access checks.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.data[Self::offset(address)]
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn restart(&mut self) {
        self.data.fill(0);
    }

    fn offset(address: u16) -> usize {
        usize::from(address) & (BANK_SIZE - 1)
    }

    fn refuse(&self, kind: AccessKind, address: u16) -> std::result::Result<(), AccessFault> {
        let fault = AccessFault { kind, address };
        if self.strict {
            Err(fault)
        } else {
            log::warn!("memory: {fault}");
            Ok(())
        }
    }
}

/// Port state that decides window routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMapping {
    /// Media port bit 1 is clear: VRAM is paged into its window.
    pub vram_mapped: bool,
    /// Raw extended mode register (port 0xF0).
    pub extended_mode: u8,
}

/// Extended mode bit enabling window 3 extension pages.
const EXTENDED_PAGING_BIT: u8 = 0x04;

/// Where a block transfer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTarget {
    /// Through the address space as currently mapped.
    Mapped(PageMapping),
    /// Straight into one bank.
    Bank(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Write,
    Burn,
}

/// The full bank set and window routing.
#[derive(Debug, Clone)]
pub struct Memory {
    map: MemoryMap,
    fix_vram: bool,
    banks: Vec<MemoryBank>,
    rom_index: usize,
    vram_index: usize,
    ext_index: usize,
    vram_window: u8,
}

impl Memory {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        let strict = config.strict_mode;
        let mut banks = vec![
            MemoryBank::new(0x0000, BankRole::Ram, strict),
            MemoryBank::new(0x4000, BankRole::Ram, strict),
            MemoryBank::new(0x8000, BankRole::Ram, strict),
            MemoryBank::new(0xC000, BankRole::Rom, strict),
            MemoryBank::new(0x4000, BankRole::Vram, strict),
        ];
        while banks.len() < config.map.bank_count() {
            banks.push(MemoryBank::new(0xC000, BankRole::Ram, strict));
        }

        let rom_index = banks.iter().position(|b| b.role == BankRole::Rom).unwrap_or(3);
        let vram_index = banks.iter().position(|b| b.role == BankRole::Vram).unwrap_or(4);
        let vram_window = ((banks[vram_index].begin & 0xC000) >> 14) as u8;

        log::debug!(
            "memory: {}K map, {} banks, strict={strict}",
            config.map.kilobytes(),
            banks.len()
        );

        Self {
            map: config.map,
            fix_vram: config.fix_vram,
            banks,
            rom_index,
            vram_index,
            ext_index: vram_index + 1,
            vram_window,
        }
    }

    #[must_use]
    pub fn map(&self) -> MemoryMap {
        self.map
    }

    #[must_use]
    pub fn banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    #[must_use]
    pub fn rom_index(&self) -> usize {
        self.rom_index
    }

    #[must_use]
    pub fn vram_index(&self) -> usize {
        self.vram_index
    }

    #[must_use]
    pub fn rom_bank(&self) -> &MemoryBank {
        &self.banks[self.rom_index]
    }

    #[must_use]
    pub fn vram_bank(&self) -> &MemoryBank {
        &self.banks[self.vram_index]
    }

    /// Bank backing `address` under the given port state.
    #[must_use]
    pub fn page_index(&self, address: u16, mapping: PageMapping) -> usize {
        let window = ((address & 0xC000) >> 14) as u8;

        if window == self.vram_window && mapping.vram_mapped {
            return self.vram_index;
        }
        if window == 0 && mapping.vram_mapped {
            // Quirk of the serial board: paging VRAM in also moves window 0
            // onto bank 2 unless the board has been modified.
            return if self.fix_vram { 0 } else { 2 };
        }
        if window == 3 && self.map.is_extended() && mapping.extended_mode & EXTENDED_PAGING_BIT != 0 {
            let bank = if self.map == MemoryMap::Kb256 {
                usize::from(mapping.extended_mode >> 6)
            } else {
                0
            };
            return self.ext_index + (bank << 2) + usize::from(mapping.extended_mode & 0x03);
        }
        usize::from(window)
    }

    pub fn read(&self, address: u16, mapping: PageMapping) -> std::result::Result<u8, AccessFault> {
        self.banks[self.page_index(address, mapping)].read(address)
    }

    /// Read through the current mapping without access checks.
    #[must_use]
    pub fn peek(&self, address: u16, mapping: PageMapping) -> u8 {
        self.banks[self.page_index(address, mapping)].peek(address)
    }

    pub fn write(&mut self, address: u16, value: u8, mapping: PageMapping) -> std::result::Result<(), AccessFault> {
        let index = self.page_index(address, mapping);
        self.banks[index].write(address, value)
    }

    /// Copy `source[offset..]` into `begin..=end`, returning the offset just
    /// past the last byte consumed.
    ///
    /// # Errors
    ///
    /// [`RangeFault`] when `begin > end` or the source is too short; any
    /// [`AccessFault`] raised by the target under strict mode.
    pub fn transfer(
        &mut self,
        begin: u16,
        end: u16,
        source: &[u8],
        offset: usize,
        target: TransferTarget,
        mode: TransferMode,
    ) -> Result<usize> {
        if begin > end {
            return Err(RangeFault::InvalidBounds { begin, end }.into());
        }
        let needed = usize::from(end - begin) + 1;
        let Some(bytes) = source.get(offset..offset.saturating_add(needed)) else {
            return Err(RangeFault::SourceExhausted {
                offset,
                needed,
                available: source.len(),
            }
            .into());
        };

        for (address, &value) in (begin..=end).zip(bytes) {
            let bank = match target {
                TransferTarget::Mapped(mapping) => self.page_index(address, mapping),
                TransferTarget::Bank(index) => index,
            };
            let bank = &mut self.banks[bank];
            match mode {
                TransferMode::Write => bank.write(address, value)?,
                TransferMode::Burn => bank.burn(address, value)?,
            }
        }
        Ok(offset + needed)
    }

    /// Burn a ROM image into the ROM bank starting at 0xC000.
    pub fn burn_rom(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > BANK_SIZE {
            return Err(crate::error::ConfigError::RomTooLarge(image.len()).into());
        }
        if image.is_empty() {
            return Ok(());
        }
        let end = 0xC000 + (image.len() - 1) as u16;
        self.transfer(0xC000, end, image, 0, TransferTarget::Bank(self.rom_index), TransferMode::Burn)?;
        Ok(())
    }

    /// Linear image of the base layout: banks 0–3 as windows 0–3
    /// (0x0000–0xFFFF, VRAM not paged in), then the 16K VRAM bank.
    ///
    /// Extension pages of the 144K/256K maps are not part of the image.
    #[must_use]
    pub fn get_state(&self) -> Vec<u8> {
        let mut state = Vec::with_capacity(5 * BANK_SIZE);
        for window in 0..4 {
            state.extend_from_slice(self.banks[window].data());
        }
        state.extend_from_slice(self.vram_bank().data());
        state
    }

    pub fn restart(&mut self) {
        for bank in &mut self.banks {
            bank.restart();
        }
    }
}
