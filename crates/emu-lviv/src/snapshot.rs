//! Snapshot files.
//!
//! Two layouts are supported, told apart by byte 0x09:
//!
//! Native (`LVOV/DUMP/2.0/H+\0`, byte 0x09 = 0x2F), 82 205 bytes:
//!
//! | Offset  | Size   | Content |
//! |---------|--------|---------|
//! | 0x00000 | 17     | header |
//! | 0x00011 | 0xC000 | RAM 0x0000–0xBFFF |
//! | 0x0C011 | 0x4000 | ROM 0xC000–0xFFFF |
//! | 0x10011 | 0x4000 | VRAM |
//! | 0x14011 | 256    | ports 0x00–0xFF as read back through `IN` |
//! | 0x14111 | 12     | B C D E H L A F, SP (le), PC (le) |
//!
//! Interchange (`Emulator 3000`, byte 0x09 = 0x33), 0x142C0 bytes:
//! registers at fixed offsets in the 0x240-byte header, then RAM and ROM,
//! a 0x29-byte gap, VRAM, and a block of 8255 registers.
//!
//! Decoding validates the whole file before anything is returned, so a
//! bad file never reaches the machine.

use crate::cpu::Registers;
use crate::error::{FormatError, RangeFault};
use crate::memory::BANK_SIZE;

pub const NATIVE_HEADER: &[u8; 17] = b"LVOV/DUMP/2.0/H+\0";
pub const INTERCHANGE_HEADER: &[u8; 13] = b"Emulator 3000";

/// File type byte (offset 0x09) of each format.
pub const NATIVE_TYPE: u8 = 0x2F;
pub const INTERCHANGE_TYPE: u8 = 0x33;

const RAM_SIZE: usize = 3 * BANK_SIZE;

const NATIVE_MEMORY: usize = NATIVE_HEADER.len();
const NATIVE_PORTS: usize = NATIVE_MEMORY + RAM_SIZE + 2 * BANK_SIZE;
const NATIVE_REGISTERS: usize = NATIVE_PORTS + 256;
pub const NATIVE_LEN: usize = NATIVE_REGISTERS + 12;

const INTERCHANGE_MEMORY: usize = 0x240;
const INTERCHANGE_GAP: usize = 0x29;
const INTERCHANGE_VRAM: usize = INTERCHANGE_MEMORY + RAM_SIZE + BANK_SIZE + INTERCHANGE_GAP;
const INTERCHANGE_PORTS: usize = INTERCHANGE_VRAM + BANK_SIZE;
pub const INTERCHANGE_LEN: usize = INTERCHANGE_PORTS + 0x57;

/// Port → offset within the interchange port block.
const INTERCHANGE_PORT_MAP: [(u8, usize); 8] = [
    (0xC0, 0x22),
    (0xC1, 0x26),
    (0xC2, 0x2A),
    (0xC3, 0x34),
    (0xD0, 0x44),
    (0xD1, 0x48),
    (0xD2, 0x4C),
    (0xD3, 0x56),
];

/// Ports restored from an interchange file. Control words are write-only
/// and not restored.
pub const INTERCHANGE_RESTORED_PORTS: [u8; 6] = [0xC0, 0xC1, 0xC2, 0xD0, 0xD1, 0xD2];

const REG_A: usize = 0x1BA;
const REG_F: usize = 0x1BE;
const REG_B: usize = 0x1C2;
const REG_C: usize = 0x1C6;
const REG_D: usize = 0x1CA;
const REG_E: usize = 0x1CE;
const REG_H: usize = 0x1D2;
const REG_L: usize = 0x1D6;
const REG_SP: usize = 0x1DB;
const REG_PC: usize = 0x1E1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Native,
    Interchange,
}

impl SnapshotFormat {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SnapshotFormat::Native => "native snapshot",
            SnapshotFormat::Interchange => "interchange snapshot",
        }
    }

    /// Format of a file from its type byte.
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data.get(0x09) {
            Some(&NATIVE_TYPE) => Some(SnapshotFormat::Native),
            Some(&INTERCHANGE_TYPE) => Some(SnapshotFormat::Interchange),
            _ => None,
        }
    }
}

/// A decoded machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub format: SnapshotFormat,
    /// 0x0000–0xBFFF.
    pub ram: Vec<u8>,
    pub rom: Vec<u8>,
    pub vram: Vec<u8>,
    /// Port image indexed by port number. Native files replay all 256
    /// through `OUT`; interchange files set
    /// [`INTERCHANGE_RESTORED_PORTS`] directly.
    pub ports: Box<[u8; 256]>,
    pub registers: Registers,
}

impl Snapshot {
    /// Decode either format.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        match SnapshotFormat::detect(data) {
            Some(SnapshotFormat::Native) => Self::decode_native(data),
            Some(SnapshotFormat::Interchange) => Self::decode_interchange(data),
            None => Err(FormatError::UnknownFileType(data.get(0x09).copied().unwrap_or(0))),
        }
    }

    pub fn decode_native(data: &[u8]) -> Result<Self, FormatError> {
        let format = SnapshotFormat::Native;
        // The trailing NUL is not checked.
        check(data, &NATIVE_HEADER[..16], NATIVE_LEN, format)?;

        let ram = data[NATIVE_MEMORY..NATIVE_MEMORY + RAM_SIZE].to_vec();
        let rom_at = NATIVE_MEMORY + RAM_SIZE;
        let rom = data[rom_at..rom_at + BANK_SIZE].to_vec();
        let vram = data[rom_at + BANK_SIZE..NATIVE_PORTS].to_vec();

        let mut ports = Box::new([0; 256]);
        ports.copy_from_slice(&data[NATIVE_PORTS..NATIVE_REGISTERS]);

        let r = &data[NATIVE_REGISTERS..NATIVE_LEN];
        let registers = Registers {
            b: r[0],
            c: r[1],
            d: r[2],
            e: r[3],
            h: r[4],
            l: r[5],
            a: r[6],
            f: r[7],
            sp: u16::from_le_bytes([r[8], r[9]]),
            pc: u16::from_le_bytes([r[10], r[11]]),
        };

        Ok(Self {
            format,
            ram,
            rom,
            vram,
            ports,
            registers,
        })
    }

    pub fn decode_interchange(data: &[u8]) -> Result<Self, FormatError> {
        let format = SnapshotFormat::Interchange;
        check(data, INTERCHANGE_HEADER, INTERCHANGE_LEN, format)?;

        let ram = data[INTERCHANGE_MEMORY..INTERCHANGE_MEMORY + RAM_SIZE].to_vec();
        let rom_at = INTERCHANGE_MEMORY + RAM_SIZE;
        let rom = data[rom_at..rom_at + BANK_SIZE].to_vec();
        let vram = data[INTERCHANGE_VRAM..INTERCHANGE_PORTS].to_vec();

        let mut ports = Box::new([0; 256]);
        for (port, offset) in INTERCHANGE_PORT_MAP {
            ports[usize::from(port)] = data[INTERCHANGE_PORTS + offset];
        }

        let word = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
        let registers = Registers {
            a: data[REG_A],
            f: data[REG_F],
            b: data[REG_B],
            c: data[REG_C],
            d: data[REG_D],
            e: data[REG_E],
            h: data[REG_H],
            l: data[REG_L],
            sp: word(REG_SP),
            pc: word(REG_PC),
        };

        Ok(Self {
            format,
            ram,
            rom,
            vram,
            ports,
            registers,
        })
    }

    /// Check that every memory image is at least as long as the region it
    /// fills. Decoded snapshots always pass; hand-built ones may not.
    pub fn validate(&self) -> Result<(), RangeFault> {
        for (image, needed) in [(&self.ram, RAM_SIZE), (&self.rom, BANK_SIZE), (&self.vram, BANK_SIZE)] {
            if image.len() < needed {
                return Err(RangeFault::SourceExhausted {
                    offset: 0,
                    needed,
                    available: image.len(),
                });
            }
        }
        Ok(())
    }

    /// Encode in this snapshot's format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self.format {
            SnapshotFormat::Native => self.encode_native(),
            SnapshotFormat::Interchange => self.encode_interchange(),
        }
    }

    fn encode_native(&self) -> Vec<u8> {
        let r = &self.registers;
        let mut out = Vec::with_capacity(NATIVE_LEN);
        out.extend_from_slice(NATIVE_HEADER);
        out.extend_from_slice(&self.ram);
        out.extend_from_slice(&self.rom);
        out.extend_from_slice(&self.vram);
        out.extend_from_slice(&self.ports[..]);
        out.extend_from_slice(&[r.b, r.c, r.d, r.e, r.h, r.l, r.a, r.f]);
        out.extend_from_slice(&r.sp.to_le_bytes());
        out.extend_from_slice(&r.pc.to_le_bytes());
        out
    }

    fn encode_interchange(&self) -> Vec<u8> {
        let r = &self.registers;
        let mut out = vec![0; INTERCHANGE_LEN];
        out[..INTERCHANGE_HEADER.len()].copy_from_slice(INTERCHANGE_HEADER);

        for (at, value) in [
            (REG_A, r.a),
            (REG_F, r.f),
            (REG_B, r.b),
            (REG_C, r.c),
            (REG_D, r.d),
            (REG_E, r.e),
            (REG_H, r.h),
            (REG_L, r.l),
        ] {
            out[at] = value;
        }
        out[REG_SP..REG_SP + 2].copy_from_slice(&r.sp.to_le_bytes());
        out[REG_PC..REG_PC + 2].copy_from_slice(&r.pc.to_le_bytes());

        let rom_at = INTERCHANGE_MEMORY + RAM_SIZE;
        out[INTERCHANGE_MEMORY..rom_at].copy_from_slice(&self.ram);
        out[rom_at..rom_at + BANK_SIZE].copy_from_slice(&self.rom);
        out[INTERCHANGE_VRAM..INTERCHANGE_PORTS].copy_from_slice(&self.vram);
        for (port, offset) in INTERCHANGE_PORT_MAP {
            out[INTERCHANGE_PORTS + offset] = self.ports[usize::from(port)];
        }
        out
    }
}

fn check(data: &[u8], header: &[u8], len: usize, format: SnapshotFormat) -> Result<(), FormatError> {
    if !data.starts_with(header) {
        return Err(FormatError::BadHeader { format: format.name() });
    }
    if data.len() < len {
        return Err(FormatError::Truncated {
            format: format.name(),
            expected: len,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot(format: SnapshotFormat) -> Snapshot {
        let mut ports = Box::new([0; 256]);
        ports[0xC1] = 0x8F;
        ports[0xC2] = 0xFC;
        ports[0xD0] = 0x7F;
        Snapshot {
            format,
            ram: (0..RAM_SIZE).map(|i| (i % 251) as u8).collect(),
            rom: vec![0xC3; BANK_SIZE],
            vram: (0..BANK_SIZE).map(|i| (i >> 6) as u8).collect(),
            ports,
            registers: Registers {
                a: 1,
                f: 2,
                b: 3,
                c: 4,
                d: 5,
                e: 6,
                h: 7,
                l: 8,
                sp: 0xBEEF,
                pc: 0xC000,
            },
        }
    }

    #[test]
    fn layout_sizes() {
        assert_eq!(NATIVE_LEN, 82_205);
        assert_eq!(INTERCHANGE_VRAM, 0x10269);
        assert_eq!(INTERCHANGE_LEN, 0x142C0);
        assert_eq!(NATIVE_HEADER[0x09], NATIVE_TYPE);
        assert_eq!(INTERCHANGE_HEADER[0x09], INTERCHANGE_TYPE);
    }

    #[test]
    fn native_register_bytes() {
        let bytes = make_snapshot(SnapshotFormat::Native).encode();
        assert_eq!(bytes.len(), NATIVE_LEN);
        assert_eq!(
            &bytes[NATIVE_REGISTERS..],
            &[3, 4, 5, 6, 7, 8, 1, 2, 0xEF, 0xBE, 0x00, 0xC0]
        );
    }

    #[test]
    fn both_formats_decode_what_they_encode() {
        for format in [SnapshotFormat::Native, SnapshotFormat::Interchange] {
            let snapshot = make_snapshot(format);
            assert_eq!(Snapshot::decode(&snapshot.encode()), Ok(snapshot));
        }
    }

    #[test]
    fn interchange_offsets() {
        let bytes = make_snapshot(SnapshotFormat::Interchange).encode();
        assert_eq!(bytes[REG_A], 1);
        assert_eq!(bytes[REG_L], 8);
        assert_eq!(&bytes[REG_PC..REG_PC + 2], &[0x00, 0xC0]);
        assert_eq!(bytes[INTERCHANGE_PORTS + 0x26], 0x8F);
        assert_eq!(bytes[INTERCHANGE_VRAM + 64], 1);
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut bytes = make_snapshot(SnapshotFormat::Native).encode();
        bytes[0] = b'X';
        assert_eq!(
            Snapshot::decode(&bytes),
            Err(FormatError::BadHeader {
                format: "native snapshot"
            })
        );
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = make_snapshot(SnapshotFormat::Interchange).encode();
        let err = Snapshot::decode(&bytes[..0x1000]).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { expected: INTERCHANGE_LEN, .. }));
    }

    #[test]
    fn short_images_fail_validation() {
        let mut snapshot = make_snapshot(SnapshotFormat::Native);
        assert_eq!(snapshot.validate(), Ok(()));
        snapshot.vram.truncate(0x100);
        assert_eq!(
            snapshot.validate(),
            Err(RangeFault::SourceExhausted {
                offset: 0,
                needed: BANK_SIZE,
                available: 0x100,
            })
        );
    }

    #[test]
    fn unknown_type_byte() {
        let mut bytes = vec![0; 16];
        bytes[9] = 0x42;
        assert_eq!(Snapshot::decode(&bytes), Err(FormatError::UnknownFileType(0x42)));
    }
}
