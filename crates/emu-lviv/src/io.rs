//! I/O port space.
//!
//! Two 8255 PPIs sit at 0xC0–0xC3 and 0xD0–0xD3, with the extended mode
//! register at 0xF0 on modified boards. Address decoding is incomplete:
//! only the bits in the decoding mask are compared, so every port number
//! folds onto `0xC0 + (port & mask)`.
//!
//! | Port | Function |
//! |------|----------|
//! | 0xC0 | printer data |
//! | 0xC1 | palette (bit 7 enables the beeper) |
//! | 0xC2 | media: bit 0 beeper, bit 1 VRAM status (0 = paged in), bit 2 printer strobe, bit 4 tape in, bit 6 printer busy |
//! | 0xC3 | PPI 1 control word |
//! | 0xD0 | keyboard column select (main block) |
//! | 0xD1 | keyboard rows (main block) |
//! | 0xD2 | keyboard select/rows (aux block) |
//! | 0xD3 | PPI 2 control word |
//! | 0xF0 | extended mode: bit 2 paging, bit 3 high resolution, bit 4 blank, bit 5 interrupt |

use intel_8255::{ControlWord, Register};

use crate::beeper::Beeper;
use crate::config::{BeeperConfig, ControlWordRead, IoConfig};
use crate::keyboard::{self, Keyboard};
use crate::memory::PageMapping;

pub const PALETTE_PORT: u8 = 0xC1;
pub const MEDIA_PORT: u8 = 0xC2;
pub const EXTENDED_MODE_PORT: u8 = 0xF0;

/// Palette port bit that lets media port writes reach the beeper.
pub const BEEPER_MODE_BIT: u8 = 0x80;
pub const BEEPER_BIT: u8 = 0x01;
/// Media port bit; clear when VRAM is paged into the address space.
pub const VRAM_STATUS_BIT: u8 = 0x02;

/// Palette register after reset.
pub const PALETTE_RESET: u8 = 0x8F;

const MASK_EXTENDED: u8 = 0x33;
const MASK_STANDARD: u8 = 0x13;

/// The port register file plus the devices wired to it.
#[derive(Debug, Clone)]
pub struct IoPorts {
    ports: [u8; 256],
    mask: u8,
    control_word_read: ControlWordRead,
    fix_control: bool,
    pub beeper: Beeper,
    pub keyboard: Keyboard,
}

impl IoPorts {
    #[must_use]
    pub fn new(config: &IoConfig, beeper_config: &BeeperConfig, beeper: Beeper, keyboard: Keyboard) -> Self {
        let mut io = Self {
            ports: [0; 256],
            mask: if config.extended_features { MASK_EXTENDED } else { MASK_STANDARD },
            control_word_read: config.control_word_read,
            fix_control: beeper_config.fix_control,
            beeper,
            keyboard,
        };
        io.restart();
        io
    }

    /// Register a port number decodes to.
    #[must_use]
    pub fn canonical(&self, port: u8) -> u8 {
        0xC0 + (port & self.mask)
    }

    #[must_use]
    pub fn decoding_mask(&self) -> u8 {
        self.mask
    }

    /// CPU `IN`. Keyboard row ports are rescanned and latched.
    pub fn input(&mut self, port: u8) -> u8 {
        let port = self.canonical(port);
        match port {
            0xD1 => {
                let value = self.keyboard.get(self.ports[0xD0], keyboard::PORT_MAIN);
                self.ports[usize::from(port)] = value;
                value
            }
            0xD2 => {
                let value = self.keyboard.get(self.ports[0xD2], keyboard::PORT_AUX);
                self.ports[usize::from(port)] = value;
                value
            }
            _ => self.read_register(port),
        }
    }

    /// Side-effect-free view of what `input` would return.
    #[must_use]
    pub fn peek(&self, port: u8) -> u8 {
        let port = self.canonical(port);
        match port {
            0xD1 => self.keyboard.get(self.ports[0xD0], keyboard::PORT_MAIN),
            0xD2 => self.keyboard.get(self.ports[0xD2], keyboard::PORT_AUX),
            _ => self.read_register(port),
        }
    }

    fn read_register(&self, port: u8) -> u8 {
        if Register::from_address(port) == Register::Control && self.control_word_read == ControlWordRead::Zero {
            return 0;
        }
        self.ports[usize::from(port)]
    }

    /// CPU `OUT`.
    pub fn output(&mut self, port: u8, value: u8) {
        let port = self.canonical(port);

        if Register::from_address(port) == Register::Control {
            if let ControlWord::BitSetReset(command) = ControlWord::decode(value) {
                let target = port - 1;
                let current = self.input(target);
                self.output(target, command.apply(current));
            }
        }

        if port == MEDIA_PORT && (self.ports[usize::from(PALETTE_PORT)] & BEEPER_MODE_BIT != 0 || self.fix_control) {
            self.beeper.process(value & BEEPER_BIT);
        }

        self.ports[usize::from(port)] = value;
    }

    /// `OUT` for replaying a saved port image. Control registers take the
    /// byte as stored: a saved 0 is a register value, not a bit reset.
    pub fn replay(&mut self, port: u8, value: u8) {
        let port = self.canonical(port);
        if Register::from_address(port) == Register::Control {
            self.ports[usize::from(port)] = value;
        } else {
            self.output(port, value);
        }
    }

    /// Raw register contents, bypassing decoding and side effects.
    #[must_use]
    pub fn register(&self, port: u8) -> u8 {
        self.ports[usize::from(port)]
    }

    /// Store a register directly, without side effects.
    pub fn set_register(&mut self, port: u8, value: u8) {
        self.ports[usize::from(port)] = value;
    }

    #[must_use]
    pub fn palette(&self) -> u8 {
        self.ports[usize::from(PALETTE_PORT)]
    }

    /// Port state consulted by the memory window routing.
    #[must_use]
    pub fn mapping(&self) -> PageMapping {
        PageMapping {
            vram_mapped: self.ports[usize::from(MEDIA_PORT)] & VRAM_STATUS_BIT == 0,
            extended_mode: self.ports[usize::from(EXTENDED_MODE_PORT)],
        }
    }

    /// All 256 ports as `input` would read them.
    pub fn get_state(&mut self) -> [u8; 256] {
        let mut state = [0; 256];
        for (port, slot) in (0..=255u8).zip(state.iter_mut()) {
            *slot = self.input(port);
        }
        state
    }

    /// Zero every register, then load the palette and media reset values.
    pub fn restart(&mut self) {
        self.ports = [0; 256];
        self.ports[usize::from(PALETTE_PORT)] = PALETTE_RESET;
        self.ports[usize::from(MEDIA_PORT)] = 0xFF;
    }
}
