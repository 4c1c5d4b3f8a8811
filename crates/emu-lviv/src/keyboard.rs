//! Lviv keyboard matrix.
//!
//! Two matrices are scanned through the second 8255:
//!
//! | Port | Columns | Column select       | Rows read         |
//! |------|---------|---------------------|-------------------|
//! | 0xD0 | 8       | port 0xD0, bits 0–7 | port 0xD1         |
//! | 0xD2 | 4       | port 0xD2, bits 0–3 | port 0xD2, bits 4–7 |
//!
//! Column selects and rows are active low. A read ORs the row bits of
//! every selected column and inverts the result. On 0xD2 the low nibble
//! echoes the (inverted) column select.
//!
//! Host-side shortcuts that act on the emulator rather than the machine
//! (pause, screenshot, reset...) are latched as a [`SpecialKey`] and
//! consumed by the frame scheduler.

/// Matrix port for the main key block.
pub const PORT_MAIN: u8 = 0xD0;
/// Matrix port for the cursor/function block.
pub const PORT_AUX: u8 = 0xD2;

/// An emulator shortcut, consumed once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    Pause,
    Screenshot,
    Reset,
    /// Toggle colour/greyscale rendering.
    Color,
    PaletteUp,
    PaletteDown,
}

/// Keyboard state.
///
/// Column bytes store 1 = pressed; [`Keyboard::get`] inverts for the port.
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    main: [u8; 8],
    aux: [u8; 4],
    special: Option<SpecialKey>,
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a key. Out-of-range positions are ignored.
    pub fn set_key(&mut self, port: u8, column: usize, row: u8, pressed: bool) {
        let cell = match port {
            PORT_MAIN if row < 8 => self.main.get_mut(column),
            PORT_AUX if row < 4 => self.aux.get_mut(column),
            _ => None,
        };
        if let Some(cell) = cell {
            if pressed {
                *cell |= 1 << row;
            } else {
                *cell &= !(1 << row);
            }
        }
    }

    /// Scan result for `port` given the column select currently latched in
    /// `mask` (active low).
    #[must_use]
    pub fn get(&self, mask: u8, port: u8) -> u8 {
        let select = !mask;
        let scan = |columns: &[u8]| {
            columns
                .iter()
                .enumerate()
                .filter(|&(i, _)| select & (1 << i) != 0)
                .fold(0u8, |acc, (_, &rows)| acc | rows)
        };

        match port {
            PORT_MAIN => !scan(&self.main),
            PORT_AUX => !((scan(&self.aux) << 4) | (select & 0x0F)),
            _ => 0xFF,
        }
    }

    /// Latch a shortcut, replacing any not yet consumed.
    pub fn press_special(&mut self, key: SpecialKey) {
        self.special = Some(key);
    }

    /// Take the pending shortcut.
    pub fn take_special(&mut self) -> Option<SpecialKey> {
        self.special.take()
    }

    #[must_use]
    pub fn pending_special(&self) -> Option<SpecialKey> {
        self.special
    }

    /// Release every key and drop any pending shortcut.
    pub fn reset(&mut self) {
        self.main = [0; 8];
        self.aux = [0; 4];
        self.special = None;
    }
}
