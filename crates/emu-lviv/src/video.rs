//! Bitmap video.
//!
//! VRAM is 16K mapped linearly onto a 256×256 display: 64 bytes per line,
//! four pixels per byte. A pixel's 2-bit code takes its high bit from the
//! byte's high nibble and its low bit from the low nibble:
//!
//! ```text
//! bit   7  6  5  4  3  2  1  0
//! pixel 0h 1h 2h 3h 0l 1l 2l 3l
//! ```
//!
//! The palette register (port 0xC1, bits 0–6) turns each of the four codes
//! into one of eight RGB colours through a fixed set of XOR rules.
//!
//! Rendering keeps a shadow copy of VRAM and only recomputes bytes that
//! changed since the previous frame, as long as the palette is unchanged.

use crate::capture;
use crate::error::Result;
use crate::io::{IoPorts, PALETTE_PORT};

pub const WIDTH: u32 = 256;
pub const HEIGHT: u32 = 256;
const VRAM_SIZE: usize = 0x4000;

const BLUE: u8 = 1;
const GREEN: u8 = 2;
const RED: u8 = 4;

/// Channel levels per colour index (0x00, 0xC0, or 0xFF for white).
const LUT_R: [u32; 8] = [0, 0, 0, 0, 0xC0, 0xC0, 0xC0, 0xFF];
const LUT_G: [u32; 8] = [0, 0, 0xC0, 0xC0, 0, 0, 0xC0, 0xFF];
const LUT_B: [u32; 8] = [0, 0xC0, 0, 0xC0, 0, 0xC0, 0, 0xFF];

/// Expand a VRAM byte to four 2-bit pixel codes, pixel 0 in bits 6–7.
const fn decode_byte(byte: u8) -> u8 {
    let mut packed: u8 = 0;
    let mut k: u32 = 0;
    while k < 4 {
        let hi = (byte >> (7 - k)) & 1;
        let lo = (byte >> (3 - k)) & 1;
        packed |= ((hi << 1) | lo) << (6 - 2 * k);
        k += 1;
    }
    packed
}

const PIXEL_TABLE: [u8; 256] = {
    let mut table = [0; 256];
    let mut byte = 0;
    while byte < 256 {
        table[byte] = decode_byte(byte as u8);
        byte += 1;
    }
    table
};

/// Colour index (bit 0 blue, bit 1 green, bit 2 red) of pixel `code` under
/// `palette`.
#[must_use]
pub const fn color_index(code: u8, palette: u8) -> u8 {
    let mut index = 0;
    if palette & 0x40 != 0 {
        index ^= BLUE;
    }
    if palette & 0x20 != 0 {
        index ^= GREEN;
    }
    if palette & 0x10 != 0 {
        index ^= RED;
    }
    match code & 3 {
        0 => {
            if palette & 0x08 == 0 {
                index ^= RED;
            }
            if palette & 0x04 == 0 {
                index ^= BLUE;
            }
        }
        1 => {
            index ^= BLUE;
            if palette & 0x01 == 0 {
                index ^= RED;
            }
        }
        2 => index ^= GREEN,
        _ => {
            index ^= RED;
            if palette & 0x02 == 0 {
                index ^= GREEN;
            }
        }
    }
    index
}

/// ARGB32 colour for a colour index.
#[must_use]
pub const fn argb(index: u8) -> u32 {
    let i = index as usize & 7;
    0xFF00_0000 | (LUT_R[i] << 16) | (LUT_G[i] << 8) | LUT_B[i]
}

/// ARGB32 grey for a colour index: luma from which channels are lit.
#[must_use]
pub const fn grey(index: u8) -> u32 {
    let i = index as usize & 7;
    let mut sum = 0;
    if LUT_B[i] != 0 {
        sum += 0x1D;
    }
    if LUT_G[i] != 0 {
        sum += 0x96;
    }
    if LUT_R[i] != 0 {
        sum += 0x4C;
    }
    0xFF00_0000 | (sum << 16) | (sum << 8) | sum
}

/// Per-palette colours for the four pixel codes.
fn palette_table(map: fn(u8) -> u32) -> Vec<[u32; 4]> {
    (0..0x80u8)
        .map(|palette| std::array::from_fn(|code| map(color_index(code as u8, palette))))
        .collect()
}

/// Work done by one [`Screen::render`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// VRAM bytes whose pixels were recomputed.
    pub recomputed: usize,
}

/// Video state and framebuffer.
pub struct Screen {
    framebuffer: Vec<u32>,
    colors: Vec<[u32; 4]>,
    greys: Vec<[u32; 4]>,
    cache: Box<[u8]>,
    cache_valid: bool,
    cache_palette: Option<u8>,
    color_mode: bool,
}

impl Screen {
    #[must_use]
    pub fn new(color_mode: bool) -> Self {
        Self {
            framebuffer: vec![0xFF00_0000; (WIDTH * HEIGHT) as usize],
            colors: palette_table(argb),
            greys: palette_table(grey),
            cache: vec![0; VRAM_SIZE].into_boxed_slice(),
            cache_valid: false,
            cache_palette: None,
            color_mode,
        }
    }

    /// Draw VRAM into the framebuffer with the given palette register.
    /// Bit 7 of `palette` is ignored.
    pub fn render(&mut self, vram: &[u8], palette: u8) -> RenderStats {
        let palette = palette & 0x7F;
        let reuse = self.cache_valid && self.cache_palette == Some(palette);
        let table = if self.color_mode {
            &self.colors[usize::from(palette)]
        } else {
            &self.greys[usize::from(palette)]
        };

        let mut stats = RenderStats::default();
        for (i, (&byte, cached)) in vram.iter().zip(self.cache.iter_mut()).enumerate() {
            if !(reuse && byte == *cached) {
                let packed = PIXEL_TABLE[usize::from(byte)];
                let pixels = &mut self.framebuffer[i * 4..i * 4 + 4];
                for (k, pixel) in pixels.iter_mut().enumerate() {
                    *pixel = table[usize::from((packed >> (6 - 2 * k)) & 3)];
                }
                stats.recomputed += 1;
            }
            *cached = byte;
        }

        self.cache_valid = true;
        self.cache_palette = Some(palette);
        stats
    }

    /// Step the palette register by `step`, wrapping within bits 0–6.
    /// Bit 7 (beeper enable) is preserved.
    pub fn shift_palette(io: &mut IoPorts, step: i8) {
        let palette = io.palette();
        let shifted = (palette & 0x80) | (palette.wrapping_add(step as u8) & 0x7F);
        io.output(PALETTE_PORT, shifted);
    }

    pub fn set_color_mode(&mut self, color: bool) {
        if self.color_mode != color {
            self.color_mode = color;
            self.invalidate_cache();
        }
    }

    pub fn toggle_color_mode(&mut self) {
        self.set_color_mode(!self.color_mode);
    }

    #[must_use]
    pub fn color_mode(&self) -> bool {
        self.color_mode
    }

    pub fn invalidate_cache(&mut self) {
        self.cache_valid = false;
    }

    pub fn restart(&mut self) {
        self.invalidate_cache();
        self.cache_palette = None;
    }

    /// Framebuffer as ARGB32, row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Encode the framebuffer as PNG.
    pub fn capture_snapshot(&self) -> Result<Vec<u8>> {
        Ok(capture::encode_png(&self.framebuffer, WIDTH, HEIGHT)?)
    }
}
