//! Headless capture: PNG screenshots and WAV audio dumps.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use crate::beeper::SAMPLE_RATE;
use crate::error::CaptureError;

/// Encode an ARGB32 framebuffer as an RGBA PNG.
pub fn encode_png(framebuffer: &[u32], width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;

        let mut rgba = Vec::with_capacity(framebuffer.len() * 4);
        for &pixel in framebuffer {
            rgba.push((pixel >> 16) as u8);
            rgba.push((pixel >> 8) as u8);
            rgba.push(pixel as u8);
            rgba.push(0xFF);
        }
        writer.write_image_data(&rgba)?;
    }
    Ok(bytes)
}

/// Write PNG bytes (from [`crate::Screen::capture_snapshot`]) to a file.
pub fn save_screenshot(png: &[u8], path: &Path) -> Result<(), CaptureError> {
    fs::write(path, png)?;
    log::info!("screenshot saved to {}", path.display());
    Ok(())
}

/// Save beeper output as a WAV file (mono, 44.1 kHz, 16-bit PCM).
pub fn save_audio(samples: &[f32], path: &Path) -> Result<(), CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = BufWriter::new(fs::File::create(path)?);
    let mut writer = hound::WavWriter::new(file, spec)?;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize()?;
    log::info!("{} samples saved to {}", samples.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trips_pixels() {
        let fb = [0xFFC0_0000, 0xFF00_C000, 0xFF00_00C0, 0xFFFF_FFFF];
        let bytes = encode_png(&fb, 2, 2).expect("encode");

        let decoder = png::Decoder::new(bytes.as_slice());
        let mut reader = decoder.read_info().expect("header");
        let mut buf = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut buf).expect("frame");
        assert_eq!(&buf[..8], &[0xC0, 0, 0, 0xFF, 0, 0xC0, 0, 0xFF]);
    }

    #[test]
    fn wav_has_one_sample_per_input() {
        let path = std::env::temp_dir().join(format!("emu-lviv-capture-{}.wav", std::process::id()));
        save_audio(&[0.0, 0.15, -1.5], &path).expect("write");

        let mut reader = hound::WavReader::open(&path).expect("open");
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2], -i16::MAX);
        let _ = fs::remove_file(&path);
    }
}
