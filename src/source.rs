use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// Read-only supplier of packed 0xRRGGBB pixels
pub trait PixelSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Pixel at (x, y); callers stay within `width()` x `height()`
    fn pixel(&self, x: usize, y: usize) -> u32;
}

/// Row-major buffer of packed 0xRRGGBB pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Buffer filled with black
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        PixelBuffer {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Wrap existing pixels; `pixels.len()` must equal `width * height`
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(Error::BufferSize {
                expected: width * height,
                actual: pixels.len(),
            });
        }
        Ok(PixelBuffer { width, height, pixels })
    }

    /// Decode a PNG file into packed RGB pixels
    pub fn load_png<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(png::DecodingError::IoError)?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut data = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut data)?;

        let width = info.width as usize;
        let height = info.height as usize;
        let stride = info.line_size;
        let channels = info.color_type.samples();

        let mut pixels = Vec::with_capacity(width * height);
        for row in data.chunks(stride).take(height) {
            for px in row[..width * channels].chunks_exact(channels) {
                let (r, g, b) = match channels {
                    1 | 2 => (px[0], px[0], px[0]),
                    _ => (px[0], px[1], px[2]),
                };
                pixels.push(pack_rgb(r, g, b));
            }
        }

        debug!(
            "Loaded {} ({}x{}, {:?})",
            path.as_ref().display(),
            width,
            height,
            info.color_type
        );

        Ok(PixelBuffer { width, height, pixels })
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    pub fn set(&mut self, x: usize, y: usize, color: u32) {
        self.pixels[y * self.width + x] = color;
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}

impl PixelSource for PixelBuffer {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Solid red, green, blue, then black: one color per frame.
///
/// Handy for checking the channel order a strip expects.
pub struct TestPattern {
    buffer: PixelBuffer,
    step: usize,
}

const TEST_PATTERN_COLORS: [u32; 4] = [0xFF0000, 0x00FF00, 0x0000FF, 0x000000];

impl TestPattern {
    pub fn new(width: usize, height: usize) -> Self {
        TestPattern {
            buffer: PixelBuffer::new(width, height),
            step: 0,
        }
    }

    /// Advance to the next color and return the frame to show
    pub fn next_frame(&mut self) -> &PixelBuffer {
        let color = TEST_PATTERN_COLORS[self.step % TEST_PATTERN_COLORS.len()];
        self.step += 1;
        self.buffer.fill(color);
        &self.buffer
    }
}
