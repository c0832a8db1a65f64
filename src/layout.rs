//! Physical wiring order of the LED strings.
//!
//! A [`Layout`] maps a display coordinate to the byte offset of that pixel
//! inside the OPC payload (header excluded). Panels wired differently can
//! supply their own implementation; any `Fn(x, y, height) -> offset` works.

use crate::geometry::Geometry;

/// Offsets must be multiples of 3 below `3 * width * height`, one per pixel.
pub trait Layout {
    /// Byte offset of pixel (x, y) relative to the start of the payload
    fn offset(&self, x: usize, y: usize, geometry: &Geometry) -> usize;
}

/// Column-major zigzag: even columns run top to bottom, odd columns bottom
/// to top, so the whole panel is one continuous string.
///
/// ```text
///   0     2h-1  2h
///   1     .     .
///   .     .     .
///   h-1   h     etc.
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Serpentine;

impl Layout for Serpentine {
    #[inline]
    fn offset(&self, x: usize, y: usize, geometry: &Geometry) -> usize {
        serpentine_offset(x, y, geometry.height())
    }
}

impl<F> Layout for F
where
    F: Fn(usize, usize, usize) -> usize,
{
    fn offset(&self, x: usize, y: usize, geometry: &Geometry) -> usize {
        self(x, y, geometry.height())
    }
}

#[inline]
pub fn serpentine_offset(x: usize, y: usize, height: usize) -> usize {
    let row = if x % 2 == 0 { y } else { height - 1 - y };
    3 * (x * height + row)
}
