use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Geometry, Rect};
use crate::source::{PixelBuffer, PixelSource};

/// How the square crop side is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPolicy {
    /// Side equals the display height
    #[default]
    DisplayHeight,
    /// Side equals the source height (the largest top-anchored square)
    SourceHeight,
}

/// Square crop window, top-anchored and horizontally centered.
///
/// The side is clamped to the source bounds, so a source smaller than the
/// requested square yields a smaller window instead of negative offsets.
/// An empty source yields an empty window.
pub fn compute_crop_window(
    source_width: usize,
    source_height: usize,
    geometry: &Geometry,
    policy: CropPolicy,
) -> Rect {
    let requested = match policy {
        CropPolicy::DisplayHeight => geometry.height(),
        CropPolicy::SourceHeight => source_height,
    };
    let side = requested.min(source_width).min(source_height);

    Rect::new((source_width - side) / 2, 0, side, side)
}

/// Box-filter `crop` of `source` into `dest`, covering all of `dest`.
///
/// Each destination pixel averages the source pixels its cell covers; when
/// upscaling a cell covers less than one pixel and the nearest one is used.
/// `crop` must be non-empty and inside the source.
pub fn resize_into<S: PixelSource + ?Sized>(source: &S, crop: Rect, dest: &mut PixelBuffer) {
    let dest_width = dest.width();
    let dest_height = dest.height();

    for dy in 0..dest_height {
        let (y0, y1) = cell_span(dy, crop.height, dest_height);
        for dx in 0..dest_width {
            let (x0, x1) = cell_span(dx, crop.width, dest_width);

            // a cell may cover millions of pixels, too many for u32 sums
            let mut sum = [0u64; 3];
            for sy in y0..y1 {
                for sx in x0..x1 {
                    let c = source.pixel(crop.x + sx, crop.y + sy);
                    sum[0] += ((c >> 16) & 0xFF) as u64;
                    sum[1] += ((c >> 8) & 0xFF) as u64;
                    sum[2] += (c & 0xFF) as u64;
                }
            }

            let n = ((x1 - x0) * (y1 - y0)) as u64;
            let avg = |s: u64| ((s + n / 2) / n) as u32;
            dest.pixels_mut()[dy * dest_width + dx] =
                avg(sum[0]) << 16 | avg(sum[1]) << 8 | avg(sum[2]);
        }
    }
}

/// Allocating variant of [`resize_into`]
pub fn resize<S: PixelSource + ?Sized>(source: &S, crop: Rect, geometry: &Geometry) -> PixelBuffer {
    let mut dest = PixelBuffer::new(geometry.width(), geometry.height());
    resize_into(source, crop, &mut dest);
    dest
}

/// Source range `[start, end)` covered by destination cell `i` of `dest_len`
fn cell_span(i: usize, src_len: usize, dest_len: usize) -> (usize, usize) {
    let start = i * src_len / dest_len;
    let end = ((i + 1) * src_len / dest_len).max(start + 1).min(src_len);
    (start, end)
}

/// Crops and scales source images into a display-sized buffer that is
/// reused for every frame
pub struct FrameMapper {
    geometry: Geometry,
    policy: CropPolicy,
    source_size: (usize, usize),
    crop: Rect,
    resized: PixelBuffer,
}

impl FrameMapper {
    pub fn new(geometry: Geometry, policy: CropPolicy) -> Self {
        let mut mapper = FrameMapper {
            geometry,
            policy,
            source_size: (0, 0),
            crop: Rect::default(),
            resized: PixelBuffer::new(geometry.width(), geometry.height()),
        };
        mapper.set_source_size(geometry.width(), geometry.height());
        mapper
    }

    /// Recompute the crop window for sources of the given size
    pub fn set_source_size(&mut self, width: usize, height: usize) {
        self.source_size = (width, height);
        self.crop = compute_crop_window(width, height, &self.geometry, self.policy);

        let wanted = match self.policy {
            CropPolicy::DisplayHeight => self.geometry.height(),
            CropPolicy::SourceHeight => height,
        };
        if !self.crop.is_empty() && self.crop.width < wanted {
            warn!(
                "Source {}x{} is smaller than the {}x{} crop, clamped to {}x{}",
                width, height, wanted, wanted, self.crop.width, self.crop.height
            );
        }
        debug!("Source {}x{} -> crop window {:?}", width, height, self.crop);
    }

    /// Crop and scale `source` into the display buffer
    pub fn map<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<&PixelBuffer> {
        let size = (source.width(), source.height());
        if size != self.source_size {
            self.set_source_size(size.0, size.1);
        }
        if self.crop.is_empty() {
            return Err(Error::EmptySource {
                width: size.0,
                height: size.1,
            });
        }

        resize_into(source, self.crop, &mut self.resized);
        Ok(&self.resized)
    }

    pub fn crop_window(&self) -> Rect {
        self.crop
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Result of the most recent [`map`](Self::map)
    pub fn resized(&self) -> &PixelBuffer {
        &self.resized
    }
}
