use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::opc::{HEADER_LEN, MAX_PAYLOAD_LEN};

/// Fixed display size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub struct Geometry {
    width: usize,
    height: usize,
}

#[derive(Deserialize)]
struct RawGeometry {
    width: usize,
    height: usize,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = Error;

    fn try_from(raw: RawGeometry) -> Result<Self> {
        Geometry::new(raw.width, raw.height)
    }
}

impl Geometry {
    /// Validate a display size.
    ///
    /// Both dimensions must be non-zero and the RGB payload must fit the
    /// 16-bit OPC length field.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeometry { width, height });
        }

        let bytes = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .unwrap_or(usize::MAX);
        if bytes > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge { bytes });
        }

        Ok(Geometry { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// RGB payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.pixel_count() * 3
    }

    /// Header plus payload
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }
}

/// Pixel rectangle inside a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Rect { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangle lies entirely inside a `width` x `height` image
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}
