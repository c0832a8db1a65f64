use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Display width or height is zero
    #[error("invalid display geometry {width}x{height}: both dimensions must be non-zero")]
    InvalidGeometry { width: usize, height: usize },

    /// `3 * width * height` does not fit the 16-bit OPC length field
    #[error("OPC payload of {bytes} bytes exceeds the 65535 byte protocol limit")]
    PayloadTooLarge { bytes: usize },

    /// Source image has no pixels to crop from
    #[error("source image {width}x{height} has no pixels")]
    EmptySource { width: usize, height: usize },

    /// Wiring layout maps pixel (x, y) outside the payload or onto a used slot
    #[error("layout maps pixel ({x}, {y}) to invalid payload offset {offset}")]
    InvalidLayout { x: usize, y: usize, offset: usize },

    /// Pixel data does not match the stated image size
    #[error("pixel buffer holds {actual} pixels, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Sink could not be set up (address resolution, device open)
    #[error("failed to open sink {target}: {source}")]
    Sink { target: String, source: std::io::Error },

    #[error("failed to send frame: {0}")]
    Transmission(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] png::DecodingError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
