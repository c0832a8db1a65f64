//! Image to Open Pixel Control frames.
//!
//! Crops and scales a source image onto a fixed LED display, gamma-corrects
//! every channel, reorders pixels into the physical wiring order of the LED
//! strings and frames the result as an OPC "set pixel colors" message.
//!
//! ```no_run
//! use img2opc::{Geometry, OpcEncoder, PixelBuffer, TcpSink};
//!
//! # fn main() -> img2opc::Result<()> {
//! let mut encoder = OpcEncoder::serpentine(Geometry::new(10, 10)?)?;
//! let mut sink = TcpSink::new("127.0.0.1:7890")?;
//! let image = PixelBuffer::filled(40, 30, 0xFF8000);
//! encoder.send_frame(&image, &mut sink)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gamma;
pub mod geometry;
pub mod layout;
pub mod mapper;
pub mod opc;
pub mod sink;
pub mod source;
pub mod streamer;

pub use config::{Config, SinkConfig, SourceConfig};
pub use error::{Error, Result};
pub use gamma::GammaTable;
pub use geometry::{Geometry, Rect};
pub use layout::{serpentine_offset, Layout, Serpentine};
pub use mapper::{compute_crop_window, CropPolicy, FrameMapper};
pub use opc::OpcEncoder;
pub use sink::{open_sink, FileSink, TcpSink};
pub use source::{PixelBuffer, PixelSource, TestPattern};
pub use streamer::{FrameSource, Streamer};
