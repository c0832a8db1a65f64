//! Open Pixel Control framing.
//!
//! A frame is a 4 byte header (channel, command, big-endian payload length)
//! followed by R,G,B triples. The encoder below owns one frame buffer sized
//! for its display and rewrites the payload in place for every frame.

use std::io::Write;

use log::trace;

use crate::error::{Error, Result};
use crate::gamma::GammaTable;
use crate::geometry::{Geometry, Rect};
use crate::layout::{Layout, Serpentine};
use crate::mapper::{CropPolicy, FrameMapper};
use crate::source::{PixelBuffer, PixelSource};

pub const HEADER_LEN: usize = 4;
/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;
/// TCP port OPC receivers listen on unless told otherwise
pub const DEFAULT_PORT: u16 = 7890;
/// Channel 0 addresses every string on the connection
pub const BROADCAST_CHANNEL: u8 = 0;
pub const CMD_SET_PIXELS: u8 = 0;

/// Write channel, command and payload length into the first four bytes
pub fn write_header(frame: &mut [u8], channel: u8, command: u8, payload_len: usize) -> Result<()> {
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge { bytes: payload_len });
    }

    let len = (payload_len as u16).to_be_bytes();
    frame[..HEADER_LEN].copy_from_slice(&[channel, command, len[0], len[1]]);
    Ok(())
}

/// Gamma-correct `resized` and place each pixel at its wiring offset.
///
/// `frame` is header plus payload; only payload bytes are written.
pub fn encode_pixels<L: Layout + ?Sized>(
    frame: &mut [u8],
    resized: &PixelBuffer,
    gamma: &GammaTable,
    geometry: &Geometry,
    layout: &L,
) {
    for x in 0..geometry.width() {
        for y in 0..geometry.height() {
            let pos = HEADER_LEN + layout.offset(x, y, geometry);
            frame[pos..pos + 3].copy_from_slice(&gamma.correct_rgb(resized.pixel(x, y)));
        }
    }
}

/// Check that `layout` gives every pixel its own RGB slot inside the payload
pub fn check_layout<L: Layout + ?Sized>(geometry: &Geometry, layout: &L) -> Result<()> {
    let mut used = vec![false; geometry.pixel_count()];
    for x in 0..geometry.width() {
        for y in 0..geometry.height() {
            let offset = layout.offset(x, y, geometry);
            let slot = offset / 3;
            if offset % 3 != 0 || slot >= used.len() || used[slot] {
                return Err(Error::InvalidLayout { x, y, offset });
            }
            used[slot] = true;
        }
    }
    Ok(())
}

/// Turns source images into OPC frames for one fixed display
pub struct OpcEncoder {
    mapper: FrameMapper,
    gamma: GammaTable,
    layout: Box<dyn Layout + Send>,
    frame: Vec<u8>,
}

impl OpcEncoder {
    /// Encoder on the broadcast channel with the default crop policy
    pub fn new<L>(geometry: Geometry, gamma: GammaTable, layout: L) -> Result<Self>
    where
        L: Layout + Send + 'static,
    {
        Self::with_options(geometry, gamma, layout, BROADCAST_CHANNEL, CropPolicy::default())
    }

    pub fn with_channel<L>(
        geometry: Geometry,
        gamma: GammaTable,
        layout: L,
        channel: u8,
    ) -> Result<Self>
    where
        L: Layout + Send + 'static,
    {
        Self::with_options(geometry, gamma, layout, channel, CropPolicy::default())
    }

    /// Allocate the frame buffer and write its header; the header never
    /// changes afterwards
    pub fn with_options<L>(
        geometry: Geometry,
        gamma: GammaTable,
        layout: L,
        channel: u8,
        crop: CropPolicy,
    ) -> Result<Self>
    where
        L: Layout + Send + 'static,
    {
        check_layout(&geometry, &layout)?;

        let mut frame = vec![0u8; geometry.frame_len()];
        write_header(&mut frame, channel, CMD_SET_PIXELS, geometry.payload_len())?;

        Ok(OpcEncoder {
            mapper: FrameMapper::new(geometry, crop),
            gamma,
            layout: Box::new(layout),
            frame,
        })
    }

    /// Serpentine wiring, 2.5 gamma, broadcast channel
    pub fn serpentine(geometry: Geometry) -> Result<Self> {
        Self::new(geometry, GammaTable::build(), Serpentine)
    }

    /// Crop, scale, correct and reorder `source` into the frame buffer
    pub fn encode<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<&[u8]> {
        let geometry = *self.mapper.geometry();
        let resized = self.mapper.map(source)?;
        encode_pixels(&mut self.frame, resized, &self.gamma, &geometry, self.layout.as_ref());
        Ok(&self.frame)
    }

    /// Write the current frame to `sink` and flush it
    pub fn send<W: Write + ?Sized>(&self, sink: &mut W) -> Result<()> {
        trace!("Frame: {}", hex_dump(&self.frame, 30));
        sink.write_all(&self.frame)?;
        sink.flush()?;
        Ok(())
    }

    pub fn send_frame<S, W>(&mut self, source: &S, sink: &mut W) -> Result<()>
    where
        S: PixelSource + ?Sized,
        W: Write + ?Sized,
    {
        self.encode(source)?;
        self.send(sink)
    }

    /// Send an all-black frame without touching the resized buffer
    pub fn send_black<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<()> {
        self.frame[HEADER_LEN..].fill(0);
        self.send(sink)
    }

    /// Header plus payload as last encoded
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn payload(&self) -> &[u8] {
        &self.frame[HEADER_LEN..]
    }

    /// Display-resolution preview of the last encoded image
    pub fn resized(&self) -> &PixelBuffer {
        self.mapper.resized()
    }

    pub fn geometry(&self) -> &Geometry {
        self.mapper.geometry()
    }

    pub fn crop_window(&self) -> Rect {
        self.mapper.crop_window()
    }
}

/// First `limit` bytes as space separated hex
pub fn hex_dump(bytes: &[u8], limit: usize) -> String {
    bytes
        .iter()
        .take(limit)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::serpentine_offset;
    use std::io;

    fn encoder(w: usize, h: usize) -> OpcEncoder {
        OpcEncoder::serpentine(Geometry::new(w, h).unwrap()).unwrap()
    }

    /// Sink that fails while `fail` is set
    struct FlakySink {
        fail: bool,
        written: Vec<u8>,
        flushes: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "receiver gone"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_header_10x10() {
        let enc = encoder(10, 10);
        assert_eq!(&enc.frame()[..4], &[0, 0, 0x01, 0x2C]);
        assert_eq!(enc.frame().len(), 304);
    }

    #[test]
    fn test_header_channel() {
        let geometry = Geometry::new(1, 1).unwrap();
        let enc = OpcEncoder::with_channel(geometry, GammaTable::build(), Serpentine, 3).unwrap();
        assert_eq!(enc.frame(), &[3, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_write_header_limit() {
        let mut frame = [0u8; 4];
        write_header(&mut frame, 0, 0, 0xFFFF).unwrap();
        assert_eq!(frame, [0, 0, 0xFF, 0xFF]);
        assert!(matches!(
            write_header(&mut frame, 0, 0, 0x10000),
            Err(Error::PayloadTooLarge { bytes: 0x10000 })
        ));
    }

    #[test]
    fn test_black_and_white() {
        let mut enc = encoder(3, 4);

        let black = PixelBuffer::filled(3, 4, 0x000000);
        assert!(enc.encode(&black).unwrap()[HEADER_LEN..].iter().all(|&b| b == 0));

        let white = PixelBuffer::filled(3, 4, 0xFFFFFF);
        let frame = enc.encode(&white).unwrap();
        assert_eq!(frame.len(), 4 + 36);
        assert!(frame[HEADER_LEN..].iter().all(|&b| b == 255));
    }

    #[test]
    fn test_single_red_pixel() {
        let gamma = GammaTable::build();
        let mut enc = encoder(2, 2);
        let mut source = PixelBuffer::new(2, 2);
        source.set(0, 1, 0x800000);

        let frame = enc.encode(&source).unwrap();
        assert_eq!(4 + serpentine_offset(0, 1, 2), 7);
        assert_eq!(frame[7], gamma.correct(0x80));
        assert_eq!(frame[8], 0);
        assert_eq!(frame[9], 0);
        assert_eq!(frame.iter().filter(|&&b| b != 0).count(), 2); // header length byte + red
    }

    #[test]
    fn test_serpentine_order() {
        let geometry = Geometry::new(2, 2).unwrap();
        let mut enc = OpcEncoder::new(geometry, GammaTable::linear(), Serpentine).unwrap();
        let pixels = vec![0x010101, 0x030303, 0x020202, 0x040404];
        let source = PixelBuffer::from_pixels(2, 2, pixels).unwrap();
        let frame = enc.encode(&source).unwrap();
        // (0,0) (0,1) (1,1) (1,0)
        assert_eq!(&frame[4..], &[1, 1, 1, 2, 2, 2, 4, 4, 4, 3, 3, 3]);
    }

    #[test]
    fn test_custom_layout() {
        let row_major = |x: usize, y: usize, _h: usize| 3 * (y * 2 + x);
        let geometry = Geometry::new(2, 2).unwrap();
        let mut enc = OpcEncoder::new(geometry, GammaTable::linear(), row_major).unwrap();
        let pixels = vec![0x010101, 0x030303, 0x020202, 0x040404];
        let source = PixelBuffer::from_pixels(2, 2, pixels).unwrap();
        let frame = enc.encode(&source).unwrap();
        assert_eq!(&frame[4..], &[1, 1, 1, 3, 3, 3, 2, 2, 2, 4, 4, 4]);
    }

    #[test]
    fn test_bad_layout_rejected_at_construction() {
        let geometry = Geometry::new(2, 2).unwrap();
        let past_end = |x: usize, y: usize, _h: usize| 3 * (y * 2 + x) + 3;
        assert!(matches!(
            OpcEncoder::new(geometry, GammaTable::linear(), past_end),
            Err(Error::InvalidLayout { x: 1, y: 1, offset: 12 })
        ));

        let unaligned = |x: usize, y: usize, _h: usize| 3 * (y * 2 + x) + 1;
        assert!(matches!(
            OpcEncoder::new(geometry, GammaTable::linear(), unaligned),
            Err(Error::InvalidLayout { x: 0, y: 0, offset: 1 })
        ));

        let collapsed = |x: usize, _y: usize, _h: usize| 3 * x;
        assert!(matches!(
            OpcEncoder::new(geometry, GammaTable::linear(), collapsed),
            Err(Error::InvalidLayout { x: 0, y: 1, offset: 0 })
        ));

        assert!(check_layout(&geometry, &Serpentine).is_ok());
    }

    #[test]
    fn test_send_writes_and_flushes() {
        let mut enc = encoder(2, 2);
        let mut sink = FlakySink { fail: false, written: Vec::new(), flushes: 0 };
        enc.send_frame(&PixelBuffer::filled(2, 2, 0xFFFFFF), &mut sink).unwrap();
        assert_eq!(sink.written.len(), 16);
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_send_failure_then_recovery() {
        let mut enc = encoder(2, 2);
        let mut sink = FlakySink { fail: true, written: Vec::new(), flushes: 0 };

        let result = enc.send_frame(&PixelBuffer::filled(2, 2, 0xFFFFFF), &mut sink);
        assert!(matches!(result, Err(Error::Transmission(_))));
        assert_eq!(enc.frame().len(), 16);
        assert_eq!(&enc.frame()[..4], &[0, 0, 0, 12]);

        sink.fail = false;
        enc.send_frame(&PixelBuffer::filled(2, 2, 0x000000), &mut sink).unwrap();
        assert_eq!(sink.written, vec![0, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_send_black_keeps_header() {
        let mut enc = encoder(2, 1);
        enc.encode(&PixelBuffer::filled(2, 1, 0xFFFFFF)).unwrap();
        let mut sink: Vec<u8> = Vec::new();
        enc.send_black(&mut sink).unwrap();
        assert_eq!(sink, vec![0, 0, 0, 6, 0, 0, 0, 0, 0, 0]);
        assert_eq!(enc.resized().pixel(0, 0), 0xFFFFFF);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x00, 0x2c, 0xff], 2), "00 2c");
    }
}
