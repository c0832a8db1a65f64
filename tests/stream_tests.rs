use std::io::Read;
use std::net::TcpListener;

use img2opc::{Config, Error, Geometry, OpcEncoder, PixelBuffer, Streamer, TcpSink};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("img2opc-{}-{}", std::process::id(), name))
}

#[test]
fn test_streams_pattern_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = Config::new("127.0.0.1", port, 2, 2).unwrap();
    let mut streamer = Streamer::new(&config, false).unwrap();
    streamer.run(Some(2)).unwrap();
    assert_eq!(streamer.frames_sent(), 2);

    let (mut conn, _) = listener.accept().unwrap();
    let mut frames = [0u8; 3 * 16];
    conn.read_exact(&mut frames).unwrap();

    let header = [0u8, 0, 0, 12];
    let blank = &frames[0..16];
    let red = &frames[16..32];
    let green = &frames[32..48];

    assert_eq!(&blank[..4], &header);
    assert!(blank[4..].iter().all(|&b| b == 0));
    assert_eq!(&red[..4], &header);
    assert_eq!(&red[4..], &[255, 0, 0].repeat(4)[..]);
    assert_eq!(&green[4..], &[0, 255, 0].repeat(4)[..]);
}

#[test]
fn test_send_to_missing_receiver_fails_then_recovers() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let mut encoder = OpcEncoder::serpentine(Geometry::new(2, 2).unwrap()).unwrap();
    let mut sink = TcpSink::from_addr(addr);

    let white = PixelBuffer::filled(2, 2, 0xFFFFFF);
    let result = encoder.send_frame(&white, &mut sink);
    assert!(matches!(result, Err(Error::Transmission(_))));
    assert_eq!(encoder.frame().len(), 16);

    // a receiver on a fresh port gets a clean frame from the same encoder
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut sink = TcpSink::from_addr(listener.local_addr().unwrap());
    let black = PixelBuffer::filled(2, 2, 0x000000);
    encoder.send_frame(&black, &mut sink).unwrap();

    let (mut conn, _) = listener.accept().unwrap();
    let mut frame = [0xAAu8; 16];
    conn.read_exact(&mut frame).unwrap();
    assert_eq!(frame, [0, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_png_to_file_sink() {
    let image_path = temp_path("source.png");
    let output_path = temp_path("frames.opc");
    let config_path = temp_path("config.json");
    std::fs::remove_file(&output_path).ok();

    // 4x2 image: left half black, right half white
    {
        let file = std::fs::File::create(&image_path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), 4, 2);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let row = [0u8, 0, 0, 0, 0, 0, 255, 255, 255, 255, 255, 255];
        writer.write_image_data(&[row, row].concat()).unwrap();
    }

    let config_json = format!(
        r#"{{
            "sink": {{ "type": "file", "path": "{}" }},
            "display": {{ "width": 2, "height": 2 }},
            "crop": "source_height",
            "source": {{ "type": "png", "path": "{}" }},
            "fps": 1000
        }}"#,
        output_path.display(),
        image_path.display()
    );
    std::fs::write(&config_path, config_json).unwrap();

    let config = Config::load(&config_path).unwrap();
    let mut streamer = Streamer::new(&config, false).unwrap();
    streamer.run(Some(1)).unwrap();

    let data = std::fs::read(&output_path).unwrap();
    for path in [&image_path, &output_path, &config_path] {
        std::fs::remove_file(path).ok();
    }

    // blank frame, then the image: the 2x2 crop starts at x=1, so column 0
    // is black and column 1 is white; column 1 runs bottom to top
    assert_eq!(data.len(), 32);
    assert_eq!(&data[16..20], &[0, 0, 0, 12]);
    assert_eq!(&data[20..26], &[0, 0, 0, 0, 0, 0]);
    assert_eq!(&data[26..32], &[255, 255, 255, 255, 255, 255]);
}

#[test]
fn test_invalid_geometry_is_rejected() {
    assert!(matches!(Geometry::new(0, 4), Err(Error::InvalidGeometry { .. })));
    assert!(matches!(Geometry::new(200, 200), Err(Error::PayloadTooLarge { bytes: 120000 })));
}
