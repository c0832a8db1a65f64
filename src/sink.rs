//! Byte sinks that accept complete OPC frames.
//!
//! Every sink is a plain [`std::io::Write`]; the encoder calls `write_all`
//! then `flush` once per frame. Connection handling lives here, not in the
//! encoder: a broken TCP connection is dropped and reopened on the next frame.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::opc::DEFAULT_PORT;

/// Wait at most this long for a connection or a write
const SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Resolve `host` or `host:port`, falling back to `default_port`
pub fn resolve(hostport: &str, default_port: u16) -> io::Result<SocketAddr> {
    let (host, port) = match hostport.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("bad port in {}: {}", hostport, e),
                )
            })?;
            (host, port)
        }
        None => (hostport, default_port),
    };
    let host = if host.is_empty() { "localhost" } else { host };

    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("host not found: {}", hostport))
        })
}

/// TCP connection to an OPC receiver, opened lazily.
///
/// One connection attempt is made per frame while disconnected.
pub struct TcpSink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpSink {
    pub fn new(hostport: &str) -> Result<Self> {
        let addr = resolve(hostport, DEFAULT_PORT).map_err(|source| Error::Sink {
            target: hostport.to_string(),
            source,
        })?;
        Ok(TcpSink { addr, stream: None })
    }

    pub fn from_addr(addr: SocketAddr) -> Self {
        TcpSink { addr, stream: None }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> io::Result<&mut TcpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect_timeout(&self.addr, SEND_TIMEOUT).map_err(|e| {
                    warn!("Failed to connect to {}: {}", self.addr, e);
                    e
                })?;
                stream.set_write_timeout(Some(SEND_TIMEOUT))?;
                stream.set_nodelay(true)?;
                info!("Connected to {}", self.addr);
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }

    fn disconnect(&mut self, err: &io::Error) {
        if self.stream.take().is_some() {
            warn!("Connection to {} lost: {}", self.addr, err);
        }
    }
}

impl Write for TcpSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.connect()?.write(buf);
        if let Err(e) = &result {
            self.disconnect(e);
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        };
        if let Err(e) = &result {
            self.disconnect(e);
        }
        result
    }
}

/// Appends frames to a file, opened on the first write
pub struct FileSink {
    path: String,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: &str) -> Self {
        FileSink {
            path: path.to_string(),
            file: None,
        }
    }

    fn open(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
                debug!("Opened {}", self.path);
                file
            }
        };
        Ok(self.file.insert(file))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.open()?.write(buf);
        if result.is_err() {
            self.file = None;
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Open a serial device 8N1 without flow control
pub fn open_serial(port_name: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
    let mut port = serialport::new(port_name, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(SEND_TIMEOUT)
        .open()
        .map_err(|e| Error::Sink {
            target: port_name.to_string(),
            source: io::Error::from(e),
        })?;

    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("Failed to set DTR on {}: {}", port_name, e);
    }

    // Allow device to initialize
    thread::sleep(Duration::from_millis(100));

    info!("Opened {} at {} baud", port_name, baud_rate);
    Ok(port)
}

/// Build the sink described by `config`
pub fn open_sink(config: &SinkConfig) -> Result<Box<dyn Write + Send>> {
    match config {
        SinkConfig::Tcp { host, port } => {
            let sink = TcpSink::new(&format!("{}:{}", host, port))?;
            debug!("OPC receiver at {}", sink.addr());
            Ok(Box::new(sink))
        }
        SinkConfig::File { path } => Ok(Box::new(FileSink::new(path))),
        SinkConfig::Serial { port, baud_rate } => Ok(Box::new(open_serial(port, *baud_rate)?)),
    }
}
