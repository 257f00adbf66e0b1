use std::io;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use futures::{Sink, Stream};
use tokio::net::TcpStream;
use tokio_serial::{DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};
use tokio_util::codec::Framed;
use url::Url;

use crate::emulator::EmulatedTransport;
use crate::protocol::codec::{Cn105Codec, Frame, RxFrame};
use crate::transport::{TcpTransport, Transport};

/// The CN105 connector runs at 2400 baud, 8E1.
pub const BAUD_RATE: u32 = 2400;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    /// Sends closer together than this are dropped.
    pub min_send_interval: Duration,

    /// Bound on each of the two waits in the handshake.
    pub connect_timeout: Duration,

    /// How long to sleep between reads while waiting in the handshake.
    pub poll_step: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            min_send_interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(2000),
            poll_step: Duration::from_millis(10),
        }
    }
}

fn serial_path(url: &Url) -> &str {
    url.path()
}

fn tcp_addr(url: &Url) -> Result<(String, u16)> {
    let host = url.host_str()
        .with_context(|| format!("tcp+raw requires a host to be specified in the url: {url}"))?;

    let port = url.port()
        .with_context(|| format!("tcp+raw requires a port number to be specified in the url: {url}"))?;

    Ok((host.to_string(), port))
}

/// A blocking connection to a unit, for the driver.
pub enum Port {
    Serial(Box<dyn SerialPort>),
    TcpRaw(TcpTransport),
    Emulated(EmulatedTransport),
}

impl Port {
    /// Open `serial:///dev/path`, `tcp+raw://host:port` or `emulator:`.
    pub fn open(url: &Url) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = serial_path(url);

                let port = tokio_serial::new(path, BAUD_RATE)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::Even)
                    .stop_bits(StopBits::One)
                    .timeout(Duration::from_millis(100))
                    .open()
                    .with_context(|| format!("failed to open serial port {path}"))?;

                Ok(Self::Serial(port))
            }
            "tcp+raw" => {
                let addr = tcp_addr(url)?;

                let transport = TcpTransport::connect(addr)
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                Ok(Self::TcpRaw(transport))
            }
            "emulator" => Ok(Self::Emulated(EmulatedTransport::default())),
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }
}

impl Transport for Port {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Port::Serial(port) => port.write(bytes),
            Port::TcpRaw(transport) => transport.write(bytes),
            Port::Emulated(transport) => transport.write(bytes),
        }
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        match self {
            Port::Serial(port) => port.bytes_available(),
            Port::TcpRaw(transport) => transport.bytes_available(),
            Port::Emulated(transport) => transport.bytes_available(),
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self {
            Port::Serial(port) => port.read_byte(),
            Port::TcpRaw(transport) => transport.read_byte(),
            Port::Emulated(transport) => transport.read_byte(),
        }
    }

    fn read_available(&mut self, dst: &mut BytesMut) -> io::Result<usize> {
        match self {
            Port::Serial(port) => port.read_available(dst),
            Port::TcpRaw(transport) => transport.read_available(dst),
            Port::Emulated(transport) => transport.read_available(dst),
        }
    }
}

pub trait PortStream: Stream<Item = io::Result<RxFrame>> + Sink<Frame, Error = io::Error> + Send + Unpin {}

impl<T> PortStream for T
where
    T: Stream<Item = io::Result<RxFrame>> + Sink<Frame, Error = io::Error> + Send + Unpin,
{}

/// An async connection, for the tools that watch or emulate the line.
pub enum AsyncPort {
    Serial(SerialStream),
    TcpRaw(TcpStream),
}

impl AsyncPort {
    pub async fn open(url: &Url) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = serial_path(url);

                let port = tokio_serial::new(path, BAUD_RATE)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::Even)
                    .stop_bits(StopBits::One)
                    .open_native_async()
                    .with_context(|| format!("failed to open serial port {path}"))?;

                Ok(Self::Serial(port))
            }
            "tcp+raw" => {
                let addr = tcp_addr(url)?;

                let stream = TcpStream::connect(addr).await
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                stream.set_nodelay(true)?;

                Ok(Self::TcpRaw(stream))
            }
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }

    pub fn framed(self) -> Box<dyn PortStream> {
        match self {
            AsyncPort::Serial(port) => Box::new(Framed::new(port, Cn105Codec::new())),
            AsyncPort::TcpRaw(stream) => Box::new(Framed::new(stream, Cn105Codec::new())),
        }
    }
}
