use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::{BufMut, BytesMut};
use tokio_serial::SerialPort;

/// Byte stream to the unit.
///
/// Reads never block: callers check [`Transport::bytes_available`] first.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn bytes_available(&mut self) -> io::Result<usize>;

    fn read_byte(&mut self) -> io::Result<u8>;

    /// Move everything currently available into `dst`.
    fn read_available(&mut self, dst: &mut BytesMut) -> io::Result<usize> {
        let mut count = 0;

        loop {
            let available = self.bytes_available()?;
            if available == 0 {
                return Ok(count);
            }

            dst.reserve(available);
            for _ in 0..available {
                dst.put_u8(self.read_byte()?);
            }

            count += available;
        }
    }
}

impl Transport for Box<dyn SerialPort> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// A raw TCP connection to a serial bridge.
pub struct TcpTransport {
    stream: TcpStream,
    pending: VecDeque<u8>,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(Self::new(stream))
    }

    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            pending: VecDeque::new(),
        }
    }

    /// Drain the socket into `pending` without blocking.
    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0; 64];

        self.stream.set_nonblocking(true)?;
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
                Ok(n) => self.pending.extend(&buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => break Err(err),
            }
        };
        self.stream.set_nonblocking(false)?;

        result
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        Ok(self.pending.len())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        self.pending
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no byte available"))
    }
}
