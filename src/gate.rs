use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::transport::Transport;

/// Outcome of a gated send.
#[derive(Debug)]
pub enum Admission {
    Sent,

    /// Too soon after the previous send. Nothing was written and nothing is
    /// queued.
    Deferred,

    /// Admitted, but the write failed. Still counts as a send.
    Failed(io::Error),
}

impl Admission {
    pub fn admitted(&self) -> bool {
        !matches!(self, Admission::Deferred)
    }
}

/// Owns the transport and enforces a minimum interval between sends.
pub struct TransportGate<T> {
    transport: T,
    min_interval: u64,
    last_send: Option<u64>,
}

impl<T: Transport> TransportGate<T> {
    pub fn new(transport: T, min_interval: Duration) -> Self {
        Self {
            transport,
            min_interval: min_interval.as_millis() as u64,
            last_send: None,
        }
    }

    pub fn can_send(&self, now: u64) -> bool {
        match self.last_send {
            None => true,
            Some(last) => now.saturating_sub(last) > self.min_interval,
        }
    }

    pub fn last_send(&self) -> Option<u64> {
        self.last_send
    }

    pub fn send(&mut self, now: u64, bytes: &[u8]) -> Admission {
        if !self.can_send(now) {
            trace!("send deferred, last send at {:?}ms, now {now}ms", self.last_send);
            return Admission::Deferred;
        }

        match self.force_send(now, bytes) {
            Ok(()) => Admission::Sent,
            Err(err) => {
                warn!("write failed: {err}");
                Admission::Failed(err)
            }
        }
    }

    /// Send regardless of the interval. The send is still recorded.
    pub fn force_send(&mut self, now: u64, bytes: &[u8]) -> io::Result<()> {
        self.last_send = Some(now);
        trace!("TX {bytes:02x?}");
        self.transport.write(bytes)
    }

    pub fn read_available(&mut self, dst: &mut BytesMut) -> io::Result<usize> {
        self.transport.read_available(dst)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
