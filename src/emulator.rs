//! An emulated indoor unit.
//!
//! [`Unit`] answers frames the way a unit on the CN105 connector does.
//! [`EmulatedTransport`] wires one up as an in-process [`Transport`] so the
//! driver can be exercised without hardware.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use bytes::BytesMut;
use packed_struct::PackingError;
use tokio_util::codec::Decoder;
use tracing::{debug, info, trace};

use crate::protocol::codec::{Cn105Codec, Frame, RxFrame};
use crate::protocol::ids::*;
use crate::protocol::packets::*;
use crate::protocol::settings::{Mode, Power, SettingsRecord};
use crate::transport::Transport;

#[derive(Clone, Debug)]
pub struct Unit {
    settings: SettingsRecord,
    connected: bool,
}

impl Default for Unit {
    fn default() -> Self {
        Self::new(SettingsRecord {
            power: Power::On,
            mode: Mode::Heat,
            temperature: 21,
            room_temperature: 19,
            ..SettingsRecord::default()
        })
    }
}

impl Unit {
    pub fn new(settings: SettingsRecord) -> Self {
        Self {
            settings,
            connected: false,
        }
    }

    pub fn settings(&self) -> SettingsRecord {
        self.settings
    }

    pub fn set_settings(&mut self, settings: SettingsRecord) {
        let room_temperature = self.settings.room_temperature;
        self.settings = SettingsRecord { room_temperature, ..settings };
    }

    pub fn set_room_temperature(&mut self, celsius: u8) {
        self.settings.room_temperature = celsius;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The reply to `frame`, if the unit would send one.
    ///
    /// Until it has seen a connect request the unit ignores everything.
    pub fn respond(&mut self, frame: &Frame) -> Result<Option<Frame>, PackingError> {
        let reply = match frame.packet_type {
            CONNECT_REQUEST => {
                frame.unpack_as::<ConnectRequest>()?;

                if !self.connected {
                    info!("unit: controller connected");
                }
                self.connected = true;

                Frame::pack(&ConnectResponse::default())?
            }

            _ if !self.connected => {
                trace!("unit: ignoring {frame:02x?} before connect");
                return Ok(None);
            }

            SET_REQUEST => {
                let request = frame.unpack_as::<SetRequest>()?;
                self.set_settings(request.settings());

                debug!("unit: settings now {:?}", self.settings);

                Frame::pack(&SetResponse::default())?
            }

            GET_INFO_REQUEST => match frame.data.first().copied() {
                Some(kind) if kind == InfoType::Settings as u8 => {
                    Frame::pack(&SettingsResponse::from_settings(&self.settings))?
                }
                Some(kind) if kind == InfoType::RoomTemperature as u8 => {
                    Frame::pack(&RoomTemperatureResponse::new(self.settings.room_temperature))?
                }
                other => {
                    debug!("unit: unsupported info request {other:02x?}");
                    return Ok(None);
                }
            },

            other => {
                debug!("unit: unexpected packet type {other:#04x}");
                return Ok(None);
            }
        };

        Ok(Some(reply))
    }
}

#[derive(Default)]
struct Line {
    unit: Unit,
    codec: Cn105Codec,

    /// controller -> unit, not yet framed
    inbound: BytesMut,

    /// unit -> controller
    outbound: VecDeque<u8>,

    /// Controller writes, kept only when `recording`.
    written: Vec<Vec<u8>>,
    recording: bool,

    /// Reply packet types the unit keeps to itself.
    muted: Vec<u8>,
}

impl Line {
    fn receive(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.recording {
            self.written.push(bytes.to_vec());
        }
        self.inbound.extend_from_slice(bytes);

        while let Some(frame) = self.codec.decode(&mut self.inbound)? {
            let frame = match frame {
                RxFrame::Valid(frame) => frame,
                RxFrame::Corrupted(_) => continue,
            };

            let reply = self
                .unit
                .respond(&frame)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("{err:?}")))?;

            if let Some(reply) = reply {
                if self.muted.contains(&reply.packet_type) {
                    trace!("unit: reply {:#04x} muted", reply.packet_type);
                    continue;
                }
                self.outbound.extend(reply.to_bytes().iter());
            }
        }

        Ok(())
    }
}

/// An in-process [`Unit`] behind the [`Transport`] interface.
///
/// Clones share the same line, so a test can keep a handle while the driver
/// owns another.
#[derive(Clone, Default)]
pub struct EmulatedTransport {
    line: Rc<RefCell<Line>>,
}

impl EmulatedTransport {
    pub fn new(unit: Unit) -> Self {
        Self {
            line: Rc::new(RefCell::new(Line {
                unit,
                ..Line::default()
            })),
        }
    }

    /// Like [`EmulatedTransport::new`], but every controller write is kept
    /// for [`EmulatedTransport::written`].
    pub fn recording(unit: Unit) -> Self {
        Self {
            line: Rc::new(RefCell::new(Line {
                unit,
                recording: true,
                ..Line::default()
            })),
        }
    }

    pub fn unit(&self) -> Unit {
        self.line.borrow().unit.clone()
    }

    pub fn with_unit<R>(&self, f: impl FnOnce(&mut Unit) -> R) -> R {
        f(&mut self.line.borrow_mut().unit)
    }

    /// Every write the controller made, in order. Empty unless recording.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.line.borrow().written.clone()
    }

    pub fn clear_written(&self) {
        self.line.borrow_mut().written.clear();
    }

    /// Queue raw bytes for the controller to read.
    pub fn inject(&self, bytes: &[u8]) {
        self.line.borrow_mut().outbound.extend(bytes);
    }

    /// Drop replies of `packet_type` instead of sending them.
    pub fn mute(&self, packet_type: u8) {
        self.line.borrow_mut().muted.push(packet_type);
    }

    pub fn unmute_all(&self) {
        self.line.borrow_mut().muted.clear();
    }

    /// Mute every reply.
    pub fn set_silent(&self) {
        for packet_type in [SET_RESPONSE, GET_INFO_RESPONSE, CONNECT_RESPONSE] {
            self.mute(packet_type);
        }
    }
}

impl Transport for EmulatedTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.line.borrow_mut().receive(bytes)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.line.borrow().outbound.len())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.line
            .borrow_mut()
            .outbound
            .pop_front()
            .ok_or_else(|| io::ErrorKind::WouldBlock.into())
    }
}
