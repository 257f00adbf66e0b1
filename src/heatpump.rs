use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::gate::{Admission, TransportGate};
use crate::protocol::codec::{Cn105Codec, Frame, RxFrame};
use crate::protocol::lookup::{Category, SemanticValue, FAN, MODE, POWER, ROOM_TEMPERATURE, TEMPERATURE, VANE, WIDE_VANE};
use crate::protocol::packets::{connect_request, info_request, InfoType, Response, SetRequest};
use crate::protocol::settings::{self, FanSpeed, Mode, Power, SettingsRecord, Vane, WideVane};
use crate::transport::Transport;

/// What one received frame did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// `current` was replaced by a settings report.
    Settings,
    RoomTemperature,
    /// `current` was replaced by the last sent settings.
    SetAcknowledged,
    ConnectAcknowledged,
    /// A valid frame with nothing in it for us.
    Ignored,
    /// Checksum mismatch, or a frame too short for its type.
    Corrupted,
}

/// A heat pump on the other end of a CN105 link.
///
/// Holds what the unit last reported (`current`) and what the caller wants
/// (`wanted`). Nothing here blocks except [`HeatPump::connect`].
pub struct HeatPump<T, C> {
    gate: Option<TransportGate<T>>,
    clock: C,
    config: DriverConfig,

    codec: Cn105Codec,
    rx: BytesMut,

    current: SettingsRecord,
    wanted: SettingsRecord,

    /// Settings of the last admitted write, confirmed by a `0x61`.
    last_sent: Option<SettingsRecord>,

    next_info: InfoType,
    last_update_successful: bool,
    connected: bool,
}

impl<T: Transport, C: Clock> HeatPump<T, C> {
    pub fn new(clock: C, config: DriverConfig) -> Self {
        Self {
            gate: None,
            clock,
            config,
            codec: Cn105Codec::new(),
            rx: BytesMut::new(),
            current: SettingsRecord::default(),
            wanted: SettingsRecord::default(),
            last_sent: None,
            next_info: InfoType::Settings,
            last_update_successful: false,
            connected: false,
        }
    }

    /// Take over `transport` and run the handshake.
    ///
    /// Sends CONNECT and waits for the acknowledgement, then asks for the
    /// unit's settings and its room temperature, waiting for each reply.
    /// Each wait is bounded by
    /// [`DriverConfig::connect_timeout`]. On success `wanted` is a copy of
    /// what the unit reported.
    pub fn connect(&mut self, transport: T) -> Result<()> {
        self.connected = false;
        self.last_sent = None;
        self.rx.clear();
        self.gate = Some(TransportGate::new(transport, self.config.min_send_interval));

        info!("connecting");
        self.force_send(&connect_request()?)?;
        if !self.wait_for(ParseOutcome::ConnectAcknowledged) {
            return Err(Error::ConnectTimeout(self.config.connect_timeout));
        }
        info!("unit acknowledged connect");

        self.force_send(&info_request(InfoType::Settings)?)?;
        if !self.wait_for(ParseOutcome::Settings) {
            return Err(Error::SeedTimeout(self.config.connect_timeout));
        }

        self.force_send(&info_request(InfoType::RoomTemperature)?)?;
        if !self.wait_for(ParseOutcome::RoomTemperature) {
            return Err(Error::SeedTimeout(self.config.connect_timeout));
        }

        self.wanted = self.current;
        self.next_info = InfoType::Settings;
        self.connected = true;

        info!("connected, unit reports {:?}", self.current);

        Ok(())
    }

    fn force_send(&mut self, frame: &Frame) -> Result<()> {
        let now = self.clock.millis();
        let gate = self.gate.as_mut().ok_or(Error::NotConnected)?;

        gate.force_send(now, &frame.to_bytes())?;

        Ok(())
    }

    /// Poll until a frame has the wanted effect, or the connect timeout runs out.
    fn wait_for(&mut self, wanted: ParseOutcome) -> bool {
        let deadline = self.clock.millis() + self.config.connect_timeout.as_millis() as u64;

        loop {
            match self.receive() {
                Ok(outcomes) if outcomes.contains(&wanted) => return true,
                Ok(_) => {}
                Err(err) => warn!("receive failed: {err}"),
            }

            if self.clock.millis() >= deadline {
                return false;
            }

            self.clock.delay(self.config.poll_step);
        }
    }

    /// Send `wanted` if the rate limit allows. Returns whether the send was
    /// admitted, not whether the unit accepted it.
    pub fn update(&mut self) -> bool {
        if !self.connected {
            debug!("update before connect");
            return false;
        }

        let now = self.clock.millis();
        self.send_wanted(now)
    }

    /// Read whatever the unit sent, then use the send slot (if open) to
    /// either push `wanted` or poll the next info selector.
    pub fn sync(&mut self) {
        if !self.connected {
            return;
        }

        if let Err(err) = self.receive() {
            warn!("receive failed: {err}");
            self.last_update_successful = false;
        }

        let now = self.clock.millis();
        let can_send = self.gate.as_ref().is_some_and(|gate| gate.can_send(now));
        if !can_send {
            return;
        }

        if self.wanted != self.current {
            self.send_wanted(now);
        } else {
            self.poll_info(now);
        }
    }

    fn send_wanted(&mut self, now: u64) -> bool {
        let request = SetRequest::from_settings(&self.wanted);
        let frame = match Frame::pack(&request) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("unable to build settings write: {err:?}");
                self.last_update_successful = false;
                return false;
            }
        };

        let Some(gate) = self.gate.as_mut() else {
            return false;
        };

        match gate.send(now, &frame.to_bytes()) {
            Admission::Sent => {
                let sent = request.settings();
                debug!("sent settings {sent:?}");
                self.last_sent = Some(sent);
                true
            }
            Admission::Deferred => false,
            Admission::Failed(_) => {
                self.last_sent = None;
                self.last_update_successful = false;
                true
            }
        }
    }

    fn poll_info(&mut self, now: u64) {
        let info_type = self.next_info;

        let frame = match info_request(info_type) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("unable to build info request: {err:?}");
                return;
            }
        };

        let Some(gate) = self.gate.as_mut() else {
            return;
        };

        match gate.send(now, &frame.to_bytes()) {
            Admission::Sent => {
                trace!("polled {info_type:?}");
                self.next_info = info_type.next();
            }
            Admission::Deferred => {}
            Admission::Failed(_) => {
                self.last_update_successful = false;
                self.next_info = info_type.next();
            }
        }
    }

    /// Drain the transport and apply every complete frame to `current`.
    /// Partial frames stay buffered for the next call.
    pub fn receive(&mut self) -> Result<Vec<ParseOutcome>> {
        let gate = self.gate.as_mut().ok_or(Error::NotConnected)?;
        gate.read_available(&mut self.rx)?;

        let mut outcomes = Vec::new();
        while let Some(frame) = self.codec.decode(&mut self.rx)? {
            outcomes.push(self.apply(frame));
        }

        Ok(outcomes)
    }

    fn apply(&mut self, frame: RxFrame) -> ParseOutcome {
        let frame = match frame {
            RxFrame::Valid(frame) => frame,
            RxFrame::Corrupted(_) => {
                self.last_update_successful = false;
                return ParseOutcome::Corrupted;
            }
        };

        let response = match Response::parse(&frame) {
            Ok(response) => response,
            Err(err) => {
                warn!("undecodable frame {:#04x} {:02x?}: {err:?}", frame.packet_type, &frame.data[..]);
                self.last_update_successful = false;
                return ParseOutcome::Corrupted;
            }
        };

        self.last_update_successful = true;

        match response {
            Response::Settings(settings) => {
                self.replace_current(settings);
                ParseOutcome::Settings
            }
            Response::RoomTemperature(celsius) => {
                self.current.room_temperature = celsius;
                ParseOutcome::RoomTemperature
            }
            Response::SetAcknowledged => {
                if let Some(sent) = self.last_sent.take() {
                    self.replace_current(sent);
                }
                ParseOutcome::SetAcknowledged
            }
            Response::ConnectAcknowledged => ParseOutcome::ConnectAcknowledged,
            Response::Other { packet_type, kind } => {
                trace!("ignoring frame {packet_type:#04x} ({kind:02x?})");
                ParseOutcome::Ignored
            }
        }
    }

    /// Every field but the room temperature comes from `settings`.
    fn replace_current(&mut self, settings: SettingsRecord) {
        let room_temperature = self.current.room_temperature;
        let settings = SettingsRecord { room_temperature, ..settings };

        if settings != self.current {
            debug!("unit settings changed to {settings:?}");
        }

        self.current = settings;
    }

    pub fn get_settings(&self) -> SettingsRecord {
        self.current
    }

    pub fn wanted_settings(&self) -> SettingsRecord {
        self.wanted
    }

    pub fn set_settings(&mut self, settings: SettingsRecord) {
        self.wanted = SettingsRecord {
            temperature: TEMPERATURE.decode(TEMPERATURE.encode(settings.temperature)),
            ..settings
        };
    }

    pub fn power(&self) -> Power {
        self.wanted.power
    }

    pub fn set_power(&mut self, power: Power) {
        self.wanted.power = power;
    }

    pub fn power_on(&self) -> bool {
        self.wanted.power.into()
    }

    pub fn set_power_on(&mut self, on: bool) {
        self.wanted.power = on.into();
    }

    pub fn mode(&self) -> Mode {
        self.wanted.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.wanted.mode = mode;
    }

    pub fn temperature(&self) -> u8 {
        self.wanted.temperature
    }

    /// Temperatures the unit can't be set to become the first table entry (31).
    pub fn set_temperature(&mut self, celsius: u8) {
        self.wanted.temperature = TEMPERATURE.decode(TEMPERATURE.encode(celsius));
    }

    pub fn fan_speed(&self) -> FanSpeed {
        self.wanted.fan
    }

    pub fn set_fan_speed(&mut self, fan: FanSpeed) {
        self.wanted.fan = fan;
    }

    pub fn vane(&self) -> Vane {
        self.wanted.vane
    }

    pub fn set_vane(&mut self, vane: Vane) {
        self.wanted.vane = vane;
    }

    pub fn wide_vane(&self) -> WideVane {
        self.wanted.wide_vane
    }

    pub fn set_wide_vane(&mut self, wide_vane: WideVane) {
        self.wanted.wide_vane = wide_vane;
    }

    /// Last reported room temperature, whole degrees Celsius.
    pub fn room_temperature(&self) -> u8 {
        self.current.room_temperature
    }

    /// Set a field of `wanted` by category. Values that aren't in the
    /// category's table become its first entry. The room temperature can't
    /// be set; returns false for it.
    pub fn set_value(&mut self, category: Category, value: &SemanticValue) -> bool {
        let byte = category.encode(value);

        match category {
            Category::Power => self.wanted.power = POWER.decode(byte),
            Category::Mode => self.wanted.mode = MODE.decode(byte),
            Category::Temperature => self.wanted.temperature = TEMPERATURE.decode(byte),
            Category::Fan => self.wanted.fan = FAN.decode(byte),
            Category::Vane => self.wanted.vane = VANE.decode(byte),
            Category::WideVane => self.wanted.wide_vane = WIDE_VANE.decode(byte),
            Category::RoomTemperature => {
                debug!("room temperature is read-only");
                return false;
            }
        }

        true
    }

    /// A field of `current` by category.
    pub fn current_value(&self, category: Category) -> SemanticValue {
        let current = &self.current;

        let byte = match category {
            Category::Power => POWER.encode(current.power),
            Category::Mode => MODE.encode(current.mode),
            Category::Temperature => TEMPERATURE.encode(current.temperature),
            Category::Fan => FAN.encode(current.fan),
            Category::Vane => VANE.encode(current.vane),
            Category::WideVane => WIDE_VANE.encode(current.wide_vane),
            Category::RoomTemperature => ROOM_TEMPERATURE.encode(current.room_temperature),
        };

        category.decode(byte)
    }

    /// Whether the most recent frame, send or read went through cleanly.
    pub fn last_update_successful(&self) -> bool {
        self.last_update_successful
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn fahrenheit_to_celsius(fahrenheit: i32) -> i32 {
        settings::fahrenheit_to_celsius(fahrenheit)
    }

    pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
        settings::celsius_to_fahrenheit(celsius)
    }
}
