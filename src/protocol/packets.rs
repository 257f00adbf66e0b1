use packed_struct::prelude::*;

use super::codec::Frame;
use super::ids::*;
use super::lookup::{FAN, MODE, POWER, ROOM_TEMPERATURE, TEMPERATURE, VANE, WIDE_VANE};
use super::settings::SettingsRecord;

/*
    Frame layout:

    FC TT 01 30 LL [LL data bytes] CS

    TT = packet type (see `ids`)
    LL = data length, 0x10 for everything except the handshake
    CS = 0xfc - sum(all preceding bytes)

    Settings writes and info requests are 22 bytes on the wire.
*/

pub trait Command {
    const ID: u8;
}

/// The complete handshake frame.
pub const CONNECT: [u8; 8] = [0xfc, 0x5a, 0x01, 0x30, 0x02, 0xca, 0x01, 0xa8];

/// Frame header plus the fixed leading data bytes of a settings write.
pub const SET_REQUEST_HEADER: [u8; 8] = [0xfc, 0x41, 0x01, 0x30, 0x10, 0x01, 0x9f, 0x00];

pub const INFO_REQUEST_HEADER: [u8; 5] = [0xfc, 0x42, 0x01, 0x30, 0x10];

pub const INFO_MODES: [u8; 2] = [0x02, 0x03];

/// Length on the wire of settings writes and info requests.
pub const PACKET_LEN: usize = 22;

/// Define a command whose data bytes are always `0x00`
macro_rules! empty_command {
    ($(#[$meta:meta])* $name:ident, $id:expr, $len:tt) => {
        $(#[$meta])*
        #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
        #[packed_struct(bit_numbering="msb0")]
        pub struct $name {
            _empty: [u8; $len]
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    _empty: [0x00; $len]
                }
            }
        }

        impl Command for $name {
            const ID: u8 = $id;
        }
    }
}

mod connect {
    use super::*;

    /// Command `0x5a` -- Connect (request).
    ///
    /// The unit ignores everything else on the line until it has seen this.
    /// It replies with [ConnectResponse].
    #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
    #[packed_struct(bit_numbering="msb0")]
    pub struct ConnectRequest {
        /// Unknown. Always `0xca`.
        #[packed_field(bytes="0")]
        pub unknown_byte0: u8,

        /// Unknown. Always `0x01`.
        #[packed_field(bytes="1")]
        pub unknown_byte1: u8,
    }

    impl Default for ConnectRequest {
        fn default() -> Self {
            Self {
                unknown_byte0: 0xca,
                unknown_byte1: 0x01,
            }
        }
    }

    impl Command for ConnectRequest {
        const ID: u8 = CONNECT_REQUEST;
    }

    empty_command!(
        /// Command `0x7a` -- Connect (response).
        ConnectResponse,
        CONNECT_RESPONSE,
        1
    );
}

pub use connect::{ConnectRequest, ConnectResponse};

mod set {
    use super::*;

    /// Command `0x41` -- Settings write (request).
    ///
    /// Every field is always present; the flag bytes are fixed.
    ///
    /// ```text
    ///  0   1   2   3   4   5   6   7   8 ..12  13  14  15
    /// 01  9F  00  PW  MO  TM  FA  VA  00..00  WV  00  00
    /// ```
    ///
    /// The unit replies with [SetResponse].
    #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
    #[packed_struct(bit_numbering="msb0")]
    pub struct SetRequest {
        /// Always `0x01` for a settings write.
        #[packed_field(bytes="0")]
        pub kind: u8,

        /// Which of power/mode/temperature/fan/vane are being set.
        #[packed_field(bytes="1")]
        pub flags0: u8,

        /// Whether wide vane is being set.
        #[packed_field(bytes="2")]
        pub flags1: u8,

        #[packed_field(bytes="3")]
        pub power: u8,

        #[packed_field(bytes="4")]
        pub mode: u8,

        #[packed_field(bytes="5")]
        pub temperature: u8,

        #[packed_field(bytes="6")]
        pub fan: u8,

        #[packed_field(bytes="7")]
        pub vane: u8,

        #[packed_field(bytes="8..=12")]
        pub reserved0: [u8; 5],

        #[packed_field(bytes="13")]
        pub wide_vane: u8,

        #[packed_field(bytes="14..=15")]
        pub reserved1: [u8; 2],
    }

    impl SetRequest {
        pub fn from_settings(settings: &SettingsRecord) -> Self {
            Self {
                kind: SET_REQUEST_HEADER[5],
                flags0: SET_REQUEST_HEADER[6],
                flags1: SET_REQUEST_HEADER[7],
                power: POWER.encode(settings.power),
                mode: MODE.encode(settings.mode),
                temperature: TEMPERATURE.encode(settings.temperature),
                fan: FAN.encode(settings.fan),
                vane: VANE.encode(settings.vane),
                reserved0: [0x00; 5],
                wide_vane: WIDE_VANE.encode(settings.wide_vane),
                reserved1: [0x00; 2],
            }
        }

        /// Decode the fields. The room temperature isn't part of this
        /// packet and is left at its default.
        pub fn settings(&self) -> SettingsRecord {
            SettingsRecord {
                power: POWER.decode(self.power),
                mode: MODE.decode(self.mode),
                temperature: TEMPERATURE.decode(self.temperature),
                fan: FAN.decode(self.fan),
                vane: VANE.decode(self.vane),
                wide_vane: WIDE_VANE.decode(self.wide_vane),
                ..SettingsRecord::default()
            }
        }
    }

    impl Command for SetRequest {
        const ID: u8 = SET_REQUEST;
    }

    empty_command!(
        /// Command `0x61` -- Settings write (response).
        ///
        /// Sent by the unit once it has applied a [SetRequest].
        SetResponse,
        SET_RESPONSE,
        16
    );
}

pub use set::{SetRequest, SetResponse};

mod info {
    use super::*;

    #[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
    pub enum InfoType {
        Settings = 0x02,
        RoomTemperature = 0x03,
    }

    impl InfoType {
        /// The selector polled after this one.
        pub fn next(self) -> Self {
            match self {
                InfoType::Settings => InfoType::RoomTemperature,
                InfoType::RoomTemperature => InfoType::Settings,
            }
        }
    }

    /// Command `0x42` -- Info (request).
    ///
    /// The unit replies with a `0x62` frame whose first data byte echoes
    /// `info_type`.
    #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
    #[packed_struct(bit_numbering="msb0")]
    pub struct InfoRequest {
        #[packed_field(bytes="0", ty="enum")]
        pub info_type: InfoType,

        #[packed_field(bytes="1..=15")]
        pub reserved: [u8; 15],
    }

    impl InfoRequest {
        pub fn new(info_type: InfoType) -> Self {
            Self {
                info_type,
                reserved: [0x00; 15],
            }
        }
    }

    impl Command for InfoRequest {
        const ID: u8 = GET_INFO_REQUEST;
    }

    /// Command `0x62` -- Info (response), settings.
    ///
    /// ```text
    ///  0   1   2   3   4   5   6   7   8   9  10  11..15
    /// 02  xx  xx  PW  MO  TM  FA  VA  xx  xx  WV  xx..xx
    /// ```
    #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
    #[packed_struct(bit_numbering="msb0")]
    pub struct SettingsResponse {
        #[packed_field(bytes="0")]
        pub kind: u8,

        #[packed_field(bytes="1..=2")]
        pub unknown0: [u8; 2],

        #[packed_field(bytes="3")]
        pub power: u8,

        #[packed_field(bytes="4")]
        pub mode: u8,

        #[packed_field(bytes="5")]
        pub temperature: u8,

        #[packed_field(bytes="6")]
        pub fan: u8,

        #[packed_field(bytes="7")]
        pub vane: u8,

        #[packed_field(bytes="8..=9")]
        pub unknown1: [u8; 2],

        #[packed_field(bytes="10")]
        pub wide_vane: u8,

        #[packed_field(bytes="11..=15")]
        pub unknown2: [u8; 5],
    }

    impl SettingsResponse {
        pub fn from_settings(settings: &SettingsRecord) -> Self {
            Self {
                kind: InfoType::Settings as u8,
                unknown0: [0x00; 2],
                power: POWER.encode(settings.power),
                mode: MODE.encode(settings.mode),
                temperature: TEMPERATURE.encode(settings.temperature),
                fan: FAN.encode(settings.fan),
                vane: VANE.encode(settings.vane),
                unknown1: [0x00; 2],
                wide_vane: WIDE_VANE.encode(settings.wide_vane),
                unknown2: [0x00; 5],
            }
        }

        /// Decode the fields. The room temperature is reported separately
        /// and is left at its default.
        pub fn settings(&self) -> SettingsRecord {
            SettingsRecord {
                power: POWER.decode(self.power),
                mode: MODE.decode(self.mode),
                temperature: TEMPERATURE.decode(self.temperature),
                fan: FAN.decode(self.fan),
                vane: VANE.decode(self.vane),
                wide_vane: WIDE_VANE.decode(self.wide_vane),
                ..SettingsRecord::default()
            }
        }
    }

    impl Command for SettingsResponse {
        const ID: u8 = GET_INFO_RESPONSE;
    }

    /// Command `0x62` -- Info (response), room temperature.
    #[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
    #[packed_struct(bit_numbering="msb0")]
    pub struct RoomTemperatureResponse {
        #[packed_field(bytes="0")]
        pub kind: u8,

        #[packed_field(bytes="1..=2")]
        pub unknown0: [u8; 2],

        #[packed_field(bytes="3")]
        pub room_temperature: u8,

        #[packed_field(bytes="4..=15")]
        pub unknown1: [u8; 12],
    }

    impl RoomTemperatureResponse {
        pub fn new(celsius: u8) -> Self {
            Self {
                kind: InfoType::RoomTemperature as u8,
                unknown0: [0x00; 2],
                room_temperature: ROOM_TEMPERATURE.encode(celsius),
                unknown1: [0x00; 12],
            }
        }

        pub fn celsius(&self) -> u8 {
            ROOM_TEMPERATURE.decode(self.room_temperature)
        }
    }

    impl Command for RoomTemperatureResponse {
        const ID: u8 = GET_INFO_RESPONSE;
    }
}

pub use info::{InfoType, InfoRequest, SettingsResponse, RoomTemperatureResponse};

/// Build the settings-write frame for `settings`.
pub fn set_request(settings: &SettingsRecord) -> Result<Frame, PackingError> {
    Frame::pack(&SetRequest::from_settings(settings))
}

pub fn info_request(info_type: InfoType) -> Result<Frame, PackingError> {
    Frame::pack(&InfoRequest::new(info_type))
}

pub fn connect_request() -> Result<Frame, PackingError> {
    Frame::pack(&ConnectRequest::default())
}

/// A valid frame, interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// A complete set of settings, from a settings echo or an info response.
    /// The room temperature is not part of these frames.
    Settings(SettingsRecord),

    /// Room sensor reading, whole degrees Celsius.
    RoomTemperature(u8),

    SetAcknowledged,

    ConnectAcknowledged,

    /// A frame this driver has no use for.
    Other { packet_type: u8, kind: Option<u8> },
}

impl Response {
    pub fn parse(frame: &Frame) -> Result<Self, PackingError> {
        let kind = frame.data.first().copied();

        let response = match (frame.packet_type, kind) {
            (SET_REQUEST, _) => Response::Settings(frame.unpack_as::<SetRequest>()?.settings()),

            (GET_INFO_RESPONSE, Some(0x02)) => {
                Response::Settings(frame.unpack_as::<SettingsResponse>()?.settings())
            }

            (GET_INFO_RESPONSE, Some(0x03)) => {
                Response::RoomTemperature(frame.unpack_as::<RoomTemperatureResponse>()?.celsius())
            }

            (SET_RESPONSE, _) => Response::SetAcknowledged,

            (CONNECT_RESPONSE, _) => Response::ConnectAcknowledged,

            (packet_type, kind) => Response::Other { packet_type, kind },
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use proptest::sample::select;
    use rstest::rstest;

    use super::*;
    use crate::protocol::codec::{checksum, checksum_valid};
    use crate::protocol::settings::{FanSpeed, Mode, Power, Vane, WideVane};

    fn cool_22() -> SettingsRecord {
        SettingsRecord {
            power: Power::On,
            mode: Mode::Cool,
            temperature: 22,
            fan: FanSpeed::Auto,
            vane: Vane::Auto,
            wide_vane: WideVane::Center,
            room_temperature: 20,
        }
    }

    #[test]
    fn connect_frame() {
        let frame = connect_request().unwrap();

        assert_eq!(&frame.to_bytes()[..], &CONNECT[..]);
    }

    #[test]
    fn set_request_frame() {
        let bytes = set_request(&cool_22()).unwrap().to_bytes();

        assert_eq!(
            &bytes[..],
            &[
                // header
                0xfc, 0x41, 0x01, 0x30, 0x10, 0x01, 0x9f, 0x00,
                // power, mode, temperature, fan, vane
                0x01, 0x03, 0x09, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00,
                // wide vane
                0x03,
                0x00, 0x00,
                // checksum
                0xce,
            ][..]
        );
    }

    #[test]
    fn set_request_layout() {
        let bytes = set_request(&cool_22()).unwrap().to_bytes();

        assert_eq!(bytes.len(), PACKET_LEN);
        assert_eq!(&bytes[..8], &SET_REQUEST_HEADER[..]);
        assert_eq!(bytes[9], 0x03);
        assert_eq!(bytes[10], 0x09);
        assert_eq!(bytes[21], checksum(&bytes[..21]));
    }

    #[rstest]
    #[case(InfoType::Settings, 0x02, 0x7b)]
    #[case(InfoType::RoomTemperature, 0x03, 0x7a)]
    fn info_request_frames(#[case] info_type: InfoType, #[case] selector: u8, #[case] expected_checksum: u8) {
        let bytes = info_request(info_type).unwrap().to_bytes();

        assert_eq!(bytes.len(), PACKET_LEN);
        assert_eq!(&bytes[..5], &INFO_REQUEST_HEADER[..]);
        assert_eq!(bytes[5], selector);
        assert!(INFO_MODES.contains(&bytes[5]));
        assert!(bytes[6..21].iter().all(|b| *b == 0x00));
        assert_eq!(bytes[21], expected_checksum);
    }

    #[test]
    fn info_types_alternate() {
        assert_eq!(InfoType::Settings.next(), InfoType::RoomTemperature);
        assert_eq!(InfoType::Settings.next().next(), InfoType::Settings);
    }

    #[test]
    fn builders_are_pure() {
        let settings = cool_22();

        assert_eq!(set_request(&settings).unwrap(), set_request(&settings).unwrap());
        assert!(checksum_valid(&set_request(&settings).unwrap().to_bytes()));
    }

    #[test]
    fn settings_echo_decodes() {
        let frame = set_request(&cool_22()).unwrap();

        assert_eq!(Response::parse(&frame).unwrap(), Response::Settings(cool_22()));
    }

    #[test]
    fn settings_info_response_decodes() {
        let mut data = [0x00; 16];
        data[0] = 0x02;
        data[3] = 0x01; // ON
        data[4] = 0x08; // AUTO
        data[5] = 0x0f; // 16
        data[6] = 0x06; // 4
        data[7] = 0x07; // SWING
        data[10] = 0x0c; // SWING
        let frame = Frame::new(GET_INFO_RESPONSE, data.to_vec());

        let expected = SettingsRecord {
            power: Power::On,
            mode: Mode::Auto,
            temperature: 16,
            fan: FanSpeed::Speed4,
            vane: Vane::Swing,
            wide_vane: WideVane::Swing,
            room_temperature: 10,
        };

        assert_eq!(Response::parse(&frame).unwrap(), Response::Settings(expected));
    }

    #[test]
    fn settings_response_round_trips_through_a_frame() {
        let frame = Frame::pack(&SettingsResponse::from_settings(&cool_22())).unwrap();

        assert_eq!(frame.data[10], 0x03);
        assert_eq!(Response::parse(&frame).unwrap(), Response::Settings(cool_22()));
    }

    #[test]
    fn room_temperature_response_decodes() {
        let mut data = [0x00; 16];
        data[0] = 0x03;
        data[3] = 0x0c;
        let frame = Frame::new(GET_INFO_RESPONSE, data.to_vec());

        assert_eq!(Response::parse(&frame).unwrap(), Response::RoomTemperature(22));
    }

    #[test]
    fn unknown_field_bytes_decode_to_defaults() {
        let mut data = [0x00; 16];
        data[0] = 0x02;
        data[4] = 0x55;
        data[10] = 0x00;
        let frame = Frame::new(GET_INFO_RESPONSE, data.to_vec());

        match Response::parse(&frame).unwrap() {
            Response::Settings(settings) => {
                assert_eq!(settings.mode, Mode::Heat);
                assert_eq!(settings.wide_vane, WideVane::FarLeft);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn acknowledgements() {
        let set_ack = Frame::pack(&SetResponse::default()).unwrap();
        let connect_ack = Frame::pack(&ConnectResponse::default()).unwrap();

        assert_eq!(Response::parse(&set_ack).unwrap(), Response::SetAcknowledged);
        assert_eq!(Response::parse(&connect_ack).unwrap(), Response::ConnectAcknowledged);
        assert_eq!(&connect_ack.to_bytes()[..], &[0xfc, 0x7a, 0x01, 0x30, 0x01, 0x00, 0x54]);
    }

    #[test]
    fn other_frames_are_passed_through() {
        let mut data = [0x00; 16];
        data[0] = 0x06;
        let frame = Frame::new(GET_INFO_RESPONSE, data.to_vec());

        assert_eq!(
            Response::parse(&frame).unwrap(),
            Response::Other { packet_type: GET_INFO_RESPONSE, kind: Some(0x06) }
        );
    }

    #[test]
    fn short_settings_frames_fail_to_unpack() {
        let frame = Frame::new(SET_REQUEST, vec![0x01, 0x9f, 0x00]);

        assert!(Response::parse(&frame).is_err());
    }

    fn any_settings() -> impl Strategy<Value = SettingsRecord> {
        (
            select(POWER.values()),
            select(MODE.values()),
            select(TEMPERATURE.values()),
            select(FAN.values()),
            select(VANE.values()),
            select(WIDE_VANE.values()),
        )
            .prop_map(|(power, mode, temperature, fan, vane, wide_vane)| SettingsRecord {
                power,
                mode,
                temperature,
                fan,
                vane,
                wide_vane,
                ..SettingsRecord::default()
            })
    }

    proptest! {
        #[test]
        fn flipped_byte_in_a_settings_write_is_detected(settings in any_settings(), index in 0usize..PACKET_LEN, mask in 1u8..=255) {
            let mut bytes = set_request(&settings).unwrap().to_bytes().to_vec();
            prop_assert!(checksum_valid(&bytes));

            bytes[index] ^= mask;
            prop_assert!(!checksum_valid(&bytes));
        }

        #[test]
        fn flipped_byte_in_an_info_request_is_detected(room in any::<bool>(), index in 0usize..PACKET_LEN, mask in 1u8..=255) {
            let info_type = if room { InfoType::RoomTemperature } else { InfoType::Settings };
            let mut bytes = info_request(info_type).unwrap().to_bytes().to_vec();
            prop_assert!(checksum_valid(&bytes));

            bytes[index] ^= mask;
            prop_assert!(!checksum_valid(&bytes));
        }
    }
}
