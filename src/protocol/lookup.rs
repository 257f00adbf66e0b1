//! Byte <-> value tables for every field the unit understands.
//!
//! Each table pairs a fixed list of semantic values with the byte the unit
//! uses for each of them. Lookups are linear scans; the longest table has 32
//! entries. A byte (or value) that is not in a table maps to the table's
//! first entry, so a garbled field never stops the rest of a frame from
//! decoding.

use std::fmt::Debug;
use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use super::settings::{FanSpeed, Mode, Power, Vane, WideVane};

pub struct ByteMap<T: 'static> {
    name: &'static str,
    values: &'static [T],
    bytes: &'static [u8],
}

impl<T> ByteMap<T>
where
    T: Copy + PartialEq + Debug + 'static,
{
    const fn new(name: &'static str, values: &'static [T], bytes: &'static [u8]) -> Self {
        assert!(values.len() == bytes.len());
        assert!(!values.is_empty());

        Self { name, values, bytes }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'static [T] {
        self.values
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    pub fn default_value(&self) -> T {
        self.values[0]
    }

    pub fn default_byte(&self) -> u8 {
        self.bytes[0]
    }

    pub fn decode(&self, byte: u8) -> T {
        match self.bytes.iter().position(|b| *b == byte) {
            Some(index) => self.values[index],
            None => {
                let fallback = self.default_value();
                debug!("{}: unknown byte {byte:#04x}, using {fallback:?}", self.name);
                fallback
            }
        }
    }

    pub fn encode(&self, value: T) -> u8 {
        match self.values.iter().position(|v| *v == value) {
            Some(index) => self.bytes[index],
            None => {
                let fallback = self.default_byte();
                debug!("{}: no byte for {value:?}, using {fallback:#04x}", self.name);
                fallback
            }
        }
    }
}

pub const POWER: ByteMap<Power> = ByteMap::new(
    "power",
    &[Power::Off, Power::On],
    &[0x00, 0x01],
);

pub const MODE: ByteMap<Mode> = ByteMap::new(
    "mode",
    &[Mode::Heat, Mode::Dry, Mode::Cool, Mode::Fan, Mode::Auto],
    &[0x01, 0x02, 0x03, 0x07, 0x08],
);

pub const TEMPERATURE: ByteMap<u8> = ByteMap::new(
    "temperature",
    &[31, 30, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20, 19, 18, 17, 16],
    &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f],
);

pub const FAN: ByteMap<FanSpeed> = ByteMap::new(
    "fan",
    &[FanSpeed::Auto, FanSpeed::Quiet, FanSpeed::Speed1, FanSpeed::Speed2, FanSpeed::Speed3, FanSpeed::Speed4],
    &[0x00, 0x01, 0x02, 0x03, 0x05, 0x06],
);

pub const VANE: ByteMap<Vane> = ByteMap::new(
    "vane",
    &[Vane::Auto, Vane::Position1, Vane::Position2, Vane::Position3, Vane::Position4, Vane::Position5, Vane::Swing],
    &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x07],
);

pub const WIDE_VANE: ByteMap<WideVane> = ByteMap::new(
    "wide vane",
    &[
        WideVane::FarLeft,
        WideVane::Left,
        WideVane::Center,
        WideVane::Right,
        WideVane::FarRight,
        WideVane::LeftRightSwing,
        WideVane::Swing,
    ],
    &[0x01, 0x02, 0x03, 0x04, 0x05, 0x08, 0x0c],
);

pub const ROOM_TEMPERATURE: ByteMap<u8> = ByteMap::new(
    "room temperature",
    &[
        10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
        26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41,
    ],
    &[
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
    ],
);

/// A semantic value in its loosely typed form: a name for the enumerated
/// categories, a number for the temperatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemanticValue {
    Named(String),
    Number(i32),
}

impl From<&str> for SemanticValue {
    fn from(name: &str) -> Self {
        SemanticValue::Named(name.to_string())
    }
}

impl From<i32> for SemanticValue {
    fn from(number: i32) -> Self {
        SemanticValue::Number(number)
    }
}

impl std::fmt::Display for SemanticValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticValue::Named(name) => write!(f, "{name}"),
            SemanticValue::Number(number) => write!(f, "{number}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Category {
    Power,
    Mode,
    Temperature,
    Fan,
    Vane,
    WideVane,
    RoomTemperature,
}

/// Whether a category's semantic values are names or numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Named,
    Number,
}

impl Category {
    pub fn kind(self) -> ValueKind {
        match self {
            Category::Temperature | Category::RoomTemperature => ValueKind::Number,
            _ => ValueKind::Named,
        }
    }

    /// Number of entries in this category's table.
    pub fn len(self) -> usize {
        match self {
            Category::Power => POWER.len(),
            Category::Mode => MODE.len(),
            Category::Temperature => TEMPERATURE.len(),
            Category::Fan => FAN.len(),
            Category::Vane => VANE.len(),
            Category::WideVane => WIDE_VANE.len(),
            Category::RoomTemperature => ROOM_TEMPERATURE.len(),
        }
    }

    pub fn bytes(self) -> &'static [u8] {
        match self {
            Category::Power => POWER.bytes(),
            Category::Mode => MODE.bytes(),
            Category::Temperature => TEMPERATURE.bytes(),
            Category::Fan => FAN.bytes(),
            Category::Vane => VANE.bytes(),
            Category::WideVane => WIDE_VANE.bytes(),
            Category::RoomTemperature => ROOM_TEMPERATURE.bytes(),
        }
    }

    pub fn decode(self, byte: u8) -> SemanticValue {
        fn named<T: Into<&'static str>>(value: T) -> SemanticValue {
            SemanticValue::Named(value.into().to_string())
        }

        match self {
            Category::Power => named(POWER.decode(byte)),
            Category::Mode => named(MODE.decode(byte)),
            Category::Temperature => SemanticValue::Number(TEMPERATURE.decode(byte).into()),
            Category::Fan => named(FAN.decode(byte)),
            Category::Vane => named(VANE.decode(byte)),
            Category::WideVane => named(WIDE_VANE.decode(byte)),
            Category::RoomTemperature => SemanticValue::Number(ROOM_TEMPERATURE.decode(byte).into()),
        }
    }

    /// Values of the wrong kind, unparseable names and out-of-table numbers
    /// all encode to the category's first byte.
    pub fn encode(self, value: &SemanticValue) -> u8 {
        fn by_name<T>(table: &ByteMap<T>, value: &SemanticValue) -> u8
        where
            T: Copy + PartialEq + Debug + FromStr + 'static,
        {
            match value {
                SemanticValue::Named(name) => match T::from_str(name) {
                    Ok(value) => table.encode(value),
                    Err(_) => {
                        debug!("{}: unknown name {name:?}", table.name());
                        table.default_byte()
                    }
                },
                SemanticValue::Number(number) => {
                    debug!("{}: expected a name, got {number}", table.name());
                    table.default_byte()
                }
            }
        }

        fn by_number(table: &ByteMap<u8>, value: &SemanticValue) -> u8 {
            match value {
                SemanticValue::Number(number) => match u8::try_from(*number) {
                    Ok(number) => table.encode(number),
                    Err(_) => table.default_byte(),
                },
                SemanticValue::Named(name) => {
                    debug!("{}: expected a number, got {name:?}", table.name());
                    table.default_byte()
                }
            }
        }

        match self {
            Category::Power => by_name(&POWER, value),
            Category::Mode => by_name(&MODE, value),
            Category::Temperature => by_number(&TEMPERATURE, value),
            Category::Fan => by_name(&FAN, value),
            Category::Vane => by_name(&VANE, value),
            Category::WideVane => by_name(&WIDE_VANE, value),
            Category::RoomTemperature => by_number(&ROOM_TEMPERATURE, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn round_trips<T: Copy + PartialEq + Debug + 'static>(table: &ByteMap<T>) {
        for value in table.values() {
            assert_eq!(table.decode(table.encode(*value)), *value, "{}", table.name());
        }
    }

    #[test]
    fn every_table_round_trips() {
        round_trips(&POWER);
        round_trips(&MODE);
        round_trips(&TEMPERATURE);
        round_trips(&FAN);
        round_trips(&VANE);
        round_trips(&WIDE_VANE);
        round_trips(&ROOM_TEMPERATURE);
    }

    #[test]
    fn every_enum_variant_has_a_byte() {
        for mode in Mode::iter() {
            assert!(MODE.values().contains(&mode));
        }
        for fan in FanSpeed::iter() {
            assert!(FAN.values().contains(&fan));
        }
        for vane in Vane::iter() {
            assert!(VANE.values().contains(&vane));
        }
        for wide_vane in WideVane::iter() {
            assert!(WIDE_VANE.values().contains(&wide_vane));
        }
    }

    #[test]
    fn table_sizes() {
        let sizes: Vec<usize> = Category::iter().map(Category::len).collect();
        assert_eq!(sizes, vec![2, 5, 16, 6, 7, 7, 32]);
    }

    #[test]
    fn known_bytes() {
        assert_eq!(MODE.encode(Mode::Cool), 0x03);
        assert_eq!(TEMPERATURE.encode(22), 0x09);
        assert_eq!(WIDE_VANE.encode(WideVane::Swing), 0x0c);
        assert_eq!(FAN.decode(0x05), FanSpeed::Speed3);
        assert_eq!(ROOM_TEMPERATURE.decode(0x0c), 22);
    }

    #[test]
    fn unknown_bytes_decode_to_first_entry() {
        assert_eq!(POWER.decode(0x42), Power::Off);
        assert_eq!(MODE.decode(0x00), Mode::Heat);
        assert_eq!(TEMPERATURE.decode(0x10), 31);
        assert_eq!(FAN.decode(0x04), FanSpeed::Auto);
        assert_eq!(VANE.decode(0x06), Vane::Auto);
        assert_eq!(WIDE_VANE.decode(0x00), WideVane::FarLeft);
        assert_eq!(ROOM_TEMPERATURE.decode(0xff), 10);
    }

    #[test]
    fn unknown_values_encode_to_first_byte() {
        assert_eq!(TEMPERATURE.encode(12), 0x00);
        assert_eq!(ROOM_TEMPERATURE.encode(50), 0x00);
    }

    #[test]
    fn categories_round_trip_every_byte() {
        for category in Category::iter() {
            for byte in category.bytes() {
                let value = category.decode(*byte);
                assert_eq!(category.encode(&value), *byte, "{category} {value}");
            }
        }
    }

    #[test]
    fn category_values_use_display_names() {
        assert_eq!(Category::Mode.decode(0x07), SemanticValue::from("FAN"));
        assert_eq!(Category::WideVane.decode(0x08), SemanticValue::from("LEFT-RIGHT-SWING"));
        assert_eq!(Category::Temperature.decode(0x0f), SemanticValue::Number(16));
        assert_eq!(Category::Mode.encode(&"COOL".into()), 0x03);
        assert_eq!(Category::WideVane.encode(&"<>".into()), 0x08);
    }

    #[test]
    fn mismatched_values_fall_back() {
        assert_eq!(Category::Mode.encode(&SemanticValue::Number(3)), 0x01);
        assert_eq!(Category::Temperature.encode(&"HOT".into()), 0x00);
        assert_eq!(Category::Fan.encode(&"TURBO".into()), 0x00);
        assert_eq!(Category::Temperature.encode(&SemanticValue::Number(-4)), 0x00);
    }

    #[test]
    fn category_names_parse() {
        assert_eq!("wide-vane".parse::<Category>(), Ok(Category::WideVane));
        assert_eq!(Category::RoomTemperature.to_string(), "room-temperature");
        assert_eq!(Category::Temperature.kind(), ValueKind::Number);
    }
}
