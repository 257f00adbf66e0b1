use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use super::lookup::{FAN, MODE, POWER, ROOM_TEMPERATURE, TEMPERATURE, VANE, WIDE_VANE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum Power {
    #[strum(to_string = "OFF")]
    Off,
    #[strum(to_string = "ON")]
    On,
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Power::On } else { Power::Off }
    }
}

impl From<Power> for bool {
    fn from(power: Power) -> Self {
        power == Power::On
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum Mode {
    #[strum(to_string = "HEAT")]
    Heat,
    #[strum(to_string = "DRY")]
    Dry,
    #[strum(to_string = "COOL")]
    Cool,
    #[strum(to_string = "FAN")]
    Fan,
    #[strum(to_string = "AUTO")]
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum FanSpeed {
    #[strum(to_string = "AUTO")]
    Auto,
    #[strum(to_string = "QUIET")]
    Quiet,
    #[strum(to_string = "1")]
    Speed1,
    #[strum(to_string = "2")]
    Speed2,
    #[strum(to_string = "3")]
    Speed3,
    #[strum(to_string = "4")]
    Speed4,
}

/// Vertical airflow (up/down).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum Vane {
    #[strum(to_string = "AUTO")]
    Auto,
    #[strum(to_string = "1")]
    Position1,
    #[strum(to_string = "2")]
    Position2,
    #[strum(to_string = "3")]
    Position3,
    #[strum(to_string = "4")]
    Position4,
    #[strum(to_string = "5")]
    Position5,
    #[strum(to_string = "SWING")]
    Swing,
}

/// Horizontal airflow (left/right).
///
/// The arrow spellings used on the unit's own remote (`<<`, `<`, `|`, `>`,
/// `>>`, `<>`) parse as aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum WideVane {
    #[strum(to_string = "FAR-LEFT", serialize = "<<")]
    FarLeft,
    #[strum(to_string = "LEFT", serialize = "<")]
    Left,
    #[strum(to_string = "CENTER", serialize = "|")]
    Center,
    #[strum(to_string = "RIGHT", serialize = ">")]
    Right,
    #[strum(to_string = "FAR-RIGHT", serialize = ">>")]
    FarRight,
    #[strum(to_string = "LEFT-RIGHT-SWING", serialize = "<>")]
    LeftRightSwing,
    #[strum(to_string = "SWING")]
    Swing,
}

/// Semantic snapshot of the unit.
///
/// `room_temperature` is a sensor reading rather than a setting: it is never
/// written to the unit and is ignored when two records are compared.
#[derive(Clone, Copy, Debug)]
pub struct SettingsRecord {
    pub power: Power,
    pub mode: Mode,

    /// Target temperature, whole degrees Celsius (16-31).
    pub temperature: u8,

    pub fan: FanSpeed,
    pub vane: Vane,
    pub wide_vane: WideVane,

    /// Room sensor reading, whole degrees Celsius (10-41).
    pub room_temperature: u8,
}

impl PartialEq for SettingsRecord {
    fn eq(&self, other: &Self) -> bool {
        self.power == other.power
            && self.mode == other.mode
            && self.temperature == other.temperature
            && self.fan == other.fan
            && self.vane == other.vane
            && self.wide_vane == other.wide_vane
    }
}

impl Eq for SettingsRecord {}

impl std::fmt::Display for SettingsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "power {} mode {} temperature {}C fan {} vane {} wide vane {} (room {}C)",
            self.power, self.mode, self.temperature, self.fan, self.vane, self.wide_vane, self.room_temperature
        )
    }
}

impl Default for SettingsRecord {
    /// Every field at its table's index-0 entry.
    fn default() -> Self {
        Self {
            power: POWER.default_value(),
            mode: MODE.default_value(),
            temperature: TEMPERATURE.default_value(),
            fan: FAN.default_value(),
            vane: VANE.default_value(),
            wide_vane: WIDE_VANE.default_value(),
            room_temperature: ROOM_TEMPERATURE.default_value(),
        }
    }
}

/// `ceil((f - 32) / 1.8)`, in integer arithmetic.
pub fn fahrenheit_to_celsius(fahrenheit: i32) -> i32 {
    let celsius = -((-(i64::from(fahrenheit) - 32) * 5).div_euclid(9));
    saturate(celsius)
}

/// `floor(c * 1.8 + 32)`, in integer arithmetic. Saturates at the ends of `i32`.
pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    let fahrenheit = (i64::from(celsius) * 9).div_euclid(5) + 32;
    saturate(fahrenheit)
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn room_temperature_is_ignored_by_equality() {
        let a = SettingsRecord { room_temperature: 18, ..Default::default() };
        let b = SettingsRecord { room_temperature: 27, ..Default::default() };

        assert_eq!(a, b);
    }

    #[test]
    fn other_fields_take_part_in_equality() {
        let a = SettingsRecord::default();
        let b = SettingsRecord { mode: Mode::Cool, ..a };
        let c = SettingsRecord { temperature: 22, ..a };

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_record_uses_first_table_entries() {
        let record = SettingsRecord::default();

        assert_eq!(record.power, Power::Off);
        assert_eq!(record.mode, Mode::Heat);
        assert_eq!(record.temperature, 31);
        assert_eq!(record.fan, FanSpeed::Auto);
        assert_eq!(record.vane, Vane::Auto);
        assert_eq!(record.wide_vane, WideVane::FarLeft);
        assert_eq!(record.room_temperature, 10);
    }

    #[test]
    fn records_display_every_field() {
        let record = SettingsRecord {
            power: Power::On,
            mode: Mode::Cool,
            temperature: 22,
            wide_vane: WideVane::Center,
            room_temperature: 20,
            ..Default::default()
        };

        assert_eq!(
            record.to_string(),
            "power ON mode COOL temperature 22C fan AUTO vane AUTO wide vane CENTER (room 20C)"
        );
    }

    #[test]
    fn names_round_trip_through_strings() {
        for mode in Mode::iter() {
            assert_eq!(Mode::from_str(&mode.to_string()), Ok(mode));
        }
        for wide_vane in WideVane::iter() {
            assert_eq!(WideVane::from_str(&wide_vane.to_string()), Ok(wide_vane));
        }
    }

    #[rstest]
    #[case("<<", WideVane::FarLeft)]
    #[case("<", WideVane::Left)]
    #[case("|", WideVane::Center)]
    #[case(">", WideVane::Right)]
    #[case(">>", WideVane::FarRight)]
    #[case("<>", WideVane::LeftRightSwing)]
    #[case("SWING", WideVane::Swing)]
    fn wide_vane_arrow_aliases(#[case] name: &str, #[case] expected: WideVane) {
        assert_eq!(WideVane::from_str(name), Ok(expected));
    }

    #[test]
    fn fan_speeds_are_named_by_number() {
        assert_eq!(FanSpeed::from_str("3"), Ok(FanSpeed::Speed3));
        assert_eq!(FanSpeed::Quiet.to_string(), "QUIET");
    }

    #[test]
    fn power_converts_from_bool() {
        assert_eq!(Power::from(true), Power::On);
        assert!(!bool::from(Power::Off));
    }

    #[rstest]
    #[case(32, 0)]
    #[case(72, 23)]
    #[case(61, 17)]
    #[case(88, 32)]
    fn fahrenheit_rounds_up(#[case] fahrenheit: i32, #[case] celsius: i32) {
        assert_eq!(fahrenheit_to_celsius(fahrenheit), celsius);
    }

    #[rstest]
    #[case(16, 60)]
    #[case(22, 71)]
    #[case(31, 87)]
    #[case(-40, -40)]
    fn celsius_rounds_down(#[case] celsius: i32, #[case] fahrenheit: i32) {
        assert_eq!(celsius_to_fahrenheit(celsius), fahrenheit);
    }

    #[rstest]
    #[case(1_000_000_000, 555_555_538)]
    #[case(i32::MAX, 1_193_046_453)]
    #[case(i32::MIN, -1_193_046_488)]
    fn fahrenheit_extremes_do_not_overflow(#[case] fahrenheit: i32, #[case] celsius: i32) {
        assert_eq!(fahrenheit_to_celsius(fahrenheit), celsius);
    }

    #[test]
    fn celsius_extremes_saturate() {
        assert_eq!(celsius_to_fahrenheit(i32::MAX), i32::MAX);
        assert_eq!(celsius_to_fahrenheit(i32::MIN), i32::MIN);
        assert_eq!(celsius_to_fahrenheit(1_000_000_000), 1_800_000_032);
    }

    #[test]
    fn celsius_survives_a_trip_through_fahrenheit() {
        for celsius in -40..=60 {
            assert_eq!(fahrenheit_to_celsius(celsius_to_fahrenheit(celsius)), celsius);
        }
    }
}
