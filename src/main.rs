use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use mitsuhvac::{Category, DriverConfig, FanSpeed, HeatPump, Mode, Port, Power, SemanticValue, SystemClock, Vane, WideVane};
use mitsuhvac::protocol::lookup::ValueKind;

/// Control a Mitsubishi heat pump over its CN105 connector
///
/// Connects, applies any requested settings, then keeps the unit in sync and
/// prints its state whenever it changes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// serial:///device/path, tcp+raw://host:port or emulator: URLs supported
    port: Url,

    #[arg(long)]
    power: Option<Power>,

    #[arg(long)]
    mode: Option<Mode>,

    /// Target temperature in degrees Celsius (16-31)
    #[arg(long, conflicts_with = "fahrenheit")]
    temperature: Option<u8>,

    /// Target temperature in degrees Fahrenheit
    #[arg(long)]
    fahrenheit: Option<i32>,

    #[arg(long)]
    fan: Option<FanSpeed>,

    #[arg(long)]
    vane: Option<Vane>,

    /// FAR-LEFT, LEFT, CENTER, RIGHT, FAR-RIGHT, LEFT-RIGHT-SWING, SWING
    /// (or <<, <, |, >, >>, <>)
    #[arg(long)]
    wide_vane: Option<WideVane>,

    /// Set a field by category name, e.g. `--set mode=COOL --set temperature=22`
    #[arg(long = "set", value_parser = parse_assignment)]
    assignments: Vec<(Category, SemanticValue)>,

    /// Minimum time between sends, in milliseconds
    #[arg(long, default_value_t = 1000)]
    min_send_interval: u64,

    /// Exit once the unit reports the wanted settings
    #[arg(long)]
    once: bool,
}

fn parse_assignment(s: &str) -> Result<(Category, SemanticValue)> {
    let Some((name, value)) = s.split_once('=') else {
        bail!("expected category=value, got {s:?}");
    };

    let category: Category = name.parse()
        .with_context(|| format!("unknown category {name:?}"))?;

    let value = match category.kind() {
        ValueKind::Named => SemanticValue::Named(value.to_uppercase()),
        ValueKind::Number => SemanticValue::Number(value.parse()
            .with_context(|| format!("{category} takes a number, got {value:?}"))?),
    };

    Ok((category, value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = DriverConfig {
        min_send_interval: Duration::from_millis(args.min_send_interval),
        ..DriverConfig::default()
    };

    let port = Port::open(&args.port)?;

    let mut heatpump = HeatPump::new(SystemClock::new(), config);
    heatpump.connect(port)
        .with_context(|| format!("failed to connect to {}", args.port))?;

    println!("{}", heatpump.get_settings());

    if let Some(power) = args.power {
        heatpump.set_power(power);
    }
    if let Some(mode) = args.mode {
        heatpump.set_mode(mode);
    }
    if let Some(celsius) = args.temperature {
        heatpump.set_temperature(celsius);
    }
    if let Some(fahrenheit) = args.fahrenheit {
        let celsius = HeatPump::<Port, SystemClock>::fahrenheit_to_celsius(fahrenheit);
        heatpump.set_temperature(celsius.clamp(0, u8::MAX.into()) as u8);
    }
    if let Some(fan) = args.fan {
        heatpump.set_fan_speed(fan);
    }
    if let Some(vane) = args.vane {
        heatpump.set_vane(vane);
    }
    if let Some(wide_vane) = args.wide_vane {
        heatpump.set_wide_vane(wide_vane);
    }
    for (category, value) in &args.assignments {
        if !heatpump.set_value(*category, value) {
            bail!("{category} can't be set");
        }
    }

    if heatpump.wanted_settings() != heatpump.get_settings() {
        info!("wanted: {}", heatpump.wanted_settings());
    }

    let mut last_printed = heatpump.get_settings();
    let mut last_room_temperature = last_printed.room_temperature;

    loop {
        heatpump.sync();

        let current = heatpump.get_settings();
        if current != last_printed || current.room_temperature != last_room_temperature {
            println!("{current}");
            last_printed = current;
            last_room_temperature = current.room_temperature;
        }

        if args.once && current == heatpump.wanted_settings() {
            return Ok(());
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
