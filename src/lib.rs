//! Driver for Mitsubishi heat pumps over the CN105 serial connector.
//!
//! [`HeatPump`] keeps two settings records: `current`, as last reported by
//! the unit, and `wanted`, as authored by the caller. The caller polls
//! [`HeatPump::sync`] and [`HeatPump::update`] to move the unit towards
//! `wanted`; sends are rate limited to one per [`DriverConfig::min_send_interval`].

pub mod clock;
pub mod config;
pub mod emulator;
pub mod error;
pub mod gate;
pub mod heatpump;
pub mod protocol;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DriverConfig, Port};
pub use error::{Error, Result};
pub use heatpump::HeatPump;
pub use protocol::lookup::{Category, SemanticValue};
pub use protocol::settings::{FanSpeed, Mode, Power, SettingsRecord, Vane, WideVane};
pub use transport::Transport;
