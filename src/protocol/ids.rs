//! Packet type identifiers (the second byte of every frame).

/// Settings write, controller to unit.
pub const SET_REQUEST: u8 = 0x41;

/// Info request, controller to unit.
pub const GET_INFO_REQUEST: u8 = 0x42;

/// Connection handshake, controller to unit.
pub const CONNECT_REQUEST: u8 = 0x5a;

/// Acknowledges a `SET_REQUEST`.
pub const SET_RESPONSE: u8 = 0x61;

/// Answers a `GET_INFO_REQUEST`.
pub const GET_INFO_RESPONSE: u8 = 0x62;

/// Acknowledges a `CONNECT_REQUEST`.
pub const CONNECT_RESPONSE: u8 = 0x7a;

pub fn describe(packet_type: u8) -> &'static str {
    match packet_type {
        SET_REQUEST => "Set Request",
        GET_INFO_REQUEST => "Info Request",
        CONNECT_REQUEST => "Connect Request",
        SET_RESPONSE => "Set Response",
        GET_INFO_RESPONSE => "Info Response",
        CONNECT_RESPONSE => "Connect Response",
        _ => "Unknown",
    }
}
