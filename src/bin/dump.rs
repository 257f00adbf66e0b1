use std::time::SystemTime;

use anyhow::Result;
use clap::Parser;
use colored::{ColoredString, Colorize};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use url::Url;

use mitsuhvac::config::AsyncPort;
use mitsuhvac::protocol::codec::{Frame, RxFrame};
use mitsuhvac::protocol::ids::*;
use mitsuhvac::protocol::packets::Response;

/// Print every frame seen on a CN105 line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,
}

fn delta_ms(since: Option<SystemTime>) -> u128 {
    since
        .and_then(|since| since.elapsed().ok())
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

fn frame_desc(frame: &Frame) -> String {
    let desc = match Response::parse(frame) {
        Ok(Response::Settings(settings)) if frame.packet_type == SET_REQUEST => format!("write {settings}"),
        Ok(Response::Settings(settings)) => format!("report {settings}"),
        Ok(Response::RoomTemperature(celsius)) => format!("room {celsius}C"),
        Ok(_) => String::new(),
        Err(err) => format!("{err:?}"),
    };

    let packet_type = frame.packet_type;
    let name = describe(packet_type);
    format!("{packet_type:02x}: {name: <16} {:02x?} {desc}", &frame.data[..])
}

fn coloured(packet_type: u8, line: String) -> ColoredString {
    match packet_type {
        CONNECT_REQUEST | CONNECT_RESPONSE => line.on_cyan().bright_white(),
        SET_REQUEST => line.on_purple().bright_white(),
        SET_RESPONSE => line.on_bright_purple().bright_white(),
        GET_INFO_REQUEST => line.on_green().bright_white(),
        GET_INFO_RESPONSE => line.on_bright_green().bright_white(),
        _ => line.on_black(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut framed = AsyncPort::open(&args.port).await?.framed();

    let start_time = SystemTime::now();
    let mut last_frame_time: Option<SystemTime> = None;

    while let Some(frame) = framed.next().await {
        let start_delta_ms = delta_ms(Some(start_time));
        let last_frame_delta_ms = delta_ms(last_frame_time);

        let frame = match frame? {
            RxFrame::Valid(frame) => frame,
            RxFrame::Corrupted(data) => {
                println!("{}", format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] corrupted frame: {data:02x?}").red());
                continue;
            }
        };

        let line = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {}", frame_desc(&frame));

        println!("{}", coloured(frame.packet_type, line));

        last_frame_time = Some(SystemTime::now());
    }

    Ok(())
}
