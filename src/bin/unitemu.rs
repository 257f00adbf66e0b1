use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures::{SinkExt, TryStreamExt};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use mitsuhvac::config::{AsyncPort, PortStream};
use mitsuhvac::emulator::Unit;
use mitsuhvac::protocol::codec::{Cn105Codec, RxFrame};

/// Emulator for a Mitsubishi indoor unit
///
/// Listens for controllers on a TCP port, or attaches to an existing line,
/// and answers them the way a unit on the CN105 connector does.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address and port to listen on (host:port) for controllers
    #[arg(default_value = "127.0.0.1:3456")]
    listen: String,

    /// Attach to this port instead of listening
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    #[arg(long)]
    attach: Option<Url>,

    /// Wander the room temperature by a degree every this many seconds
    #[arg(long)]
    drift: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let unit = Arc::new(Mutex::new(Unit::default()));

    if let Some(seconds) = args.drift {
        tokio::spawn(drift_room_temperature(unit.clone(), Duration::from_secs(seconds)));
    }

    if let Some(url) = args.attach {
        let framed = AsyncPort::open(&url).await?.framed();
        info!("attached to {url}");
        return serve(unit, framed).await;
    }

    let listener = TcpListener::bind(&args.listen).await?;
    info!("listening on {}", args.listen);

    loop {
        let (socket, addr) = listener.accept().await?;
        socket.set_nodelay(true)?;

        info!("new connection from {addr}");

        let unit = unit.clone();
        tokio::spawn(async move {
            if let Err(err) = serve(unit, Box::new(Framed::new(socket, Cn105Codec::new()))).await {
                warn!("connection from {addr} failed: {err}");
            }
            info!("{addr} disconnected");
        });
    }
}

async fn serve(unit: Arc<Mutex<Unit>>, mut port: Box<dyn PortStream>) -> Result<()> {
    loop {
        let frame = if let Some(frame) = port.try_next().await? { frame } else {
            // stream reached the end
            return Ok(())
        };

        let frame = match frame {
            RxFrame::Valid(frame) => frame,
            RxFrame::Corrupted(data) => {
                warn!("ignoring corrupted frame {data:02x?}");
                continue;
            }
        };

        let reply = unit.lock().await.respond(&frame);

        match reply {
            Ok(Some(reply)) => port.send(reply).await?,
            Ok(None) => continue,
            Err(err) => warn!("unable to answer {:#04x}: {err:?}", frame.packet_type),
        }
    }
}

async fn drift_room_temperature(unit: Arc<Mutex<Unit>>, period: Duration) {
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;

        let mut unit = unit.lock().await;
        let current = unit.settings().room_temperature;
        let step: i8 = rand::thread_rng().gen_range(-1..=1);
        let next = current.saturating_add_signed(step).clamp(10, 41);

        if next != current {
            info!("room temperature now {next}C");
        }
        unit.set_room_temperature(next);
    }
}
