//! Themed-attraction real-time control core.
//!
//! # Crate Structure
//!
//! - [`state`] - process-wide House State shared by every task
//! - [`audio`] - device streams, clip decode/resample, session mixing, TTS
//! - [`doors`] - safety-critical door state machines
//! - [`sensors`] - remote sensor/actuator bus over a serial gateway
//! - [`dimmer`] - the dimmer mixer's serial link and flicker effects
//! - [`hw`] - microcontroller board links (relays, solenoids)
//! - [`scene`] - show orchestration: the engine and per-room scripts
//! - [`supervisor`] - boot/online/shutdown/reboot lifecycle
//! - [`external`] - operator-facing control surfaces (HTTP today)

mod audio;
mod config;
mod dimmer;
mod doors;
mod error;
mod external;
mod hw;
mod scene;
mod sensors;
mod state;
mod supervisor;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use audio::channel_map::ChannelMap;
use audio::mixer::AudioMixer;
use config::{HTTP_BIND_ADDR, PRIMARY_DEVICE_NAME_HINT, SECONDARY_DEVICE_NAME_HINT};
use dimmer::DimmerController;
use hw::Boards;
use scene::clips::ClipLibrary;
use scene::rooms::RoomId;
use sensors::SensorBus;
use state::HouseState;
use supervisor::Supervisor;

/// Themed-attraction real-time control core: show orchestration, audio
/// mixing, sensor/actuator bus, and safety-critical door control.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory audio clips are resolved against.
    #[arg(long, default_value = "clips")]
    clips_dir: PathBuf,

    /// Directory rolling log files are written to.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Override autodetection of the sensor gateway's serial port.
    #[arg(long)]
    sensor_port: Option<String>,

    /// Override autodetection of the dimmer's serial port.
    #[arg(long)]
    dimmer_port: Option<String>,

    /// Run a single room once and exit instead of a full show, bypassing
    /// the HTTP operator surface. Useful for tech rehearsal.
    #[arg(long)]
    demo: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_dir);

    if let Err(e) = run(cli) {
        error!("fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn init_logging(log_dir: &PathBuf) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "house.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout.and(non_blocking))
        .init();

    guard
}

fn run(cli: Cli) -> Result<()> {
    info!("booting house control core");

    let house = HouseState::new();
    let channel_map = ChannelMap::new(config::primary_channel_table(), config::secondary_channel_table());
    let mixer = Arc::new(
        AudioMixer::new(house.clone(), channel_map, PRIMARY_DEVICE_NAME_HINT, SECONDARY_DEVICE_NAME_HINT)
            .context("opening audio devices")?,
    );
    let sensors = SensorBus::start(cli.sensor_port);
    let dimmer = DimmerController::start(house.clone(), cli.dimmer_port);
    let boards = Arc::new(Boards::connect());
    let clips = Arc::new(ClipLibrary::new(cli.clips_dir));

    let supervisor = Supervisor::new(house.clone(), mixer, sensors, dimmer, boards, clips);

    if let Some(room_name) = cli.demo.as_deref() {
        let room = RoomId::parse(room_name)
            .with_context(|| format!("unknown room: {room_name}"))?;
        info!("running one-shot demo of {}", room.name());
        house.set_system_state(state::SystemState::Online);
        use external::OperatorCommands;
        supervisor.demo(room).map_err(|e| anyhow::anyhow!("{}", e))?;
        // the demo thread owns house_active/demo until it finishes; block
        // until it clears house_active again.
        while house.house_active() {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        return Ok(());
    }

    {
        let supervisor = supervisor.clone();
        std::thread::Builder::new()
            .name("supervisor".to_string())
            .spawn(move || supervisor.run())
            .context("spawning supervisor thread")?;
    }

    let addr: SocketAddr = HTTP_BIND_ADDR.parse().context("parsing HTTP bind address")?;
    let rt = tokio::runtime::Runtime::new().context("starting async runtime")?;
    rt.block_on(external::http::serve(addr, supervisor))
}
