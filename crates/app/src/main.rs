use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use midisync_core::{
    AppConfig, BackendKind, HostMidiFeed, MappingMatrix, MidiSync, Notification,
};
use tracing_subscriber::EnvFilter;

fn main() -> midisync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::live_defaults(),
    };

    match cli.command {
        Commands::Ports => run_ports(&config),
        Commands::Monitor { port, frames, fps } => run_monitor(config, port, frames, fps),
    }
}

fn run_ports(config: &AppConfig) -> midisync_core::Result<()> {
    let feed = HostMidiFeed::new(config.midi.queue_capacity);
    let midi = MidiSync::new(&config.midi, feed);
    let ports = midi.list_ports();
    tracing::info!(backend = ?midi.backend_kind(), count = ports.len(), "MIDI inputs");
    for port in ports {
        println!("{}: {}", port.index, port.display_name);
    }
    Ok(())
}

fn run_monitor(
    mut config: AppConfig,
    port: Option<i32>,
    frames: Option<u64>,
    fps: u32,
) -> midisync_core::Result<()> {
    if let Some(port) = port {
        config.midi.auto_connect = true;
        config.midi.auto_connect_port = port;
    }

    let feed = HostMidiFeed::new(config.midi.queue_capacity);
    let mut midi = MidiSync::new(&config.midi, feed);
    if midi.backend_kind() == BackendKind::Fallback {
        return Err(midisync_core::MidiSyncError::msg(
            "no native MIDI driver in this build (rebuild with --features native)",
        ));
    }
    if !midi.is_port_open() {
        return Err(midisync_core::MidiSyncError::msg(
            "no MIDI input open (pass --port)",
        ));
    }

    let notifications = midi.dispatcher_mut().subscribe_channel();
    let mut mappings = MappingMatrix::with_mappings(config.mappings.clone());
    let frame_time = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let mut frame = 0u64;

    tracing::info!(port = ?midi.selected_port(), fps, "monitoring MIDI input");
    while frames.map_or(true, |limit| frame < limit) {
        midi.update();

        for notification in notifications.try_iter() {
            mappings.apply(&notification);
            match notification {
                Notification::Activity | Notification::ClockActivity => {}
                Notification::Beat { beat_number } => tracing::info!(
                    beat_number,
                    bpm = midi.bpm(),
                    "beat"
                ),
                other => tracing::debug!(?other, "midi"),
            }
        }
        for update in mappings.take_updates() {
            tracing::debug!(param = %update.target, value = update.value, "parameter");
        }

        tracing::trace!(position = midi.beat_position(), "frame");
        std::thread::sleep(frame_time);
        frame += 1;
    }

    midi.close()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MIDI clock and controller monitor",
    long_about = "MIDI clock and controller monitor.\n\n\
        Hardware input needs the native driver: build with `--features native`. \
        Without it `ports` lists nothing and `monitor` exits with an error."
)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the MIDI input ports of the selected backend.
    ///
    /// Prints nothing unless built with `--features native`.
    Ports,
    /// Open an input and log notes, controllers, beats and tempo.
    ///
    /// Requires a build with `--features native`.
    Monitor {
        /// Port index to open; defaults to the configured auto-connect port.
        #[arg(short, long)]
        port: Option<i32>,
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,
        /// Polling rate in frames per second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}
