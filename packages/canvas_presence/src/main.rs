use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use presence_core::{CanvasGrid, ConnectionState, PresenceSnapshot, SelectionSet};
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

use canvas_presence::PresenceChannel;
use canvas_presence::config::{self, ChannelConfig, FileConfig};

/// How often the wandering pointer moves.
const WANDER_INTERVAL: Duration = Duration::from_millis(100);
/// Largest per-axis step of the wandering pointer, in pixels.
const WANDER_STEP: i32 = 24;

#[derive(Parser)]
#[command(name = "canvas-presence")]
#[command(about = "Live cursor presence client for shared canvases")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to <config dir>/canvas-presence/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Relay endpoint, overrides the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print status changes and connected cursors (default)
    Watch(WatchArgs),

    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Parser, Default)]
struct WatchArgs {
    /// Move the local pointer in a random walk across the canvas
    #[arg(long)]
    wander: bool,

    /// Toggle a random box every N seconds
    #[arg(long, value_name = "SECS")]
    click_every: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut file_config = config::resolve(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        file_config.connection.endpoint = endpoint;
    }

    match cli.command {
        None => watch(file_config, WatchArgs::default()).await,
        Some(Commands::Watch(args)) => watch(file_config, args).await,
        Some(Commands::Config) => print_config(&file_config),
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "canvas_presence=debug,presence_core=debug,info"
    } else {
        "canvas_presence=info,presence_core=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    // stdout is reserved for the cursor list
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn watch(file_config: FileConfig, args: WatchArgs) -> Result<()> {
    let grid = CanvasGrid::new(file_config.canvas.width);
    let config = ChannelConfig::from_file(&file_config);
    info!(
        endpoint = %config.endpoint,
        cols = grid.cols(),
        rows = grid.rows(),
        "starting presence channel"
    );
    let channel = PresenceChannel::connect(config);

    let mut state_rx = channel.watch_state();
    let mut presence_rx = channel.watch_presence();
    let mut selection = SelectionSet::new();

    let mut wander = tokio::time::interval(WANDER_INTERVAL);
    let click_period = Duration::from_secs(args.click_every.unwrap_or(1).max(1));
    let mut clicker = tokio::time::interval_at(tokio::time::Instant::now() + click_period, click_period);
    let mut pointer = grid.center();

    print_status(*state_rx.borrow_and_update());

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }

            Ok(()) = state_rx.changed() => print_status(*state_rx.borrow_and_update()),

            Ok(()) = presence_rx.changed() => {
                let snapshot = presence_rx.borrow_and_update().clone();
                print_cursors(&snapshot);
            }

            _ = wander.tick(), if args.wander => {
                pointer = wander_step(pointer, &grid);
                channel.move_pointer(pointer.0, pointer.1);
            }

            _ = clicker.tick(), if args.click_every.is_some() && grid.total_boxes() > 0 => {
                let index = rand::rng().random_range(0..grid.total_boxes());
                let selected = selection.toggle(index);
                info!(index, selected, total_selected = selection.len(), "toggled box");
                channel.click_box(index);
            }
        }
    }

    info!("shutting down");
    channel.teardown().await;
    Ok(())
}

fn wander_step(pointer: (i32, i32), grid: &CanvasGrid) -> (i32, i32) {
    let mut rng = rand::rng();
    let x = pointer.0.saturating_add(rng.random_range(-WANDER_STEP..=WANDER_STEP));
    let y = pointer.1.saturating_add(rng.random_range(-WANDER_STEP..=WANDER_STEP));
    grid.clamp_point(x, y)
}

fn print_status(state: ConnectionState) {
    println!("[{}]", state.as_str().to_uppercase());
}

fn print_cursors(snapshot: &PresenceSnapshot) {
    println!("Connected Cursors:");
    for cursor in &snapshot.entries {
        println!("  Client {}: X={}, Y={}", cursor.source, cursor.x, cursor.y);
    }
    for position in &snapshot.anonymous {
        println!("  Client (anonymous): X={}, Y={}", position.x, position.y);
    }
}

fn print_config(file_config: &FileConfig) -> Result<()> {
    let rendered =
        toml::to_string_pretty(file_config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
