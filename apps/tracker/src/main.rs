mod config;
mod console;

use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};
use clap::Parser;
use config::{load_settings, normalize_database_url};
use console::{describe_event, parse_command, ConsoleInput, ConsoleMap, HELP};
use store::{FirebaseStore, MemoryStore, RemoteStateStore};
use sync_core::{PositionSink, RuntimeCommand, RuntimeEvent, RuntimeHandle, SyncRuntime};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Follow a GPS device and drive its LED and buzzer")]
struct Args {
    #[arg(long, default_value = "tracker.toml")]
    config: PathBuf,
    /// Overrides the configured database URL.
    #[arg(long)]
    database_url: Option<String>,
    /// Run against an in-process store instead of a remote database.
    #[arg(long)]
    memory: bool,
    #[arg(long)]
    zoom: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }
    if let Some(zoom) = args.zoom {
        settings.map_zoom = zoom;
    }
    settings.use_memory_store |= args.memory;

    let store: Arc<dyn RemoteStateStore> = if settings.use_memory_store {
        info!("using in-process store");
        Arc::new(MemoryStore::new())
    } else {
        let database_url = normalize_database_url(&settings.database_url)?;
        info!(%database_url, "connecting to realtime database");
        Arc::new(FirebaseStore::new(&database_url).context("failed to build database client")?)
    };

    let sink = PositionSink::with_view(ConsoleMap::default(), settings.map_zoom, &settings.marker_label);
    let (mut runtime, handle) = SyncRuntime::with_sink(store, sink);
    runtime.start().await.context("failed to subscribe to device state")?;

    tokio::spawn(print_events(handle.subscribe_events()));
    handle.send(RuntimeCommand::MapReady)?;
    handle.send(RuntimeCommand::FetchPosition)?;

    // Blocking stdin reads stay off the async workers.
    thread::spawn(move || read_commands(handle));

    println!("{HELP}");
    runtime.run().await;
    info!("tracker stopped");
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<RuntimeEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", describe_event(&event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn read_commands(handle: RuntimeHandle) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to read stdin: {err}");
                break;
            }
        };

        match parse_command(&line) {
            Some(ConsoleInput::Command(command)) => {
                if handle.send(command).is_err() {
                    return;
                }
            }
            Some(ConsoleInput::Help) => println!("{HELP}"),
            Some(ConsoleInput::Unknown(word)) => println!("unknown command '{word}'; {HELP}"),
            None => {}
        }
    }

    // stdin closed
    let _ = handle.send(RuntimeCommand::Shutdown);
}
