use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared::{
    domain::{FlagName, FlagState, Position},
    path::StorePath,
    protocol::{encode_flag, encode_position, flag_path, gps_path},
};
use store::{FirebaseStore, RemoteStateStore, StoreNotification};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(about = "Inspect and seed the device nodes of a realtime database")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "http://127.0.0.1:9000")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the JSON stored at a path.
    Get { path: String },
    /// Store a raw JSON value at a path.
    Set { path: String, value: String },
    /// Publish a coordinate the way the device does.
    SetGps { latitude: f64, longitude: f64 },
    /// Switch a control flag, e.g. `flag led on`.
    Flag { name: String, state: String },
    /// Print every change under a path until interrupted.
    Watch { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let cli = Cli::parse();
    let store = FirebaseStore::new(cli.database_url.trim_end_matches('/'))?;

    match cli.command {
        Command::Get { path } => {
            let snapshot = store.read(&parse_path(&path)?).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot.into_raw())?);
        }
        Command::Set { path, value } => {
            let path = parse_path(&path)?;
            let value: Value =
                serde_json::from_str(&value).with_context(|| format!("'{value}' is not JSON"))?;
            store.write(&path, value).await?;
            debug!(path = %path, "value written");
            println!("wrote {path}");
        }
        Command::SetGps {
            latitude,
            longitude,
        } => {
            let position = Position::new(latitude, longitude);
            store.write(&gps_path(), encode_position(&position)).await?;
            println!("published {position}");
        }
        Command::Flag { name, state } => {
            let Some(flag) = FlagName::parse(&name) else {
                bail!("unknown flag '{name}', expected LED or Buzzer");
            };
            let state = parse_state(&state)?;
            store.write(&flag_path(flag), encode_flag(state)).await?;
            println!("{flag} set {state}");
        }
        Command::Watch { path } => {
            let mut subscription = store.subscribe(&parse_path(&path)?).await?;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    notification = subscription.notifications.recv() => match notification {
                        Some(StoreNotification::Changed(snapshot)) => {
                            let path = snapshot.path().clone();
                            println!("{path} = {}", snapshot.into_raw());
                        }
                        Some(StoreNotification::Cancelled(err)) => {
                            warn!(subscription = subscription.id.0, "watch cancelled by store: {err}");
                            bail!("watch cancelled: {err}");
                        }
                        None => {
                            debug!(subscription = subscription.id.0, "change stream closed");
                            break;
                        }
                    },
                }
            }
            store.unsubscribe(subscription.id).await;
            info!(path = %subscription.path, "stopped watching");
        }
    }

    Ok(())
}

fn parse_path(raw: &str) -> Result<StorePath> {
    StorePath::parse(raw).with_context(|| format!("invalid path '{raw}'"))
}

fn parse_state(raw: &str) -> Result<FlagState> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(FlagState::On),
        "off" | "0" | "false" => Ok(FlagState::Off),
        other => bail!("unknown flag state '{other}', expected on or off"),
    }
}
