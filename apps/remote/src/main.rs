use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{topology::ClipRow, Session, SessionEvent};
use serde_json::Value;
use shared::{
    composition::display_name,
    domain::{ClipId, ColumnId, ParameterId},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Overrides, DEFAULT_CONFIG_FILE};

/// How long to wait for the first snapshot before giving up on a one-shot command.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
/// Commands are queued, not acknowledged; this lets the connection task write them out.
const FLUSH_GRACE: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "mixer_remote", about = "Remote control for a live video mixer")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    reconnect_min_ms: Option<u64>,
    #[arg(long)]
    reconnect_max_ms: Option<u64>,
    #[arg(long)]
    log_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror the composition and print every change until interrupted.
    Watch,
    PlayAll,
    PauseAll,
    StopAll,
    DisconnectAll,
    /// Write a value to a parameter; the value is parsed as JSON, else sent as text.
    SetParam {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        value: String,
    },
    /// Press and release a clip's connect trigger.
    ConnectClip {
        #[arg(long)]
        id: i64,
        /// Leave the trigger pressed.
        #[arg(long)]
        hold: bool,
    },
    ConnectColumn {
        #[arg(long)]
        id: i64,
        /// Only trigger the column's clip on the first three layers.
        #[arg(long)]
        limited: bool,
        #[arg(long)]
        hold: bool,
    },
    SetVolume {
        #[arg(long)]
        level: f64,
    },
    SendText {
        #[arg(long)]
        text: String,
    },
    ClearText,
    UploadThumbnail {
        #[arg(long)]
        clip: i64,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        mime: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = Overrides {
        host: args.host.clone(),
        port: args.port,
        reconnect_min_ms: args.reconnect_min_ms,
        reconnect_max_ms: args.reconnect_max_ms,
        log_filter: args.log_filter.clone(),
    };
    let settings = load_settings(&args.config, &overrides)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let session = Session::new(settings.session_config()?);
    let events = start_session(&session, &args.command);

    match args.command {
        Command::Watch => {
            if let Some(events) = events {
                watch(&session, events).await?;
            }
        }
        Command::UploadThumbnail { clip, file, mime } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "thumbnail".to_string());
            session
                .dispatcher()
                .upload_thumbnail(ClipId(clip), file_name, bytes, mime.as_deref())
                .await?;
            println!("thumbnail uploaded for clip {clip}");
        }
        command => {
            wait_for_snapshot(&session).await?;
            run_command(&session, command)?;
            tokio::time::sleep(FLUSH_GRACE).await;
        }
    }

    session.shutdown();
    Ok(())
}

/// Starts the channel for every command that needs it. `watch` subscribes
/// first so it sees the initial connect and snapshot.
fn start_session(session: &Session, command: &Command) -> Option<broadcast::Receiver<SessionEvent>> {
    let events = matches!(command, Command::Watch).then(|| session.subscribe_events());
    if !matches!(command, Command::UploadThumbnail { .. }) {
        info!(endpoint = %session.endpoint().websocket_url(), "connecting to mixer");
        session.start();
    }
    events
}

/// Sends the press and, unless `hold`, the matching release.
fn press_and_release(hold: bool, mut trigger: impl FnMut(bool) -> bool) -> bool {
    let pressed = trigger(true);
    if pressed && !hold {
        trigger(false)
    } else {
        pressed
    }
}

async fn wait_for_snapshot(session: &Session) -> Result<()> {
    let mut composition = session.watch_composition();
    tokio::time::timeout(
        SNAPSHOT_TIMEOUT,
        composition.wait_for(|composition| !composition.layers.is_empty() || !composition.columns.is_empty()),
    )
    .await
    .with_context(|| format!("no composition from {} yet", session.endpoint().websocket_url()))??;
    Ok(())
}

fn run_command(session: &Session, command: Command) -> Result<()> {
    let dispatcher = session.dispatcher();
    let composition = session.composition();

    let sent = match command {
        Command::PlayAll => dispatcher.play_all(&composition) > 0,
        Command::PauseAll => dispatcher.pause_all(&composition) > 0,
        Command::StopAll => dispatcher.stop_all(&composition) > 0,
        Command::DisconnectAll => dispatcher.disconnect_all(),
        Command::SetParam { id, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            dispatcher.update_parameter(ParameterId(id), value)
        }
        Command::ConnectClip { id, hold } => {
            press_and_release(hold, |down| dispatcher.connect_clip(ClipId(id), down))
        }
        Command::ConnectColumn { id, limited, hold } => {
            if limited {
                let Some(index) = composition.columns.iter().position(|column| column.id.0 == id)
                else {
                    bail!("column {id} is not in the composition");
                };
                press_and_release(hold, |down| {
                    dispatcher.connect_column_limited(&composition, index, down) > 0
                })
            } else {
                press_and_release(hold, |down| dispatcher.connect_column(ColumnId(id), down))
            }
        }
        Command::SetVolume { level } => dispatcher.set_volume(&composition, level),
        Command::SendText { text } => dispatcher.send_text_to_selected_clip(&composition, &text),
        Command::ClearText => dispatcher.clear_selected_clip_text(&composition),
        Command::Watch | Command::UploadThumbnail { .. } => false,
    };

    if !sent {
        bail!("nothing was sent to the mixer");
    }
    Ok(())
}

async fn watch(session: &Session, mut events: broadcast::Receiver<SessionEvent>) -> Result<()> {
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => describe(session, &event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn describe(session: &Session, event: &SessionEvent) {
    match event {
        SessionEvent::ConnectionStateChanged(state) => println!("connection: {state:?}"),
        SessionEvent::ProductUpdated(product) => println!("product: {product}"),
        SessionEvent::CompositionReplaced => print_topology(session),
        SessionEvent::ThumbnailUpdated { clip_id } => {
            if let Some(clip) = session.composition().clip(*clip_id) {
                println!("thumbnail: clip {} -> {}", clip_id.0, session.thumbnail_url(clip));
            }
        }
        SessionEvent::SourcesUpdated => {
            let sources = session.sources();
            println!("sources: {} audio, {} video", sources.audio.len(), sources.video.len());
        }
        SessionEvent::EffectsUpdated => {
            let effects = session.effects();
            println!("effects: {} audio, {} video", effects.audio.len(), effects.video.len());
        }
        SessionEvent::ParameterUpdated(update) => {
            println!("parameter {}: {}", update.id.0, update.value);
        }
    }
}

fn print_topology(session: &Session) {
    let topology = session.topology();
    println!("composition: {} rows", topology.rows.len());
    for row in &topology.rows {
        let kind = if row.is_group() { "group" } else { "layer" };
        println!("  {kind:<5} {}", row.display_name());
    }
    for clips in &topology.clip_rows {
        let cells = match clips {
            ClipRow::Clips(clips) => clips
                .iter()
                .map(|clip| clip.name.as_str().unwrap_or("-").to_string())
                .collect::<Vec<_>>(),
            ClipRow::GroupColumns(columns) => columns
                .iter()
                .enumerate()
                .map(|(index, column)| display_name(column.name.as_str().unwrap_or_default(), index))
                .collect(),
        };
        println!("    [{}]", cells.join(" | "));
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
