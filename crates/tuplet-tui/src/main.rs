mod app;
mod browser;
mod controller;
mod persist;
mod session;
mod theme;
mod ui;
mod widgets;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tuplet_engine::{ensure_daemon, LocalEngine, LoftyProbe, MpvBackend, PlaybackEngine, RemoteEngine};
use tuplet_proto::config::{Config, EngineKind};

use crate::app::App;
use crate::controller::Controller;
use crate::persist::SessionStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    /// Play inside this process; music stops when the UI exits.
    Local,
    /// Drive tuplet-daemon, starting it if needed.
    Remote,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Local => EngineKind::Local,
            EngineArg::Remote => EngineKind::Remote,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tuplet", about = "Terminal music browser and player")]
struct Args {
    /// Directory to start browsing in (default: where the last session left off)
    path: Option<PathBuf>,

    /// Playback engine, overriding the config file
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = tuplet_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("tui.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,tuplet=debug,tuplet_engine=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("tuplet log: {}", log_path.display());
    info!("tuplet starting");

    let config = Config::load().unwrap_or_default();

    let explicit_dir = match args.path {
        Some(path) => {
            let dir = path
                .canonicalize()
                .with_context(|| format!("cannot open {}", path.display()))?;
            anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());
            Some(dir)
        }
        None => None,
    };
    let fallback_dir = dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .context("no home directory")?;

    let store = SessionStore::new(config.session.state_file.clone());
    let saved = store.load();
    let rows = ratatui::crossterm::terminal::size()
        .map(|(_, h)| ui::list_height(h))
        .unwrap_or(20);
    let controller = Controller::restore(&saved, explicit_dir, fallback_dir, rows);
    let tick = Duration::from_millis(config.ui.tick_ms.max(50));

    let kind = args.engine.map(EngineKind::from).unwrap_or(config.playback.engine);
    match kind {
        EngineKind::Remote => {
            let daemon = ensure_daemon(&config.daemon).await?;
            run(RemoteEngine::new(daemon), controller, store, tick).await
        }
        EngineKind::Local => {
            let backend = MpvBackend::new(
                config.playback.mpv_binary.clone(),
                config.playback.mpv_socket.clone(),
            );
            let engine = LocalEngine::new(backend, LoftyProbe, config.playback.probe_timeout());
            run(engine, controller, store, tick).await
        }
    }
}

async fn run<E: PlaybackEngine>(
    engine: E,
    controller: Controller,
    store: SessionStore,
    tick: Duration,
) -> anyhow::Result<()> {
    info!("engine: {}", engine.label());
    App::new(engine, controller, store, tick).run().await
}
