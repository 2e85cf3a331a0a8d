use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tuplet_engine::{LocalEngine, LoftyProbe, MpvBackend};
use tuplet_proto::config::Config;

#[derive(Parser, Debug)]
#[command(name = "tuplet-daemon", about = "Background playback daemon for tuplet")]
struct Args {
    /// Socket to listen on (default: the configured daemon socket)
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup file logging
    let data_dir = tuplet_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tuplet_daemon=debug,tuplet_engine=debug")
            }),
        )
        .with_ansi(false)
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let socket_path = args.socket.unwrap_or_else(|| config.daemon.socket_path.clone());
    let listener = tuplet_daemon::bind(&socket_path)?;

    let backend = MpvBackend::new(
        config.playback.mpv_binary.clone(),
        config.playback.mpv_socket.clone(),
    );
    let engine = LocalEngine::new(backend, LoftyProbe, config.playback.probe_timeout());

    info!("Daemon initialised, pid {}", std::process::id());
    tuplet_daemon::serve(listener, socket_path, engine, shutdown_signal()).await;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
