//! Playback engines.
//!
//! Two implementations sit behind [`PlaybackEngine`]:
//!
//! ```text
//!   LocalEngine<B, P>   owns a MediaBackend (mpv) in this process and
//!                       probes files itself before committing them
//!   RemoteEngine        forwards every call to tuplet-daemon over its
//!                       socket; the daemon's LocalEngine does the probing
//! ```
//!
//! `play` never blocks: it starts a probe-and-commit attempt in the
//! background and the outcome is picked up later with `poll_pending`.

pub mod backend;
pub mod bootstrap;
pub mod local;
pub mod mpv;
pub mod probe;
pub mod remote;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tuplet_proto::client::ClientError;

pub use backend::{BackendSnapshot, MediaBackend};
pub use bootstrap::ensure_daemon;
pub use local::LocalEngine;
pub use mpv::MpvBackend;
pub use probe::{LoftyProbe, Probe, ProbeSlot, TrackInfo};
pub use remote::{DaemonHandle, RemoteEngine};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported or corrupt audio file: {0}")]
    Unsupported(String),
    #[error("probe timed out after {0:?}")]
    ProbeTimeout(Duration),
    #[error("nothing is playing")]
    NothingLoaded,
    /// A newer `play` started before this one could commit.
    #[error("superseded by a newer play request")]
    Superseded,
    #[error("playback backend: {0:#}")]
    Backend(#[from] anyhow::Error),
    #[error(transparent)]
    Transport(#[from] ClientError),
    #[error("daemon: {0}")]
    Daemon(String),
}

/// Snapshot of what the engine is doing.  Built fresh on every query.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub track_name: Option<String>,
    pub position_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    pub paused: bool,
    /// Nothing audible is loaded, or the track ran to its end.
    pub is_idle: bool,
}

impl PlaybackStatus {
    pub fn idle() -> Self {
        Self {
            track_name: None,
            position_secs: None,
            duration_secs: None,
            paused: false,
            is_idle: true,
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.is_idle
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Outcome of one probe-and-commit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Committed { track_name: String },
    Failed { reason: String },
}

/// A command the session controller asks the engine to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Play { path: PathBuf, start_secs: f64 },
    Stop,
    TogglePause,
    Seek { secs: f64 },
    Query,
}

/// The transport contract shared by the local and remote engines.
pub trait PlaybackEngine: Send + Sync + 'static {
    /// Start a probe-and-commit attempt for `path` and return immediately.
    /// The result is retrieved with [`PlaybackEngine::poll_pending`].
    fn play(&self, path: &Path, start_secs: f64);

    /// Halt playback and forget the current track.  Idempotent.
    fn stop(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Flip paused/playing.  No-op when nothing is loaded.
    fn toggle_pause(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Absolute seek within the current track.
    fn seek(&self, secs: f64) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn query_status(&self) -> impl Future<Output = Result<PlaybackStatus, EngineError>> + Send;

    /// Non-blocking read-and-clear of the latest probe result.
    fn poll_pending(&self) -> Option<ProbeResult>;

    /// Called once when the UI exits.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;

    /// Ask an out-of-process engine to stop playing and exit.  Engines that
    /// live in this process have nothing to do beyond `shutdown`.
    fn quit_daemon(&self) -> impl Future<Output = Result<(), EngineError>> + Send {
        async { Ok(()) }
    }

    /// Short name for the status line.
    fn label(&self) -> &'static str;
}

/// Display name for a track: the file name, falling back to the full path.
pub fn track_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
