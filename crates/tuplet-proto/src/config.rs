use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "platform::daemon_socket_path")]
    pub socket_path: PathBuf,
    /// Explicit daemon binary.  Empty = search beside the exe, then PATH.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Bound on one whole request/response exchange.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long the bootstrap waits for a freshly spawned daemon.
    #[serde(default = "default_spawn_wait_ms")]
    pub spawn_wait_ms: u64,
    /// Bound on a `PLAY` exchange.  The daemon probes and then loads before
    /// it answers, so this must exceed `probe_timeout_secs` plus mpv's 5 s
    /// load wait or the UI gives up on a track the daemon goes on to play.
    #[serde(default = "default_play_timeout_ms")]
    pub play_timeout_ms: u64,
}

/// Which playback engine the UI drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Local,
    #[default]
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default)]
    pub mpv_binary: Option<PathBuf>,
    #[serde(default = "platform::mpv_socket_path")]
    pub mpv_socket: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Status poll / autoplay tick period.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: platform::daemon_socket_path(),
            binary: None,
            request_timeout_ms: default_request_timeout_ms(),
            spawn_wait_ms: default_spawn_wait_ms(),
            play_timeout_ms: default_play_timeout_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            probe_timeout_secs: default_probe_timeout_secs(),
            mpv_binary: None,
            mpv_socket: platform::mpv_socket_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl DaemonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn spawn_wait(&self) -> Duration {
        Duration::from_millis(self.spawn_wait_ms)
    }

    pub fn play_timeout(&self) -> Duration {
        Duration::from_millis(self.play_timeout_ms)
    }
}

impl PlaybackConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_spawn_wait_ms() -> u64 {
    3000
}

fn default_play_timeout_ms() -> u64 {
    15_000
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("session.json")
}

fn default_tick_ms() -> u64 {
    250
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // The mpv socket is per-process; writing today's pid into the file
        // would pin every later run to it.
        let mut on_disk = toml::Value::try_from(self)?;
        if let Some(toml::Value::Table(playback)) = on_disk.get_mut("playback") {
            playback.remove("mpv_socket");
        }
        let content = toml::to_string_pretty(&on_disk)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            playback: PlaybackConfig::default(),
            session: SessionConfig::default(),
            ui: UiConfig::default(),
        }
    }
}
