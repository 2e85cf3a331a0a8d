//! In-memory backend and probe used by tests (enable the `test-util`
//! feature from other crates).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::{BackendSnapshot, MediaBackend};
use crate::probe::{Probe, TrackInfo};
use crate::{track_name, EngineError};

/// Duration the fake reports for every accepted file.
pub const FAKE_DURATION_SECS: f64 = 180.0;

#[derive(Debug, Default)]
pub struct FakeState {
    pub loaded: Option<PathBuf>,
    pub paused: bool,
    pub position_secs: f64,
    pub finished: bool,
    pub loads: Vec<PathBuf>,
    pub stops: usize,
    pub seeks: Vec<f64>,
    pub shut_down: bool,
}

/// Backend that records calls instead of playing audio.  Clones share state
/// so a test can keep one and hand the other to an engine.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&FakeState) -> R) -> R {
        f(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Pretend the loaded track played to its end.
    pub fn finish_track(&self) {
        self.with(|s| s.finished = true);
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl MediaBackend for FakeBackend {
    async fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        self.with(|s| {
            s.loaded = Some(path.to_path_buf());
            s.loads.push(path.to_path_buf());
            s.paused = false;
            s.finished = false;
            s.position_secs = 0.0;
        });
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.with(|s| {
            s.loaded = None;
            s.paused = false;
            s.stops += 1;
        });
        Ok(())
    }

    async fn toggle_pause(&mut self) -> anyhow::Result<()> {
        self.with(|s| s.paused = !s.paused);
        Ok(())
    }

    async fn seek_to(&mut self, secs: f64) -> anyhow::Result<()> {
        self.with(|s| {
            s.position_secs = secs;
            s.seeks.push(secs);
        });
        Ok(())
    }

    async fn snapshot(&mut self) -> anyhow::Result<BackendSnapshot> {
        Ok(self.with(|s| {
            if s.loaded.is_none() || s.finished {
                BackendSnapshot::idle()
            } else {
                BackendSnapshot {
                    idle: false,
                    paused: s.paused,
                    position_secs: Some(s.position_secs),
                    duration_secs: Some(FAKE_DURATION_SECS),
                }
            }
        }))
    }

    async fn shutdown(&mut self) {
        self.with(|s| {
            s.loaded = None;
            s.shut_down = true;
        });
    }
}

/// Probe that accepts any existing file whose contents do not start with
/// `corrupt`.  Per-path delays simulate slow media.
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    delays: HashMap<PathBuf, Duration>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, path: impl Into<PathBuf>, delay: Duration) -> Self {
        self.delays.insert(path.into(), delay);
        self
    }
}

impl Probe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<TrackInfo, EngineError> {
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        let contents =
            std::fs::read(path).map_err(|_| EngineError::NotFound(path.to_path_buf()))?;
        if contents.starts_with(b"corrupt") {
            return Err(EngineError::Unsupported(track_name(path)));
        }
        Ok(TrackInfo {
            name: track_name(path),
            duration_secs: Some(FAKE_DURATION_SECS),
        })
    }
}
