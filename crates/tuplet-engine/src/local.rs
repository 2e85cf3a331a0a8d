//! In-process engine: probes files itself and drives a [`MediaBackend`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::MediaBackend;
use crate::probe::{LoftyProbe, Probe, ProbeSlot, TrackInfo};
use crate::{EngineError, PlaybackEngine, PlaybackStatus, ProbeResult};

struct NowPlaying {
    path: PathBuf,
    name: String,
    /// From the probe; used when the backend cannot report one.
    duration_secs: Option<f64>,
}

struct Player<B> {
    backend: B,
    now_playing: Option<NowPlaying>,
}

struct Shared<B, P> {
    player: Mutex<Player<B>>,
    probe: P,
    slot: ProbeSlot,
    probe_timeout: Duration,
}

/// Cheap to clone; clones drive the same backend.
pub struct LocalEngine<B, P = LoftyProbe> {
    shared: Arc<Shared<B, P>>,
}

impl<B, P> Clone for LocalEngine<B, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: MediaBackend, P: Probe> LocalEngine<B, P> {
    pub fn new(backend: B, probe: P, probe_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                player: Mutex::new(Player {
                    backend,
                    now_playing: None,
                }),
                probe,
                slot: ProbeSlot::new(),
                probe_timeout,
            }),
        }
    }

    /// Probe `path` and, if it is playable and no newer attempt has started
    /// meanwhile, switch playback to it.  Returns the committed track name.
    ///
    /// On any error current playback is left as it was, except when the
    /// backend itself fails to load a file that probed fine.
    pub async fn load(&self, path: &Path, start_secs: f64) -> Result<String, EngineError> {
        let generation = self.shared.slot.begin();
        self.probe_and_commit(generation, path, start_secs).await
    }

    /// Path of the committed track, if any.
    pub async fn now_playing(&self) -> Option<PathBuf> {
        let player = self.shared.player.lock().await;
        player.now_playing.as_ref().map(|np| np.path.clone())
    }

    async fn probe_and_commit(
        &self,
        generation: u64,
        path: &Path,
        start_secs: f64,
    ) -> Result<String, EngineError> {
        let timeout = self.shared.probe_timeout;
        let info: TrackInfo = tokio::time::timeout(timeout, self.shared.probe.probe(path))
            .await
            .map_err(|_| EngineError::ProbeTimeout(timeout))??;

        let mut player = self.shared.player.lock().await;
        if !self.shared.slot.is_current(generation) {
            debug!("local: probe of {} superseded", path.display());
            return Err(EngineError::Superseded);
        }

        player.backend.stop().await?;
        player.now_playing = None;
        player.backend.load(path).await?;
        if start_secs > 0.0 {
            if let Err(e) = player.backend.seek_to(start_secs).await {
                warn!("local: seek to {start_secs} after load failed: {e:#}");
            }
        }
        info!("local: playing {}", path.display());
        player.now_playing = Some(NowPlaying {
            path: path.to_path_buf(),
            name: info.name.clone(),
            duration_secs: info.duration_secs,
        });
        Ok(info.name)
    }
}

impl<B: MediaBackend, P: Probe> PlaybackEngine for LocalEngine<B, P> {
    fn play(&self, path: &Path, start_secs: f64) {
        let generation = self.shared.slot.begin();
        let engine = self.clone();
        let path = path.to_path_buf();
        tokio::spawn(async move {
            let result = match engine.probe_and_commit(generation, &path, start_secs).await {
                Ok(track_name) => ProbeResult::Committed { track_name },
                Err(EngineError::Superseded) => return,
                Err(e) => {
                    warn!("local: cannot play {}: {}", path.display(), e);
                    ProbeResult::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            engine.shared.slot.publish(generation, result);
        });
    }

    async fn stop(&self) -> Result<(), EngineError> {
        let mut player = self.shared.player.lock().await;
        player.now_playing = None;
        player.backend.stop().await?;
        Ok(())
    }

    async fn toggle_pause(&self) -> Result<(), EngineError> {
        let mut player = self.shared.player.lock().await;
        if player.now_playing.is_none() {
            return Ok(());
        }
        player.backend.toggle_pause().await?;
        Ok(())
    }

    async fn seek(&self, secs: f64) -> Result<(), EngineError> {
        let mut player = self.shared.player.lock().await;
        if player.now_playing.is_none() {
            return Err(EngineError::NothingLoaded);
        }
        player.backend.seek_to(secs.max(0.0)).await?;
        Ok(())
    }

    async fn query_status(&self) -> Result<PlaybackStatus, EngineError> {
        let mut player = self.shared.player.lock().await;
        if player.now_playing.is_none() {
            return Ok(PlaybackStatus::idle());
        }
        let snapshot = match player.backend.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("local: snapshot failed: {e:#}");
                let name = player.now_playing.as_ref().map(|np| np.name.clone());
                return Ok(PlaybackStatus {
                    track_name: name,
                    position_secs: None,
                    duration_secs: None,
                    paused: false,
                    is_idle: false,
                });
            }
        };
        if snapshot.idle {
            debug!("local: backend went idle");
            player.now_playing = None;
            return Ok(PlaybackStatus::idle());
        }
        let now_playing = player.now_playing.as_ref();
        Ok(PlaybackStatus {
            track_name: now_playing.map(|np| np.name.clone()),
            position_secs: snapshot.position_secs,
            duration_secs: snapshot
                .duration_secs
                .or_else(|| now_playing.and_then(|np| np.duration_secs)),
            paused: snapshot.paused,
            is_idle: false,
        })
    }

    fn poll_pending(&self) -> Option<ProbeResult> {
        self.shared.slot.take()
    }

    async fn shutdown(&self) {
        let mut player = self.shared.player.lock().await;
        player.now_playing = None;
        if let Err(e) = player.backend.stop().await {
            debug!("local: stop on shutdown failed: {e:#}");
        }
        player.backend.shutdown().await;
    }

    fn label(&self) -> &'static str {
        "local"
    }
}
