//! Probe-before-commit support: validating a file off the caller's path and
//! the single-slot cell its result is delivered through.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use lofty::prelude::*;
use tracing::debug;

use crate::{track_name, EngineError, ProbeResult};

/// What a successful probe learned about a file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub name: String,
    pub duration_secs: Option<f64>,
}

/// Checks that a file is playable without touching current playback.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, path: &Path) -> impl Future<Output = Result<TrackInfo, EngineError>> + Send;
}

/// Probe backed by lofty's container/stream parsers.  Parsing runs on the
/// blocking pool; the engine bounds how long it waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyProbe;

impl Probe for LoftyProbe {
    async fn probe(&self, path: &Path) -> Result<TrackInfo, EngineError> {
        if !path.is_file() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_track_info(&owned))
            .await
            .map_err(|e| EngineError::Backend(anyhow::anyhow!("probe task failed: {e}")))?
    }
}

fn read_track_info(path: &Path) -> Result<TrackInfo, EngineError> {
    let unsupported = |e: &dyn std::fmt::Display| {
        EngineError::Unsupported(format!("{}: {e}", track_name(path)))
    };
    let tagged = lofty::probe::Probe::open(path)
        .map_err(|e| unsupported(&e))?
        .guess_file_type()
        .map_err(|e| unsupported(&e))?
        .read()
        .map_err(|e| unsupported(&e))?;

    let duration = tagged.properties().duration();
    Ok(TrackInfo {
        name: track_name(path),
        duration_secs: (!duration.is_zero()).then(|| duration.as_secs_f64()),
    })
}

/// Single-slot "latest result" cell shared by an engine and its probe tasks.
///
/// Every attempt takes a generation number from [`ProbeSlot::begin`].  Only
/// the newest generation may publish; a result left over from an older
/// attempt is dropped rather than queued.
#[derive(Debug, Default)]
pub struct ProbeSlot {
    latest: AtomicU64,
    cell: Mutex<Option<(u64, ProbeResult)>>,
}

impl ProbeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new attempt, superseding any still in flight.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }

    /// Store `result` unless a newer attempt has started.  Returns whether
    /// the result was kept.
    pub fn publish(&self, generation: u64, result: ProbeResult) -> bool {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(generation) {
            debug!("probe: dropping result of superseded attempt {}", generation);
            return false;
        }
        *cell = Some((generation, result));
        true
    }

    /// Read and clear.  Never blocks on anything but the slot's own lock.
    pub fn take(&self) -> Option<ProbeResult> {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        match cell.take() {
            Some((generation, result)) if self.is_current(generation) => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(name: &str) -> ProbeResult {
        ProbeResult::Committed {
            track_name: name.to_string(),
        }
    }

    #[test]
    fn test_take_clears_the_slot() {
        let slot = ProbeSlot::new();
        let generation = slot.begin();
        assert!(slot.publish(generation, committed("a.mp3")));
        assert_eq!(slot.take(), Some(committed("a.mp3")));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_newer_result_overwrites_unconsumed_one() {
        let slot = ProbeSlot::new();
        let first = slot.begin();
        assert!(slot.publish(first, committed("a.mp3")));
        let second = slot.begin();
        assert!(slot.publish(second, committed("b.mp3")));
        assert_eq!(slot.take(), Some(committed("b.mp3")));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_superseded_attempt_cannot_publish() {
        let slot = ProbeSlot::new();
        let first = slot.begin();
        let second = slot.begin();
        assert!(!slot.is_current(first));
        assert!(!slot.publish(
            first,
            ProbeResult::Failed {
                reason: "late".into()
            }
        ));
        assert_eq!(slot.take(), None);
        assert!(slot.publish(second, committed("b.mp3")));
        assert_eq!(slot.take(), Some(committed("b.mp3")));
    }

    #[test]
    fn test_unconsumed_result_is_dropped_once_superseded() {
        let slot = ProbeSlot::new();
        let first = slot.begin();
        assert!(slot.publish(first, committed("a.mp3")));
        let _second = slot.begin();
        assert_eq!(slot.take(), None);
    }

    #[tokio::test]
    async fn test_lofty_probe_rejects_missing_file() {
        let err = LoftyProbe
            .probe(Path::new("/definitely/not/here.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lofty_probe_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not audio at all").unwrap();
        let err = LoftyProbe.probe(&path).await.unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)), "got {err:?}");
    }
}
