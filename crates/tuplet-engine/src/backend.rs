//! The low-level media engine as seen by [`crate::LocalEngine`].

use std::future::Future;
use std::path::Path;

/// Raw transport state reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BackendSnapshot {
    /// Nothing loaded, or the loaded file played to its end.
    pub idle: bool,
    pub paused: bool,
    pub position_secs: Option<f64>,
    pub duration_secs: Option<f64>,
}

impl BackendSnapshot {
    pub fn idle() -> Self {
        Self {
            idle: true,
            ..Self::default()
        }
    }
}

/// Anything that can actually make sound out of a local file.
///
/// Methods take `&mut self`; the engine serialises access behind a lock.
pub trait MediaBackend: Send + 'static {
    /// Replace whatever is loaded with `path` and start playing from 0.
    /// Resolves once the backend has accepted or rejected the file.
    fn load(&mut self, path: &Path) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn stop(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn toggle_pause(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn seek_to(&mut self, secs: f64) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn snapshot(&mut self) -> impl Future<Output = anyhow::Result<BackendSnapshot>> + Send;

    /// Release the backend for good (kill processes, remove sockets).
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
