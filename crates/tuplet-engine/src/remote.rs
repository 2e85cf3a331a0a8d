//! Proxy engine: every call becomes one request to `tuplet-daemon`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use tuplet_proto::client::{send_request, ClientError};
use tuplet_proto::protocol::{Request, Response};

use crate::probe::ProbeSlot;
use crate::{track_name, EngineError, PlaybackEngine, PlaybackStatus, ProbeResult};

/// Where the daemon listens and how long to wait for it.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    pub socket_path: PathBuf,
    pub request_timeout: Duration,
    /// `PLAY` answers only after the daemon has probed and loaded the file.
    pub play_timeout: Duration,
}

impl DaemonHandle {
    pub fn new(socket_path: PathBuf, request_timeout: Duration) -> Self {
        Self {
            socket_path,
            request_timeout,
            play_timeout: request_timeout,
        }
    }

    pub fn with_play_timeout(mut self, play_timeout: Duration) -> Self {
        self.play_timeout = play_timeout;
        self
    }

    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        self.request_with_timeout(request, self.request_timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        send_request(&self.socket_path, request, timeout).await
    }

    /// True if a daemon answered a status query.
    pub async fn ping(&self) -> bool {
        self.request(&Request::GetInfo).await.is_ok()
    }
}

struct PlayJob {
    generation: u64,
    path: PathBuf,
    start_secs: f64,
}

pub struct RemoteEngine {
    daemon: DaemonHandle,
    slot: Arc<ProbeSlot>,
    plays: mpsc::UnboundedSender<PlayJob>,
}

impl RemoteEngine {
    /// Must be called inside a tokio runtime: starts the task that sends
    /// `PLAY` requests.
    pub fn new(daemon: DaemonHandle) -> Self {
        let slot = Arc::new(ProbeSlot::new());
        let (plays, rx) = mpsc::unbounded_channel();
        tokio::spawn(play_worker(daemon.clone(), Arc::clone(&slot), rx));
        Self {
            daemon,
            slot,
            plays,
        }
    }

    pub fn daemon(&self) -> &DaemonHandle {
        &self.daemon
    }

    async fn simple(&self, request: Request) -> Result<(), EngineError> {
        expect_ok(self.daemon.request(&request).await?)
    }
}

/// Sends plays one at a time in the order they were started, so the daemon
/// never commits an older attempt after a newer one.  Jobs already
/// superseded by a queued newer one are skipped.
async fn play_worker(
    daemon: DaemonHandle,
    slot: Arc<ProbeSlot>,
    mut rx: mpsc::UnboundedReceiver<PlayJob>,
) {
    while let Some(mut job) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            debug!("remote: skipping superseded PLAY {}", job.path.display());
            job = newer;
        }
        let result = play_remote(&daemon, &job.path, job.start_secs).await;
        slot.publish(job.generation, result);
    }
    debug!("remote: play worker stopped");
}

fn expect_ok(response: Response) -> Result<(), EngineError> {
    match response {
        Response::Ok => Ok(()),
        Response::Error(message) => Err(EngineError::Daemon(message)),
        other => Err(EngineError::Daemon(format!("unexpected reply: {other:?}"))),
    }
}

async fn play_remote(daemon: &DaemonHandle, path: &Path, start_secs: f64) -> ProbeResult {
    let Some(target) = path.to_str() else {
        return ProbeResult::Failed {
            reason: format!("path is not valid UTF-8: {}", path.display()),
        };
    };
    let request = Request::Play {
        path: target.to_string(),
        start_secs,
    };
    match daemon.request_with_timeout(&request, daemon.play_timeout).await {
        Ok(Response::Ok) => ProbeResult::Committed {
            track_name: track_name(path),
        },
        Ok(Response::Error(reason)) => ProbeResult::Failed { reason },
        Ok(other) => ProbeResult::Failed {
            reason: format!("unexpected reply: {other:?}"),
        },
        Err(e) => {
            warn!("remote: PLAY {} failed: {}", path.display(), e);
            ProbeResult::Failed {
                reason: e.to_string(),
            }
        }
    }
}

impl PlaybackEngine for RemoteEngine {
    fn play(&self, path: &Path, start_secs: f64) {
        let generation = self.slot.begin();
        let job = PlayJob {
            generation,
            path: path.to_path_buf(),
            start_secs,
        };
        if self.plays.send(job).is_err() {
            self.slot.publish(
                generation,
                ProbeResult::Failed {
                    reason: "play worker is not running".into(),
                },
            );
        }
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.simple(Request::Stop).await
    }

    async fn toggle_pause(&self) -> Result<(), EngineError> {
        self.simple(Request::Pause).await
    }

    async fn seek(&self, secs: f64) -> Result<(), EngineError> {
        self.simple(Request::Seek { secs: secs.max(0.0) }).await
    }

    async fn query_status(&self) -> Result<PlaybackStatus, EngineError> {
        match self.daemon.request(&Request::GetInfo).await? {
            Response::None => Ok(PlaybackStatus::idle()),
            Response::Info {
                name,
                position_secs,
                duration_secs,
            } => Ok(PlaybackStatus {
                track_name: Some(name),
                position_secs,
                duration_secs,
                paused: false,
                is_idle: false,
            }),
            Response::Error(message) => Err(EngineError::Daemon(message)),
            Response::Ok => Err(EngineError::Daemon("unexpected reply: OK".into())),
        }
    }

    fn poll_pending(&self) -> Option<ProbeResult> {
        self.slot.take()
    }

    async fn shutdown(&self) {
        debug!("remote: leaving daemon running");
    }

    async fn quit_daemon(&self) -> Result<(), EngineError> {
        self.simple(Request::Quit).await
    }

    fn label(&self) -> &'static str {
        "daemon"
    }
}
