/// mpv IPC driver with separated reader/writer tasks.
///
/// Architecture:
///
/// ```text
///   MpvBackend::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event (end-file, file-loaded…) → event channel
/// ```
///
/// `MpvHandle` is cheaply cloneable; `send(cmd)` resolves to mpv's reply.
/// `MpvBackend` owns the `mpv --idle` process and respawns it when it dies.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::backend::{BackendSnapshot, MediaBackend};

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `load` waits for mpv to report the outcome of `loadfile`.
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

// ── internal channel types ────────────────────────────────────────────────────

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// For an `end-file` caused by a bad file, mpv's description of why.
    pub fn load_error(&self) -> Option<String> {
        if self.event_name()? != "end-file" || self.raw.get("reason")?.as_str()? != "error" {
            return None;
        }
        Some(
            self.raw
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        )
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    async fn get_property(&self, name: &str) -> anyhow::Result<Value> {
        let resp = self.send(json!(["get_property", name])).await?;
        Ok(resp["data"].clone())
    }

    async fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_property(name).await.ok()?.as_bool()
    }

    async fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_property(name).await.ok()?.as_f64()
    }
}

// ── backend ───────────────────────────────────────────────────────────────────

/// Plays local files through an `mpv --idle` child process.
pub struct MpvBackend {
    binary: Option<PathBuf>,
    socket_path: PathBuf,
    process: Option<tokio::process::Child>,
    handle: Option<MpvHandle>,
    events: Option<mpsc::Receiver<MpvEvent>>,
}

impl MpvBackend {
    /// `binary: None` searches `MPV_PATH`, beside the exe, then `PATH`.
    /// Nothing is spawned until the first `load`.
    pub fn new(binary: Option<PathBuf>, socket_path: PathBuf) -> Self {
        Self {
            binary,
            socket_path,
            process: None,
            handle: None,
            events: None,
        }
    }

    fn process_alive(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            child.try_wait().ok().flatten().is_none()
        } else {
            false
        }
    }

    /// The current IPC handle, if mpv is still running.
    fn live_handle(&mut self) -> Option<MpvHandle> {
        if !self.process_alive() {
            return None;
        }
        self.handle.clone()
    }

    async fn kill(&mut self) {
        self.handle = None;
        self.events = None;
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    async fn ensure_connected(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(handle) = self.live_handle() {
            return Ok(handle);
        }
        if self.process.is_some() {
            warn!("mpv: process gone, respawning");
        }
        self.spawn_and_connect().await
    }

    // ── spawn ─────────────────────────────────────────────────────────────────

    async fn spawn_and_connect(&mut self) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        let _ = tokio::fs::remove_file(&self.socket_path).await;

        let mpv_binary = match &self.binary {
            Some(path) => path.clone(),
            None => tuplet_proto::platform::find_mpv_binary()
                .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?,
        };
        info!("mpv: spawning {}", mpv_binary.display());

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to start {}: {}", mpv_binary.display(), e))?;
        self.process = Some(child);

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.socket_path.exists() {
                break;
            }
        }
        if !self.socket_path.exists() {
            self.kill().await;
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&self.socket_path).await?;
        info!("mpv: connected to {}", self.socket_path.display());
        let (read_half, write_half) = stream.into_split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let handle = start_io_tasks(read_half, write_half, event_tx);
        self.handle = Some(handle.clone());
        self.events = Some(event_rx);
        Ok(handle)
    }

    fn drain_events(&mut self) {
        if let Some(events) = self.events.as_mut() {
            while events.try_recv().is_ok() {}
        }
    }

    async fn wait_for_load(&mut self) -> anyhow::Result<()> {
        let events = self
            .events
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("mpv event channel missing"))?;
        let outcome = tokio::time::timeout(LOAD_TIMEOUT, async {
            while let Some(event) = events.recv().await {
                if event.event_name() == Some("file-loaded") {
                    return Ok(());
                }
                if let Some(reason) = event.load_error() {
                    anyhow::bail!("mpv rejected file: {}", reason);
                }
            }
            anyhow::bail!("mpv IPC connection closed")
        })
        .await;
        match outcome {
            Ok(result) => result,
            Err(_) => anyhow::bail!("mpv did not load the file within {:?}", LOAD_TIMEOUT),
        }
    }
}

impl MediaBackend for MpvBackend {
    async fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        let target = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("path is not valid UTF-8: {}", path.display()))?;
        let handle = self.ensure_connected().await?;
        self.drain_events();
        handle
            .send(json!(["loadfile", target, "replace"]))
            .await?;
        self.wait_for_load().await
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.live_handle() {
            handle.send(json!(["stop"])).await?;
        }
        Ok(())
    }

    async fn toggle_pause(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.live_handle() {
            handle.send(json!(["cycle", "pause"])).await?;
        }
        Ok(())
    }

    async fn seek_to(&mut self, secs: f64) -> anyhow::Result<()> {
        let handle = self
            .live_handle()
            .ok_or_else(|| anyhow::anyhow!("mpv is not running"))?;
        handle
            .send(json!(["set_property", "time-pos", secs.max(0.0)]))
            .await?;
        Ok(())
    }

    async fn snapshot(&mut self) -> anyhow::Result<BackendSnapshot> {
        let Some(handle) = self.live_handle() else {
            return Ok(BackendSnapshot::idle());
        };
        if handle.get_bool("idle-active").await.unwrap_or(true) {
            return Ok(BackendSnapshot::idle());
        }
        Ok(BackendSnapshot {
            idle: false,
            paused: handle.get_bool("pause").await.unwrap_or(false),
            position_secs: handle.get_f64("time-pos").await,
            duration_secs: handle.get_f64("duration").await,
        })
    }

    async fn shutdown(&mut self) {
        if let Some(handle) = self.live_handle() {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle.send(json!(["quit"]))).await;
        }
        self.kill().await;
        let _ = tokio::fs::remove_file(&self.socket_path).await;
        debug!("mpv: shut down");
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    // Nobody may be listening between loads; never block the
                    // reader on a full event channel.
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.try_send(MpvEvent { raw: val }).is_err() {
                        debug!("mpv reader: event channel full, dropping event");
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, &format!("mpv IPC read error: {e}")).await;
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt};

    /// A stand-in mpv: answers every command with `data`, and pushes
    /// `file-loaded` after a `loadfile`.
    async fn fake_mpv(stream: tokio::io::DuplexStream, data: Value) {
        let (read_half, mut write_half) = split(stream);
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let req: Value = serde_json::from_str(&line).unwrap();
            let reply = json!({ "request_id": req["request_id"], "error": "success", "data": data });
            let mut out = format!("{reply}\n");
            if req["command"][0] == "loadfile" {
                out.push_str("{\"event\":\"file-loaded\"}\n");
            }
            write_half.write_all(out.as_bytes()).await.unwrap();
        }
    }

    #[test]
    fn test_load_error_only_for_error_end_file() {
        let failed = MpvEvent {
            raw: json!({"event": "end-file", "reason": "error", "file_error": "unrecognized file format"}),
        };
        assert_eq!(failed.load_error().as_deref(), Some("unrecognized file format"));

        let stopped = MpvEvent {
            raw: json!({"event": "end-file", "reason": "stop"}),
        };
        assert_eq!(stopped.load_error(), None);

        let loaded = MpvEvent {
            raw: json!({"event": "file-loaded"}),
        };
        assert_eq!(loaded.event_name(), Some("file-loaded"));
        assert_eq!(loaded.load_error(), None);
    }

    #[tokio::test]
    async fn test_replies_are_matched_and_events_forwarded() {
        let (ours, theirs) = duplex(4096);
        tokio::spawn(fake_mpv(theirs, json!(12.5)));
        let (read_half, write_half) = split(ours);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        assert_eq!(handle.get_f64("time-pos").await, Some(12.5));
        handle.send(json!(["loadfile", "/a.mp3", "replace"])).await.unwrap();
        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.event_name(), Some("file-loaded"));
    }

    #[tokio::test]
    async fn test_pending_requests_fail_when_connection_closes() {
        let (ours, theirs) = duplex(4096);
        let (read_half, write_half) = split(ours);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);
        drop(theirs);
        assert!(handle.send(json!(["get_property", "pause"])).await.is_err());
    }

    #[tokio::test]
    async fn test_unstarted_backend_is_idle() {
        let mut backend = MpvBackend::new(None, std::env::temp_dir().join("tuplet-mpv-test.sock"));
        let snapshot = backend.snapshot().await.unwrap();
        assert!(snapshot.idle);
        backend.stop().await.unwrap();
        assert!(backend.seek_to(3.0).await.is_err());
    }
}
