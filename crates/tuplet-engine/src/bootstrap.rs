//! Connect to the playback daemon, starting it first if nobody answers.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tuplet_proto::config::DaemonConfig;
use tuplet_proto::platform;

use crate::remote::DaemonHandle;

const FIRST_RETRY: Duration = Duration::from_millis(50);
const MAX_RETRY: Duration = Duration::from_millis(500);

/// Return a handle to a live daemon, spawning one if the socket is silent.
pub async fn ensure_daemon(config: &DaemonConfig) -> anyhow::Result<DaemonHandle> {
    let handle = DaemonHandle::new(config.socket_path.clone(), config.request_timeout())
        .with_play_timeout(config.play_timeout());
    if handle.ping().await {
        debug!("daemon: already running at {}", config.socket_path.display());
        return Ok(handle);
    }

    let binary = daemon_binary(config)?;
    // Dropping the handle detaches the reaper; it still runs.
    let _reaper = spawn_detached(&binary, &config.socket_path)?;

    let deadline = Instant::now() + config.spawn_wait();
    let mut delay = FIRST_RETRY;
    loop {
        tokio::time::sleep(delay).await;
        if handle.ping().await {
            info!("daemon: started at {}", config.socket_path.display());
            return Ok(handle);
        }
        if Instant::now() >= deadline {
            anyhow::bail!(
                "daemon did not come up on {} within {:?}",
                config.socket_path.display(),
                config.spawn_wait()
            );
        }
        delay = (delay * 2).min(MAX_RETRY);
    }
}

fn daemon_binary(config: &DaemonConfig) -> anyhow::Result<PathBuf> {
    match &config.binary {
        Some(path) => Ok(path.clone()),
        None => platform::find_daemon_binary().ok_or_else(|| {
            anyhow::anyhow!("{} not found beside the executable or on PATH", platform::DAEMON_BINARY_NAME)
        }),
    }
}

/// Start the daemon in its own process group.  The returned task reaps it
/// when it exits, so a daemon told to `QUIT` does not linger as a zombie
/// while this process keeps running.
fn spawn_detached(
    binary: &Path,
    socket_path: &Path,
) -> anyhow::Result<JoinHandle<Option<ExitStatus>>> {
    info!("daemon: spawning {}", binary.display());
    let mut command = tokio::process::Command::new(binary);
    command
        .arg("--socket")
        .arg(socket_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        // Own process group: Ctrl-C in the terminal must not reach it.
        .process_group(0);
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {}", binary.display()))?;
    debug!("daemon: spawned pid {:?}", child.id());
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                debug!("daemon: exited with {}", status);
                Some(status)
            }
            Err(e) => {
                warn!("daemon: wait failed: {}", e);
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig {
            socket_path: dir.path().join("d.sock"),
            binary: Some(dir.path().join("no-such-daemon")),
            request_timeout_ms: 200,
            spawn_wait_ms: 200,
            ..DaemonConfig::default()
        };
        let err = ensure_daemon(&config).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to start"), "{err:#}");
    }

    #[tokio::test]
    async fn test_live_daemon_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("d.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(b"NONE\n").await.unwrap();
        });
        let config = DaemonConfig {
            socket_path: socket.clone(),
            binary: Some(dir.path().join("never-spawned")),
            request_timeout_ms: 1000,
            spawn_wait_ms: 200,
            ..DaemonConfig::default()
        };
        let handle = ensure_daemon(&config).await.unwrap();
        assert_eq!(handle.socket_path, socket);
        assert_eq!(handle.play_timeout, config.play_timeout());
    }

    #[tokio::test]
    async fn test_exited_daemon_is_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let reaper = spawn_detached(Path::new("true"), &dir.path().join("d.sock")).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), reaper)
            .await
            .unwrap()
            .unwrap();
        assert!(status.unwrap().success());
    }
}
