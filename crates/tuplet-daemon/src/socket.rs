use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};
use tuplet_engine::{EngineError, LocalEngine, MediaBackend, PlaybackEngine, Probe};
use tuplet_proto::protocol::{Request, Response, MAX_REQUEST_BYTES};

/// Bound on reading one request once a client has connected.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_RETRY_FIRST: Duration = Duration::from_millis(50);
const ACCEPT_RETRY_MAX: Duration = Duration::from_secs(1);

/// Whether the accept loop keeps going after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Bind `socket_path`, replacing a stale socket file left by a dead daemon.
pub fn bind(socket_path: &Path) -> std::io::Result<UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(socket_path) {
        Ok(()) => debug!("removed stale socket {}", socket_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(socket_path)
}

/// Answer requests one connection at a time until `QUIT` or `shutdown`
/// resolves, then stop playback, release the backend and remove the socket.
pub async fn serve<B, P, F>(
    listener: UnixListener,
    socket_path: PathBuf,
    engine: LocalEngine<B, P>,
    shutdown: F,
) where
    B: MediaBackend,
    P: Probe,
    F: Future<Output = ()>,
{
    info!("listening on {}", socket_path.display());
    tokio::pin!(shutdown);

    let mut accept_failures = 0u32;
    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    accept_failures = 0;
                    stream
                }
                Err(e) => {
                    // EMFILE and friends persist; don't spin on them.
                    accept_failures = accept_failures.saturating_add(1);
                    let delay = accept_backoff(accept_failures);
                    error!("accept failed: {} (retrying in {:?})", e, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        };

        match handle_connection(stream, &engine).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => {
                info!("QUIT received");
                break;
            }
            Err(e) => debug!("connection dropped: {}", e),
        }
    }

    engine.shutdown().await;
    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!("could not remove {}: {}", socket_path.display(), e);
    }
    info!("daemon stopped");
}

async fn handle_connection<B: MediaBackend, P: Probe>(
    stream: UnixStream,
    engine: &LocalEngine<B, P>,
) -> std::io::Result<Flow> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = tokio::time::timeout(READ_TIMEOUT, async {
        (&mut reader)
            .take(MAX_REQUEST_BYTES as u64)
            .read_line(&mut line)
            .await
    })
    .await;

    let (response, flow) = match read {
        Err(_) => (Response::error("request timed out"), Flow::Continue),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
            (Response::error("request is not valid UTF-8"), Flow::Continue)
        }
        Ok(Err(e)) => return Err(e),
        Ok(Ok(0)) => return Ok(Flow::Continue),
        Ok(Ok(_)) => match Request::decode(&line) {
            Ok(request) => {
                debug!("request: {:?}", request);
                dispatch(engine, request).await
            }
            Err(e) => {
                debug!("bad request {:?}: {}", line.trim_end(), e);
                (Response::error(e), Flow::Continue)
            }
        },
    };

    let stream = reader.get_mut();
    stream.write_all(response.encode().as_bytes()).await?;
    stream.flush().await?;
    Ok(flow)
}

async fn dispatch<B: MediaBackend, P: Probe>(
    engine: &LocalEngine<B, P>,
    request: Request,
) -> (Response, Flow) {
    let response = match request {
        Request::Play { path, start_secs } => {
            match engine.load(Path::new(&path), start_secs.max(0.0)).await {
                Ok(name) => {
                    info!("now playing {}", name);
                    Response::Ok
                }
                Err(e) => {
                    warn!("PLAY {} failed: {}", path, e);
                    Response::error(e)
                }
            }
        }
        Request::Stop => {
            if let Err(e) = engine.stop().await {
                warn!("STOP: {}", e);
            }
            Response::Ok
        }
        Request::Pause => reply(engine.toggle_pause().await),
        Request::Seek { secs } => reply(engine.seek(secs.max(0.0)).await),
        Request::GetInfo => match engine.query_status().await {
            Ok(status) if status.is_idle => Response::None,
            Ok(status) => Response::Info {
                name: status.track_name.unwrap_or_default(),
                position_secs: status.position_secs,
                duration_secs: status.duration_secs,
            },
            Err(e) => Response::error(e),
        },
        Request::Quit => return (Response::Ok, Flow::Quit),
    };
    (response, Flow::Continue)
}

fn reply(result: Result<(), EngineError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(e),
    }
}

/// Pause before retrying after `failures` consecutive accept errors.
fn accept_backoff(failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(10);
    (ACCEPT_RETRY_FIRST * 2u32.pow(doublings)).min(ACCEPT_RETRY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_backoff_grows_and_caps() {
        assert_eq!(accept_backoff(1), Duration::from_millis(50));
        assert_eq!(accept_backoff(2), Duration::from_millis(100));
        assert_eq!(accept_backoff(4), Duration::from_millis(400));
        assert_eq!(accept_backoff(6), ACCEPT_RETRY_MAX);
        assert_eq!(accept_backoff(u32::MAX), ACCEPT_RETRY_MAX);
    }
}
