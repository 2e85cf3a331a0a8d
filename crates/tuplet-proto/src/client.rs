//! One-shot IPC client: connect, send one request line, read one response
//! line, close.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::trace;

use crate::protocol::{ProtocolError, Request, Response, MAX_REQUEST_BYTES};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon unreachable: {0}")]
    Io(#[from] std::io::Error),
    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),
    #[error("daemon closed the connection without a reply")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Send `request` to the daemon listening on `socket_path`.  The whole
/// exchange (connect, write, read) is bounded by `timeout`.
pub async fn send_request(
    socket_path: &Path,
    request: &Request,
    timeout: Duration,
) -> Result<Response, ClientError> {
    let line = request.encode()?;
    let exchange = async {
        let mut stream = UnixStream::connect(socket_path).await?;
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;

        let mut reader = BufReader::new(stream).take(MAX_REQUEST_BYTES as u64);
        let mut reply = String::new();
        let n = reader.read_line(&mut reply).await?;
        if n == 0 {
            return Err(ClientError::Closed);
        }
        trace!("ipc {} -> {:?}", request.verb(), reply.trim_end());
        Ok::<Response, ClientError>(Response::decode(&reply)?)
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ClientError::Timeout(timeout))?
}
