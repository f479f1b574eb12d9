//! Varlink transport to the podman service.
//!
//! Varlink frames every message as one JSON object followed by a NUL byte.
//! A call writes `{"method", "parameters"}` and reads exactly one reply,
//! either `{"parameters"}` or `{"error", "parameters"}`. The protocol has no
//! request ids, so a connection carries at most one call at a time and
//! replies come back in request order.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::{Result, RuntimeError};

/// A connection able to carry one request/response call at a time.
///
/// `&mut self` makes exclusivity a property of the type: a caller must own
/// or lock the connection to issue a call.
#[async_trait]
pub trait Transport: Send {
    /// Issue `method` with `parameters` and return the reply parameters.
    async fn call(&mut self, method: &str, parameters: Value) -> Result<Value>;
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Resolve a `unix:/path;key=value` Varlink address to a socket path.
pub fn socket_path(address: &str) -> Result<PathBuf> {
    let path = address.strip_prefix("unix:").ok_or_else(|| {
        RuntimeError::Protocol(format!("unsupported varlink address '{}'", address))
    })?;
    let path = path.split(';').next().unwrap_or_default();
    if path.is_empty() {
        return Err(RuntimeError::Protocol(format!(
            "varlink address '{}' has no socket path",
            address
        )));
    }
    Ok(PathBuf::from(path))
}

/// Where the connection stands between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Idle,
    /// A request write was interrupted; the server may hold half a frame.
    Writing,
    /// A full request was sent and its reply not yet read.
    AwaitingReply,
    /// The stream failed or hit EOF.
    Broken,
}

/// Varlink client connection over a Unix domain socket.
///
/// A caller that stops waiting after its request went out leaves one reply
/// in the stream. Replies arrive in order, so the next call reads and drops
/// it before sending. Only an interrupted write or a failed stream makes
/// the connection refuse further calls.
pub struct VarlinkConnection {
    address: String,
    stream: BufReader<UnixStream>,
    state: CallState,
}

impl VarlinkConnection {
    /// Connect to the service at `address` (e.g. `unix:/run/podman/io.podman`).
    pub async fn connect(address: &str) -> Result<Self> {
        let path = socket_path(address)?;
        let stream = UnixStream::connect(&path).await.map_err(|e| {
            RuntimeError::Connection(io::Error::new(
                e.kind(),
                format!("Failed to connect to {}: {}", path.display(), e),
            ))
        })?;

        tracing::debug!(address = %address, "Connected to varlink service");

        Ok(Self {
            address: address.to_string(),
            stream: BufReader::new(stream),
            state: CallState::Idle,
        })
    }

    /// Read one NUL-terminated frame, without the terminator.
    ///
    /// Marks the connection broken on EOF or I/O failure. If the future is
    /// dropped the state is unchanged, and the rest of the frame is read by
    /// the next attempt.
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut frame = Vec::new();
        if let Err(e) = self.stream.read_until(0, &mut frame).await {
            self.state = CallState::Broken;
            return Err(e.into());
        }
        if frame.pop() != Some(0) {
            self.state = CallState::Broken;
            return Err(RuntimeError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "varlink service closed the connection",
            )));
        }
        Ok(frame)
    }
}

#[async_trait]
impl Transport for VarlinkConnection {
    async fn call(&mut self, method: &str, parameters: Value) -> Result<Value> {
        match self.state {
            CallState::Idle => {}
            CallState::AwaitingReply => {
                let stale = self.read_frame().await?;
                self.state = CallState::Idle;
                tracing::debug!(
                    address = %self.address,
                    bytes = stale.len(),
                    "Discarded reply of an abandoned call"
                );
            }
            CallState::Writing | CallState::Broken => {
                return Err(RuntimeError::Protocol(format!(
                    "connection to {} was interrupted mid-call",
                    self.address
                )));
            }
        }

        let mut request = serde_json::to_vec(&json!({
            "method": method,
            "parameters": parameters,
        }))?;
        request.push(0);

        self.state = CallState::Writing;
        if let Err(e) = self.stream.get_mut().write_all(&request).await {
            self.state = CallState::Broken;
            return Err(e.into());
        }
        self.state = CallState::AwaitingReply;

        let frame = self.read_frame().await?;
        self.state = CallState::Idle;

        let reply: Reply = serde_json::from_slice(&frame)?;
        if let Some(error) = reply.error {
            return Err(RuntimeError::from_reply(&error, reply.parameters.as_ref()));
        }
        Ok(reply.parameters.unwrap_or_else(|| json!({})))
    }
}
