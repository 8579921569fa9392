//! Container inventory probe backed by the Docker Engine API.
//!
//! Talks to the local Docker daemon over its Unix socket with an HTTP/1.0
//! request so the response arrives unchunked. One `GET /containers/json`
//! per collection tick, no filters; the probe reports whatever the runtime's
//! default listing returns.

use std::io;

use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// A single entry from `GET /containers/json`.
///
/// Only the fields the collector logs are deserialized; the rest of the
/// runtime's payload is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub state: String,
}

/// Errors that can occur while probing the container runtime.
///
/// All variants are recovered per tick by the collection job; none of them
/// reach the scheduler.
#[derive(Debug)]
pub enum InventoryError {
    /// Could not connect to the runtime socket
    Connect { socket: String, source: io::Error },

    /// Request or response I/O failed mid-flight
    Io(io::Error),

    /// The runtime answered with something other than a 2xx response
    Protocol(String),

    /// The container list could not be parsed
    Parse(serde_json::Error),
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::Connect { socket, source } => {
                write!(f, "cannot connect to container runtime at {}: {}", socket, source)
            }
            InventoryError::Io(e) => write!(f, "container runtime request failed: {}", e),
            InventoryError::Protocol(msg) => {
                write!(f, "unexpected container runtime response: {}", msg)
            }
            InventoryError::Parse(e) => write!(f, "failed to parse container list: {}", e),
        }
    }
}

impl std::error::Error for InventoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InventoryError::Connect { source, .. } => Some(source),
            InventoryError::Io(e) => Some(e),
            InventoryError::Parse(e) => Some(e),
            InventoryError::Protocol(_) => None,
        }
    }
}

/// Source of the current container count.
///
/// The collection job is generic over this seam so tests can substitute a
/// fake runtime.
#[allow(async_fn_in_trait)]
pub trait Inventory {
    /// Count the containers the runtime currently reports.
    async fn count(&self) -> Result<usize, InventoryError>;
}

/// Container probe backed by the Docker Engine API over a Unix socket.
///
/// The probe is stateless; each call opens a fresh connection, which keeps
/// tick failures independent of each other.
pub struct DockerProbe {
    socket_path: String,
}

impl DockerProbe {
    /// Create a probe for the given Docker socket path.
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Get the configured socket path.
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// List the containers the runtime reports with its default filtering.
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, InventoryError> {
        let body = self.get("/containers/json").await?;
        serde_json::from_str(&body).map_err(InventoryError::Parse)
    }

    /// Send an HTTP GET over the Unix socket and return the response body.
    async fn get(&self, path: &str) -> Result<String, InventoryError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| InventoryError::Connect {
                socket: self.socket_path.clone(),
                source: e,
            })?;

        // HTTP/1.0 so the daemon closes the connection instead of chunking.
        let request = format!("GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", path);

        let (mut reader, mut writer) = stream.into_split();
        writer
            .write_all(request.as_bytes())
            .await
            .map_err(InventoryError::Io)?;
        writer.shutdown().await.map_err(InventoryError::Io)?;

        let mut response = Vec::new();
        reader
            .read_to_end(&mut response)
            .await
            .map_err(InventoryError::Io)?;

        let raw = String::from_utf8_lossy(&response);
        let body = split_response(&raw)?;

        debug!(path = %path, body_len = body.len(), "container runtime response received");

        Ok(body.to_string())
    }
}

impl Inventory for DockerProbe {
    async fn count(&self) -> Result<usize, InventoryError> {
        let containers = self.list_containers().await?;
        Ok(containers.len())
    }
}

/// Extract the body from a raw HTTP response, checking the status line.
fn split_response(raw: &str) -> Result<&str, InventoryError> {
    let status_line = raw
        .lines()
        .next()
        .ok_or_else(|| InventoryError::Protocol("empty response".to_string()))?;

    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| {
            InventoryError::Protocol(format!("malformed status line: {}", status_line))
        })?;

    if !(200..300).contains(&code) {
        return Err(InventoryError::Protocol(format!(
            "status {} from runtime",
            code
        )));
    }

    raw.split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .ok_or_else(|| InventoryError::Protocol("response has no body separator".to_string()))
}
