//! Instance metadata resolution for the host's cloud location and public IP.
//!
//! The metadata service returns a `;`-delimited plain-text tag list, e.g.
//! `pip:1.2.3.4;locationkey:eastus`. Resolution happens exactly once at
//! startup, never on the collection path.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Host metadata resolved from the instance metadata service.
///
/// The default value (two empty strings) is used in local-debug mode and
/// when resolution fails at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMetadata {
    /// Cloud location tag for this host
    pub location_key: String,

    /// Public IP address of this host
    pub public_ip: String,
}

impl HostMetadata {
    /// Whether either metadata field is missing.
    pub fn is_incomplete(&self) -> bool {
        self.location_key.is_empty() || self.public_ip.is_empty()
    }
}

/// Errors that can occur during metadata resolution.
#[derive(Debug)]
pub enum MetadataError {
    /// The request could not be sent or timed out
    Network(reqwest::Error),

    /// The metadata service returned an empty body
    EmptyResponse,
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Network(e) => write!(f, "metadata request failed: {}", e),
            MetadataError::EmptyResponse => write!(f, "metadata service returned an empty body"),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Network(e) => Some(e),
            MetadataError::EmptyResponse => None,
        }
    }
}

/// Resolve host metadata from the instance metadata endpoint.
///
/// Sends a single GET request carrying the `Metadata: true` marker header.
/// A zero `timeout` leaves the transport default in place. The response body
/// is parsed with [`parse_tags`]; tokens the body does not carry stay empty
/// rather than erroring, so callers must check for emptiness themselves.
///
/// # Errors
///
/// Returns `MetadataError::Network` if the request cannot complete and
/// `MetadataError::EmptyResponse` if the body is empty.
pub async fn resolve(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<HostMetadata, MetadataError> {
    let mut request = client.get(url).header("Metadata", "true");
    if !timeout.is_zero() {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(MetadataError::Network)?;
    let body = response.text().await.map_err(MetadataError::Network)?;

    debug!(url = %url, body_len = body.len(), "metadata response received");

    parse_tags(&body)
}

/// Parse a `;`-delimited metadata tag body.
///
/// The first token prefixed `pip:` becomes the public IP and the first token
/// prefixed `locationkey:` becomes the location key, in any order. Missing
/// tokens leave the corresponding field empty; only an empty body is an error.
pub fn parse_tags(body: &str) -> Result<HostMetadata, MetadataError> {
    if body.is_empty() {
        return Err(MetadataError::EmptyResponse);
    }

    let mut metadata = HostMetadata::default();
    for token in body.split(';') {
        if let Some(ip) = token.strip_prefix("pip:") {
            if metadata.public_ip.is_empty() {
                metadata.public_ip = ip.to_string();
            }
        } else if let Some(key) = token.strip_prefix("locationkey:") {
            if metadata.location_key.is_empty() {
                metadata.location_key = key.to_string();
            }
        }
    }

    Ok(metadata)
}
