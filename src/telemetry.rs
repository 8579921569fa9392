//! Telemetry emission to the Application Insights track endpoint.
//!
//! [`TelemetryEmitter::emit`] is fire-and-forget: it wraps a sample in a
//! trace envelope and pushes it onto an unbounded channel. A background
//! [`transmit_task`] owns the HTTP client and POSTs envelopes to the
//! ingestion endpoint; delivery failures are logged, never surfaced to the
//! collection path.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Per-request timeout for ingestion POSTs.
const TRANSMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Severity level for informational traces.
const SEVERITY_INFORMATION: i32 = 1;

/// One collected telemetry data point.
///
/// Serialization covers the message payload only; the envelope timestamp is
/// stamped at emission, not from this struct.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Number of containers the runtime reported on this tick
    #[serde(rename = "Sessions")]
    pub session_count: usize,

    /// Cloud location tag of the host
    #[serde(rename = "LocationKey")]
    pub location_key: String,

    /// Public IP of the host
    #[serde(rename = "ServerIP")]
    pub server_ip: String,

    /// Instant the sample was constructed
    #[serde(skip)]
    pub timestamp: DateTime<Utc>,
}

/// A telemetry envelope in the Application Insights track schema.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub name: String,

    /// Occurrence time, stamped when the envelope is built (at emission)
    pub time: String,

    #[serde(rename = "iKey")]
    pub i_key: String,

    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeData {
    #[serde(rename = "baseType")]
    pub base_type: String,

    #[serde(rename = "baseData")]
    pub base_data: MessageData,
}

/// Trace payload carried inside an envelope.
#[derive(Debug, Clone, Serialize)]
pub struct MessageData {
    pub ver: i32,

    pub message: String,

    #[serde(rename = "severityLevel")]
    pub severity_level: i32,

    /// Queryable metadata properties attached to the trace
    pub properties: HashMap<String, String>,
}

/// Destination for collected samples.
///
/// The collection job is generic over this seam so tests can capture
/// emitted samples instead of shipping them.
pub trait TelemetrySink {
    /// Hand a sample off for delivery; best-effort, no result surfaces.
    fn emit(&self, sample: Sample);
}

/// Builds trace envelopes from samples and queues them for transmission.
pub struct TelemetryEmitter {
    tx: mpsc::UnboundedSender<Envelope>,
    instrumentation_key: String,
    envelope_name: String,
}

impl TelemetryEmitter {
    /// Create an emitter for the given instrumentation key.
    ///
    /// Returns the emitter and the receiving end of the envelope channel,
    /// which should be handed to [`transmit_task`].
    pub fn new(instrumentation_key: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let instrumentation_key = instrumentation_key.into();
        let envelope_name = format!(
            "Microsoft.ApplicationInsights.{}.Message",
            instrumentation_key.replace('-', "")
        );

        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                tx,
                instrumentation_key,
                envelope_name,
            },
            rx,
        )
    }

    /// Build a trace envelope for a sample.
    ///
    /// The envelope time is the current instant, not the sample's
    /// construction timestamp.
    fn build_envelope(&self, sample: &Sample) -> Envelope {
        let message = serde_json::to_string(sample)
            .unwrap_or_else(|e| format!("sample serialization failed: {}", e));

        let mut properties = HashMap::new();
        properties.insert("locationKey".to_string(), sample.location_key.clone());
        properties.insert("serverIP".to_string(), sample.server_ip.clone());

        Envelope {
            name: self.envelope_name.clone(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            i_key: self.instrumentation_key.clone(),
            data: EnvelopeData {
                base_type: "MessageData".to_string(),
                base_data: MessageData {
                    ver: 2,
                    message,
                    severity_level: SEVERITY_INFORMATION,
                    properties,
                },
            },
        }
    }
}

impl TelemetrySink for TelemetryEmitter {
    fn emit(&self, sample: Sample) {
        let envelope = self.build_envelope(&sample);
        if self.tx.send(envelope).is_err() {
            warn!("telemetry channel closed, dropping sample");
        }
    }
}

/// Background task delivering envelopes to the ingestion endpoint.
///
/// Runs until the emitter side of the channel is dropped, then drains
/// whatever is still queued and exits. Envelopes available at the same time
/// are sent as one batch, since the track endpoint accepts arrays.
pub async fn transmit_task(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    client: Client,
    ingest_url: String,
) {
    while let Some(envelope) = rx.recv().await {
        let mut batch = vec![envelope];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        match client
            .post(&ingest_url)
            .timeout(TRANSMIT_TIMEOUT)
            .json(&batch)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(envelopes = batch.len(), "telemetry batch delivered");
            }
            Ok(response) => {
                warn!(
                    status = %response.status(),
                    url = %ingest_url,
                    envelopes = batch.len(),
                    "telemetry ingestion rejected batch"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    url = %ingest_url,
                    envelopes = batch.len(),
                    "telemetry delivery failed"
                );
            }
        }
    }

    debug!("telemetry channel closed, transmit task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sample() -> Sample {
        Sample {
            session_count: 3,
            location_key: "eastus".to_string(),
            server_ip: "9.9.9.9".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_sample_message_serialization() {
        let json = serde_json::to_string(&test_sample()).unwrap();
        assert_eq!(
            json,
            r#"{"Sessions":3,"LocationKey":"eastus","ServerIP":"9.9.9.9"}"#
        );
    }

    #[test]
    fn test_envelope_fields() {
        let (emitter, _rx) = TelemetryEmitter::new("553da460-2f49-4fcc-bd75-9d9a122ddfc1");
        let envelope = emitter.build_envelope(&test_sample());

        assert_eq!(
            envelope.name,
            "Microsoft.ApplicationInsights.553da4602f494fccbd759d9a122ddfc1.Message"
        );
        assert_eq!(envelope.i_key, "553da460-2f49-4fcc-bd75-9d9a122ddfc1");
        assert_eq!(envelope.data.base_type, "MessageData");
        assert_eq!(envelope.data.base_data.ver, 2);
        assert_eq!(envelope.data.base_data.severity_level, SEVERITY_INFORMATION);
        assert!(envelope.data.base_data.message.contains("\"Sessions\":3"));
    }

    #[test]
    fn test_envelope_properties() {
        let (emitter, _rx) = TelemetryEmitter::new("test-key");
        let envelope = emitter.build_envelope(&test_sample());

        let properties = &envelope.data.base_data.properties;
        assert_eq!(properties.get("locationKey"), Some(&"eastus".to_string()));
        assert_eq!(properties.get("serverIP"), Some(&"9.9.9.9".to_string()));
    }

    #[test]
    fn test_envelope_time_is_stamped_at_build() {
        let (emitter, _rx) = TelemetryEmitter::new("test-key");

        let before = Utc::now();
        let envelope = emitter.build_envelope(&test_sample());
        let after = Utc::now();

        let time: DateTime<Utc> = envelope.time.parse().unwrap();
        // rfc3339 with millis truncates, so allow 1ms of slack on the lower bound
        assert!(time >= before - chrono::Duration::milliseconds(1));
        assert!(time <= after);
    }

    #[test]
    fn test_envelope_wire_format() {
        let (emitter, _rx) = TelemetryEmitter::new("test-key");
        let envelope = emitter.build_envelope(&test_sample());

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"iKey\":\"test-key\""));
        assert!(json.contains("\"baseType\":\"MessageData\""));
        assert!(json.contains("\"severityLevel\":1"));
    }

    #[tokio::test]
    async fn test_emit_queues_envelope() {
        let (emitter, mut rx) = TelemetryEmitter::new("test-key");

        emitter.emit(test_sample());

        let envelope = rx.recv().await.expect("envelope should be queued");
        assert!(envelope.data.base_data.message.contains("eastus"));
    }

    #[test]
    fn test_emit_after_receiver_dropped_does_not_panic() {
        let (emitter, rx) = TelemetryEmitter::new("test-key");
        drop(rx);

        emitter.emit(test_sample());
    }
}
