//! The per-tick collection job: probe the container count, build a sample,
//! hand it to the telemetry sink.
//!
//! A failed probe is logged and the tick produces no sample; no error ever
//! escapes to the scheduler.

use chrono::Utc;
use tracing::{debug, warn};

use crate::inventory::Inventory;
use crate::metadata::HostMetadata;
use crate::telemetry::{Sample, TelemetrySink};

/// One collection unit of work, bound to the metadata captured at startup.
pub struct CollectionJob<P, S> {
    probe: P,
    sink: S,
    metadata: HostMetadata,
}

impl<P, S> CollectionJob<P, S>
where
    P: Inventory,
    S: TelemetrySink,
{
    /// Create a job from a probe, a sink, and the resolved host metadata.
    pub fn new(probe: P, sink: S, metadata: HostMetadata) -> Self {
        Self {
            probe,
            sink,
            metadata,
        }
    }

    /// Run one collection tick.
    ///
    /// Probes the runtime for the current container count and emits one
    /// sample. If the probe fails the tick is skipped: the failure is
    /// logged and nothing is emitted.
    pub async fn run(&self) {
        let count = match self.probe.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "container inventory unavailable, skipping tick");
                return;
            }
        };

        let sample = Sample {
            session_count: count,
            location_key: self.metadata.location_key.clone(),
            server_ip: self.metadata.public_ip.clone(),
            timestamp: Utc::now(),
        };

        debug!(sessions = count, "sample collected");

        self.sink.emit(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryError;
    use std::sync::{Arc, Mutex};

    /// Fake runtime: `None` simulates an unavailable runtime.
    struct FakeProbe {
        count: Option<usize>,
    }

    impl Inventory for FakeProbe {
        async fn count(&self) -> Result<usize, InventoryError> {
            match self.count {
                Some(count) => Ok(count),
                None => Err(InventoryError::Protocol("runtime offline".to_string())),
            }
        }
    }

    /// Sink that captures emitted samples for inspection.
    #[derive(Clone, Default)]
    struct CaptureSink {
        samples: Arc<Mutex<Vec<Sample>>>,
    }

    impl TelemetrySink for CaptureSink {
        fn emit(&self, sample: Sample) {
            self.samples.lock().unwrap().push(sample);
        }
    }

    fn test_metadata() -> HostMetadata {
        HostMetadata {
            location_key: "eastus".to_string(),
            public_ip: "9.9.9.9".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tick_emits_one_sample() {
        let sink = CaptureSink::default();
        let job = CollectionJob::new(FakeProbe { count: Some(3) }, sink.clone(), test_metadata());

        let before = Utc::now();
        job.run().await;
        let after = Utc::now();

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].session_count, 3);
        assert_eq!(samples[0].location_key, "eastus");
        assert_eq!(samples[0].server_ip, "9.9.9.9");
        assert!(samples[0].timestamp >= before && samples[0].timestamp <= after);
    }

    #[tokio::test]
    async fn test_failed_probe_emits_nothing() {
        let sink = CaptureSink::default();
        let job = CollectionJob::new(FakeProbe { count: None }, sink.clone(), test_metadata());

        job.run().await;

        assert!(sink.samples.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_metadata_is_passed_through() {
        // Local-debug mode runs with the zero-value metadata sentinel.
        let sink = CaptureSink::default();
        let job = CollectionJob::new(
            FakeProbe { count: Some(0) },
            sink.clone(),
            HostMetadata::default(),
        );

        job.run().await;

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].session_count, 0);
        assert_eq!(samples[0].location_key, "");
        assert_eq!(samples[0].server_ip, "");
    }

    #[tokio::test]
    async fn test_repeated_ticks_emit_in_order() {
        let sink = CaptureSink::default();
        let job = CollectionJob::new(FakeProbe { count: Some(2) }, sink.clone(), test_metadata());

        job.run().await;
        job.run().await;
        job.run().await;

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
