//! Container Insights Collector Library
//!
//! This library provides components for periodically counting the containers
//! a host runs and shipping the readings to a remote telemetry sink:
//!
//! - **config**: Environment-based configuration for the collector
//! - **metadata**: One-shot resolution of the host's cloud location and public IP
//! - **inventory**: Container count probe backed by the Docker Engine API
//! - **telemetry**: Trace-envelope emission to the ingestion endpoint
//! - **job**: The per-tick collection unit of work
//! - **scheduler**: Fixed-cadence tick loop with skip-on-overlap semantics
//!
//! # Example
//!
//! ```no_run
//! use container_insights::config::Config;
//! use container_insights::inventory::DockerProbe;
//! use container_insights::job::CollectionJob;
//! use container_insights::metadata::HostMetadata;
//! use container_insights::scheduler::Scheduler;
//! use container_insights::telemetry::{transmit_task, TelemetryEmitter};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let scheduler = Scheduler::new(config.interval_secs).expect("Invalid interval");
//!
//!     let probe = DockerProbe::new(&config.docker_socket);
//!     let (emitter, rx) = TelemetryEmitter::new(&config.instrumentation_key);
//!     let client = reqwest::Client::new();
//!     tokio::spawn(transmit_task(rx, client, config.ingest_url.clone()));
//!
//!     let job = CollectionJob::new(probe, emitter, HostMetadata::default());
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     scheduler.run(|| job.run(), shutdown_rx).await;
//! }
//! ```

// Module declarations
pub mod config;
pub mod inventory;
pub mod job;
pub mod metadata;
pub mod scheduler;
pub mod telemetry;

// Re-export commonly used types at crate root for convenience
pub use config::{Config, ConfigError};
pub use inventory::{ContainerSummary, DockerProbe, Inventory, InventoryError};
pub use job::CollectionJob;
pub use metadata::{HostMetadata, MetadataError};
pub use scheduler::{Scheduler, SchedulerError};
pub use telemetry::{Envelope, Sample, TelemetryEmitter, TelemetrySink};
