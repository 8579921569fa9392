//! Container Insights Collector - periodic container telemetry for cloud hosts
//!
//! On a fixed interval this service counts the containers the local Docker
//! daemon reports, attaches the host's cloud location and public IP (resolved
//! once at startup from the instance metadata service), and ships the reading
//! to the Application Insights track endpoint.
//!
//! ## Features
//!
//! - Fixed-cadence collection loop; overlapping ticks are skipped, not queued
//! - Per-tick fault containment: a failing runtime never stops the loop
//! - Fire-and-forget telemetry delivery via a background transmit task
//! - Graceful shutdown on SIGINT, draining queued telemetry
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `CONTAINER_INSIGHTS_IKEY`: instrumentation key for the telemetry sink
//! - `CONTAINER_INSIGHTS_INTERVAL_SECS`: seconds between ticks (default: 10)
//! - `CONTAINER_INSIGHTS_LOCAL_DEBUG`: skip metadata resolution (default: false)
//! - `CONTAINER_INSIGHTS_METADATA_URL`: instance metadata endpoint override
//! - `CONTAINER_INSIGHTS_METADATA_TIMEOUT_SECS`: metadata timeout, 0 = transport default
//! - `CONTAINER_INSIGHTS_DOCKER_SOCKET`: Docker socket path (default: /var/run/docker.sock)
//! - `CONTAINER_INSIGHTS_INGEST_URL`: telemetry ingestion endpoint override
//! - `RUST_LOG`: Logging level filter (default: info)

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use container_insights::config::Config;
use container_insights::inventory::DockerProbe;
use container_insights::job::CollectionJob;
use container_insights::metadata::{self, HostMetadata};
use container_insights::scheduler::Scheduler;
use container_insights::telemetry::{transmit_task, TelemetryEmitter};

/// How long to wait for queued telemetry to drain at shutdown
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting Container Insights collector...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                interval_secs = config.interval_secs,
                local_debug = config.local_debug,
                docker_socket = %config.docker_socket,
                ingest_url = %config.ingest_url,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // Validate the tick interval before anything else touches the network
    let scheduler = match Scheduler::new(config.interval_secs) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!(error = %e, "Scheduler registration failed");
            std::process::exit(1);
        }
    };

    // Shared HTTP client for metadata resolution and telemetry delivery
    let http = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            std::process::exit(1);
        }
    };

    // Resolve host metadata once; the result is captured by the job for the
    // lifetime of the process. A failure is visible but not fatal: the
    // collector keeps running with empty metadata fields.
    let host_metadata = if config.local_debug {
        info!("Local debug mode, skipping instance metadata resolution");
        HostMetadata::default()
    } else {
        match metadata::resolve(&http, &config.metadata_url, config.metadata_timeout).await {
            Ok(md) => {
                if md.is_incomplete() {
                    warn!(
                        url = %config.metadata_url,
                        location_key = %md.location_key,
                        public_ip = %md.public_ip,
                        "Instance metadata incomplete, continuing with empty fields"
                    );
                } else {
                    info!(
                        location_key = %md.location_key,
                        public_ip = %md.public_ip,
                        "Instance metadata resolved"
                    );
                }
                md
            }
            Err(e) => {
                error!(
                    error = %e,
                    url = %config.metadata_url,
                    "Instance metadata resolution failed, continuing with empty metadata"
                );
                HostMetadata::default()
            }
        }
    };

    // Long-lived collaborators: container probe and telemetry transport
    let probe = DockerProbe::new(&config.docker_socket);
    let (emitter, envelope_rx) = TelemetryEmitter::new(&config.instrumentation_key);
    let transmit_handle = tokio::spawn(transmit_task(
        envelope_rx,
        http.clone(),
        config.ingest_url.clone(),
    ));

    let job = CollectionJob::new(probe, emitter, host_metadata);

    // Flip the watch channel on Ctrl+C to stop the scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping..."),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    info!(
        interval_secs = config.interval_secs,
        "Collector running. Press Ctrl+C to stop."
    );

    scheduler.run(|| job.run(), shutdown_rx).await;

    // Graceful shutdown: dropping the job drops the emitter, which closes
    // the envelope channel and lets the transmit task drain and exit.
    info!("Initiating graceful shutdown...");
    drop(job);

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    match tokio::time::timeout(shutdown_timeout, transmit_handle).await {
        Ok(Ok(())) => {
            info!("Telemetry transmit task shut down gracefully");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Telemetry transmit task panicked during shutdown");
        }
        Err(_) => {
            warn!("Telemetry drain timed out after {:?}", shutdown_timeout);
        }
    }

    info!("Container Insights collector stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}
