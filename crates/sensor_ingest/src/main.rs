mod config;
mod shutdown;

use anyhow::Context;
use common::domain::{DeviceStateStore, SystemClock};
use common::store::{InMemoryDeviceStateStore, JsonFileDeviceStateStore};
use common::telemetry::{init_telemetry, TelemetryConfig};
use crate::config::{ServiceConfig, StoreBackend};
use ingestion_worker::{
    EnvelopeSource, IngestionPipeline, IngestionWorker, JsonLinesSource, JsonLinesSourceConfig,
};
use sensor_payload::PortDecoder;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: config.service_name.clone(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        store_backend = ?config.store_backend,
        input_path = %config.input_path,
        "starting sensor-ingest service"
    );
    debug!("Configuration: {:?}", config);

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to open device state store");
            std::process::exit(1);
        }
    };

    let source = match open_source(&config).await {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "failed to open input");
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        Arc::new(PortDecoder::new()),
        Arc::new(SystemClock),
    ));
    let worker = IngestionWorker::new(pipeline, source);

    let token = CancellationToken::new();
    shutdown::cancel_on_signal(token.clone());

    let result = worker.run(token).await;

    // The store is closed whether the worker finished cleanly or not
    match tokio::time::timeout(config.shutdown_timeout(), store.close()).await {
        Ok(Ok(())) => info!("device state store closed"),
        Ok(Err(e)) => error!(error = %e, "failed to close device state store"),
        Err(_) => error!(
            timeout_secs = config.shutdown_timeout_secs,
            "closing device state store timed out"
        ),
    }

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "sensor-ingest exiting with error");
        std::process::exit(1);
    }

    info!("sensor-ingest stopped");
}

async fn open_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn DeviceStateStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("using in-memory device state store");
            Ok(Arc::new(InMemoryDeviceStateStore::new()))
        }
        StoreBackend::File => {
            let store = JsonFileDeviceStateStore::open(&config.store_dir).await?;
            info!(store_dir = %store.root().display(), "using json file device state store");
            Ok(Arc::new(store))
        }
    }
}

async fn open_source(config: &ServiceConfig) -> anyhow::Result<Box<dyn EnvelopeSource>> {
    let source_config = JsonLinesSourceConfig {
        batch_size: config.batch_size,
        batch_wait: config.batch_wait(),
        device_id_property: config.device_id_property.clone(),
    };

    if config.reads_stdin() {
        info!("reading transport messages from stdin");
        return Ok(Box::new(JsonLinesSource::new(
            BufReader::new(tokio::io::stdin()),
            source_config,
        )));
    }

    let file = tokio::fs::File::open(&config.input_path)
        .await
        .with_context(|| format!("failed to open input file {}", config.input_path))?;
    info!(input_path = %config.input_path, "reading transport messages from file");
    Ok(Box::new(JsonLinesSource::new(BufReader::new(file), source_config)))
}
