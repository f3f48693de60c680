//! spotterd - detection session daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + environment overrides)
//! 2. Constructs the detector backend once at startup
//! 3. Serves the "run a detection session" operation over a local HTTP API
//! 4. Runs each session end to end: stream connect, frame demultiplexing,
//!    decode, detection, and best-effort telemetry fusion

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use stream_spotter::api::{ApiConfig, ApiServer};
use stream_spotter::config::DetectorSettings;
use stream_spotter::{Detector, SpotterConfig, StubDetector};

#[derive(Parser, Debug)]
#[command(name = "spotterd", about = "MJPEG detection session daemon", version)]
struct Cli {
    /// Path to a JSON config file (falls back to SPOTTER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the API listen address.
    #[arg(long)]
    addr: Option<String>,

    /// Override the MJPEG stream URL.
    #[arg(long)]
    stream_url: Option<String>,

    /// Override the target label.
    #[arg(long)]
    target_label: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Route CLI overrides through the config layer's environment path so
    // they are validated like any other override.
    if let Some(addr) = &cli.addr {
        std::env::set_var("SPOTTER_API_ADDR", addr);
    }
    if let Some(url) = &cli.stream_url {
        std::env::set_var("SPOTTER_STREAM_URL", url);
    }
    if let Some(label) = &cli.target_label {
        std::env::set_var("SPOTTER_TARGET_LABEL", label);
    }

    let cfg = match &cli.config {
        Some(path) => SpotterConfig::load_from_path(path)?,
        None => SpotterConfig::load()?,
    };

    let detector = build_detector(&cfg.detector)?;
    {
        let mut guard = detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        guard.warm_up()?;
        log::info!("detector backend '{}' ready", guard.name());
    }

    let api = ApiServer::new(
        ApiConfig {
            addr: cfg.api_addr.clone(),
        },
        cfg.session_config(),
        detector,
    )
    .spawn()?;
    log::info!("session api listening on {}", api.addr);
    log::info!("stream source: {}", cfg.stream_url);
    log::info!(
        "target label '{}', session timeout {:?}",
        cfg.target_label,
        cfg.session_timeout
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || shutdown_handler.store(true, Ordering::SeqCst))?;

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    api.stop()?;
    Ok(())
}

fn build_detector(settings: &DetectorSettings) -> Result<Arc<Mutex<dyn Detector>>> {
    match settings.backend.as_str() {
        "stub" => Ok(Arc::new(Mutex::new(StubDetector::empty()))),
        "tract" => build_tract_detector(settings),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract_detector(settings: &DetectorSettings) -> Result<Arc<Mutex<dyn Detector>>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
    let detector = stream_spotter::TractDetector::new(
        model_path,
        settings.input_width,
        settings.input_height,
        settings.labels.clone(),
    )?
    .with_threshold(settings.confidence_threshold);
    Ok(Arc::new(Mutex::new(detector)))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract_detector(_settings: &DetectorSettings) -> Result<Arc<Mutex<dyn Detector>>> {
    Err(anyhow!(
        "detector backend 'tract' requires building with the backend-tract feature"
    ))
}
