use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use url::Url;

use crate::demux::DEFAULT_MAX_BUFFER_BYTES;
use crate::session::SessionConfig;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8790";
const DEFAULT_STREAM_URL: &str = "http://127.0.0.1:81/stream";
const DEFAULT_TELEMETRY_URL: &str = "http://127.0.0.1/gps";
const DEFAULT_TARGET_LABEL: &str = "person";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TELEMETRY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_FRAME_DECODE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_MAX_DECODE_FAILURES: u32 = 5;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";

#[derive(Debug, Deserialize, Default)]
struct SpotterConfigFile {
    api: Option<ApiConfigFile>,
    stream: Option<StreamConfigFile>,
    telemetry: Option<TelemetryConfigFile>,
    session: Option<SessionConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TelemetryConfigFile {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    target_label: Option<String>,
    timeout_ms: Option<u64>,
    frame_decode_timeout_ms: Option<u64>,
    max_buffer_bytes: Option<usize>,
    max_consecutive_decode_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    labels: Option<Vec<String>>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct SpotterConfig {
    pub api_addr: String,
    pub stream_url: String,
    pub telemetry_url: String,
    pub target_label: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub telemetry_timeout: Duration,
    pub session_timeout: Duration,
    pub frame_decode_timeout: Duration,
    pub max_buffer_bytes: usize,
    pub max_consecutive_decode_failures: u32,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Backend name: "stub", or "tract" (requires the `backend-tract`
    /// feature and a model path).
    pub backend: String,
    pub model_path: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub labels: Vec<String>,
    pub confidence_threshold: f32,
}

impl SpotterConfig {
    /// Load from the file named by `SPOTTER_CONFIG` (if any), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SPOTTER_CONFIG").ok();
        match config_path.as_deref() {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => {
                let mut cfg = Self::from_file(SpotterConfigFile::default());
                cfg.apply_env()?;
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    /// Load from an explicit config file path, then apply environment
    /// overrides and validate.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SpotterConfigFile) -> Self {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let stream = file.stream.unwrap_or_default();
        let telemetry = file.telemetry.unwrap_or_default();
        let session = file.session.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();

        Self {
            api_addr,
            stream_url: stream
                .url
                .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string()),
            telemetry_url: telemetry
                .url
                .unwrap_or_else(|| DEFAULT_TELEMETRY_URL.to_string()),
            target_label: session
                .target_label
                .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
            connect_timeout: Duration::from_millis(
                stream.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            read_timeout: Duration::from_millis(
                stream.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
            telemetry_timeout: Duration::from_millis(
                telemetry.timeout_ms.unwrap_or(DEFAULT_TELEMETRY_TIMEOUT_MS),
            ),
            session_timeout: Duration::from_millis(
                session.timeout_ms.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS),
            ),
            frame_decode_timeout: Duration::from_millis(
                session
                    .frame_decode_timeout_ms
                    .unwrap_or(DEFAULT_FRAME_DECODE_TIMEOUT_MS),
            ),
            max_buffer_bytes: session.max_buffer_bytes.unwrap_or(DEFAULT_MAX_BUFFER_BYTES),
            max_consecutive_decode_failures: session
                .max_consecutive_decode_failures
                .unwrap_or(DEFAULT_MAX_DECODE_FAILURES),
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
                model_path: detector.model_path,
                input_width: detector.input_width.unwrap_or(640),
                input_height: detector.input_height.unwrap_or(640),
                labels: detector.labels.unwrap_or_default(),
                confidence_threshold: detector.confidence_threshold.unwrap_or(0.5),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SPOTTER_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("SPOTTER_STREAM_URL") {
            if !url.trim().is_empty() {
                self.stream_url = url;
            }
        }
        if let Ok(url) = std::env::var("SPOTTER_TELEMETRY_URL") {
            if !url.trim().is_empty() {
                self.telemetry_url = url;
            }
        }
        if let Ok(label) = std::env::var("SPOTTER_TARGET_LABEL") {
            if !label.trim().is_empty() {
                self.target_label = label;
            }
        }
        if let Some(timeout) = env_millis("SPOTTER_CONNECT_TIMEOUT_MS")? {
            self.connect_timeout = timeout;
        }
        if let Some(timeout) = env_millis("SPOTTER_READ_TIMEOUT_MS")? {
            self.read_timeout = timeout;
        }
        if let Some(timeout) = env_millis("SPOTTER_TELEMETRY_TIMEOUT_MS")? {
            self.telemetry_timeout = timeout;
        }
        if let Some(timeout) = env_millis("SPOTTER_SESSION_TIMEOUT_MS")? {
            self.session_timeout = timeout;
        }
        if let Some(timeout) = env_millis("SPOTTER_FRAME_DECODE_TIMEOUT_MS")? {
            self.frame_decode_timeout = timeout;
        }
        if let Ok(cap) = std::env::var("SPOTTER_MAX_BUFFER_BYTES") {
            self.max_buffer_bytes = cap
                .parse()
                .map_err(|_| anyhow!("SPOTTER_MAX_BUFFER_BYTES must be an integer byte count"))?;
        }
        if let Ok(limit) = std::env::var("SPOTTER_MAX_DECODE_FAILURES") {
            self.max_consecutive_decode_failures = limit
                .parse()
                .map_err(|_| anyhow!("SPOTTER_MAX_DECODE_FAILURES must be an integer count"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stream url", &self.stream_url),
            ("telemetry url", &self.telemetry_url),
        ] {
            let parsed =
                Url::parse(value).map_err(|e| anyhow!("invalid {}: '{}': {}", name, value, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("{} must use http(s), got '{}'", name, value));
            }
        }
        if self.target_label.trim().is_empty() {
            return Err(anyhow!("target label must not be empty"));
        }
        if self.session_timeout.is_zero() {
            return Err(anyhow!("session timeout must be greater than zero"));
        }
        if self.max_buffer_bytes == 0 {
            return Err(anyhow!("stream buffer cap must be greater than zero"));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("tract backend requires detector.model_path"));
        }
        Ok(())
    }

    /// Per-session configuration derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            stream_url: self.stream_url.clone(),
            telemetry_url: self.telemetry_url.clone(),
            target_label: self.target_label.clone(),
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            telemetry_timeout: self.telemetry_timeout,
            session_timeout: self.session_timeout,
            frame_decode_timeout: self.frame_decode_timeout,
            max_buffer_bytes: self.max_buffer_bytes,
            max_consecutive_decode_failures: self.max_consecutive_decode_failures,
        }
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .map_err(|_| anyhow!("{} must be an integer number of milliseconds", name))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<SpotterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
