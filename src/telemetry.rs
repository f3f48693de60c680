//! Location telemetry fetcher.
//!
//! Telemetry is best-effort enrichment of a positive detection: it is
//! fetched at most once per session, only after the controller has decided
//! the session is ending with a finding, and a fetch failure never discards
//! that finding.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// A location reading from the telemetry collaborator.
///
/// The document's shape is the collaborator's business; it is carried
/// opaquely and forwarded unchanged.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LocationReading(pub serde_json::Value);

/// Telemetry collaborator seam.
pub trait TelemetrySource: Send + Sync {
    fn fetch(&self) -> Result<LocationReading>;
}

/// Fetches a JSON location document over HTTP.
#[derive(Debug)]
pub struct HttpTelemetrySource {
    url: String,
    agent: ureq::Agent,
}

impl HttpTelemetrySource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("parse telemetry url '{}'", url))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => bail!("unsupported telemetry scheme '{}'; expected http(s)", other),
        }
        Ok(Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        })
    }
}

impl TelemetrySource for HttpTelemetrySource {
    fn fetch(&self) -> Result<LocationReading> {
        let body = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("fetch location from {}", self.url))?
            .into_string()
            .context("read location response")?;
        let value: serde_json::Value =
            serde_json::from_str(&body).context("parse location response")?;
        Ok(LocationReading(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let err =
            HttpTelemetrySource::new("udp://10.0.0.2:9000", Duration::from_millis(10)).unwrap_err();
        assert!(err.to_string().contains("unsupported telemetry scheme"));
    }

    #[test]
    fn location_reading_serializes_transparently() {
        let reading = LocationReading(serde_json::json!({ "lat": 59.33, "lon": 18.06 }));
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"lat":59.33,"lon":18.06}"#);
    }
}
