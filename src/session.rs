//! Detection session fusion controller.
//!
//! One session drives the demultiplexer frame by frame through decode and
//! detection, fetches telemetry once on a positive finding, and produces
//! exactly one terminal [`SessionOutcome`]. The per-frame path is strictly
//! sequential: frame order decides which frame wins the early-exit race, so
//! no two frames are ever decoded or detected concurrently within a session.
//!
//! Sessions share no mutable state. Each invocation starts a fresh stream
//! connection and a fresh, empty buffer; both are released on every exit
//! path.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::decode::decode_frame_with_timeout;
use crate::demux::{FrameDemux, DEFAULT_MAX_BUFFER_BYTES};
use crate::detect::Detector;
use crate::stream::{ChunkSource, HttpChunkSource, StreamChunk};
use crate::telemetry::{HttpTelemetrySource, LocationReading, TelemetrySource};

/// Per-session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub stream_url: String,
    pub telemetry_url: String,
    /// Label that ends the session with a positive finding.
    pub target_label: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub telemetry_timeout: Duration,
    /// Cumulative wall-clock bound from connect through the terminal outcome.
    pub session_timeout: Duration,
    pub frame_decode_timeout: Duration,
    pub max_buffer_bytes: usize,
    /// Consecutive undecodable frames tolerated before the session escalates
    /// to a framing error.
    pub max_consecutive_decode_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_url: "http://127.0.0.1:81/stream".to_string(),
            telemetry_url: "http://127.0.0.1/gps".to_string(),
            target_label: "person".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            telemetry_timeout: Duration::from_secs(5),
            session_timeout: Duration::from_secs(30),
            frame_decode_timeout: Duration::from_secs(2),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            max_consecutive_decode_failures: 5,
        }
    }
}

/// Terminal outcome of one session. Serializes as the response of the
/// "run a detection session" operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The target label was seen. `location` is absent when the telemetry
    /// fetch failed; the finding itself is never discarded for that.
    TargetFound {
        location: Option<LocationReading>,
        #[serde(skip_serializing_if = "Option::is_none")]
        telemetry_error: Option<String>,
    },
    TargetAbsentStreamEnded,
    TimedOut,
    Error {
        reason: String,
    },
}

/// Connect to the configured stream and run one session over it.
pub fn run_http_session(cfg: &SessionConfig, detector: &mut dyn Detector) -> SessionOutcome {
    // The cumulative timer covers Connecting through Terminated, so the
    // clock starts before the stream connection is opened.
    let deadline = Instant::now() + cfg.session_timeout;

    let telemetry = match HttpTelemetrySource::new(&cfg.telemetry_url, cfg.telemetry_timeout) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            return SessionOutcome::Error {
                reason: format!("telemetry: {err:#}"),
            }
        }
    };

    // Neither the connect nor a blocking read may overshoot the session
    // deadline by more than one socket operation.
    let connect_timeout = cfg.connect_timeout.min(cfg.session_timeout);
    let read_timeout = cfg.read_timeout.min(cfg.session_timeout);
    let mut source = match HttpChunkSource::connect(&cfg.stream_url, connect_timeout, read_timeout) {
        Ok(source) => source,
        Err(err) => {
            if Instant::now() >= deadline {
                return SessionOutcome::TimedOut;
            }
            return SessionOutcome::Error {
                reason: format!("connect: {err:#}"),
            };
        }
    };

    finish_session(cfg, &mut source, detector, &telemetry, deadline)
}

/// Run one session over an already-connected chunk source.
pub fn run_session(
    cfg: &SessionConfig,
    source: &mut dyn ChunkSource,
    detector: &mut dyn Detector,
    telemetry: &dyn TelemetrySource,
) -> SessionOutcome {
    let deadline = Instant::now() + cfg.session_timeout;
    finish_session(cfg, source, detector, telemetry, deadline)
}

fn finish_session(
    cfg: &SessionConfig,
    source: &mut dyn ChunkSource,
    detector: &mut dyn Detector,
    telemetry: &dyn TelemetrySource,
    deadline: Instant,
) -> SessionOutcome {
    match drive(cfg, source, detector, telemetry, deadline) {
        Ok(outcome) => outcome,
        Err(err) => SessionOutcome::Error {
            reason: format!("{err:#}"),
        },
    }
}

/// Streaming loop. Fatal conditions surface as `Err` with a stable reason
/// prefix (`stream:`, `framing:`, `detector:`); everything else is a
/// terminal outcome.
fn drive(
    cfg: &SessionConfig,
    source: &mut dyn ChunkSource,
    detector: &mut dyn Detector,
    telemetry: &dyn TelemetrySource,
    deadline: Instant,
) -> Result<SessionOutcome> {
    let mut demux = FrameDemux::new(cfg.max_buffer_bytes);
    let mut consecutive_decode_failures = 0u32;
    let mut frames_seen = 0u64;
    let mut stream_ended = false;

    loop {
        if Instant::now() >= deadline {
            log::info!("session deadline elapsed after {} frames", frames_seen);
            return Ok(SessionOutcome::TimedOut);
        }

        let payload = match demux.next_frame() {
            Some(payload) => payload,
            None => {
                if stream_ended {
                    log::info!("stream ended after {} frames, target absent", frames_seen);
                    return Ok(SessionOutcome::TargetAbsentStreamEnded);
                }
                match source.read_chunk() {
                    Ok(StreamChunk::Data(bytes)) => demux.feed(&bytes)?,
                    Ok(StreamChunk::EndOfStream) => stream_ended = true,
                    Err(err) => {
                        // A silent stream surfaces here as a socket read
                        // timeout; when the session deadline has passed that
                        // is a TimedOut, not a stream failure.
                        if Instant::now() >= deadline {
                            log::info!(
                                "session deadline elapsed during stream read after {} frames",
                                frames_seen
                            );
                            return Ok(SessionOutcome::TimedOut);
                        }
                        return Err(anyhow!("stream: {err:#}"));
                    }
                }
                continue;
            }
        };

        frames_seen += 1;

        let budget = cfg
            .frame_decode_timeout
            .min(deadline.saturating_duration_since(Instant::now()))
            .max(Duration::from_millis(1));
        let frame = match decode_frame_with_timeout(payload, budget) {
            Ok(frame) => {
                consecutive_decode_failures = 0;
                frame
            }
            Err(err) => {
                consecutive_decode_failures += 1;
                log::warn!("skipping undecodable frame {}: {err:#}", frames_seen);
                if consecutive_decode_failures >= cfg.max_consecutive_decode_failures {
                    return Err(anyhow!(
                        "framing: {} consecutive undecodable frames",
                        consecutive_decode_failures
                    ));
                }
                continue;
            }
        };

        let result = detector
            .detect(&frame)
            .map_err(|err| anyhow!("detector: {err:#}"))?;

        if !result.contains_label(&cfg.target_label) {
            continue;
        }

        log::info!(
            "target '{}' found on frame {} ({} detections)",
            cfg.target_label,
            frames_seen,
            result.detections.len()
        );

        // Best-effort enrichment: the finding is the deliverable, telemetry
        // failure degrades it but never discards it.
        return Ok(match telemetry.fetch() {
            Ok(reading) => SessionOutcome::TargetFound {
                location: Some(reading),
                telemetry_error: None,
            },
            Err(err) => {
                log::warn!("telemetry fetch failed after positive finding: {err:#}");
                SessionOutcome::TargetFound {
                    location: None,
                    telemetry_error: Some(format!("{err:#}")),
                }
            }
        });
    }
}
