//! stream-spotter
//!
//! Turns a continuous MJPEG-over-HTTP byte stream into discrete frames, runs
//! each frame through an object detector, and fuses a positive finding with a
//! location reading fetched from a telemetry endpoint. A session ends as soon
//! as the target label is seen, the stream ends, the session deadline passes,
//! or an unrecoverable error occurs.
//!
//! # Module Structure
//!
//! - `demux`: frame demultiplexer (marker scanning, bounded buffering)
//! - `stream`: chunk source seam (HTTP MJPEG transport)
//! - `decode`: frame payload to raster image
//! - `detect`: detector trait, result types and backends
//! - `telemetry`: location reading fetcher
//! - `session`: fusion controller and session outcomes
//! - `api`: local HTTP surface exposing "run a detection session"
//! - `config`: file + environment configuration

pub mod api;
pub mod config;
pub mod decode;
pub mod demux;
pub mod detect;
pub mod session;
pub mod stream;
pub mod telemetry;

pub use config::SpotterConfig;
pub use decode::{decode_frame, RasterImage};
pub use demux::{FrameDemux, FRAME_END_MARKER, FRAME_START_MARKER};
#[cfg(feature = "backend-tract")]
pub use detect::TractDetector;
pub use detect::{BoundingBox, Detection, DetectionResult, Detector, StubDetector};
pub use session::{run_http_session, run_session, SessionConfig, SessionOutcome};
pub use stream::{ChunkSource, HttpChunkSource, StreamChunk};
pub use telemetry::{HttpTelemetrySource, LocationReading, TelemetrySource};
