//! Inbound stream transport.
//!
//! The demultiplexer is transport-agnostic; this module provides the seam it
//! is fed through (`ChunkSource`) and the one production implementation, an
//! HTTP connection to an MJPEG endpoint.

use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

const CHUNK_BYTES: usize = 8 * 1024;

/// One read from the stream connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamChunk {
    Data(Vec<u8>),
    EndOfStream,
}

/// A byte-chunk-producing stream connection.
pub trait ChunkSource {
    /// Read the next chunk, blocking up to the connection's read timeout.
    fn read_chunk(&mut self) -> Result<StreamChunk>;
}

/// HTTP MJPEG stream connection.
pub struct HttpChunkSource {
    reader: Box<dyn Read + Send + Sync>,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for HttpChunkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChunkSource").finish_non_exhaustive()
    }
}

impl HttpChunkSource {
    /// Open the stream with a connection timeout; chunk reads block up to
    /// `read_timeout`.
    pub fn connect(url: &str, connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("parse stream url '{}'", url))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => bail!("unsupported stream scheme '{}'; expected http(s)", other),
        }

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();
        let response = agent
            .get(url)
            .call()
            .with_context(|| format!("connect to stream at {}", url))?;

        Ok(Self {
            reader: response.into_reader(),
            scratch: vec![0u8; CHUNK_BYTES],
        })
    }
}

impl ChunkSource for HttpChunkSource {
    fn read_chunk(&mut self) -> Result<StreamChunk> {
        let read = self.reader.read(&mut self.scratch).context("read stream chunk")?;
        if read == 0 {
            return Ok(StreamChunk::EndOfStream);
        }
        Ok(StreamChunk::Data(self.scratch[..read].to_vec()))
    }
}
