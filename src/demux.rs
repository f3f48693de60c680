//! Streaming frame demultiplexer.
//!
//! An MJPEG stream carries no framing of its own beyond the JPEG start and
//! end markers, so frames are recovered by scanning a byte buffer that is
//! appended to as chunks arrive and trimmed from the front as frames (and
//! noise) are consumed. The buffer never retains bytes before the earliest
//! unresolved start marker, and its growth is capped so a source that never
//! emits a frame boundary cannot exhaust memory.

use anyhow::{anyhow, Result};

/// JPEG start-of-image marker. Fixed by the stream encoding.
pub const FRAME_START_MARKER: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const FRAME_END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Default cap on buffered stream bytes.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Converts raw stream chunks into complete single-frame payloads.
///
/// Owned by exactly one session; a fresh instance starts empty.
pub struct FrameDemux {
    buffer: Vec<u8>,
    max_buffer_bytes: usize,
}

impl FrameDemux {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            max_buffer_bytes,
        }
    }

    /// Append raw stream bytes.
    ///
    /// Fails when the buffer exceeds its cap without containing a complete
    /// frame, which signals a non-conforming source.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        self.discard_noise();
        if self.buffer.len() > self.max_buffer_bytes && find_frame_bounds(&self.buffer).is_none() {
            return Err(anyhow!(
                "framing: buffered {} bytes without a frame boundary (cap {})",
                self.buffer.len(),
                self.max_buffer_bytes
            ));
        }
        Ok(())
    }

    /// Extract the next complete frame, start marker through end marker
    /// inclusive. `None` means "no frame yet": feed more bytes and retry.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        self.discard_noise();
        let (start, end) = find_frame_bounds(&self.buffer)?;
        let payload = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Some(payload)
    }

    /// Bytes currently held for an in-progress frame.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything that cannot belong to a frame: spurious end markers
    /// with no start marker before them, and bytes ahead of the earliest
    /// start marker. A trailing `0xFF` is kept because it may be the first
    /// half of a marker split across chunks.
    fn discard_noise(&mut self) {
        loop {
            let start = find_marker(&self.buffer, &FRAME_START_MARKER, 0);
            let end = find_marker(&self.buffer, &FRAME_END_MARKER, 0);
            match (start, end) {
                (Some(s), Some(e)) if e < s => {
                    self.buffer.drain(..e + 2);
                }
                (None, Some(e)) => {
                    self.buffer.drain(..e + 2);
                }
                (Some(s), _) => {
                    if s > 0 {
                        self.buffer.drain(..s);
                    }
                    return;
                }
                (None, None) => {
                    let keep = usize::from(self.buffer.last() == Some(&0xFF));
                    let drain_len = self.buffer.len() - keep;
                    self.buffer.drain(..drain_len);
                    return;
                }
            }
        }
    }
}

/// Earliest complete frame: `(start, end)` where `end` is one past the end
/// marker's last byte.
fn find_frame_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = find_marker(buffer, &FRAME_START_MARKER, 0)?;
    let end = find_marker(buffer, &FRAME_END_MARKER, start + 2)?;
    Some((start, end + 2))
}

fn find_marker(buffer: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    if buffer.len() < 2 || from + 1 >= buffer.len() {
        return None;
    }
    (from..buffer.len() - 1).find(|&i| buffer[i] == marker[0] && buffer[i + 1] == marker[1])
}
