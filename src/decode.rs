//! Frame payload decoding.
//!
//! Thin adapter over the `image` codec. Camera streams occasionally emit a
//! truncated or corrupt frame, so a decode failure is a skip-this-frame
//! condition for the caller, never fatal on its own.

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;

/// Decoded RGB8 raster.
#[derive(Clone, Debug)]
pub struct RasterImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode one complete frame payload.
pub fn decode_frame(payload: &[u8]) -> Result<RasterImage> {
    let image = image::load_from_memory(payload).context("decode frame payload")?;
    let (width, height) = image.dimensions();
    let rgb = image.into_rgb8();
    Ok(RasterImage {
        pixels: rgb.into_raw(),
        width,
        height,
    })
}

/// Decode with a per-frame deadline.
///
/// The codec is not interruptible, so the work runs on a helper thread and
/// the wait is abandoned at the deadline; an overrunning decode counts as a
/// failure for that frame only. The detached thread finishes quietly into a
/// dropped channel.
pub fn decode_frame_with_timeout(payload: Vec<u8>, timeout: Duration) -> Result<RasterImage> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(decode_frame(&payload));
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(anyhow!("frame decode exceeded {:?} budget", timeout)),
    }
}
