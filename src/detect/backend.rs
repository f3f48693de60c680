use anyhow::Result;

use crate::decode::RasterImage;
use crate::detect::result::DetectionResult;

/// Object detector seam.
///
/// The fusion controller treats the detector as an injected collaborator:
/// constructed explicitly at startup, never referenced as ambient global
/// state. `detect` is synchronous and stateless from the controller's
/// perspective; a failure here is session-fatal because there is no safe
/// default result to continue with.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a decoded frame.
    fn detect(&mut self, frame: &RasterImage) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
