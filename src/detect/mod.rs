mod backend;
mod backends;
mod result;

pub use backend::Detector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use backends::StubDetector;
pub use result::{BoundingBox, Detection, DetectionResult};
