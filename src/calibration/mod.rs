//! Structured light pattern generation, capture organization and decoding.

mod acquisition;
mod capture;
mod decoder;
mod gray_code;
mod mask;
mod pattern;
mod session;

pub use acquisition::{CaptureRunner, DeviceError, ProjectorCamera, ReferenceCaptures};
pub use capture::CaptureSet;
pub use decoder::{decode, CorrespondenceMap, MaskPolicy, ProjectorCoord};
pub use gray_code::{
    binary_to_gray, bit_plane_count, gray_to_binary, Axis, PatternConfig, PatternList,
    PatternSpec, MAX_AXIS_LENGTH,
};
pub use mask::{build_mask, build_mask_gray, Mask};
pub use pattern::{PatternImagePair, PatternImages, PATTERN_OFF, PATTERN_ON};
pub use session::GrayCodeSession;
