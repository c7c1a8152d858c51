//! Video pipeline: formats, frames, scaling, and JPEG encoders

pub mod encoder;
pub mod format;
pub mod frame;
#[cfg(feature = "mpp")]
pub mod mpp;
pub mod scale;

pub use format::{align16, PixelFormat, Resolution};
pub use frame::VideoFrame;
pub use scale::ScalePolicy;
