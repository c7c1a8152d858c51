//! JPEG encoders and the worker pool

pub mod jpeg;
pub mod mpp;
pub mod pool;
pub mod traits;

pub use jpeg::CpuJpegEncoder;
#[cfg(feature = "mpp")]
pub use mpp::MppJpegEncoder;
pub use pool::{EncoderBackend, EncoderPool, PoolConfig};
pub use traits::{EncoderShared, FrameEncoder};
