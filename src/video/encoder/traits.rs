//! Encoder seam and shared handles

use std::sync::Arc;

use crate::blocking::{BlockingState, RawFrameCache};
use crate::error::Result;
use crate::overlay::{FontSet, OverlayState};
use crate::video::frame::VideoFrame;

/// One frame in, one standalone JPEG packet out.
///
/// Implementations are owned by a single worker thread and are not
/// required to be `Send`; construct them on the thread that uses them.
pub trait FrameEncoder {
    /// Human-readable encoder name (for logs)
    fn name(&self) -> &str;

    /// Encode one frame. The returned frame is a complete JPEG packet
    /// with `key_frame = true`, `gop = 0` and both encode timestamps set.
    fn compress(&mut self, src: &VideoFrame) -> Result<VideoFrame>;
}

/// Shared pipeline state consulted during encoding
#[derive(Clone)]
pub struct EncoderShared {
    pub overlay: Arc<OverlayState>,
    pub blocking: Arc<BlockingState>,
    pub fonts: Arc<FontSet>,
    pub raw_cache: Arc<RawFrameCache>,
}

impl EncoderShared {
    pub fn new() -> Self {
        Self {
            overlay: Arc::new(OverlayState::new()),
            blocking: Arc::new(BlockingState::new()),
            fonts: Arc::new(FontSet::new()),
            raw_cache: Arc::new(RawFrameCache::new()),
        }
    }
}

impl Default for EncoderShared {
    fn default() -> Self {
        Self::new()
    }
}
