//! Shared application state for the HTTP control surface

use std::sync::Arc;

use crate::blocking::{BlockingState, RawFrameCache};
use crate::overlay::{FontSet, OverlayState};
use crate::stream::StreamHub;
use crate::video::encoder::EncoderShared;

pub struct AppState {
    pub overlay: Arc<OverlayState>,
    pub blocking: Arc<BlockingState>,
    pub raw_cache: Arc<RawFrameCache>,
    pub fonts: Arc<FontSet>,
    pub hub: Arc<StreamHub>,
}

impl AppState {
    pub fn new(shared: &EncoderShared, hub: Arc<StreamHub>) -> Arc<Self> {
        Arc::new(Self {
            overlay: shared.overlay.clone(),
            blocking: shared.blocking.clone(),
            raw_cache: shared.raw_cache.clone(),
            fonts: shared.fonts.clone(),
            hub,
        })
    }
}
