//! Blocking mode: full-frame composite replacing the live capture
//!
//! While enabled, outgoing frames show a stored background with an
//! optional scaled-down live preview window and two text blocks instead
//! of the raw capture.

pub mod compositor;
pub mod raw_cache;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

pub use raw_cache::{RawFrame, RawFrameCache};

pub const MAX_TEXT_VOCAB: usize = 1024;
pub const MAX_TEXT_STATS: usize = 512;
/// Background slot bound: 4K 4:2:0
pub const MAX_BG_BYTES: usize = 3840 * 2160 * 3 / 2;

/// Decoded background image in packed NV12
pub struct BackgroundImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Preview window geometry; negative x/y anchor from the right/bottom edge
#[derive(Debug, Clone, Copy)]
pub struct PreviewWindow {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub enabled: bool,
}

impl Default for PreviewWindow {
    fn default() -> Self {
        Self {
            x: -40,
            y: -40,
            width: 384,
            height: 216,
            enabled: false,
        }
    }
}

/// Blocking-mode configuration, snapshot-copied per frame
///
/// The background rides in an `Arc` so snapshots stay cheap.
#[derive(Clone)]
pub struct BlockingConfig {
    pub enabled: bool,
    pub background: Option<Arc<BackgroundImage>>,
    pub preview: PreviewWindow,
    pub text_vocab: String,
    pub text_stats: String,
    pub vocab_scale: u32,
    pub stats_scale: u32,
    pub text_color: (u8, u8, u8),
    pub box_color: (u8, u8, u8, u8),
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            background: None,
            preview: PreviewWindow::default(),
            text_vocab: String::new(),
            text_stats: String::new(),
            vocab_scale: 10,
            stats_scale: 4,
            // White text on a semi-transparent black box
            text_color: (235, 128, 128),
            box_color: (16, 128, 128, 180),
        }
    }
}

/// Shared blocking state
///
/// `enabled_fast` duplicates `config.enabled` so the per-frame check in
/// the encode hot path is one relaxed atomic load, no mutex.
pub struct BlockingState {
    config: Mutex<BlockingConfig>,
    enabled_fast: AtomicBool,
}

impl BlockingState {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(BlockingConfig::default()),
            enabled_fast: AtomicBool::new(false),
        }
    }

    /// Lock-free hot-path check
    pub fn is_enabled_fast(&self) -> bool {
        self.enabled_fast.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BlockingConfig {
        self.config.lock().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.lock().enabled = enabled;
        self.enabled_fast.store(enabled, Ordering::Release);
        tracing::info!("Blocking mode {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_preview(&self, x: i32, y: i32, width: u32, height: u32, enabled: bool) {
        let mut cfg = self.config.lock();
        cfg.preview = PreviewWindow {
            x,
            y,
            width,
            height,
            enabled,
        };
    }

    pub fn set_text_vocab(&self, text: &str) {
        self.config.lock().text_vocab = text.chars().take(MAX_TEXT_VOCAB).collect();
    }

    pub fn set_text_stats(&self, text: &str) {
        self.config.lock().text_stats = text.chars().take(MAX_TEXT_STATS).collect();
    }

    pub fn set_vocab_scale(&self, scale: u32) {
        self.config.lock().vocab_scale = scale.clamp(1, 15);
    }

    pub fn set_stats_scale(&self, scale: u32) {
        self.config.lock().stats_scale = scale.clamp(1, 10);
    }

    pub fn set_text_color(&self, y: u8, u: u8, v: u8) {
        self.config.lock().text_color = (y, u, v);
    }

    pub fn set_box_color(&self, y: u8, u: u8, v: u8, alpha: u8) {
        self.config.lock().box_color = (y, u, v, alpha);
    }

    /// Decode a JPEG and install it as the background.
    ///
    /// On any error the previous background stays in place.
    pub fn set_background_jpeg(&self, jpeg: &[u8]) -> Result<(u32, u32)> {
        let image = compositor::decode_jpeg_to_nv12(jpeg)?;
        let dims = (image.width, image.height);
        self.config.lock().background = Some(Arc::new(image));
        tracing::info!("Background set: {}x{}", dims.0, dims.1);
        Ok(dims)
    }

    /// Install raw NV12 bytes as the background
    pub fn set_background_nv12(&self, data: Vec<u8>, width: u32, height: u32) -> Result<()> {
        let image = compositor::nv12_background(data, width, height)?;
        self.config.lock().background = Some(Arc::new(image));
        tracing::info!("Background set: {}x{} (raw NV12)", width, height);
        Ok(())
    }

    /// Drop all blocking state: disable, forget background and texts
    pub fn clear(&self) {
        self.enabled_fast.store(false, Ordering::Release);
        let mut cfg = self.config.lock();
        cfg.enabled = false;
        cfg.background = None;
        cfg.preview.enabled = false;
        cfg.text_vocab.clear();
        cfg.text_stats.clear();
        tracing::info!("Blocking state cleared");
    }
}

impl Default for BlockingState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_flag_tracks_enabled() {
        let state = BlockingState::new();
        assert!(!state.is_enabled_fast());
        state.set_enabled(true);
        assert!(state.is_enabled_fast());
        assert!(state.snapshot().enabled);
        state.clear();
        assert!(!state.is_enabled_fast());
        assert!(!state.snapshot().enabled);
    }

    #[test]
    fn test_scales_clamped() {
        let state = BlockingState::new();
        state.set_vocab_scale(100);
        state.set_stats_scale(0);
        let cfg = state.snapshot();
        assert_eq!(cfg.vocab_scale, 15);
        assert_eq!(cfg.stats_scale, 1);
    }

    #[test]
    fn test_bad_background_keeps_previous() {
        let state = BlockingState::new();
        let nv12 = vec![128u8; 16 * 16 * 3 / 2];
        state.set_background_nv12(nv12, 16, 16).unwrap();
        assert!(state.set_background_jpeg(b"not a jpeg").is_err());
        let cfg = state.snapshot();
        let bg = cfg.background.expect("background dropped");
        assert_eq!((bg.width, bg.height), (16, 16));
    }

    #[test]
    fn test_text_limits() {
        let state = BlockingState::new();
        state.set_text_vocab(&"v".repeat(5000));
        state.set_text_stats(&"s".repeat(5000));
        let cfg = state.snapshot();
        assert_eq!(cfg.text_vocab.len(), MAX_TEXT_VOCAB);
        assert_eq!(cfg.text_stats.len(), MAX_TEXT_STATS);
    }
}
