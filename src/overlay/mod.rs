//! Text overlay on NV12 encoder buffers
//!
//! Shared overlay configuration plus the drawing primitives that blend
//! text blocks onto the hardware encoder's input planes.

pub mod draw;
pub mod font;
mod font8x8;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use draw::{draw_overlay, draw_text_block, measure_text, Nv12Target, TextStyle};
pub use font::{FontFace, FontSet};

/// Maximum overlay text length
pub const MAX_TEXT_LEN: usize = 256;

/// Overlay anchor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Explicit top-left corner in frame pixels
    Custom,
}

impl std::str::FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top_left" | "tl" => Ok(OverlayPosition::TopLeft),
            "top_right" | "tr" => Ok(OverlayPosition::TopRight),
            "bottom_left" | "bl" => Ok(OverlayPosition::BottomLeft),
            "bottom_right" | "br" => Ok(OverlayPosition::BottomRight),
            "center" => Ok(OverlayPosition::Center),
            "custom" => Ok(OverlayPosition::Custom),
            _ => Err(format!("Unknown overlay position: {}", s)),
        }
    }
}

/// Overlay configuration, snapshot-copied per frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub text: String,
    pub position: OverlayPosition,
    pub x: i32,
    pub y: i32,
    pub scale: u32,
    pub y_color: u8,
    pub u_color: u8,
    pub v_color: u8,
    pub background: bool,
    pub bg_y: u8,
    pub bg_u: u8,
    pub bg_v: u8,
    pub bg_alpha: u8,
    pub padding: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            position: OverlayPosition::TopRight,
            x: 0,
            y: 0,
            scale: 2,
            // White text, semi-transparent black box
            y_color: 235,
            u_color: 128,
            v_color: 128,
            background: true,
            bg_y: 16,
            bg_u: 128,
            bg_v: 128,
            bg_alpha: 180,
            padding: 8,
        }
    }
}

/// Shared overlay state
///
/// Mutated by the HTTP control surface, read as a snapshot by every
/// encoder worker at the top of each frame.
pub struct OverlayState {
    config: Mutex<OverlayConfig>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(OverlayConfig::default()),
        }
    }

    /// Copy the current configuration out under the lock
    pub fn snapshot(&self) -> OverlayConfig {
        self.config.lock().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.lock().enabled = enabled;
        tracing::info!("Overlay {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_text(&self, text: &str) {
        let mut cfg = self.config.lock();
        cfg.text = text.chars().take(MAX_TEXT_LEN).collect();
    }

    pub fn set_position(&self, position: OverlayPosition, x: i32, y: i32) {
        let mut cfg = self.config.lock();
        cfg.position = position;
        cfg.x = x;
        cfg.y = y;
    }

    pub fn set_scale(&self, scale: u32) {
        self.config.lock().scale = scale.clamp(1, 10);
    }

    pub fn set_color(&self, y: u8, u: u8, v: u8) {
        let mut cfg = self.config.lock();
        cfg.y_color = y;
        cfg.u_color = u;
        cfg.v_color = v;
    }

    pub fn set_background(&self, enabled: bool, y: u8, u: u8, v: u8, alpha: u8) {
        let mut cfg = self.config.lock();
        cfg.background = enabled;
        cfg.bg_y = y;
        cfg.bg_u = u;
        cfg.bg_v = v;
        cfg.bg_alpha = alpha;
    }

    pub fn set_padding(&self, padding: u32) {
        self.config.lock().padding = padding;
    }

    pub fn clear(&self) {
        let mut cfg = self.config.lock();
        cfg.enabled = false;
        cfg.text.clear();
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_clamped() {
        let state = OverlayState::new();
        state.set_scale(0);
        assert_eq!(state.snapshot().scale, 1);
        state.set_scale(99);
        assert_eq!(state.snapshot().scale, 10);
    }

    #[test]
    fn test_text_truncated() {
        let state = OverlayState::new();
        state.set_text(&"x".repeat(1000));
        assert_eq!(state.snapshot().text.len(), MAX_TEXT_LEN);
    }

    #[test]
    fn test_clear_resets_text_and_enable() {
        let state = OverlayState::new();
        state.set_text("hello");
        state.set_enabled(true);
        state.clear();
        let cfg = state.snapshot();
        assert!(!cfg.enabled);
        assert!(cfg.text.is_empty());
    }
}
