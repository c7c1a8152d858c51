//! TrueType font set shared by all encoder workers
//!
//! Two faces are loaded lazily from well-known paths: a bold face for the
//! big overlay/vocabulary blocks and a monospace face for stats. All
//! rasterisation happens under one process-wide mutex; the guard is held
//! only for a single text block at a time. When no face can be loaded,
//! rendering falls back to the built-in 8x8 bitmap font.

use parking_lot::{Mutex, MutexGuard};

use crate::error::{AppError, Result};

/// Pixel size of a TrueType line at scale 1
pub const BASE_FONT_PX: f32 = 16.0;

/// Which face a text block renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Bold,
    Mono,
}

const BOLD_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
];

const MONO_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
];

struct FontSlots {
    loaded: bool,
    warned: bool,
    bold: Option<fontdue::Font>,
    mono: Option<fontdue::Font>,
}

/// Shared, lazily loaded font faces
pub struct FontSet {
    slots: Mutex<FontSlots>,
}

impl FontSet {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(FontSlots {
                loaded: false,
                warned: false,
                bold: None,
                mono: None,
            }),
        }
    }

    /// A font set that never loads TrueType faces (bitmap rendering only)
    pub fn bitmap_only() -> Self {
        Self {
            slots: Mutex::new(FontSlots {
                loaded: true,
                warned: true,
                bold: None,
                mono: None,
            }),
        }
    }

    /// Lock the rasteriser for one text block
    pub fn lock(&self) -> FontGuard<'_> {
        let mut slots = self.slots.lock();
        if !slots.loaded {
            slots.loaded = true;
            slots.bold = load_first(BOLD_PATHS).ok();
            slots.mono = load_first(MONO_PATHS).ok();
            if (slots.bold.is_none() || slots.mono.is_none()) && !slots.warned {
                slots.warned = true;
                tracing::warn!("TrueType faces unavailable, using bitmap font fallback");
            }
        }
        FontGuard { slots }
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self::new()
    }
}

fn load_first(paths: &[&str]) -> Result<fontdue::Font> {
    for path in paths {
        match std::fs::read(path) {
            Ok(data) => {
                match fontdue::Font::from_bytes(data, fontdue::FontSettings::default()) {
                    Ok(font) => {
                        tracing::info!("Loaded font face {}", path);
                        return Ok(font);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse font {}: {}", path, e);
                    }
                }
            }
            Err(_) => continue,
        }
    }
    Err(AppError::FontLoad(format!("no usable face in {:?}", paths)))
}

/// Exclusive access to the loaded faces for the duration of one draw
pub struct FontGuard<'a> {
    slots: MutexGuard<'a, FontSlots>,
}

impl FontGuard<'_> {
    pub fn face(&self, face: FontFace) -> Option<&fontdue::Font> {
        match face {
            FontFace::Bold => self.slots.bold.as_ref(),
            FontFace::Mono => self.slots.mono.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_only_has_no_faces() {
        let fonts = FontSet::bitmap_only();
        let guard = fonts.lock();
        assert!(guard.face(FontFace::Bold).is_none());
        assert!(guard.face(FontFace::Mono).is_none());
    }
}
