//! Blocking-mode frame compositor
//!
//! Builds the outgoing frame from four layers, in order: background,
//! raw-frame archive (side effect), live preview window, text blocks.

use crate::error::{AppError, Result};
use crate::overlay::{draw_text_block, measure_text, FontFace, FontSet, Nv12Target, TextStyle};
use crate::video::frame::VideoFrame;
use crate::video::scale::{scale_nv12_into_rect, Nv12Planes};
use crate::video::PixelFormat;

use super::{BackgroundImage, BlockingConfig, RawFrameCache, MAX_BG_BYTES};

/// Border luma for the preview window frame
const BORDER_Y: u8 = 235;
/// Padding around composited text boxes
const TEXT_PADDING: u32 = 8;
/// Smallest preview window after auto-shrink
const PREVIEW_MIN_W: u32 = 160;
const PREVIEW_MIN_H: u32 = 90;

/// Convert RGB24 to packed NV12 (BT.601 limited range)
pub fn rgb24_to_nv12(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut nv12 = vec![0u8; w * h * 3 / 2];
    let (y_plane, uv_plane) = nv12.split_at_mut(w * h);

    for py in 0..h {
        for px in 0..w {
            let idx = (py * w + px) * 3;
            let r = rgb[idx] as i32;
            let g = rgb[idx + 1] as i32;
            let b = rgb[idx + 2] as i32;

            let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[py * w + px] = y.clamp(16, 235) as u8;

            if px % 2 == 0 && py % 2 == 0 {
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                let uv_idx = (py / 2) * w + px;
                uv_plane[uv_idx] = u.clamp(16, 240) as u8;
                uv_plane[uv_idx + 1] = v.clamp(16, 240) as u8;
            }
        }
    }
    nv12
}

/// Decode a JPEG into an NV12 background image
pub fn decode_jpeg_to_nv12(jpeg: &[u8]) -> Result<BackgroundImage> {
    let mut decompressor = turbojpeg::Decompressor::new()
        .map_err(|e| AppError::JpegDecode(format!("turbojpeg init: {}", e)))?;

    let header = decompressor
        .read_header(jpeg)
        .map_err(|e| AppError::JpegDecode(format!("read_header: {}", e)))?;

    // Even dimensions keep the 4:2:0 chroma grid intact
    let width = (header.width as u32) & !1;
    let height = (header.height as u32) & !1;
    if width == 0 || height == 0 {
        return Err(AppError::JpegDecode("degenerate image".into()));
    }
    if (width * height * 3 / 2) as usize > MAX_BG_BYTES {
        return Err(AppError::BackgroundTooLarge { width, height });
    }

    let pitch = header.width * 3;
    let mut image = turbojpeg::Image {
        pixels: vec![0u8; header.height * pitch],
        width: header.width,
        pitch,
        height: header.height,
        format: turbojpeg::PixelFormat::RGB,
    };
    decompressor
        .decompress(jpeg, image.as_deref_mut())
        .map_err(|e| AppError::JpegDecode(format!("decompress: {}", e)))?;

    // Re-pack to even dims when the JPEG was odd-sized
    let data = if width as usize == header.width && height as usize == header.height {
        rgb24_to_nv12(&image.pixels, width, height)
    } else {
        let mut cropped = vec![0u8; (width * height * 3) as usize];
        for row in 0..height as usize {
            let src = &image.pixels[row * pitch..row * pitch + width as usize * 3];
            cropped[row * width as usize * 3..(row + 1) * width as usize * 3]
                .copy_from_slice(src);
        }
        rgb24_to_nv12(&cropped, width, height)
    };

    Ok(BackgroundImage {
        data,
        width,
        height,
    })
}

/// Validate raw NV12 bytes as a background image
pub fn nv12_background(data: Vec<u8>, width: u32, height: u32) -> Result<BackgroundImage> {
    let expected = (width as usize) * (height as usize) * 3 / 2;
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(AppError::BadRequest(format!(
            "invalid background geometry {}x{}",
            width, height
        )));
    }
    if expected > MAX_BG_BYTES {
        return Err(AppError::BackgroundTooLarge { width, height });
    }
    if data.len() < expected {
        return Err(AppError::BadRequest(format!(
            "background payload {} bytes, need {}",
            data.len(),
            expected
        )));
    }
    Ok(BackgroundImage {
        data,
        width,
        height,
    })
}

/// Resolve the preview rectangle against the destination frame.
///
/// Oversized previews shrink to a fifth of the fitting scale with a
/// 160x90 floor; negative positions anchor from the right/bottom edge;
/// everything lands on even coordinates.
pub fn resolve_preview_rect(
    cfg_x: i32,
    cfg_y: i32,
    cfg_w: u32,
    cfg_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> (u32, u32, u32, u32) {
    let mut pw = cfg_w;
    let mut ph = cfg_h;

    if pw > dst_w || ph > dst_h {
        let factor =
            (dst_w as f32 / pw as f32).min(dst_h as f32 / ph as f32) * 0.2;
        pw = ((pw as f32 * factor) as u32).max(PREVIEW_MIN_W);
        ph = ((ph as f32 * factor) as u32).max(PREVIEW_MIN_H);
    }
    pw = (pw & !1).min(dst_w & !1);
    ph = (ph & !1).min(dst_h & !1);

    let mut px = if cfg_x < 0 {
        dst_w as i32 + cfg_x - pw as i32
    } else {
        cfg_x
    };
    let mut py = if cfg_y < 0 {
        dst_h as i32 + cfg_y - ph as i32
    } else {
        cfg_y
    };

    px = px.clamp(0, (dst_w - pw) as i32);
    py = py.clamp(0, (dst_h - ph) as i32);

    ((px as u32) & !1, (py as u32) & !1, pw, ph)
}

fn draw_preview_border(target: &mut Nv12Target<'_>, px: u32, py: u32, pw: u32, ph: u32) {
    let stride = target.y_stride;
    let (dw, dh) = (target.width, target.height);

    // Top edge (2 px)
    for x in px..(px + pw).min(dw) {
        target.y[(py * stride + x) as usize] = BORDER_Y;
        if py + 1 < dh {
            target.y[((py + 1) * stride + x) as usize] = BORDER_Y;
        }
    }
    // Bottom edge
    let bottom = py + ph - 1;
    if bottom < dh {
        for x in px..(px + pw).min(dw) {
            target.y[(bottom * stride + x) as usize] = BORDER_Y;
            if bottom > 0 {
                target.y[((bottom - 1) * stride + x) as usize] = BORDER_Y;
            }
        }
    }
    // Left edge
    for y in py..(py + ph).min(dh) {
        target.y[(y * stride + px) as usize] = BORDER_Y;
        if px + 1 < dw {
            target.y[(y * stride + px + 1) as usize] = BORDER_Y;
        }
    }
    // Right edge
    let right = px + pw - 1;
    if right < dw {
        for y in py..(py + ph).min(dh) {
            target.y[(y * stride + right) as usize] = BORDER_Y;
            if right > 0 {
                target.y[(y * stride + right - 1) as usize] = BORDER_Y;
            }
        }
    }
}

/// Composite the blocking layers onto the encoder input planes.
///
/// `src` is the live capture (read for the preview window and archived
/// into `raw_cache`); `target` is the destination at encoder strides.
pub fn composite_nv12(
    src: &VideoFrame,
    target: &mut Nv12Target<'_>,
    cfg: &BlockingConfig,
    fonts: &FontSet,
    raw_cache: &RawFrameCache,
) {
    if src.format != PixelFormat::Nv12 {
        return;
    }

    let (dw, dh) = (target.width, target.height);

    // Layer 1: background, or neutral dark grey
    match &cfg.background {
        Some(bg) => {
            let bg_planes = Nv12Planes {
                y: &bg.data[..(bg.width * bg.height) as usize],
                uv: &bg.data[(bg.width * bg.height) as usize..],
                width: bg.width,
                height: bg.height,
                y_stride: bg.width,
                uv_stride: bg.width,
            };
            if bg.width == dw && bg.height == dh {
                for row in 0..dh {
                    let d = (row * target.y_stride) as usize;
                    let s = (row * bg.width) as usize;
                    target.y[d..d + dw as usize]
                        .copy_from_slice(&bg_planes.y[s..s + dw as usize]);
                }
                for row in 0..dh / 2 {
                    let d = (row * target.uv_stride) as usize;
                    let s = (row * bg.width) as usize;
                    target.uv[d..d + dw as usize]
                        .copy_from_slice(&bg_planes.uv[s..s + dw as usize]);
                }
            } else {
                scale_nv12_into_rect(
                    bg_planes,
                    target.y,
                    target.uv,
                    0,
                    0,
                    dw,
                    dh,
                    target.y_stride,
                    target.uv_stride,
                    dw,
                    dh,
                );
            }
        }
        None => {
            let y_len = (target.y_stride * dh) as usize;
            let y_cap = target.y.len();
            target.y[..y_len.min(y_cap)].fill(32);
            let uv_len = (target.uv_stride * (dh / 2)) as usize;
            let uv_cap = target.uv.len();
            target.uv[..uv_len.min(uv_cap)].fill(128);
        }
    }

    // Layer 2: archive the real capture before it disappears from view
    raw_cache.store(src.data(), src.width(), src.height(), src.stride);

    // Layer 3: live preview window
    let preview = cfg.preview;
    if preview.enabled && preview.width > 0 && preview.height > 0 {
        let (px, py, pw, ph) =
            resolve_preview_rect(preview.x, preview.y, preview.width, preview.height, dw, dh);
        if pw > 0 && ph > 0 {
            let y_size = (src.stride * src.height()) as usize;
            let src_planes = Nv12Planes {
                y: &src.data()[..y_size],
                uv: &src.data()[y_size..],
                width: src.width(),
                height: src.height(),
                y_stride: src.stride,
                uv_stride: src.stride,
            };
            scale_nv12_into_rect(
                src_planes,
                target.y,
                target.uv,
                px,
                py,
                pw,
                ph,
                target.y_stride,
                target.uv_stride,
                dw,
                dh,
            );
            draw_preview_border(target, px, py, pw, ph);
        }
    }

    let style = TextStyle {
        fg: cfg.text_color,
        bg: Some(cfg.box_color),
    };

    // Layer 4: vocabulary text, centred within the upper 60% band
    if !cfg.text_vocab.is_empty() {
        let guard = fonts.lock();
        let (tw, th) = measure_text(&cfg.text_vocab, cfg.vocab_scale, &guard, FontFace::Bold);
        if tw > 0 && th > 0 {
            let x = ((dw as i32 - tw as i32) / 2).max(10);
            let y = ((dh as i32 * 6 / 10 - th as i32) / 2).max(10);
            draw_text_block(
                target,
                x,
                y,
                &cfg.text_vocab,
                cfg.vocab_scale,
                style,
                TEXT_PADDING,
                &guard,
                FontFace::Bold,
            );
        }
    }

    // Layer 5: stats text, bottom-left
    if !cfg.text_stats.is_empty() {
        let guard = fonts.lock();
        let (tw, th) = measure_text(&cfg.text_stats, cfg.stats_scale, &guard, FontFace::Mono);
        if tw > 0 && th > 0 {
            let x = 20;
            let y = (dh as i32 - th as i32 - 30).max(10);
            draw_text_block(
                target,
                x,
                y,
                &cfg.text_stats,
                cfg.stats_scale,
                style,
                TEXT_PADDING,
                &guard,
                FontFace::Mono,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::Resolution;

    #[test]
    fn test_preview_anchor_from_bottom_right() {
        // -40/-40 on a 1920x1080 destination anchors 40 px off each edge
        let (px, py, pw, ph) = resolve_preview_rect(-40, -40, 384, 216, 1920, 1080);
        assert_eq!((px, py), (1496, 824));
        assert_eq!((pw, ph), (384, 216));
        assert_eq!(px % 2, 0);
        assert_eq!(py % 2, 0);
    }

    #[test]
    fn test_preview_oversize_shrinks_with_floor() {
        let (_, _, pw, ph) = resolve_preview_rect(0, 0, 4000, 3000, 1920, 1080);
        assert!(pw <= 1920 && ph <= 1080);
        assert!(pw >= PREVIEW_MIN_W - 1 && ph >= PREVIEW_MIN_H - 1);
        assert_eq!(pw % 2, 0);
        assert_eq!(ph % 2, 0);
    }

    #[test]
    fn test_preview_positive_position_clamped() {
        let (px, py, pw, ph) = resolve_preview_rect(5000, 5000, 384, 216, 1920, 1080);
        assert!(px + pw <= 1920);
        assert!(py + ph <= 1080);
    }

    #[test]
    fn test_bt601_red() {
        let rgb = vec![255u8, 0, 0];
        let mut red = Vec::new();
        for _ in 0..4 * 4 {
            red.extend_from_slice(&rgb);
        }
        let nv12 = rgb24_to_nv12(&red, 4, 4);
        // Limited-range red: Y=82, U=90, V=240 (V clamped)
        assert_eq!(nv12[0], 82);
        assert_eq!(nv12[16], 90);
        assert_eq!(nv12[17], 240);
    }

    #[test]
    fn test_bt601_grey_is_neutral() {
        let mut grey = Vec::new();
        for _ in 0..4 * 4 {
            grey.extend_from_slice(&[128, 128, 128]);
        }
        let nv12 = rgb24_to_nv12(&grey, 4, 4);
        // Y = 128*220/256-ish + 16, chroma dead centre
        assert!(nv12[0] >= 123 && nv12[0] <= 130);
        assert_eq!(nv12[16], 128);
        assert_eq!(nv12[17], 128);
    }

    fn make_src(w: u32, h: u32, y: u8) -> VideoFrame {
        let mut data = vec![y; (w * h * 3 / 2) as usize];
        for p in data[(w * h) as usize..].iter_mut() {
            *p = 128;
        }
        VideoFrame::from_vec(data, Resolution::new(w, h), PixelFormat::Nv12, w, 0)
    }

    #[test]
    fn test_composite_fills_neutral_without_background() {
        let src = make_src(64, 64, 200);
        let mut y = vec![0u8; 64 * 64];
        let mut uv = vec![0u8; 64 * 32];
        let mut target = Nv12Target {
            y: &mut y,
            uv: &mut uv,
            width: 64,
            height: 64,
            y_stride: 64,
            uv_stride: 64,
        };
        let cfg = BlockingConfig::default();
        let fonts = FontSet::bitmap_only();
        let cache = RawFrameCache::new();
        composite_nv12(&src, &mut target, &cfg, &fonts, &cache);

        assert!(y.iter().all(|&p| p == 32));
        assert!(uv.iter().all(|&p| p == 128));
        // Raw frame archived
        let raw = cache.snapshot().unwrap();
        assert_eq!(raw.width, 64);
        assert_eq!(raw.data[0], 200);
    }

    #[test]
    fn test_composite_preview_draws_border_and_content() {
        let src = make_src(64, 64, 200);
        let mut y = vec![0u8; 128 * 128];
        let mut uv = vec![0u8; 128 * 64];
        let mut target = Nv12Target {
            y: &mut y,
            uv: &mut uv,
            width: 128,
            height: 128,
            y_stride: 128,
            uv_stride: 128,
        };
        let mut cfg = BlockingConfig::default();
        cfg.preview = super::super::PreviewWindow {
            x: 10,
            y: 10,
            width: 32,
            height: 32,
            enabled: true,
        };
        let fonts = FontSet::bitmap_only();
        let cache = RawFrameCache::new();
        composite_nv12(&src, &mut target, &cfg, &fonts, &cache);

        // Border pixel at the preview origin
        assert_eq!(y[10 * 128 + 10], BORDER_Y);
        // Interior carries the (uniform) source luma
        assert_eq!(y[20 * 128 + 20], 200);
        // Outside the preview still neutral grey
        assert_eq!(y[100 * 128 + 100], 32);
    }

    #[test]
    fn test_background_scaled_to_destination() {
        let src = make_src(32, 32, 0);
        // 16x16 background, luma 77
        let mut bg = vec![77u8; 16 * 16 * 3 / 2];
        for p in bg[16 * 16..].iter_mut() {
            *p = 99;
        }
        let mut cfg = BlockingConfig::default();
        cfg.background = Some(std::sync::Arc::new(BackgroundImage {
            data: bg,
            width: 16,
            height: 16,
        }));

        let mut y = vec![0u8; 64 * 64];
        let mut uv = vec![0u8; 64 * 32];
        let mut target = Nv12Target {
            y: &mut y,
            uv: &mut uv,
            width: 64,
            height: 64,
            y_stride: 64,
            uv_stride: 64,
        };
        let fonts = FontSet::bitmap_only();
        let cache = RawFrameCache::new();
        composite_nv12(&src, &mut target, &cfg, &fonts, &cache);

        assert!(y.iter().all(|&p| p == 77));
        assert!(uv.iter().all(|&p| p == 99));
    }
}
