//! NV12 text and box rendering
//!
//! All primitives operate directly on the encoder's input planes. Y is
//! touched per pixel; the interleaved UV plane is touched once per 2x2
//! block at even coordinates.

use super::font::{FontFace, FontGuard, FontSet, BASE_FONT_PX};
use super::font8x8;
use super::{OverlayConfig, OverlayPosition};

/// Mutable view of NV12 destination planes
pub struct Nv12Target<'a> {
    pub y: &'a mut [u8],
    pub uv: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub y_stride: u32,
    pub uv_stride: u32,
}

/// Colours for one text block
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub fg: (u8, u8, u8),
    /// Background box (y, u, v, alpha); None draws bare glyphs
    pub bg: Option<(u8, u8, u8, u8)>,
}

/// Measure a (possibly multi-line) text block at the given scale.
///
/// Uses the TrueType face when one is loaded, the 8x8 bitmap font
/// otherwise. Returns (width, height) in pixels.
pub fn measure_text(text: &str, scale: u32, guard: &FontGuard<'_>, face: FontFace) -> (u32, u32) {
    if text.is_empty() {
        return (0, 0);
    }

    if let Some(font) = guard.face(face) {
        let px = BASE_FONT_PX * scale as f32;
        let line_h = font
            .horizontal_line_metrics(px)
            .map(|m| m.new_line_size.ceil() as u32)
            .unwrap_or(px as u32);
        let mut max_w = 0u32;
        let mut lines = 0u32;
        for line in text.split('\n') {
            lines += 1;
            let w: f32 = line
                .chars()
                .map(|ch| font.metrics(ch, px).advance_width)
                .sum();
            max_w = max_w.max(w.ceil() as u32);
        }
        (max_w, lines * line_h)
    } else {
        let mut max_chars = 0u32;
        let mut lines = 0u32;
        for line in text.split('\n') {
            lines += 1;
            max_chars = max_chars.max(line.chars().count() as u32);
        }
        (
            max_chars * font8x8::CHAR_WIDTH * scale,
            lines * font8x8::CHAR_HEIGHT * scale,
        )
    }
}

/// Alpha-blend a rectangle onto the target (single-level alpha)
pub fn blend_rect(
    target: &mut Nv12Target<'_>,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: (u8, u8, u8, u8),
) {
    let (bg_y, bg_u, bg_v, alpha) = color;
    let a_fg = alpha as u32;
    let a_bg = 256 - a_fg;

    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = (x + width as i32).clamp(0, target.width as i32) as u32;
    let y1 = (y + height as i32).clamp(0, target.height as i32) as u32;

    for py in y0..y1 {
        let row = (py * target.y_stride) as usize;
        for px in x0..x1 {
            let p = &mut target.y[row + px as usize];
            *p = ((a_fg * bg_y as u32 + a_bg * *p as u32) >> 8) as u8;

            if px % 2 == 0 && py % 2 == 0 {
                let uv = ((py / 2) * target.uv_stride + px) as usize;
                if uv + 1 < target.uv.len() {
                    let u = &mut target.uv[uv];
                    *u = ((a_fg * bg_u as u32 + a_bg * *u as u32) >> 8) as u8;
                    let v = &mut target.uv[uv + 1];
                    *v = ((a_fg * bg_v as u32 + a_bg * *v as u32) >> 8) as u8;
                }
            }
        }
    }
}

/// Draw one bitmap glyph scaled by pixel replication
fn draw_char_bitmap(
    target: &mut Nv12Target<'_>,
    x: i32,
    y: i32,
    ch: char,
    scale: u32,
    fg: (u8, u8, u8),
) {
    let glyph = font8x8::glyph(ch);

    for (cy, row_bits) in glyph.iter().enumerate() {
        for cx in 0..font8x8::CHAR_WIDTH {
            if (row_bits >> cx) & 1 == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let px = x + (cx * scale + sx) as i32;
                    let py = y + (cy as u32 * scale + sy) as i32;
                    if px < 0 || py < 0 || px >= target.width as i32 || py >= target.height as i32
                    {
                        continue;
                    }
                    let (px, py) = (px as u32, py as u32);
                    target.y[(py * target.y_stride + px) as usize] = fg.0;
                    if px % 2 == 0 && py % 2 == 0 {
                        let uv = ((py / 2) * target.uv_stride + px) as usize;
                        if uv + 1 < target.uv.len() {
                            target.uv[uv] = fg.1;
                            target.uv[uv + 1] = fg.2;
                        }
                    }
                }
            }
        }
    }
}

/// Rasterise one TrueType glyph and coverage-blend it
fn draw_char_ttf(
    target: &mut Nv12Target<'_>,
    font: &fontdue::Font,
    pen_x: i32,
    baseline: i32,
    ch: char,
    px_size: f32,
    fg: (u8, u8, u8),
) -> i32 {
    let (metrics, coverage) = font.rasterize(ch, px_size);
    let gx = pen_x + metrics.xmin;
    let gy = baseline - metrics.height as i32 - metrics.ymin;

    for row in 0..metrics.height {
        for col in 0..metrics.width {
            let alpha = coverage[row * metrics.width + col] as u32;
            if alpha == 0 {
                continue;
            }
            let px = gx + col as i32;
            let py = gy + row as i32;
            if px < 0 || py < 0 || px >= target.width as i32 || py >= target.height as i32 {
                continue;
            }
            let (px, py) = (px as u32, py as u32);
            let yi = (py * target.y_stride + px) as usize;
            let old = target.y[yi] as u32;
            target.y[yi] = ((alpha * fg.0 as u32 + (255 - alpha) * old) / 255) as u8;

            if px % 2 == 0 && py % 2 == 0 {
                let uv = ((py / 2) * target.uv_stride + px) as usize;
                if uv + 1 < target.uv.len() {
                    let u = target.uv[uv] as u32;
                    target.uv[uv] = ((alpha * fg.1 as u32 + (255 - alpha) * u) / 255) as u8;
                    let v = target.uv[uv + 1] as u32;
                    target.uv[uv + 1] = ((alpha * fg.2 as u32 + (255 - alpha) * v) / 255) as u8;
                }
            }
        }
    }

    metrics.advance_width.round() as i32
}

/// Draw a multi-line text block at an explicit position.
///
/// The background box, when styled, extends `padding` pixels around the
/// measured text and is blended first.
#[allow(clippy::too_many_arguments)]
pub fn draw_text_block(
    target: &mut Nv12Target<'_>,
    x: i32,
    y: i32,
    text: &str,
    scale: u32,
    style: TextStyle,
    padding: u32,
    guard: &FontGuard<'_>,
    face: FontFace,
) {
    if text.is_empty() {
        return;
    }

    let (text_w, text_h) = measure_text(text, scale, guard, face);
    if text_w == 0 || text_h == 0 {
        return;
    }

    if let Some(bg) = style.bg {
        blend_rect(
            target,
            x - padding as i32,
            y - padding as i32,
            text_w + 2 * padding,
            text_h + 2 * padding,
            bg,
        );
    }

    if let Some(font) = guard.face(face) {
        let px_size = BASE_FONT_PX * scale as f32;
        let (ascent, line_h) = font
            .horizontal_line_metrics(px_size)
            .map(|m| (m.ascent.round() as i32, m.new_line_size.ceil() as i32))
            .unwrap_or((px_size as i32, px_size as i32));
        for (idx, line) in text.split('\n').enumerate() {
            let baseline = y + idx as i32 * line_h + ascent;
            let mut pen_x = x;
            for ch in line.chars() {
                pen_x += draw_char_ttf(target, font, pen_x, baseline, ch, px_size, style.fg);
            }
        }
    } else {
        let step_x = (font8x8::CHAR_WIDTH * scale) as i32;
        let step_y = (font8x8::CHAR_HEIGHT * scale) as i32;
        for (idx, line) in text.split('\n').enumerate() {
            let mut cur_x = x;
            let cur_y = y + idx as i32 * step_y;
            for ch in line.chars() {
                draw_char_bitmap(target, cur_x, cur_y, ch, scale, style.fg);
                cur_x += step_x;
            }
        }
    }
}

/// Compute the overlay text position for a frame
fn overlay_position(
    cfg: &OverlayConfig,
    frame_w: u32,
    frame_h: u32,
    text_w: u32,
    text_h: u32,
) -> (i32, i32) {
    let total_w = (text_w + 2 * cfg.padding) as i32;
    let total_h = (text_h + 2 * cfg.padding) as i32;
    let fw = frame_w as i32;
    let fh = frame_h as i32;
    let pad = cfg.padding as i32;

    let (mut x, mut y) = match cfg.position {
        OverlayPosition::TopLeft => (pad, pad),
        OverlayPosition::TopRight => (fw - total_w, pad),
        OverlayPosition::BottomLeft => (pad, fh - total_h),
        OverlayPosition::BottomRight => (fw - total_w, fh - total_h),
        OverlayPosition::Center => ((fw - total_w) / 2, (fh - total_h) / 2),
        OverlayPosition::Custom => (cfg.x, cfg.y),
    };

    // Keep the reserved box fully in frame
    x = x.max(0);
    y = y.max(0);
    if x + total_w > fw {
        x = fw - total_w;
    }
    if y + total_h > fh {
        y = fh - total_h;
    }
    (x, y)
}

/// Render the configured overlay onto an NV12 frame.
///
/// The caller passes a config snapshot; the font mutex is taken here and
/// held for the whole block.
pub fn draw_overlay(target: &mut Nv12Target<'_>, cfg: &OverlayConfig, fonts: &FontSet) {
    if !cfg.enabled || cfg.text.is_empty() {
        return;
    }

    let guard = fonts.lock();
    let (text_w, text_h) = measure_text(&cfg.text, cfg.scale, &guard, FontFace::Bold);
    if text_w == 0 || text_h == 0 {
        return;
    }

    let (x, y) = overlay_position(cfg, target.width, target.height, text_w, text_h);

    let style = TextStyle {
        fg: (cfg.y_color, cfg.u_color, cfg.v_color),
        bg: cfg
            .background
            .then_some((cfg.bg_y, cfg.bg_u, cfg.bg_v, cfg.bg_alpha)),
    };
    draw_text_block(
        target,
        x,
        y,
        &cfg.text,
        cfg.scale,
        style,
        cfg.padding,
        &guard,
        FontFace::Bold,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target(w: u32, h: u32, y_fill: u8) -> (Vec<u8>, Vec<u8>) {
        (
            vec![y_fill; (w * h) as usize],
            vec![128u8; (w * h / 2) as usize],
        )
    }

    fn target<'a>(y: &'a mut [u8], uv: &'a mut [u8], w: u32, h: u32) -> Nv12Target<'a> {
        Nv12Target {
            y,
            uv,
            width: w,
            height: h,
            y_stride: w,
            uv_stride: w,
        }
    }

    #[test]
    fn test_bitmap_measure() {
        let fonts = FontSet::bitmap_only();
        let guard = fonts.lock();
        assert_eq!(measure_text("AB", 1, &guard, FontFace::Bold), (16, 8));
        assert_eq!(measure_text("AB\nCDE", 2, &guard, FontFace::Bold), (48, 32));
        assert_eq!(measure_text("", 3, &guard, FontFace::Bold), (0, 0));
    }

    #[test]
    fn test_zero_alpha_box_is_invisible() {
        let (mut y, mut uv) = make_target(64, 64, 16);
        let mut t = target(&mut y, &mut uv, 64, 64);
        blend_rect(&mut t, 8, 8, 32, 32, (235, 128, 128, 0));
        assert!(y.iter().all(|&p| p == 16));
    }

    #[test]
    fn test_full_alpha_box_nearly_replaces() {
        let (mut y, mut uv) = make_target(64, 64, 16);
        let mut t = target(&mut y, &mut uv, 64, 64);
        blend_rect(&mut t, 0, 0, 64, 64, (200, 128, 128, 255));
        // (255*200 + 1*16) >> 8 = 199
        assert!(y.iter().all(|&p| p == 199));
    }

    #[test]
    fn test_glyph_pixels_hit_foreground() {
        // Black frame, overlay "A" at scale 1, alpha-0 box: the lit glyph
        // bits get Y=235, everything else stays untouched.
        let (mut y_buf, mut uv_buf) = make_target(64, 64, 16);
        {
            let mut t = target(&mut y_buf, &mut uv_buf, 64, 64);
            let cfg = OverlayConfig {
                enabled: true,
                text: "A".to_string(),
                scale: 1,
                bg_alpha: 0,
                ..Default::default()
            };
            let fonts = FontSet::bitmap_only();
            draw_overlay(&mut t, &cfg, &fonts);
        }

        // Default position TopRight with padding 8: text lands at
        // (64 - (8 + 16), 8) = (40, 8).
        let glyph = font8x8::glyph('A');
        let mut lit = 0;
        for (cy, row) in glyph.iter().enumerate() {
            for cx in 0..8 {
                let expected = if (row >> cx) & 1 == 1 { 235 } else { 16 };
                let px = 40 + cx as usize;
                let py = 8 + cy;
                assert_eq!(y_buf[py * 64 + px], expected, "pixel ({},{})", px, py);
                if expected == 235 {
                    lit += 1;
                }
            }
        }
        assert!(lit > 0, "glyph drew nothing");
        // Region outside the box untouched
        assert_eq!(y_buf[0], 16);
    }

    #[test]
    fn test_overlay_disabled_draws_nothing() {
        let (mut y, mut uv) = make_target(32, 32, 50);
        let mut t = target(&mut y, &mut uv, 32, 32);
        let cfg = OverlayConfig {
            enabled: false,
            text: "X".to_string(),
            ..Default::default()
        };
        let fonts = FontSet::bitmap_only();
        draw_overlay(&mut t, &cfg, &fonts);
        assert!(y.iter().all(|&p| p == 50));
    }

    #[test]
    fn test_position_clamped_in_frame() {
        let cfg = OverlayConfig {
            position: OverlayPosition::Custom,
            x: 1000,
            y: -50,
            padding: 4,
            ..Default::default()
        };
        let (x, y) = overlay_position(&cfg, 64, 64, 16, 8);
        assert!(x >= 0 && y >= 0);
        assert!(x + 16 + 8 <= 64);
    }
}
