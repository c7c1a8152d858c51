//! Resolution scaling policy and NV12 nearest-neighbour scaling
//!
//! The policy maps input geometry onto one of a fixed set of output
//! geometries; the scalers move semi-planar 4:2:0 pixels between packed
//! source buffers and stride-aligned encoder buffers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::{align16, PixelFormat};

/// Target-resolution rule applied before hardware encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalePolicy {
    /// Pass through, except 4K NV12 which drops to 1080p
    Native,
    /// Cap at 1920x1080
    P1080,
    /// Cap at 2560x1440
    P1440,
    /// Pass through unchanged
    P2160,
}

impl ScalePolicy {
    /// Resolve the encode target for an input frame.
    ///
    /// Never upscales: both target dimensions are clamped to the input.
    /// Returns `(target_w, target_h, needs_downscale)`.
    pub fn resolve_target(&self, width: u32, height: u32, format: PixelFormat) -> (u32, u32, bool) {
        let (tw, th) = match self {
            ScalePolicy::P1080 => (width.min(1920), height.min(1080)),
            ScalePolicy::P1440 => (width.min(2560), height.min(1440)),
            ScalePolicy::P2160 => (width, height),
            ScalePolicy::Native => {
                if width >= 3840 && height >= 2160 && format == PixelFormat::Nv12 {
                    (1920, 1080)
                } else {
                    (width, height)
                }
            }
        };
        (tw, th, (tw, th) != (width, height))
    }
}

impl fmt::Display for ScalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalePolicy::Native => "native",
            ScalePolicy::P1080 => "1080p",
            ScalePolicy::P1440 => "2k",
            ScalePolicy::P2160 => "4k",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ScalePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(ScalePolicy::Native),
            "1080p" | "1080" => Ok(ScalePolicy::P1080),
            "2k" | "1440p" => Ok(ScalePolicy::P1440),
            "4k" | "2160p" => Ok(ScalePolicy::P2160),
            _ => Err(format!("Unknown scale policy: {}", s)),
        }
    }
}

/// Downscale packed NV12 into a stride-aligned destination buffer.
///
/// Nearest-neighbour via 16.16 fixed-point factors. The destination Y
/// stride is `dst_stride`; the UV plane starts at
/// `align16(dst_h) * dst_stride` with the same stride (hardware buffer
/// layout). Destination dimensions are forced even; UV source columns are
/// masked to keep U/V pairs aligned.
///
/// Returns the effective (even) destination geometry.
pub fn downscale_nv12(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    dst_stride: u32,
) -> (u32, u32) {
    let dw = (dst_w & !1) as usize;
    let dh = (dst_h & !1) as usize;
    let sw = src_w as usize;
    let sh = src_h as usize;
    let stride = dst_stride as usize;

    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return (dw as u32, dh as u32);
    }

    let (src_y, src_uv) = src.split_at(sw * sh);
    let uv_off = align16(dst_h) as usize * stride;
    let (dst_y, dst_uv) = dst.split_at_mut(uv_off);

    let sx_fix = ((sw as u64) << 16) / dw as u64;
    let sy_fix = ((sh as u64) << 16) / dh as u64;

    for dy in 0..dh {
        let sy = (((dy as u64 * sy_fix) >> 16) as usize).min(sh - 1);
        let src_row = &src_y[sy * sw..sy * sw + sw];
        let dst_row = &mut dst_y[dy * stride..dy * stride + dw];
        for (dx, out) in dst_row.iter_mut().enumerate() {
            let sx = (((dx as u64 * sx_fix) >> 16) as usize).min(sw - 1);
            *out = src_row[sx];
        }
    }

    // UV plane: half height, columns stepped by pairs
    let src_uv_h = sh / 2;
    let dst_uv_h = dh / 2;
    if sw < 2 || src_uv_h == 0 || dst_uv_h == 0 {
        return (dw as u32, dh as u32);
    }
    let suv_fix = ((src_uv_h as u64) << 16) / dst_uv_h as u64;

    for dy in 0..dst_uv_h {
        let sy = (((dy as u64 * suv_fix) >> 16) as usize).min(src_uv_h - 1);
        let src_row = &src_uv[sy * sw..sy * sw + sw];
        let dst_row = &mut dst_uv[dy * stride..dy * stride + dw];
        for dx in (0..dw).step_by(2) {
            let sx = ((((dx as u64 * sx_fix) >> 16) as usize) & !1).min((sw - 2) & !1);
            dst_row[dx] = src_row[sx];
            dst_row[dx + 1] = src_row[sx + 1];
        }
    }

    (dw as u32, dh as u32)
}

/// Copy NV12 into a stride-aligned destination without scaling.
///
/// Row-by-row for the Y plane, then the half-height UV plane at
/// `align16(height) * dst_stride`. When the strides already match, each
/// plane is copied as one block.
pub fn copy_nv12_aligned(
    src: &[u8],
    width: u32,
    height: u32,
    src_stride: u32,
    dst: &mut [u8],
    dst_stride: u32,
) {
    let w = width as usize;
    let h = height as usize;
    let sstride = src_stride as usize;
    let stride = dst_stride as usize;

    let (src_y, src_uv) = src.split_at(sstride * h);
    let uv_off = align16(height) as usize * stride;
    let (dst_y, dst_uv) = dst.split_at_mut(uv_off);

    if stride == sstride && align16(height) == height {
        dst_y[..sstride * h].copy_from_slice(src_y);
        dst_uv[..sstride * (h / 2)].copy_from_slice(&src_uv[..sstride * (h / 2)]);
        return;
    }

    for row in 0..h {
        dst_y[row * stride..row * stride + w]
            .copy_from_slice(&src_y[row * sstride..row * sstride + w]);
    }
    for row in 0..h / 2 {
        dst_uv[row * stride..row * stride + w]
            .copy_from_slice(&src_uv[row * sstride..row * sstride + w]);
    }
}

/// NV12 plane view of a read-only source buffer
#[derive(Clone, Copy)]
pub struct Nv12Planes<'a> {
    pub y: &'a [u8],
    pub uv: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub y_stride: u32,
    pub uv_stride: u32,
}

/// Scale an NV12 source into a rectangle of a destination frame.
///
/// Used by the blocking compositor for the background and the preview
/// window. The destination rectangle is clipped against the frame bounds;
/// UV pair alignment is preserved on both sides.
#[allow(clippy::too_many_arguments)]
pub fn scale_nv12_into_rect(
    src: Nv12Planes<'_>,
    dst_y: &mut [u8],
    dst_uv: &mut [u8],
    dst_x: u32,
    dst_y_pos: u32,
    rect_w: u32,
    rect_h: u32,
    dst_y_stride: u32,
    dst_uv_stride: u32,
    frame_w: u32,
    frame_h: u32,
) {
    if rect_w == 0 || rect_h == 0 || src.width == 0 || src.height == 0 {
        return;
    }

    let sx_fix = ((src.width as u64) << 16) / rect_w as u64;
    let sy_fix = ((src.height as u64) << 16) / rect_h as u64;

    for dy in 0..rect_h {
        let py = dst_y_pos + dy;
        if py >= frame_h {
            break;
        }
        let sy = (((dy as u64 * sy_fix) >> 16) as u32).min(src.height - 1);
        for dx in 0..rect_w {
            let px = dst_x + dx;
            if px >= frame_w {
                break;
            }
            let sx = (((dx as u64 * sx_fix) >> 16) as u32).min(src.width - 1);
            dst_y[(py * dst_y_stride + px) as usize] =
                src.y[(sy * src.y_stride + sx) as usize];
        }
    }

    let src_uv_h = src.height / 2;
    let rect_uv_h = rect_h / 2;
    if src.width < 2 || src_uv_h == 0 || rect_uv_h == 0 {
        return;
    }
    let suv_fix = ((src_uv_h as u64) << 16) / rect_uv_h as u64;

    for dy in 0..rect_uv_h {
        let py = dst_y_pos / 2 + dy;
        if py >= frame_h / 2 {
            break;
        }
        let sy = (((dy as u64 * suv_fix) >> 16) as u32).min(src_uv_h - 1);
        for dx in (0..rect_w).step_by(2) {
            let px = dst_x + dx;
            if px >= frame_w {
                break;
            }
            let sx = ((((dx as u64 * sx_fix) >> 16) as u32) & !1).min((src.width - 2) & !1);
            let di = (py * dst_uv_stride + px) as usize;
            let si = (sy * src.uv_stride + sx) as usize;
            dst_uv[di] = src.uv[si];
            dst_uv[di + 1] = src.uv[si + 1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_caps() {
        let (w, h, scale) = ScalePolicy::P1080.resolve_target(3840, 2160, PixelFormat::Nv12);
        assert_eq!((w, h, scale), (1920, 1080, true));

        let (w, h, scale) = ScalePolicy::P1440.resolve_target(3840, 2160, PixelFormat::Nv12);
        assert_eq!((w, h, scale), (2560, 1440, true));

        let (w, h, scale) = ScalePolicy::P2160.resolve_target(3840, 2160, PixelFormat::Nv12);
        assert_eq!((w, h, scale), (3840, 2160, false));
    }

    #[test]
    fn test_policy_never_upscales() {
        for policy in [
            ScalePolicy::Native,
            ScalePolicy::P1080,
            ScalePolicy::P1440,
            ScalePolicy::P2160,
        ] {
            for (w, h) in [(640, 480), (1280, 720), (1920, 1080), (3840, 2160)] {
                let (tw, th, _) = policy.resolve_target(w, h, PixelFormat::Nv12);
                assert!(tw <= w && th <= h, "{:?} upscaled {}x{}", policy, w, h);
            }
        }
    }

    #[test]
    fn test_native_rule() {
        // 4K NV12 collapses to 1080p
        let (w, h, scale) = ScalePolicy::Native.resolve_target(3840, 2160, PixelFormat::Nv12);
        assert_eq!((w, h, scale), (1920, 1080, true));
        // Sub-4K NV12 passes through
        let (w, h, scale) = ScalePolicy::Native.resolve_target(1920, 1080, PixelFormat::Nv12);
        assert_eq!((w, h, scale), (1920, 1080, false));
        // 4K in a non-NV12 format passes through
        let (w, h, scale) = ScalePolicy::Native.resolve_target(3840, 2160, PixelFormat::Bgr24);
        assert_eq!((w, h, scale), (3840, 2160, false));
    }

    #[test]
    fn test_policy_tokens() {
        assert_eq!("native".parse::<ScalePolicy>(), Ok(ScalePolicy::Native));
        assert_eq!("1080p".parse::<ScalePolicy>(), Ok(ScalePolicy::P1080));
        assert_eq!("2k".parse::<ScalePolicy>(), Ok(ScalePolicy::P1440));
        assert_eq!("4k".parse::<ScalePolicy>(), Ok(ScalePolicy::P2160));
        assert!("720p".parse::<ScalePolicy>().is_err());
    }

    fn make_nv12(w: usize, h: usize, y: u8, u: u8, v: u8) -> Vec<u8> {
        let mut buf = vec![y; w * h * 3 / 2];
        for pair in buf[w * h..].chunks_exact_mut(2) {
            pair[0] = u;
            pair[1] = v;
        }
        buf
    }

    #[test]
    fn test_downscale_preserves_uv_pairing() {
        let src = make_nv12(64, 64, 100, 90, 200);
        let dst_stride = align16(32);
        let dst_size = (dst_stride * align16(32)) as usize * 3 / 2;
        let mut dst = vec![0u8; dst_size];

        let (dw, dh) = downscale_nv12(&src, 64, 64, &mut dst, 32, 32, dst_stride);
        assert_eq!((dw, dh), (32, 32));

        let uv_off = (align16(32) * dst_stride) as usize;
        for row in 0..(dh / 2) as usize {
            let base = uv_off + row * dst_stride as usize;
            for dx in (0..dw as usize).step_by(2) {
                assert_eq!(dst[base + dx], 90, "U misaligned at row {} col {}", row, dx);
                assert_eq!(dst[base + dx + 1], 200, "V misaligned at row {} col {}", row, dx);
            }
        }
    }

    #[test]
    fn test_downscale_forces_even_dims() {
        let src = make_nv12(64, 64, 50, 128, 128);
        let dst_stride = align16(33);
        let mut dst = vec![0u8; (dst_stride * align16(33)) as usize * 3 / 2];
        let (dw, dh) = downscale_nv12(&src, 64, 64, &mut dst, 33, 31, dst_stride);
        assert_eq!(dw % 2, 0);
        assert_eq!(dh % 2, 0);
        assert_eq!((dw, dh), (32, 30));
    }

    #[test]
    fn test_aligned_copy_rows() {
        let w = 24u32;
        let h = 16u32;
        let mut src = make_nv12(w as usize, h as usize, 0, 128, 128);
        // Tag the first Y pixel of each row so row placement is checkable
        for row in 0..h as usize {
            src[row * w as usize] = row as u8 + 1;
        }
        let stride = align16(w);
        let mut dst = vec![0u8; (stride * align16(h)) as usize * 3 / 2];
        copy_nv12_aligned(&src, w, h, w, &mut dst, stride);

        for row in 0..h as usize {
            assert_eq!(dst[row * stride as usize], row as u8 + 1);
        }
        // Padding columns stay zeroed
        assert_eq!(dst[w as usize], 0);
        let uv_off = (align16(h) * stride) as usize;
        assert_eq!(dst[uv_off], 128);
    }
}
