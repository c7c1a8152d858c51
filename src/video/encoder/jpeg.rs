//! Software JPEG encoder (turbojpeg)
//!
//! Fallback path for machines without the VPU. NV12 frames pass through
//! the same blocking-composite and text-overlay stage as the hardware
//! path, then raw frames are converted to I420 with scalar loops and
//! compressed straight from YUV planes.
//!
//! Note: turbojpeg compressors are not thread-safe; each worker owns its
//! own instance.

use bytes::Bytes;
use std::time::Instant;

use super::traits::{EncoderShared, FrameEncoder};
use crate::blocking::compositor::composite_nv12;
use crate::error::{AppError, Result};
use crate::overlay::{draw_overlay, Nv12Target};
use crate::video::format::{PixelFormat, Resolution};
use crate::video::frame::VideoFrame;

pub struct CpuJpegEncoder {
    name: String,
    quality: u8,
    shared: EncoderShared,
    compressor: turbojpeg::Compressor,
    /// Packed NV12 working buffer for the compositing stage
    nv12: Vec<u8>,
    /// I420 staging buffer (Y + U + V planes), grown on demand
    i420: Vec<u8>,
}

/// Convert NV12 (any stride) into packed I420 planes
fn nv12_to_i420(data: &[u8], stride: usize, w: usize, h: usize, i420: &mut Vec<u8>) {
    i420.resize(w * h * 3 / 2, 0);
    let (y_dst, uv_dst) = i420.split_at_mut(w * h);
    let (u_dst, v_dst) = uv_dst.split_at_mut(w * h / 4);

    for row in 0..h {
        y_dst[row * w..(row + 1) * w].copy_from_slice(&data[row * stride..row * stride + w]);
    }
    let uv_src = &data[stride * h..];
    for row in 0..h / 2 {
        let src_row = &uv_src[row * stride..row * stride + w];
        for col in 0..w / 2 {
            u_dst[row * (w / 2) + col] = src_row[col * 2];
            v_dst[row * (w / 2) + col] = src_row[col * 2 + 1];
        }
    }
}

impl CpuJpegEncoder {
    pub fn new(name: &str, quality: u8, shared: EncoderShared) -> Result<Self> {
        let quality = quality.clamp(1, 99);
        let mut compressor = turbojpeg::Compressor::new()
            .map_err(|e| AppError::VideoError(format!("turbojpeg compressor: {}", e)))?;
        compressor
            .set_quality(quality as i32)
            .map_err(|e| AppError::VideoError(format!("set_quality: {}", e)))?;

        tracing::info!("CPU {}: software JPEG encoder (quality={})", name, quality);
        Ok(Self {
            name: name.to_string(),
            quality,
            shared,
            compressor,
            nv12: Vec::new(),
            i420: Vec::new(),
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn encode_i420(&mut self, width: usize, height: usize) -> Result<Vec<u8>> {
        let yuv = turbojpeg::YuvImage {
            pixels: self.i420.as_slice(),
            width,
            align: 1,
            height,
            subsamp: turbojpeg::Subsamp::Sub2x2,
        };
        self.compressor
            .compress_yuv_to_vec(yuv)
            .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
    }

    /// Copy the source into the packed NV12 working buffer
    fn stage_nv12_working(&mut self, src: &VideoFrame) {
        let w = src.width() as usize;
        let h = src.height() as usize;
        let stride = src.stride as usize;
        let data = src.data();

        self.nv12.resize(w * h * 3 / 2, 0);
        let (y_dst, uv_dst) = self.nv12.split_at_mut(w * h);
        for row in 0..h {
            y_dst[row * w..(row + 1) * w].copy_from_slice(&data[row * stride..row * stride + w]);
        }
        let uv_src = &data[stride * h..];
        for row in 0..h / 2 {
            uv_dst[row * w..(row + 1) * w]
                .copy_from_slice(&uv_src[row * stride..row * stride + w]);
        }
    }

    /// Blocking composite and text overlay on the working buffer
    fn apply_overlays(&mut self, src: &VideoFrame) {
        let w = src.width();
        let h = src.height();
        let (y_plane, uv_plane) = self.nv12.split_at_mut((w * h) as usize);
        let mut target = Nv12Target {
            y: y_plane,
            uv: uv_plane,
            width: w,
            height: h,
            y_stride: w,
            uv_stride: w,
        };

        if self.shared.blocking.is_enabled_fast() {
            let cfg = self.shared.blocking.snapshot();
            if cfg.enabled {
                composite_nv12(src, &mut target, &cfg, &self.shared.fonts, &self.shared.raw_cache);
            }
        }

        let overlay_cfg = self.shared.overlay.snapshot();
        if overlay_cfg.enabled {
            draw_overlay(&mut target, &overlay_cfg, &self.shared.fonts);
        }
    }

    fn stage_packed_422(&mut self, src: &VideoFrame, y_first: bool) {
        let w = src.width() as usize;
        let h = src.height() as usize;
        let row_bytes = src.stride as usize * 2;
        let data = src.data();

        self.i420.resize(w * h * 3 / 2, 0);
        let (y_dst, uv_dst) = self.i420.split_at_mut(w * h);
        let (u_dst, v_dst) = uv_dst.split_at_mut(w * h / 4);

        for row in 0..h {
            let src_row = &data[row * row_bytes..row * row_bytes + w * 2];
            for col in 0..w / 2 {
                let quad = &src_row[col * 4..col * 4 + 4];
                // YUYV: Y0 U Y1 V, UYVY: U Y0 V Y1
                let (y0, u, y1, v) = if y_first {
                    (quad[0], quad[1], quad[2], quad[3])
                } else {
                    (quad[1], quad[0], quad[3], quad[2])
                };
                y_dst[row * w + col * 2] = y0;
                y_dst[row * w + col * 2 + 1] = y1;
                // 4:2:0 chroma from even rows
                if row % 2 == 0 {
                    u_dst[(row / 2) * (w / 2) + col] = u;
                    v_dst[(row / 2) * (w / 2) + col] = v;
                }
            }
        }
    }

    fn encode_rgb(&mut self, src: &VideoFrame, format: turbojpeg::PixelFormat) -> Result<Vec<u8>> {
        let w = src.width() as usize;
        let h = src.height() as usize;
        let pitch = src.stride as usize * 3;

        let image = turbojpeg::Image {
            pixels: src.data(),
            width: w,
            pitch,
            height: h,
            format,
        };
        self.compressor
            .compress_to_vec(image)
            .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
    }
}

impl FrameEncoder for CpuJpegEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn compress(&mut self, src: &VideoFrame) -> Result<VideoFrame> {
        let begin = Instant::now();

        let expected = src
            .format
            .bytes_per_frame(src.width(), src.height(), src.stride)
            .map_err(|_| AppError::UnsupportedFormat(src.format))?;
        if src.used_bytes < expected {
            return Err(AppError::VideoError(format!(
                "{} frame too small: {} < {}",
                src.format, src.used_bytes, expected
            )));
        }

        let w = src.width() as usize;
        let h = src.height() as usize;
        let jpeg = match src.format {
            PixelFormat::Nv12 => {
                let compositing = self.shared.blocking.is_enabled_fast()
                    || self.shared.overlay.snapshot().enabled;
                if compositing {
                    self.stage_nv12_working(src);
                    self.apply_overlays(src);
                    let Self { nv12, i420, .. } = self;
                    nv12_to_i420(nv12, w, w, h, i420);
                } else {
                    nv12_to_i420(src.data(), src.stride as usize, w, h, &mut self.i420);
                }
                self.encode_i420(w, h)?
            }
            PixelFormat::Yuyv => {
                self.stage_packed_422(src, true);
                self.encode_i420(w, h)?
            }
            PixelFormat::Uyvy => {
                self.stage_packed_422(src, false);
                self.encode_i420(w, h)?
            }
            PixelFormat::Rgb24 => self.encode_rgb(src, turbojpeg::PixelFormat::RGB)?,
            PixelFormat::Bgr24 => self.encode_rgb(src, turbojpeg::PixelFormat::BGR)?,
            other => return Err(AppError::UnsupportedFormat(other)),
        };

        let mut out = VideoFrame::new(
            Bytes::from(jpeg),
            Resolution::new(src.width(), src.height()),
            PixelFormat::Jpeg,
            0,
            src.sequence,
        );
        out.capture_ts = src.capture_ts;
        out.key_frame = true;
        out.gop = 0;
        out.encode_begin_ts = Some(begin);
        out.encode_end_ts = Some(Instant::now());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::{BlockingState, RawFrameCache};
    use crate::overlay::{FontSet, OverlayState};
    use std::sync::Arc;

    fn shared_bitmap() -> EncoderShared {
        EncoderShared {
            overlay: Arc::new(OverlayState::new()),
            blocking: Arc::new(BlockingState::new()),
            fonts: Arc::new(FontSet::bitmap_only()),
            raw_cache: Arc::new(RawFrameCache::new()),
        }
    }

    fn grey_nv12(w: u32, h: u32) -> VideoFrame {
        let data = vec![0x80u8; (w * h * 3 / 2) as usize];
        VideoFrame::from_vec(data, Resolution::new(w, h), PixelFormat::Nv12, w, 0)
    }

    #[test]
    fn test_grey_frame_roundtrip() {
        let mut enc = CpuJpegEncoder::new("test", 80, shared_bitmap()).unwrap();
        let out = enc.compress(&grey_nv12(1920, 1080)).unwrap();

        assert_eq!(out.format, PixelFormat::Jpeg);
        assert!(out.key_frame);
        assert_eq!(out.gop, 0);
        assert!(out.len() >= 1024, "JPEG suspiciously small: {}", out.len());
        assert_eq!(&out.data()[..3], &[0xFF, 0xD8, 0xFF]);
        assert!(out.is_valid_jpeg());
        assert!(out.encode_begin_ts.is_some());
        assert!(out.encode_end_ts.is_some());

        // Decode back and check the mean luma stayed put
        let mut dec = turbojpeg::Decompressor::new().unwrap();
        let header = dec.read_header(out.data()).unwrap();
        assert_eq!((header.width, header.height), (1920, 1080));
        let pitch = header.width * 3;
        let mut image = turbojpeg::Image {
            pixels: vec![0u8; header.height * pitch],
            width: header.width,
            pitch,
            height: header.height,
            format: turbojpeg::PixelFormat::RGB,
        };
        dec.decompress(out.data(), image.as_deref_mut()).unwrap();
        let mean: f64 = image.pixels.iter().map(|&p| p as f64).sum::<f64>()
            / image.pixels.len() as f64;
        // Uniform Y=0x80 with neutral chroma decodes to mid grey
        assert!((mean - 128.0).abs() < 3.0, "mean {}", mean);
    }

    #[test]
    fn test_idempotent_encoding() {
        let mut enc = CpuJpegEncoder::new("test", 90, shared_bitmap()).unwrap();
        let frame = grey_nv12(320, 240);
        let a = enc.compress(&frame).unwrap();
        let b = enc.compress(&frame).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_blocking_composites_and_archives_raw() {
        let shared = shared_bitmap();
        shared.blocking.set_enabled(true);
        let mut enc = CpuJpegEncoder::new("test", 90, shared.clone()).unwrap();
        let frame = grey_nv12(64, 64);
        let out = enc.compress(&frame).unwrap();
        assert!(out.is_valid_jpeg());

        // The live frame was archived for the snapshot endpoint
        let raw = shared.raw_cache.snapshot().expect("raw frame not cached");
        assert_eq!((raw.width, raw.height), (64, 64));
        assert_eq!(raw.data[0], 0x80);

        // Blocking replaced the grey capture with the neutral background
        let mut plain = CpuJpegEncoder::new("test", 90, shared_bitmap()).unwrap();
        let baseline = plain.compress(&frame).unwrap();
        assert_ne!(out.data(), baseline.data());
    }

    #[test]
    fn test_overlay_changes_output() {
        let shared = shared_bitmap();
        shared.overlay.set_text("REC");
        shared.overlay.set_enabled(true);
        let mut enc = CpuJpegEncoder::new("test", 90, shared).unwrap();
        let frame = grey_nv12(128, 128);
        let with_overlay = enc.compress(&frame).unwrap();

        let mut plain = CpuJpegEncoder::new("test", 90, shared_bitmap()).unwrap();
        let baseline = plain.compress(&frame).unwrap();
        assert_ne!(with_overlay.data(), baseline.data());
    }

    #[test]
    fn test_yuyv_accepted() {
        let data = vec![0x80u8; 64 * 64 * 2];
        let frame = VideoFrame::from_vec(
            data,
            Resolution::new(64, 64),
            PixelFormat::Yuyv,
            64,
            0,
        );
        let mut enc = CpuJpegEncoder::new("test", 80, shared_bitmap()).unwrap();
        let out = enc.compress(&frame).unwrap();
        assert!(out.is_valid_jpeg());
    }

    #[test]
    fn test_jpeg_input_rejected() {
        let frame = VideoFrame::from_vec(
            vec![0xFF, 0xD8, 0xFF, 0xD9],
            Resolution::new(2, 2),
            PixelFormat::Jpeg,
            0,
            0,
        );
        let mut enc = CpuJpegEncoder::new("test", 80, shared_bitmap()).unwrap();
        assert!(enc.compress(&frame).is_err());
    }

    #[test]
    fn test_short_frame_rejected() {
        let frame = VideoFrame::from_vec(
            vec![0u8; 100],
            Resolution::new(64, 64),
            PixelFormat::Nv12,
            64,
            0,
        );
        let mut enc = CpuJpegEncoder::new("test", 80, shared_bitmap()).unwrap();
        assert!(enc.compress(&frame).is_err());
    }
}
