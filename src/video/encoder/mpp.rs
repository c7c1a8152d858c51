//! Hardware JPEG encoder adapter (Rockchip MPP)
//!
//! Each adapter owns one vendor context plus its DMA buffers and is
//! pinned to a single worker thread. Configuration is keyed on the
//! resolved target geometry and vendor format; a frame that does not
//! match the current setup tears the whole session down and rebuilds it.

use crate::error::{AppError, Result};
use crate::video::format::{align16, PixelFormat};
use crate::video::scale::ScalePolicy;

/// Vendor pixel-format tags accepted by the JPEG encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MppPixelFormat {
    Yuv420Sp,
    Yuv422Sp,
    Yuv444Sp,
    Yuv422Yuyv,
    Yuv422Uyvy,
    Rgb888,
    Bgr888,
}

impl MppPixelFormat {
    pub fn from_pixel(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Nv12 => Some(MppPixelFormat::Yuv420Sp),
            PixelFormat::Nv16 => Some(MppPixelFormat::Yuv422Sp),
            PixelFormat::Nv24 => Some(MppPixelFormat::Yuv444Sp),
            PixelFormat::Yuyv => Some(MppPixelFormat::Yuv422Yuyv),
            PixelFormat::Uyvy => Some(MppPixelFormat::Yuv422Uyvy),
            PixelFormat::Rgb24 => Some(MppPixelFormat::Rgb888),
            PixelFormat::Bgr24 => Some(MppPixelFormat::Bgr888),
            PixelFormat::Jpeg => None,
        }
    }

    /// DMA frame buffer size for aligned strides
    pub fn frame_buf_size(&self, hor_stride: u32, ver_stride: u32) -> usize {
        let base = hor_stride as usize * ver_stride as usize;
        match self {
            MppPixelFormat::Yuv420Sp => base * 3 / 2,
            MppPixelFormat::Yuv422Sp | MppPixelFormat::Yuv422Yuyv | MppPixelFormat::Yuv422Uyvy => {
                base * 2
            }
            MppPixelFormat::Yuv444Sp | MppPixelFormat::Rgb888 | MppPixelFormat::Bgr888 => base * 3,
        }
    }
}

/// Resolved hardware configuration for one frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSetup {
    pub width: u32,
    pub height: u32,
    pub hor_stride: u32,
    pub ver_stride: u32,
    pub format: MppPixelFormat,
}

impl EncoderSetup {
    /// Plan the target setup for an input frame under a scale policy.
    ///
    /// The nearest-neighbour scaler only exists for NV12, so downscale
    /// targets on other formats fall back to the input geometry.
    pub fn plan(
        policy: ScalePolicy,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self> {
        let mpp_format =
            MppPixelFormat::from_pixel(format).ok_or(AppError::UnsupportedFormat(format))?;

        let (tw, th, needs_downscale) = policy.resolve_target(width, height, format);
        let (tw, th) = if needs_downscale && format != PixelFormat::Nv12 {
            (width, height)
        } else {
            (tw, th)
        };

        Ok(Self {
            width: tw,
            height: th,
            hor_stride: align16(tw),
            ver_stride: align16(th),
            format: mpp_format,
        })
    }

    /// Conservative upper bound for the output JPEG
    pub fn packet_buf_size(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(feature = "mpp")]
pub use hw::MppJpegEncoder;

#[cfg(feature = "mpp")]
mod hw {
    use bytes::Bytes;
    use std::time::Instant;

    use super::EncoderSetup;
    use crate::blocking::compositor::composite_nv12;
    use crate::error::{AppError, Result};
    use crate::overlay::{draw_overlay, Nv12Target};
    use crate::video::encoder::traits::{EncoderShared, FrameEncoder};
    use crate::video::format::{PixelFormat, Resolution};
    use crate::video::frame::VideoFrame;
    use crate::video::mpp::{raw_format, BufferGroup, DmaBuffer, EncCfg, EncContext, FrameDesc};
    use crate::video::scale::{copy_nv12_aligned, downscale_nv12, ScalePolicy};

    /// Live hardware session; field order is release order (packet
    /// buffer, frame buffer, group, context).
    struct Configured {
        pkt_buf: DmaBuffer,
        frame_buf: DmaBuffer,
        _group: BufferGroup,
        ctx: EncContext,
        setup: EncoderSetup,
    }

    enum AdapterState {
        Uninit,
        Ready(Box<Configured>),
    }

    /// Stateful, reconfigurable MJPEG encoder over the vendor VPU
    pub struct MppJpegEncoder {
        name: String,
        quality: u8,
        policy: ScalePolicy,
        shared: EncoderShared,
        state: AdapterState,
    }

    impl MppJpegEncoder {
        /// Reserve name and quality; hardware is not touched until the
        /// first frame arrives.
        pub fn new(name: &str, quality: u8, policy: ScalePolicy, shared: EncoderShared) -> Self {
            tracing::info!(
                "MPP {}: hardware JPEG encoder (quality={})",
                name,
                quality.clamp(1, 99)
            );
            Self {
                name: name.to_string(),
                quality: quality.clamp(1, 99),
                policy,
                shared,
                state: AdapterState::Uninit,
            }
        }

        fn allocate(quality: u8, setup: EncoderSetup) -> Result<Configured> {
            let ctx = EncContext::new_mjpeg()?;

            let cfg = EncCfg::new()?;
            ctx.fetch_cfg(&cfg)?;
            cfg.set_s32(c"prep:width", setup.width as i32)?;
            cfg.set_s32(c"prep:height", setup.height as i32)?;
            cfg.set_s32(c"prep:hor_stride", setup.hor_stride as i32)?;
            cfg.set_s32(c"prep:ver_stride", setup.ver_stride as i32)?;
            cfg.set_s32(c"prep:format", raw_format(setup.format) as i32)?;
            cfg.set_s32(c"rc:mode", RC_MODE_FIXQP)?;
            cfg.set_s32(c"jpeg:quant", quality.clamp(1, 99) as i32)?;
            ctx.apply_cfg(&cfg)?;
            drop(cfg);

            let group = BufferGroup::new_drm()?;
            let frame_buf =
                group.alloc(setup.format.frame_buf_size(setup.hor_stride, setup.ver_stride))?;
            let pkt_buf = group.alloc(setup.packet_buf_size())?;

            Ok(Configured {
                pkt_buf,
                frame_buf,
                _group: group,
                ctx,
                setup,
            })
        }

        fn configure(&mut self, setup: EncoderSetup) -> Result<()> {
            // Release any previous session before reallocating
            self.state = AdapterState::Uninit;

            tracing::info!(
                "MPP {}: configuring {}x{} stride={}x{} {:?}",
                self.name,
                setup.width,
                setup.height,
                setup.hor_stride,
                setup.ver_stride,
                setup.format
            );

            let configured = Self::allocate(self.quality, setup)
                .map_err(|e| AppError::Reconfigure(e.to_string()))?;
            self.state = AdapterState::Ready(Box::new(configured));
            Ok(())
        }

        /// Copy the source frame into the DMA buffer at encoder strides
        fn stage_frame(&mut self, src: &VideoFrame) -> Result<()> {
            let c = match &mut self.state {
                AdapterState::Ready(c) => c,
                AdapterState::Uninit => unreachable!("stage_frame on unconfigured adapter"),
            };
            let setup = c.setup;
            let dma = c.frame_buf.as_mut_slice();

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
            // A downscaled frame is allowed to be bigger than the target
            // buffer; every 1:1 copy path must fit it
            let downscaling = src.format == PixelFormat::Nv12
                && (setup.width, setup.height) != (src.width(), src.height());
            if !downscaling && expected > dma.len() {
                return Err(AppError::OversizedFrame {
                    got: expected,
                    max: dma.len(),
                });
            }

            let w = src.width() as usize;
            let h = src.height() as usize;
            let sstride = src.stride as usize;
            let hor = setup.hor_stride as usize;
            let ver = setup.ver_stride as usize;
            let data = src.data();

            match src.format {
                PixelFormat::Nv12 => {
                    if (setup.width, setup.height) != (src.width(), src.height()) {
                        if src.stride != src.width() {
                            return Err(AppError::VideoError(
                                "strided NV12 input cannot be downscaled".into(),
                            ));
                        }
                        downscale_nv12(
                            data,
                            src.width(),
                            src.height(),
                            dma,
                            setup.width,
                            setup.height,
                            setup.hor_stride,
                        );
                    } else {
                        copy_nv12_aligned(
                            data,
                            src.width(),
                            src.height(),
                            src.stride,
                            dma,
                            setup.hor_stride,
                        );
                    }
                }
                PixelFormat::Nv16 => {
                    for row in 0..h {
                        dma[row * hor..row * hor + w]
                            .copy_from_slice(&data[row * sstride..row * sstride + w]);
                    }
                    let (src_uv, dst_uv) = (&data[sstride * h..], &mut dma[hor * ver..]);
                    for row in 0..h {
                        dst_uv[row * hor..row * hor + w]
                            .copy_from_slice(&src_uv[row * sstride..row * sstride + w]);
                    }
                }
                PixelFormat::Nv24 => {
                    for row in 0..h {
                        dma[row * hor..row * hor + w]
                            .copy_from_slice(&data[row * sstride..row * sstride + w]);
                    }
                    let (src_uv, dst_uv) = (&data[sstride * h..], &mut dma[hor * ver..]);
                    for row in 0..h {
                        dst_uv[row * hor * 2..row * hor * 2 + w * 2]
                            .copy_from_slice(&src_uv[row * sstride * 2..row * sstride * 2 + w * 2]);
                    }
                }
                PixelFormat::Yuyv | PixelFormat::Uyvy => {
                    for row in 0..h {
                        dma[row * hor * 2..row * hor * 2 + w * 2]
                            .copy_from_slice(&data[row * sstride * 2..row * sstride * 2 + w * 2]);
                    }
                }
                PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                    for row in 0..h {
                        dma[row * hor * 3..row * hor * 3 + w * 3]
                            .copy_from_slice(&data[row * sstride * 3..row * sstride * 3 + w * 3]);
                    }
                }
                PixelFormat::Jpeg => return Err(AppError::UnsupportedFormat(PixelFormat::Jpeg)),
            }
            Ok(())
        }

        /// Blocking composite and text overlay, NV12 only
        fn apply_overlays(&mut self, src: &VideoFrame) {
            if src.format != PixelFormat::Nv12 {
                return;
            }
            let shared = self.shared.clone();
            let c = match &mut self.state {
                AdapterState::Ready(c) => c,
                AdapterState::Uninit => return,
            };
            let setup = c.setup;
            let dma = c.frame_buf.as_mut_slice();
            let uv_off = setup.hor_stride as usize * setup.ver_stride as usize;
            let (y_plane, uv_plane) = dma.split_at_mut(uv_off);
            let mut target = Nv12Target {
                y: y_plane,
                uv: uv_plane,
                width: setup.width,
                height: setup.height,
                y_stride: setup.hor_stride,
                uv_stride: setup.hor_stride,
            };

            if shared.blocking.is_enabled_fast() {
                let cfg = shared.blocking.snapshot();
                if cfg.enabled {
                    composite_nv12(src, &mut target, &cfg, &shared.fonts, &shared.raw_cache);
                }
            }

            let overlay_cfg = shared.overlay.snapshot();
            if overlay_cfg.enabled {
                draw_overlay(&mut target, &overlay_cfg, &shared.fonts);
            }
        }
    }

    impl FrameEncoder for MppJpegEncoder {
        fn name(&self) -> &str {
            &self.name
        }

        fn compress(&mut self, src: &VideoFrame) -> Result<VideoFrame> {
            let begin = Instant::now();

            let setup =
                EncoderSetup::plan(self.policy, src.width(), src.height(), src.format)?;
            let needs_configure = match &self.state {
                AdapterState::Ready(c) => c.setup != setup,
                AdapterState::Uninit => true,
            };
            if needs_configure {
                self.configure(setup)?;
            }

            self.stage_frame(src)?;
            self.apply_overlays(src);

            let c = match &mut self.state {
                AdapterState::Ready(c) => c,
                AdapterState::Uninit => unreachable!(),
            };

            // Cache-sync end: the VPU must see every CPU write
            c.frame_buf.sync_end()?;

            let desc = FrameDesc::new(
                setup.width,
                setup.height,
                setup.hor_stride,
                setup.ver_stride,
                setup.format,
                &c.frame_buf,
            )
            .map_err(|e| AppError::SubmitFailed(e.to_string()))?;

            c.ctx.put_frame(&desc)?;
            let packet = c.ctx.get_packet()?;
            let payload = packet.data();
            if payload.is_empty() {
                return Err(AppError::EmptyPacket);
            }

            let mut out = VideoFrame::new(
                Bytes::copy_from_slice(payload),
                Resolution::new(setup.width, setup.height),
                PixelFormat::Jpeg,
                0,
                src.sequence,
            );
            out.capture_ts = src.capture_ts;
            out.key_frame = true;
            out.gop = 0;
            out.encode_begin_ts = Some(begin);
            out.encode_end_ts = Some(Instant::now());

            tracing::debug!(
                "MPP {}: {} bytes for {}x{}",
                self.name,
                out.len(),
                setup.width,
                setup.height
            );
            Ok(out)
        }
    }

    const RC_MODE_FIXQP: i32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::PixelFormat;
    use crate::video::scale::ScalePolicy;

    #[test]
    fn test_plan_native_rule() {
        // 4K NV12 under Native configures at 1080p
        let setup = EncoderSetup::plan(ScalePolicy::Native, 3840, 2160, PixelFormat::Nv12).unwrap();
        assert_eq!((setup.width, setup.height), (1920, 1080));
        assert_eq!((setup.hor_stride, setup.ver_stride), (1920, 1088));

        // 1080p NV12 stays 1080p
        let setup = EncoderSetup::plan(ScalePolicy::Native, 1920, 1080, PixelFormat::Nv12).unwrap();
        assert_eq!((setup.width, setup.height), (1920, 1080));

        // 4K BGR24 stays 4K (no NV12 scaler for it)
        let setup = EncoderSetup::plan(ScalePolicy::Native, 3840, 2160, PixelFormat::Bgr24).unwrap();
        assert_eq!((setup.width, setup.height), (3840, 2160));
    }

    #[test]
    fn test_plan_caps_nv12_only() {
        // P1080 downscales NV12 but not packed RGB (no scaler)
        let setup = EncoderSetup::plan(ScalePolicy::P1080, 3840, 2160, PixelFormat::Nv12).unwrap();
        assert_eq!((setup.width, setup.height), (1920, 1080));
        let setup = EncoderSetup::plan(ScalePolicy::P1080, 3840, 2160, PixelFormat::Rgb24).unwrap();
        assert_eq!((setup.width, setup.height), (3840, 2160));
    }

    #[test]
    fn test_plan_rejects_jpeg() {
        assert!(EncoderSetup::plan(ScalePolicy::Native, 1920, 1080, PixelFormat::Jpeg).is_err());
    }

    #[test]
    fn test_frame_buf_sizes() {
        assert_eq!(
            MppPixelFormat::Yuv420Sp.frame_buf_size(1920, 1088),
            1920 * 1088 * 3 / 2
        );
        assert_eq!(
            MppPixelFormat::Yuv422Yuyv.frame_buf_size(1920, 1088),
            1920 * 1088 * 2
        );
        assert_eq!(
            MppPixelFormat::Bgr888.frame_buf_size(1920, 1088),
            1920 * 1088 * 3
        );
    }

    #[test]
    fn test_setup_reuse_key() {
        let a = EncoderSetup::plan(ScalePolicy::P2160, 1920, 1080, PixelFormat::Nv12).unwrap();
        let b = EncoderSetup::plan(ScalePolicy::P2160, 1920, 1080, PixelFormat::Nv12).unwrap();
        let c = EncoderSetup::plan(ScalePolicy::P2160, 2560, 1440, PixelFormat::Nv12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Packet buffer grows with the target
        assert!(c.packet_buf_size() > a.packet_buf_size());
    }
}
