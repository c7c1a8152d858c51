//! Safe wrappers over the Rockchip MPP encoder API
//!
//! Ownership mirrors the vendor contract: the context owns the hardware
//! session, the buffer group owns its DMA buffers, and every handle is
//! released in `Drop` in reverse acquisition order. None of these types
//! are `Sync`; each encoder worker owns its own set.

mod sys;

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;

use super::encoder::mpp::MppPixelFormat;
use crate::error::{AppError, Result};

const CALLER: &[u8] = b"mpp-streamer\0";

fn caller() -> *const c_char {
    CALLER.as_ptr() as *const c_char
}

fn check(ret: sys::MPP_RET, what: &str) -> Result<()> {
    if ret == sys::MPP_OK {
        Ok(())
    } else {
        Err(AppError::VideoError(format!("{} failed: {}", what, ret)))
    }
}

pub(crate) fn raw_format(fmt: MppPixelFormat) -> u32 {
    match fmt {
        MppPixelFormat::Yuv420Sp => sys::MPP_FMT_YUV420SP,
        MppPixelFormat::Yuv422Sp => sys::MPP_FMT_YUV422SP,
        MppPixelFormat::Yuv444Sp => sys::MPP_FMT_YUV444SP,
        MppPixelFormat::Yuv422Yuyv => sys::MPP_FMT_YUV422_YUYV,
        MppPixelFormat::Yuv422Uyvy => sys::MPP_FMT_YUV422_UYVY,
        MppPixelFormat::Rgb888 => sys::MPP_FMT_RGB888,
        MppPixelFormat::Bgr888 => sys::MPP_FMT_BGR888,
    }
}

/// MPP context initialised for MJPEG encoding
pub struct EncContext {
    ctx: sys::MppCtx,
    api: *mut sys::MppApi,
}

impl EncContext {
    pub fn new_mjpeg() -> Result<Self> {
        let mut ctx: sys::MppCtx = ptr::null_mut();
        let mut api: *mut sys::MppApi = ptr::null_mut();
        unsafe {
            check(sys::mpp_create(&mut ctx, &mut api), "mpp_create")?;
            let this = Self { ctx, api };
            check(
                sys::mpp_init(ctx, sys::MPP_CTX_ENC, sys::MPP_VIDEO_CODING_MJPEG),
                "mpp_init",
            )?;
            Ok(this)
        }
    }

    fn control(&self, cmd: c_int, param: sys::MppParam, what: &str) -> Result<()> {
        unsafe {
            let f = (*self.api)
                .control
                .ok_or_else(|| AppError::VideoError("mpi->control missing".into()))?;
            check(f(self.ctx, cmd, param), what)
        }
    }

    pub fn apply_cfg(&self, cfg: &EncCfg) -> Result<()> {
        self.control(sys::MPP_ENC_SET_CFG, cfg.ptr, "MPP_ENC_SET_CFG")
    }

    pub fn fetch_cfg(&self, cfg: &EncCfg) -> Result<()> {
        self.control(sys::MPP_ENC_GET_CFG, cfg.ptr, "MPP_ENC_GET_CFG")
    }

    pub fn put_frame(&self, frame: &FrameDesc) -> Result<()> {
        unsafe {
            let f = (*self.api)
                .encode_put_frame
                .ok_or_else(|| AppError::SubmitFailed("mpi->encode_put_frame missing".into()))?;
            let ret = f(self.ctx, frame.raw);
            if ret != sys::MPP_OK {
                return Err(AppError::SubmitFailed(format!("encode_put_frame: {}", ret)));
            }
            Ok(())
        }
    }

    pub fn get_packet(&self) -> Result<Packet> {
        unsafe {
            let f = (*self.api)
                .encode_get_packet
                .ok_or_else(|| AppError::RetrieveFailed("mpi->encode_get_packet missing".into()))?;
            let mut raw: sys::MppPacket = ptr::null_mut();
            let ret = f(self.ctx, &mut raw);
            if ret != sys::MPP_OK {
                return Err(AppError::RetrieveFailed(format!("encode_get_packet: {}", ret)));
            }
            if raw.is_null() {
                return Err(AppError::EmptyPacket);
            }
            Ok(Packet { raw })
        }
    }
}

impl Drop for EncContext {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_destroy(self.ctx);
        }
    }
}

/// Encoder configuration object (prep geometry, rate control, quality)
pub struct EncCfg {
    ptr: sys::MppEncCfgPtr,
}

impl EncCfg {
    pub fn new() -> Result<Self> {
        let mut ptr: sys::MppEncCfgPtr = ptr::null_mut();
        unsafe {
            check(sys::mpp_enc_cfg_init(&mut ptr), "mpp_enc_cfg_init")?;
        }
        Ok(Self { ptr })
    }

    pub fn set_s32(&self, name: &CStr, val: i32) -> Result<()> {
        unsafe {
            check(
                sys::mpp_enc_cfg_set_s32(self.ptr, name.as_ptr(), val),
                "mpp_enc_cfg_set_s32",
            )
        }
    }
}

impl Drop for EncCfg {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_enc_cfg_deinit(self.ptr);
        }
    }
}

/// DRM buffer group; owns every buffer allocated from it
pub struct BufferGroup {
    raw: sys::MppBufferGroup,
}

impl BufferGroup {
    pub fn new_drm() -> Result<Self> {
        let mut raw: sys::MppBufferGroup = ptr::null_mut();
        unsafe {
            check(
                sys::mpp_buffer_group_get(
                    &mut raw,
                    sys::MPP_BUFFER_TYPE_DRM,
                    sys::MPP_BUFFER_INTERNAL,
                    caller(),
                    caller(),
                ),
                "mpp_buffer_group_get",
            )?;
        }
        Ok(Self { raw })
    }

    /// Allocate a DMA buffer, zero-filled so stride padding never leaks
    /// stale bytes into encoded output.
    pub fn alloc(&self, size: usize) -> Result<DmaBuffer> {
        let mut raw: sys::MppBuffer = ptr::null_mut();
        unsafe {
            let ret = sys::mpp_buffer_get_with_tag(self.raw, &mut raw, size, caller(), caller());
            if ret != sys::MPP_OK || raw.is_null() {
                return Err(AppError::AllocFailed(format!(
                    "mpp_buffer_get({} bytes): {}",
                    size, ret
                )));
            }
            let buf = DmaBuffer { raw, size };
            ptr::write_bytes(buf.as_mut_ptr(), 0, size);
            Ok(buf)
        }
    }
}

impl Drop for BufferGroup {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_buffer_group_put(self.raw);
        }
    }
}

/// A single DMA-visible buffer handle
///
/// Must be dropped before its owning `BufferGroup`.
pub struct DmaBuffer {
    raw: sys::MppBuffer,
    size: usize,
}

impl DmaBuffer {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        unsafe { sys::mpp_buffer_get_ptr_with_caller(self.raw, caller()) as *mut u8 }
    }

    /// CPU-writable view of the buffer.
    ///
    /// The mapping stays valid for the lifetime of the handle; MPP keeps
    /// DRM buffers mapped until they are put back to the group.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.size) }
    }

    /// Flush dirty CPU cache lines so the encoder sees every write.
    ///
    /// Required after any CPU write and before submission; skipping it
    /// shows up as intermittent horizontal green/cyan artefacts.
    pub fn sync_end(&self) -> Result<()> {
        unsafe {
            let ret = sys::mpp_buffer_sync_end_f(self.raw, 0, caller());
            if ret != sys::MPP_OK {
                return Err(AppError::DmaSync(format!("mpp_buffer_sync_end: {}", ret)));
            }
        }
        Ok(())
    }

    pub(crate) fn raw(&self) -> sys::MppBuffer {
        self.raw
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_buffer_put_with_caller(self.raw, caller());
        }
    }
}

/// Input frame descriptor bound to a DMA buffer
pub struct FrameDesc {
    raw: sys::MppFrame,
}

impl FrameDesc {
    pub fn new(
        width: u32,
        height: u32,
        hor_stride: u32,
        ver_stride: u32,
        format: MppPixelFormat,
        buffer: &DmaBuffer,
    ) -> Result<Self> {
        let mut raw: sys::MppFrame = ptr::null_mut();
        unsafe {
            check(sys::mpp_frame_init(&mut raw), "mpp_frame_init")?;
            sys::mpp_frame_set_width(raw, width);
            sys::mpp_frame_set_height(raw, height);
            sys::mpp_frame_set_hor_stride(raw, hor_stride);
            sys::mpp_frame_set_ver_stride(raw, ver_stride);
            sys::mpp_frame_set_fmt(raw, raw_format(format));
            sys::mpp_frame_set_eos(raw, 0);
            sys::mpp_frame_set_buffer(raw, buffer.raw());
        }
        Ok(Self { raw })
    }
}

impl Drop for FrameDesc {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_frame_deinit(&mut self.raw);
        }
    }
}

/// Encoded packet handle
pub struct Packet {
    raw: sys::MppPacket,
}

impl Packet {
    /// Packet payload as a byte slice (valid until the packet is dropped)
    pub fn data(&self) -> &[u8] {
        unsafe {
            let pos = sys::mpp_packet_get_pos(self.raw);
            let len = sys::mpp_packet_get_length(self.raw);
            if pos.is_null() || len == 0 {
                &[]
            } else {
                std::slice::from_raw_parts(pos as *const u8, len)
            }
        }
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        unsafe {
            sys::mpp_packet_deinit(&mut self.raw);
        }
    }
}
