//! Raw FFI declarations for librockchip_mpp
//!
//! Hand-written subset of rk_mpi.h / mpp_frame.h / mpp_buffer.h /
//! mpp_packet.h covering MJPEG encoding. The `*_with_tag` / `*_f`
//! entry points are the real exported symbols behind the C convenience
//! macros.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(dead_code)]

use std::os::raw::{c_char, c_int, c_void};

pub type MPP_RET = c_int;
pub const MPP_OK: MPP_RET = 0;

pub type MppCtx = *mut c_void;
pub type MppParam = *mut c_void;
pub type MppFrame = *mut c_void;
pub type MppPacket = *mut c_void;
pub type MppBuffer = *mut c_void;
pub type MppBufferGroup = *mut c_void;
pub type MppEncCfgPtr = *mut c_void;

// MppCtxType
pub const MPP_CTX_DEC: c_int = 0;
pub const MPP_CTX_ENC: c_int = 1;

// MppCodingType (OMX ordering)
pub const MPP_VIDEO_CODING_MJPEG: c_int = 8;

// MppFrameFormat
pub const MPP_FRAME_FMT_RGB: u32 = 0x10000;
pub const MPP_FMT_YUV420SP: u32 = 0;
pub const MPP_FMT_YUV422SP: u32 = 2;
pub const MPP_FMT_YUV422_YUYV: u32 = 8;
pub const MPP_FMT_YUV422_UYVY: u32 = 10;
pub const MPP_FMT_YUV444SP: u32 = 15;
pub const MPP_FMT_RGB888: u32 = MPP_FRAME_FMT_RGB + 6;
pub const MPP_FMT_BGR888: u32 = MPP_FRAME_FMT_RGB + 7;

// MppBufferType / MppBufferMode
pub const MPP_BUFFER_TYPE_DRM: c_int = 3;
pub const MPP_BUFFER_INTERNAL: c_int = 0;

// MpiCmd
pub const MPP_ENC_SET_CFG: c_int = 0x0032_0001;
pub const MPP_ENC_GET_CFG: c_int = 0x0032_0002;

// MppEncRcMode
pub const MPP_ENC_RC_MODE_FIXQP: c_int = 2;

/// Vendor API vtable returned by mpp_create
#[repr(C)]
pub struct MppApi {
    pub size: u32,
    pub version: u32,
    pub decode: Option<unsafe extern "C" fn(MppCtx, MppPacket, *mut MppFrame) -> MPP_RET>,
    pub decode_put_packet: Option<unsafe extern "C" fn(MppCtx, MppPacket) -> MPP_RET>,
    pub decode_get_frame: Option<unsafe extern "C" fn(MppCtx, *mut MppFrame) -> MPP_RET>,
    pub encode: Option<unsafe extern "C" fn(MppCtx, MppFrame, *mut MppPacket) -> MPP_RET>,
    pub encode_put_frame: Option<unsafe extern "C" fn(MppCtx, MppFrame) -> MPP_RET>,
    pub encode_get_packet: Option<unsafe extern "C" fn(MppCtx, *mut MppPacket) -> MPP_RET>,
    pub isp: Option<unsafe extern "C" fn(MppCtx, MppFrame, MppFrame) -> MPP_RET>,
    pub isp_put_frame: Option<unsafe extern "C" fn(MppCtx, MppFrame) -> MPP_RET>,
    pub isp_get_frame: Option<unsafe extern "C" fn(MppCtx, *mut MppFrame) -> MPP_RET>,
    pub poll: Option<unsafe extern "C" fn(MppCtx, c_int, c_int) -> MPP_RET>,
    pub dequeue: Option<unsafe extern "C" fn(MppCtx, c_int, *mut *mut c_void) -> MPP_RET>,
    pub enqueue: Option<unsafe extern "C" fn(MppCtx, c_int, *mut c_void) -> MPP_RET>,
    pub reset: Option<unsafe extern "C" fn(MppCtx) -> MPP_RET>,
    pub control: Option<unsafe extern "C" fn(MppCtx, c_int, MppParam) -> MPP_RET>,
    pub reserv: [u32; 16],
}

extern "C" {
    // Context lifecycle
    pub fn mpp_create(ctx: *mut MppCtx, mpi: *mut *mut MppApi) -> MPP_RET;
    pub fn mpp_init(ctx: MppCtx, ctx_type: c_int, coding: c_int) -> MPP_RET;
    pub fn mpp_destroy(ctx: MppCtx) -> MPP_RET;

    // Encoder configuration object
    pub fn mpp_enc_cfg_init(cfg: *mut MppEncCfgPtr) -> MPP_RET;
    pub fn mpp_enc_cfg_deinit(cfg: MppEncCfgPtr) -> MPP_RET;
    pub fn mpp_enc_cfg_set_s32(cfg: MppEncCfgPtr, name: *const c_char, val: c_int) -> MPP_RET;

    // Buffer groups and buffers
    pub fn mpp_buffer_group_get(
        group: *mut MppBufferGroup,
        buffer_type: c_int,
        mode: c_int,
        tag: *const c_char,
        caller: *const c_char,
    ) -> MPP_RET;
    pub fn mpp_buffer_group_put(group: MppBufferGroup) -> MPP_RET;
    pub fn mpp_buffer_get_with_tag(
        group: MppBufferGroup,
        buffer: *mut MppBuffer,
        size: usize,
        tag: *const c_char,
        caller: *const c_char,
    ) -> MPP_RET;
    pub fn mpp_buffer_put_with_caller(buffer: MppBuffer, caller: *const c_char) -> MPP_RET;
    pub fn mpp_buffer_get_ptr_with_caller(buffer: MppBuffer, caller: *const c_char) -> *mut c_void;
    pub fn mpp_buffer_get_size_with_caller(buffer: MppBuffer, caller: *const c_char) -> usize;
    pub fn mpp_buffer_sync_end_f(buffer: MppBuffer, ro: c_int, caller: *const c_char) -> MPP_RET;

    // Frame descriptors
    pub fn mpp_frame_init(frame: *mut MppFrame) -> MPP_RET;
    pub fn mpp_frame_deinit(frame: *mut MppFrame) -> MPP_RET;
    pub fn mpp_frame_set_width(frame: MppFrame, width: u32);
    pub fn mpp_frame_set_height(frame: MppFrame, height: u32);
    pub fn mpp_frame_set_hor_stride(frame: MppFrame, stride: u32);
    pub fn mpp_frame_set_ver_stride(frame: MppFrame, stride: u32);
    pub fn mpp_frame_set_fmt(frame: MppFrame, fmt: u32);
    pub fn mpp_frame_set_eos(frame: MppFrame, eos: u32);
    pub fn mpp_frame_set_buffer(frame: MppFrame, buffer: MppBuffer);

    // Packets
    pub fn mpp_packet_deinit(packet: *mut MppPacket) -> MPP_RET;
    pub fn mpp_packet_get_pos(packet: MppPacket) -> *mut c_void;
    pub fn mpp_packet_get_length(packet: MppPacket) -> usize;
}
