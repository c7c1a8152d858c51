//! V4L2 capture loop
//!
//! A thin mmap capture thread that feeds raw frames into the encoder
//! pool. Device hotplug and recovery live with the operator, not here.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info, warn};
use v4l::buffer::Type as BufferType;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format};

use crate::error::{AppError, Result};
use crate::video::encoder::EncoderPool;
use crate::video::format::{PixelFormat, Resolution};
use crate::video::frame::VideoFrame;

/// Frames smaller than this are truncated capture artefacts
const MIN_CAPTURE_FRAME_SIZE: usize = 128;
const CAPTURE_BUFFERS: u32 = 4;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: PathBuf,
    pub format: PixelFormat,
    pub resolution: Resolution,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            format: PixelFormat::Nv12,
            resolution: Resolution::HD1080,
            fps: 30,
        }
    }
}

/// Start the capture thread. Frames are dispatched to the pool until
/// `stop` is raised or the device goes away.
pub fn spawn_capture(
    config: CaptureConfig,
    pool: Arc<EncoderPool>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    if config.format.is_compressed() {
        return Err(AppError::UnsupportedFormat(config.format));
    }

    std::thread::Builder::new()
        .name("capture".into())
        .spawn(move || capture_loop(config, pool, stop))
        .map_err(AppError::Io)
}

fn capture_loop(config: CaptureConfig, pool: Arc<EncoderPool>, stop: Arc<AtomicBool>) {
    let device = match Device::with_path(&config.device) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to open {}: {}", config.device.display(), e);
            return;
        }
    };

    let requested = Format::new(
        config.resolution.width,
        config.resolution.height,
        config.format.to_fourcc(),
    );
    let actual = match device.set_format(&requested) {
        Ok(f) => f,
        Err(e) => {
            error!("set_format failed on {}: {}", config.device.display(), e);
            return;
        }
    };

    let format = PixelFormat::from_fourcc(actual.fourcc).unwrap_or(config.format);
    let resolution = Resolution::new(actual.width, actual.height);
    let stride = match format.row_bytes_per_sample() {
        Some(bps) if actual.stride > 0 => actual.stride / bps,
        _ => actual.width,
    };

    info!(
        "Capture format: {} {} stride={} ({} bytes/row)",
        format, resolution, stride, actual.stride
    );

    if config.fps > 0 {
        if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
            warn!("Failed to set hardware FPS: {}", e);
        }
    }

    let mut stream = match MmapStream::with_buffers(&device, BufferType::VideoCapture, CAPTURE_BUFFERS)
    {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create capture stream: {}", e);
            return;
        }
    };

    let mut sequence: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        let (buf, meta) = match stream.next() {
            Ok(data) => data,
            Err(e) => {
                if e.kind() == io::ErrorKind::TimedOut {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                    continue;
                }
                let device_lost = matches!(e.raw_os_error(), Some(6 | 19 | 5 | 32 | 108));
                if device_lost {
                    error!("Video device lost: {} - {}", config.device.display(), e);
                    return;
                }
                error!("Capture error: {}", e);
                continue;
            }
        };

        let frame_size = meta.bytesused as usize;
        if frame_size < MIN_CAPTURE_FRAME_SIZE {
            continue;
        }

        let frame = VideoFrame::from_vec(
            buf[..frame_size].to_vec(),
            resolution,
            format,
            stride,
            sequence,
        );
        sequence = sequence.wrapping_add(1);
        pool.dispatch(frame);
    }

    info!("Capture loop stopped after {} frames", sequence);
}
