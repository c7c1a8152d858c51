//! Encoder worker pool
//!
//! N OS threads, each owning one encoder instance (the vendor context is
//! not thread-safe, so an adapter never leaves its thread). Frames are
//! dispatched round-robin; a busy worker drops the frame rather than
//! queueing stale video.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::jpeg::CpuJpegEncoder;
use super::traits::{EncoderShared, FrameEncoder};
use crate::error::{AppError, Result};
use crate::stream::StreamHub;
use crate::video::frame::VideoFrame;
use crate::video::scale::ScalePolicy;

/// Per-worker queue depth; anything deeper only adds latency
const WORKER_QUEUE_DEPTH: usize = 2;
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Which encoder implementation the pool runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderBackend {
    CpuJpeg,
    MppJpeg,
}

impl EncoderBackend {
    /// Hardware when compiled in, software otherwise
    pub fn default_for_build() -> Self {
        if cfg!(feature = "mpp") {
            EncoderBackend::MppJpeg
        } else {
            EncoderBackend::CpuJpeg
        }
    }
}

impl std::str::FromStr for EncoderBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu-jpeg" => Ok(EncoderBackend::CpuJpeg),
            "mpp-jpeg" => Ok(EncoderBackend::MppJpeg),
            _ => Err(format!("Unknown encoder backend: {}", s)),
        }
    }
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::CpuJpeg => write!(f, "cpu-jpeg"),
            EncoderBackend::MppJpeg => write!(f, "mpp-jpeg"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub backend: EncoderBackend,
    pub quality: u8,
    pub policy: ScalePolicy,
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            backend: EncoderBackend::CpuJpeg,
            quality: 80,
            policy: ScalePolicy::Native,
            workers: 4,
        }
    }
}

/// Running pool handle
pub struct EncoderPool {
    senders: Vec<SyncSender<VideoFrame>>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    next: AtomicUsize,
    dropped: AtomicU64,
    stop: Arc<AtomicBool>,
}

impl EncoderPool {
    pub fn start(config: PoolConfig, shared: EncoderShared, hub: Arc<StreamHub>) -> Result<Self> {
        if config.backend == EncoderBackend::MppJpeg && !cfg!(feature = "mpp") {
            return Err(AppError::VideoError(
                "built without the `mpp` feature; use --encoder=cpu-jpeg".into(),
            ));
        }

        let workers = config.workers.clamp(1, 16);
        let stop = Arc::new(AtomicBool::new(false));
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for idx in 0..workers {
            let (tx, rx) = sync_channel::<VideoFrame>(WORKER_QUEUE_DEPTH);
            let worker_stop = stop.clone();
            let worker_hub = hub.clone();
            let worker_shared = shared.clone();
            let name = format!("enc{}", idx);

            let handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    // Construct on the owning thread; encoders never move
                    let encoder = match build_encoder(&config, &name, &worker_shared) {
                        Ok(enc) => enc,
                        Err(e) => {
                            tracing::error!("{}: failed to create encoder: {}", name, e);
                            return;
                        }
                    };
                    worker_loop(&name, rx, encoder, worker_hub, worker_stop);
                })
                .map_err(AppError::Io)?;

            senders.push(tx);
            handles.push(handle);
        }

        tracing::info!(
            "Encoder pool started: {} worker(s), backend={:?}, quality={}, scale={}",
            workers,
            config.backend,
            config.quality.clamp(1, 99),
            config.policy
        );

        Ok(Self {
            senders,
            handles: parking_lot::Mutex::new(handles),
            next: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            stop,
        })
    }

    /// Hand a captured frame to the next worker; drops it when that
    /// worker's queue is full.
    pub fn dispatch(&self, frame: VideoFrame) {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        match self.senders[idx].try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 300 == 1 {
                    tracing::debug!("worker {} busy, {} frames dropped so far", idx, dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("worker {} is gone, frame dropped", idx);
            }
        }
    }

    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop all workers and wait for them to exit
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.lock().drain(..) {
            if let Err(e) = handle.join() {
                tracing::warn!("worker thread panicked: {:?}", e);
            }
        }
        tracing::info!("Encoder pool stopped");
    }
}

fn build_encoder(
    config: &PoolConfig,
    name: &str,
    shared: &EncoderShared,
) -> Result<Box<dyn FrameEncoder>> {
    match config.backend {
        EncoderBackend::CpuJpeg => Ok(Box::new(CpuJpegEncoder::new(
            name,
            config.quality,
            shared.clone(),
        )?)),
        EncoderBackend::MppJpeg => {
            #[cfg(feature = "mpp")]
            {
                Ok(Box::new(super::mpp::MppJpegEncoder::new(
                    name,
                    config.quality,
                    config.policy,
                    shared.clone(),
                )))
            }
            #[cfg(not(feature = "mpp"))]
            {
                Err(AppError::VideoError(
                    "hardware encoder unavailable in this build".into(),
                ))
            }
        }
    }
}

fn worker_loop(
    name: &str,
    rx: Receiver<VideoFrame>,
    mut encoder: Box<dyn FrameEncoder>,
    hub: Arc<StreamHub>,
    stop: Arc<AtomicBool>,
) {
    tracing::debug!("{}: worker running ({})", name, encoder.name());
    let mut failures: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        let frame = match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match encoder.compress(&frame) {
            Ok(packet) => hub.publish(packet),
            Err(e) => {
                // One bad frame is dropped; the next one retries from
                // scratch (a failed reconfigure left the adapter Uninit)
                failures += 1;
                if failures % 60 == 1 {
                    tracing::warn!("{}: encode failed ({} so far): {}", name, failures, e);
                }
            }
        }
    }
    tracing::debug!("{}: worker exiting", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::{PixelFormat, Resolution};

    fn grey_frame(seq: u64) -> VideoFrame {
        VideoFrame::from_vec(
            vec![0x80u8; 64 * 64 * 3 / 2],
            Resolution::new(64, 64),
            PixelFormat::Nv12,
            64,
            seq,
        )
    }

    #[test]
    fn test_backend_tokens() {
        assert_eq!("cpu-jpeg".parse(), Ok(EncoderBackend::CpuJpeg));
        assert_eq!("mpp-jpeg".parse(), Ok(EncoderBackend::MppJpeg));
        assert!("vaapi".parse::<EncoderBackend>().is_err());
    }

    #[test]
    fn test_pool_encodes_frames() {
        let hub = Arc::new(StreamHub::new());
        let pool = EncoderPool::start(
            PoolConfig {
                workers: 2,
                ..Default::default()
            },
            EncoderShared::new(),
            hub.clone(),
        )
        .unwrap();

        for seq in 0..4 {
            pool.dispatch(grey_frame(seq));
        }

        // Workers publish asynchronously; poll the latest slot
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let packet = loop {
            if let Some(packet) = hub.latest() {
                break packet;
            }
            assert!(std::time::Instant::now() < deadline, "no packet within 5s");
            std::thread::sleep(Duration::from_millis(10));
        };
        assert!(packet.is_valid_jpeg());
        assert!(packet.key_frame);
        assert_eq!(packet.gop, 0);

        pool.shutdown();
    }

    #[test]
    fn test_mpp_backend_requires_feature() {
        if cfg!(feature = "mpp") {
            return;
        }
        let hub = Arc::new(StreamHub::new());
        let result = EncoderPool::start(
            PoolConfig {
                backend: EncoderBackend::MppJpeg,
                ..Default::default()
            },
            EncoderShared::new(),
            hub,
        );
        assert!(result.is_err());
    }
}
