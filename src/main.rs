use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mpp_streamer::capture::{spawn_capture, CaptureConfig};
use mpp_streamer::state::AppState;
use mpp_streamer::stream::StreamHub;
use mpp_streamer::video::encoder::{EncoderBackend, EncoderPool, EncoderShared, PoolConfig};
use mpp_streamer::video::format::{PixelFormat, Resolution};
use mpp_streamer::video::scale::ScalePolicy;
use mpp_streamer::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// mpp-streamer command line arguments
#[derive(Parser, Debug)]
#[command(name = "mpp-streamer")]
#[command(version, about = "Lightweight MJPEG-HTTP streamer with MPP hardware encoding", long_about = None)]
struct CliArgs {
    /// Encoder backend (cpu-jpeg, mpp-jpeg)
    #[arg(long, value_name = "BACKEND", default_value_t = EncoderBackend::default_for_build())]
    encoder: EncoderBackend,

    /// Target resolution rule (native, 1080p, 2k, 4k)
    #[arg(long = "encode-scale", value_name = "POLICY", default_value = "native")]
    encode_scale: ScalePolicy,

    /// JPEG quality (1-99, 99 = best)
    #[arg(long, value_name = "N", default_value_t = 80)]
    quality: u8,

    /// Number of parallel encoder workers
    #[arg(long, value_name = "N", default_value_t = 4)]
    workers: usize,

    /// V4L2 capture device
    #[arg(short = 'd', long, value_name = "PATH", default_value = "/dev/video0")]
    device: PathBuf,

    /// Capture pixel format
    #[arg(long, value_name = "FORMAT", default_value = "NV12")]
    format: PixelFormat,

    /// Capture width
    #[arg(long, value_name = "PX", default_value_t = 1920)]
    width: u32,

    /// Capture height
    #[arg(long, value_name = "PX", default_value_t = 1080)]
    height: u32,

    /// Capture frame rate
    #[arg(long, value_name = "FPS", default_value_t = 30)]
    fps: u32,

    /// Listen address
    #[arg(short = 'a', long, value_name = "ADDRESS", default_value = "0.0.0.0")]
    address: String,

    /// HTTP port
    #[arg(short = 'p', long, value_name = "PORT", default_value_t = 8080)]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting mpp-streamer v{}", env!("CARGO_PKG_VERSION"));

    let shared = EncoderShared::new();
    let hub = Arc::new(StreamHub::new());
    let state = AppState::new(&shared, hub.clone());

    let pool = Arc::new(EncoderPool::start(
        PoolConfig {
            backend: args.encoder,
            quality: args.quality.clamp(1, 99),
            policy: args.encode_scale,
            workers: args.workers,
        },
        shared,
        hub,
    )?);

    let capture_stop = Arc::new(AtomicBool::new(false));
    let capture_handle = spawn_capture(
        CaptureConfig {
            device: args.device,
            format: args.format,
            resolution: Resolution::new(args.width, args.height),
            fps: args.fps,
        },
        pool.clone(),
        capture_stop.clone(),
    )?;

    let app = web::create_router(state);
    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C handler");
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Stop capture first so no new frames reach the workers
    capture_stop.store(true, std::sync::atomic::Ordering::Relaxed);
    if capture_handle.join().is_err() {
        tracing::warn!("Capture thread panicked during shutdown");
    }
    pool.shutdown();

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "mpp_streamer=error,tower_http=error",
        LogLevel::Warn => "mpp_streamer=warn,tower_http=warn",
        LogLevel::Info => "mpp_streamer=info,tower_http=info",
        LogLevel::Debug => "mpp_streamer=debug,tower_http=debug",
        LogLevel::Trace => "mpp_streamer=trace,tower_http=debug",
    };

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
