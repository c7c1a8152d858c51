//! mpp-streamer - Lightweight MJPEG-HTTP streamer core
//!
//! This crate provides the frame-encoding pipeline for mpp-streamer:
//! V4L2 capture frames in, independently decodable JPEG packets out,
//! with hardware encoding on Rockchip VPUs and an NV12 overlay/blocking
//! compositor in between.

pub mod blocking;
pub mod capture;
pub mod error;
pub mod overlay;
pub mod state;
pub mod stream;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
