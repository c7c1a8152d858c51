//! Video frame data structures

use bytes::Bytes;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// A video frame with metadata
///
/// Owned payload plus the geometry/timing fields the pipeline threads
/// through from capture to HTTP delivery.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw frame data
    data: Bytes,
    /// Frame resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: PixelFormat,
    /// Luma stride in samples per row
    pub stride: u32,
    /// Bytes of `data` that carry payload
    pub used_bytes: usize,
    /// Whether this is a key frame (JPEG packets always are)
    pub key_frame: bool,
    /// GOP index (0 for JPEG)
    pub gop: u32,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub capture_ts: Instant,
    /// Set when an encoder picks the frame up
    pub encode_begin_ts: Option<Instant>,
    /// Set when encoding completed successfully
    pub encode_end_ts: Option<Instant>,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(
        data: Bytes,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        let used_bytes = data.len();
        Self {
            data,
            resolution,
            format,
            stride,
            used_bytes,
            key_frame: true,
            gop: 0,
            sequence,
            capture_ts: Instant::now(),
            encode_begin_ts: None,
            encode_end_ts: None,
        }
    }

    /// Create a frame from a Vec<u8>
    pub fn from_vec(
        data: Vec<u8>,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self::new(Bytes::from(data), resolution, format, stride, sequence)
    }

    /// Get frame data as a byte slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get frame data as Bytes (cheap clone)
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// Check that the payload length matches what the format implies.
    ///
    /// JPEG frames are exempt; their size is whatever the encoder emitted.
    pub fn has_expected_size(&self) -> bool {
        match self
            .format
            .bytes_per_frame(self.width(), self.height(), self.stride)
        {
            Ok(expected) => self.used_bytes == expected,
            Err(_) => self.format.is_compressed(),
        }
    }

    /// Validate JPEG payload framing (SOI ... EOI)
    pub fn is_valid_jpeg(&self) -> bool {
        self.format.is_compressed() && Self::is_valid_jpeg_bytes(self.data())
    }

    /// Validate JPEG bytes without constructing a frame
    pub fn is_valid_jpeg_bytes(data: &[u8]) -> bool {
        if data.len() < 4 {
            return false;
        }
        if data[0] != 0xFF || data[1] != 0xD8 {
            return false;
        }
        let end = data.len();
        data[end - 2] == 0xFF && data[end - 1] == 0xD9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_used_bytes_invariant() {
        let res = Resolution::new(64, 48);
        let data = vec![0u8; 64 * 48 * 3 / 2];
        let frame = VideoFrame::from_vec(data, res, PixelFormat::Nv12, 64, 0);
        assert!(frame.has_expected_size());
        assert_eq!(frame.used_bytes, 64 * 48 + (64 * 48) / 2);
    }

    #[test]
    fn test_short_payload_rejected() {
        let res = Resolution::new(64, 48);
        let data = vec![0u8; 64 * 48];
        let frame = VideoFrame::from_vec(data, res, PixelFormat::Nv12, 64, 0);
        assert!(!frame.has_expected_size());
    }

    #[test]
    fn test_jpeg_framing() {
        assert!(VideoFrame::is_valid_jpeg_bytes(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]));
        assert!(!VideoFrame::is_valid_jpeg_bytes(&[0xFF, 0xD8, 0x00, 0x00]));
        assert!(!VideoFrame::is_valid_jpeg_bytes(&[0x00, 0xD8, 0xFF, 0xD9]));
        assert!(!VideoFrame::is_valid_jpeg_bytes(&[0xFF, 0xD8]));
    }
}
