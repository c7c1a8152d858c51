//! Pixel format definitions and plane arithmetic

use serde::{Deserialize, Serialize};
use std::fmt;
use v4l::format::fourcc;

use crate::error::{AppError, Result};

/// Align a dimension up to the next multiple of 16 (VPU stride requirement)
pub fn align16(x: u32) -> u32 {
    (x + 15) & !15
}

/// Supported pixel formats
///
/// Strides are counted in luma samples per row; packed formats carry their
/// per-pixel bytes in the `channels` factor, not in the stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    /// NV12 semi-planar (Y plane + interleaved UV, 4:2:0)
    Nv12,
    /// NV16 semi-planar (chroma at full height, 4:2:2)
    Nv16,
    /// NV24 semi-planar (chroma at full width and height, 4:4:4)
    Nv24,
    /// YUYV 4:2:2 packed
    Yuyv,
    /// UYVY 4:2:2 packed
    Uyvy,
    /// RGB24 packed (3 bytes per pixel)
    Rgb24,
    /// BGR24 packed (3 bytes per pixel)
    Bgr24,
    /// JPEG compressed (opaque bytes, variable size)
    Jpeg,
}

impl PixelFormat {
    /// Convert to V4L2 FourCC
    pub fn to_fourcc(&self) -> fourcc::FourCC {
        match self {
            PixelFormat::Nv12 => fourcc::FourCC::new(b"NV12"),
            PixelFormat::Nv16 => fourcc::FourCC::new(b"NV16"),
            PixelFormat::Nv24 => fourcc::FourCC::new(b"NV24"),
            PixelFormat::Yuyv => fourcc::FourCC::new(b"YUYV"),
            PixelFormat::Uyvy => fourcc::FourCC::new(b"UYVY"),
            PixelFormat::Rgb24 => fourcc::FourCC::new(b"RGB3"),
            PixelFormat::Bgr24 => fourcc::FourCC::new(b"BGR3"),
            PixelFormat::Jpeg => fourcc::FourCC::new(b"JPEG"),
        }
    }

    /// Try to convert from V4L2 FourCC
    pub fn from_fourcc(fourcc: fourcc::FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"NV12" => Some(PixelFormat::Nv12),
            b"NV16" => Some(PixelFormat::Nv16),
            b"NV24" => Some(PixelFormat::Nv24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"UYVY" => Some(PixelFormat::Uyvy),
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"BGR3" => Some(PixelFormat::Bgr24),
            b"JPEG" | b"MJPG" => Some(PixelFormat::Jpeg),
            _ => None,
        }
    }

    /// Check if format is a semi-planar YUV layout (Y plane + interleaved UV)
    pub fn is_semiplanar_yuv(&self) -> bool {
        matches!(
            self,
            PixelFormat::Nv12 | PixelFormat::Nv16 | PixelFormat::Nv24
        )
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Jpeg)
    }

    /// Bytes per luma sample in a packed row (used to translate V4L2
    /// bytesperline into a sample stride)
    pub fn row_bytes_per_sample(&self) -> Option<u32> {
        match self {
            PixelFormat::Nv12 | PixelFormat::Nv16 | PixelFormat::Nv24 => Some(1),
            PixelFormat::Yuyv | PixelFormat::Uyvy => Some(2),
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Jpeg => None,
        }
    }

    /// Total bytes for one frame at the given geometry
    ///
    /// `stride` is the luma stride in samples (>= width). Fails for JPEG,
    /// whose size is carried by the payload itself.
    pub fn bytes_per_frame(&self, _width: u32, height: u32, stride: u32) -> Result<usize> {
        let stride = stride as usize;
        let height = height as usize;
        match self {
            PixelFormat::Nv12 => Ok(stride * height + stride * (height / 2)),
            PixelFormat::Nv16 => Ok(stride * height * 2),
            PixelFormat::Nv24 => Ok(stride * height * 3),
            PixelFormat::Yuyv | PixelFormat::Uyvy => Ok(stride * height * 2),
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Ok(stride * height * 3),
            PixelFormat::Jpeg => Err(AppError::UnsupportedFormat(*self)),
        }
    }

    /// Byte offsets of the Y plane and (for semi-planar formats) the UV plane
    pub fn plane_offsets(&self, _width: u32, height: u32, stride: u32) -> Result<(usize, Option<usize>)> {
        if self.is_compressed() {
            return Err(AppError::UnsupportedFormat(*self));
        }
        if self.is_semiplanar_yuv() {
            Ok((0, Some(stride as usize * height as usize)))
        } else {
            Ok((0, None))
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Nv12 => "NV12",
            PixelFormat::Nv16 => "NV16",
            PixelFormat::Nv24 => "NV24",
            PixelFormat::Yuyv => "YUYV",
            PixelFormat::Uyvy => "UYVY",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Bgr24 => "BGR24",
            PixelFormat::Jpeg => "JPEG",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NV12" => Ok(PixelFormat::Nv12),
            "NV16" => Ok(PixelFormat::Nv16),
            "NV24" => Ok(PixelFormat::Nv24),
            "YUYV" => Ok(PixelFormat::Yuyv),
            "UYVY" => Ok(PixelFormat::Uyvy),
            "RGB24" => Ok(PixelFormat::Rgb24),
            "BGR24" => Ok(PixelFormat::Bgr24),
            "JPEG" | "MJPEG" | "MJPG" => Ok(PixelFormat::Jpeg),
            _ => Err(format!("Unknown pixel format: {}", s)),
        }
    }
}

/// Resolution (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD1080: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align16() {
        assert_eq!(align16(1920), 1920);
        assert_eq!(align16(1080), 1088);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(0), 0);
        assert_eq!(align16(17), 32);
    }

    #[test]
    fn test_nv12_frame_size() {
        // 1920x1080 NV12 = Y + half-height interleaved UV
        let size = PixelFormat::Nv12.bytes_per_frame(1920, 1080, 1920).unwrap();
        assert_eq!(size, 1920 * 1080 * 3 / 2);
    }

    #[test]
    fn test_packed_frame_sizes() {
        assert_eq!(
            PixelFormat::Yuyv.bytes_per_frame(1280, 720, 1280).unwrap(),
            1280 * 720 * 2
        );
        assert_eq!(
            PixelFormat::Bgr24.bytes_per_frame(640, 480, 640).unwrap(),
            640 * 480 * 3
        );
        assert_eq!(
            PixelFormat::Nv24.bytes_per_frame(640, 480, 640).unwrap(),
            640 * 480 * 3
        );
    }

    #[test]
    fn test_stride_padding_counts() {
        // Stride larger than width must be part of the byte count
        let size = PixelFormat::Nv12.bytes_per_frame(1080, 64, align16(1080)).unwrap();
        assert_eq!(size, 1088 * 64 + 1088 * 32);
    }

    #[test]
    fn test_jpeg_is_opaque() {
        assert!(PixelFormat::Jpeg.bytes_per_frame(1920, 1080, 1920).is_err());
        assert!(PixelFormat::Jpeg.plane_offsets(1920, 1080, 1920).is_err());
    }

    #[test]
    fn test_plane_offsets() {
        let (y, uv) = PixelFormat::Nv12.plane_offsets(1920, 1080, 1920).unwrap();
        assert_eq!(y, 0);
        assert_eq!(uv, Some(1920 * 1080));

        let (_, uv) = PixelFormat::Yuyv.plane_offsets(1920, 1080, 1920).unwrap();
        assert_eq!(uv, None);
    }

    #[test]
    fn test_semiplanar_predicate() {
        for fmt in [PixelFormat::Nv12, PixelFormat::Nv16, PixelFormat::Nv24] {
            assert!(fmt.is_semiplanar_yuv());
            assert!(fmt.plane_offsets(64, 64, 64).unwrap().1.is_some());
        }
        for fmt in [
            PixelFormat::Yuyv,
            PixelFormat::Uyvy,
            PixelFormat::Rgb24,
            PixelFormat::Bgr24,
            PixelFormat::Jpeg,
        ] {
            assert!(!fmt.is_semiplanar_yuv());
        }
    }

    #[test]
    fn test_fourcc_round_trip() {
        for fmt in [
            PixelFormat::Nv12,
            PixelFormat::Nv16,
            PixelFormat::Nv24,
            PixelFormat::Yuyv,
            PixelFormat::Uyvy,
            PixelFormat::Rgb24,
            PixelFormat::Bgr24,
        ] {
            assert_eq!(PixelFormat::from_fourcc(fmt.to_fourcc()), Some(fmt));
        }
    }
}
