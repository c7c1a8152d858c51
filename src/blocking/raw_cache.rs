//! Single-slot cache of the last raw capture frame
//!
//! The blocking compositor archives the live NV12 frame here right before
//! it overwrites the encoder input, so the snapshot endpoint can still
//! serve the real capture while blocking is active.

use bytes::Bytes;
use parking_lot::Mutex;

/// A copied-out raw frame
#[derive(Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

struct Slot {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: u32,
}

/// Mutex-protected single slot; the buffer is reused across frames
pub struct RawFrameCache {
    slot: Mutex<Option<Slot>>,
}

impl RawFrameCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store a copy of the frame, growing the retained buffer as needed
    pub fn store(&self, data: &[u8], width: u32, height: u32, stride: u32) {
        let mut guard = self.slot.lock();
        let slot = guard.get_or_insert_with(|| Slot {
            data: Vec::new(),
            width: 0,
            height: 0,
            stride: 0,
        });
        slot.data.clear();
        slot.data.extend_from_slice(data);
        slot.width = width;
        slot.height = height;
        slot.stride = stride;
    }

    /// Copy the cached frame out.
    ///
    /// The lock is held only for the copy; callers never hold it across
    /// their own work.
    pub fn snapshot(&self) -> Option<RawFrame> {
        let guard = self.slot.lock();
        guard.as_ref().map(|slot| RawFrame {
            data: Bytes::copy_from_slice(&slot.data),
            width: slot.width,
            height: slot.height,
            stride: slot.stride,
        })
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for RawFrameCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_snapshot() {
        let cache = RawFrameCache::new();
        assert!(cache.snapshot().is_none());

        cache.store(&[1, 2, 3, 4], 2, 1, 2);
        let frame = cache.snapshot().unwrap();
        assert_eq!(&frame.data[..], &[1, 2, 3, 4]);
        assert_eq!((frame.width, frame.height, frame.stride), (2, 1, 2));

        // Overwrite reuses the slot
        cache.store(&[9, 9], 1, 1, 1);
        let frame = cache.snapshot().unwrap();
        assert_eq!(&frame.data[..], &[9, 9]);

        cache.clear();
        assert!(cache.snapshot().is_none());
    }
}
