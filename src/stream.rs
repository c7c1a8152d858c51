//! Encoded-frame distribution
//!
//! Workers publish finished JPEG packets here; HTTP consumers either
//! grab the latest completed frame or follow the live broadcast. Frame
//! ordering across workers is not preserved, so consumers always take
//! the most recent packet.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::video::frame::VideoFrame;

const BROADCAST_CAPACITY: usize = 8;

pub struct StreamHub {
    latest: ArcSwapOption<VideoFrame>,
    tx: broadcast::Sender<Arc<VideoFrame>>,
}

impl StreamHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            latest: ArcSwapOption::const_empty(),
            tx,
        }
    }

    /// Publish a finished packet (called from encoder worker threads)
    pub fn publish(&self, frame: VideoFrame) {
        let frame = Arc::new(frame);
        self.latest.store(Some(frame.clone()));
        // No receivers is fine; the latest slot still updates
        let _ = self.tx.send(frame);
    }

    /// Most recently completed packet
    pub fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.latest.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<VideoFrame>> {
        self.tx.subscribe()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::{PixelFormat, Resolution};

    #[test]
    fn test_latest_tracks_publish() {
        let hub = StreamHub::new();
        assert!(hub.latest().is_none());

        let frame = VideoFrame::from_vec(
            vec![0xFF, 0xD8, 0xFF, 0xD9],
            Resolution::new(2, 2),
            PixelFormat::Jpeg,
            0,
            7,
        );
        hub.publish(frame);

        let latest = hub.latest().unwrap();
        assert_eq!(latest.sequence, 7);
    }

    #[tokio::test]
    async fn test_subscribers_receive_packets() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe();

        let frame = VideoFrame::from_vec(
            vec![0xFF, 0xD8, 0xFF, 0xD9],
            Resolution::new(2, 2),
            PixelFormat::Jpeg,
            0,
            1,
        );
        hub.publish(frame);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.sequence, 1);
    }
}
