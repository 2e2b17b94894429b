//! Pre-auth audio buffer — guarantees zero-loss recording even when the
//! hotkey fires before the transport has finished authenticating.
//!
//! An ordered FIFO of PCM chunks, capped at [`MAX_CHUNKS`]. When full,
//! the oldest chunk is dropped and a single warning is logged per drop.

use std::collections::VecDeque;
use std::future::Future;

/// Hard cap on buffered chunks (~10 minutes at the chunk sizes this client
/// produces).
pub const MAX_CHUNKS: usize = 20_000;

/// Ordered FIFO of PCM chunks captured before the transport authenticates.
pub struct AudioBuffer {
    chunks: VecDeque<Vec<u8>>,
    buffering: bool,
}

impl AudioBuffer {
    /// Create an empty buffer in `buffering = true` mode.
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            buffering: true,
        }
    }

    /// Append a chunk. When the buffer is already at [`MAX_CHUNKS`], the
    /// oldest chunk is evicted first and a warning is logged.
    pub fn add(&mut self, chunk: Vec<u8>) {
        if self.chunks.len() >= MAX_CHUNKS {
            self.chunks.pop_front();
            log::warn!("audio buffer limit reached ({MAX_CHUNKS}); dropping oldest chunk");
        }
        self.chunks.push_back(chunk);
    }

    /// Move every buffered chunk through `send_fn`, in original order,
    /// atomically switching `buffering` to `false` before awaiting sends
    /// so concurrent producers route directly to the transport instead of
    /// queuing here. After this returns, the buffer is empty.
    pub async fn flush<F, Fut>(&mut self, mut send_fn: F)
    where
        F: FnMut(Vec<u8>) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.chunks.is_empty() {
            self.buffering = false;
            return;
        }

        log::info!("flushing {} buffered audio chunks", self.chunks.len());
        let to_flush = std::mem::take(&mut self.chunks);
        self.buffering = false;

        for chunk in to_flush {
            send_fn(chunk).await;
        }
        log::debug!("audio buffer flush complete");
    }

    /// Reset to empty and re-enter `buffering = true` mode.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.buffering = true;
    }

    /// True when no chunks are buffered.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Current number of buffered chunks.
    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    /// True when chunks added via [`Self::add`] should be queued rather
    /// than routed directly to the transport.
    pub fn buffering(&self) -> bool {
        self.buffering
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty_and_buffering() {
        let buf = AudioBuffer::new();
        assert!(buf.is_empty());
        assert!(buf.buffering());
        assert_eq!(buf.count(), 0);
    }

    #[test]
    fn add_increments_count_in_order() {
        let mut buf = AudioBuffer::new();
        buf.add(vec![1]);
        buf.add(vec![2]);
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn add_never_exceeds_max_chunks() {
        let mut buf = AudioBuffer::new();
        for i in 0..(MAX_CHUNKS + 10) {
            buf.add(vec![(i % 256) as u8]);
        }
        assert_eq!(buf.count(), MAX_CHUNKS);
    }

    #[test]
    fn overflow_drops_oldest_first() {
        let mut buf = AudioBuffer::new();
        for i in 0..MAX_CHUNKS {
            buf.add(vec![0, (i % 256) as u8]);
        }
        // One more push should evict chunk 0 (marker 0) and keep chunk 1..=MAX.
        buf.add(vec![1, 99]);
        assert_eq!(buf.count(), MAX_CHUNKS);
    }

    #[tokio::test]
    async fn flush_delivers_chunks_in_order_and_empties_buffer() {
        let mut buf = AudioBuffer::new();
        buf.add(vec![1]);
        buf.add(vec![2]);
        buf.add(vec![3]);

        let delivered = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let delivered_clone = delivered.clone();
        buf.flush(move |chunk| {
            let delivered = delivered_clone.clone();
            async move {
                delivered.lock().await.push(chunk);
            }
        })
        .await;

        assert!(buf.is_empty());
        assert!(!buf.buffering());
        assert_eq!(*delivered.lock().await, vec![vec![1], vec![2], vec![3]]);
    }

    #[tokio::test]
    async fn flush_on_empty_buffer_only_clears_buffering_flag() {
        let mut buf = AudioBuffer::new();
        let mut called = false;
        buf.flush(|_| {
            called = true;
            async {}
        })
        .await;
        assert!(!called);
        assert!(!buf.buffering());
    }

    #[test]
    fn clear_resets_to_empty_and_buffering() {
        let mut buf = AudioBuffer::new();
        buf.add(vec![1]);
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.buffering());
    }
}
