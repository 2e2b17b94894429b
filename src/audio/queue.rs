//! Bounded handoff between the real-time capture callback and the async
//! pipe task.
//!
//! `crossbeam-channel` gives us a lock-free MPSC queue; we bound it to
//! [`MAX_QUEUED_CHUNKS`] and drop the oldest chunk on overflow so a stalled
//! runtime can never make the callback thread's memory grow without limit.
//! The callback-side `push` never blocks.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Same cap as [`crate::buffer::MAX_CHUNKS`] — ~10 minutes of audio.
pub const MAX_QUEUED_CHUNKS: usize = 20_000;

/// Producer handle, cloned into the cpal callback.
#[derive(Clone)]
pub struct ChunkSender {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Consumer handle, owned by the pipe task.
pub struct ChunkReceiver {
    rx: Receiver<Vec<u8>>,
}

/// Create a bounded chunk queue. The sender half also holds a clone of the
/// receiver so it can drop the oldest entry on overflow without a second
/// synchronization primitive.
pub fn bounded() -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(MAX_QUEUED_CHUNKS);
    (
        ChunkSender {
            tx,
            rx: rx.clone(),
        },
        ChunkReceiver { rx },
    )
}

impl ChunkSender {
    /// Push a chunk. Never blocks: if the queue is full, the oldest queued
    /// chunk is dropped (with a warning) to make room.
    pub fn push(&self, chunk: Vec<u8>) {
        if let Err(crossbeam_channel::TrySendError::Full(chunk)) = self.tx.try_send(chunk) {
            if self.rx.try_recv().is_ok() {
                log::warn!(
                    "chunk queue limit reached ({MAX_QUEUED_CHUNKS}); dropping oldest chunk"
                );
            }
            // Best-effort: if another consumer raced us and drained a slot,
            // this may still fail; in that vanishingly unlikely case the
            // chunk is dropped rather than blocking the real-time thread.
            let _ = self.tx.try_send(chunk);
        }
    }
}

impl ChunkReceiver {
    /// Pop a chunk with a short poll timeout, matching the controller's
    /// pipe-task loop (~100 ms per spec).
    pub async fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Vec<u8>> {
        match self.rx.try_recv() {
            Ok(chunk) => return Some(chunk),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {}
        }
        tokio::time::sleep(timeout).await;
        self.rx.try_recv().ok()
    }

    /// True if no chunks are currently queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
