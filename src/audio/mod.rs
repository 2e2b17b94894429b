//! Audio pipeline — microphone capture → resample/convert → bounded queue.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → resample_to_16k
//!           → f32_to_pcm16 → ChunkSender (bounded, oldest-drop)
//! ```

pub mod capture;
pub mod queue;
pub mod resample;

pub use capture::{AudioCapture, CaptureError, StreamHandle, MAX_CHUNK_BYTES};
pub use queue::{bounded, ChunkReceiver, ChunkSender, MAX_QUEUED_CHUNKS};
pub use resample::{f32_to_pcm16, resample_to_16k, stereo_to_mono};
