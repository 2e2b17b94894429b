//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle. The
//! hardware stream is opened once by [`AudioCapture::start_stream`] and
//! stays open across record toggles — [`AudioCapture::start_capture`] /
//! [`AudioCapture::stop_capture`] only flip an [`AtomicBool`], so toggling
//! is sub-millisecond. While `recording` is set, every callback buffer is
//! downmixed to mono, resampled to 16 kHz, converted to little-endian
//! 16-bit PCM, and pushed onto the bounded chunk queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::queue::ChunkSender;
use super::resample::{f32_to_pcm16, resample_to_16k, stereo_to_mono};

/// Largest chunk this capture will emit, per spec (~2 s of 16 kHz mono
/// 16-bit PCM). Device buffers are far smaller in practice; this is a
/// defensive cap, not a target size.
pub const MAX_CHUNK_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value calls `cpal::Stream::drop` which pauses/stops the
/// underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    /// Shared with the callback; toggled by `start_capture`/`stop_capture`.
    recording: Arc<AtomicBool>,
    stream: Option<StreamHandle>,
}

impl AudioCapture {
    /// Create a new [`AudioCapture`] using the system default input device.
    ///
    /// Queries the device's preferred stream configuration (sample rate,
    /// channels, buffer size) so no manual configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
            recording: Arc::new(AtomicBool::new(false)),
            stream: None,
        })
    }

    /// Open the hardware stream if it isn't already open. Idempotent.
    ///
    /// Every callback buffer is downmixed, resampled to 16 kHz, converted
    /// to PCM16, and pushed onto `queue` — but only while `recording` is
    /// set, so opening the stream does not by itself produce chunks.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`]
    /// if the platform rejects the stream configuration.
    pub fn start_stream(&mut self, queue: ChunkSender) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let recording = Arc::clone(&self.recording);

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !recording.load(Ordering::Relaxed) {
                    return;
                }
                let mono = stereo_to_mono(data, channels);
                let resampled = resample_to_16k(&mono, sample_rate);
                let mut bytes = f32_to_pcm16(&resampled);
                bytes.truncate(MAX_CHUNK_BYTES);
                queue.push(bytes);
            },
            |err: cpal::StreamError| {
                log::warn!("cpal stream callback status: {err}");
            },
            None,
        )?;

        stream.play()?;
        self.stream = Some(StreamHandle { _stream: stream });
        Ok(())
    }

    /// Close the hardware stream if open. Idempotent.
    pub fn stop_stream(&mut self) {
        self.recording.store(false, Ordering::Relaxed);
        self.stream = None;
    }

    /// Set the `recording` flag. The hardware stream must already be open
    /// via [`Self::start_stream`]; this only gates whether callback
    /// buffers are converted and enqueued.
    pub fn start_capture(&self) {
        self.recording.store(true, Ordering::Relaxed);
    }

    /// Clear the `recording` flag. The hardware stream stays open.
    pub fn stop_capture(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels the device reports.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
