//! Resampling and int16 conversion — the two conversion steps between a
//! raw cpal callback buffer and a wire-ready PCM chunk.
//!
//! 1. [`resample_to_16k`] — linear-interpolation resample to 16 000 Hz.
//! 2. [`f32_to_pcm16`] — clip to `[-1.0, 1.0]` and scale to signed 16-bit.

const TARGET_RATE: u32 = 16_000;

/// Resample `samples` (mono `f32`) from `source_rate` Hz to 16 000 Hz using
/// linear interpolation. The output frame count is
/// `round(samples.len() * 16000 / source_rate)`.
///
/// * If `source_rate == 16_000` the input is cloned unchanged (no-op fast
///   path).
/// * An empty input returns an empty output.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == TARGET_RATE {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = TARGET_RATE as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels. `channels == 1` is a zero-copy fast path; `channels == 0`
/// returns an empty vector.
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Clip each sample to `[-1.0, 1.0]` and scale to a little-endian signed
/// 16-bit PCM byte stream: `int16 = round(sample * 32767)`, saturating.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let scaled = (clamped * 32767.0).round();
        let int16 = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&int16.to_le_bytes());
    }
    bytes
}
