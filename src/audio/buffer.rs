//! Immutable PCM audio buffer.
//!
//! [`AudioBuffer`] is the unit of hand-off between pipeline stages: the
//! generation agent produces one, the feature extractor consumes one.  It is
//! immutable after construction — derived buffers (mono downmix, resampled
//! copies) are new allocations, never in-place edits.
//!
//! # Example
//!
//! ```rust
//! use musepipe::audio::AudioBuffer;
//!
//! let audio = AudioBuffer::new(vec![0.0_f32; 32_000], 16_000, 1);
//! assert!((audio.duration_secs() - 2.0).abs() < 1e-6);
//! ```

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Interleaved `f32` PCM samples with a sample rate and channel count.
///
/// Fields are private so a buffer can never be mutated after the producing
/// stage hands it to the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Create a buffer from interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate` or `channels` is zero — both would make every
    /// downstream duration/frame calculation meaningless.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(sample_rate > 0, "AudioBuffer sample rate must be > 0");
        assert!(channels > 0, "AudioBuffer channel count must be > 0");
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample *frames* (one frame = one sample per channel).
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }

    // -----------------------------------------------------------------------
    // Derived buffers
    // -----------------------------------------------------------------------

    /// Downmix to mono by averaging all channels per frame.
    ///
    /// Returns a clone when the buffer is already mono.
    pub fn to_mono(&self) -> AudioBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        let n = self.channels as usize;
        let mono: Vec<f32> = self
            .samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect();
        AudioBuffer::new(mono, self.sample_rate, 1)
    }

    /// Resample a mono buffer to `target_rate` Hz using linear interpolation.
    ///
    /// A no-op clone when the rate already matches.  Multi-channel buffers
    /// must be downmixed first.
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        debug_assert_eq!(self.channels, 1, "resample expects a mono buffer");

        if self.sample_rate == target_rate {
            return self.clone();
        }
        if self.samples.is_empty() {
            return AudioBuffer::new(Vec::new(), target_rate, self.channels);
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let output_len = (self.samples.len() as f64 * ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = src_pos - idx as f64;

            let sample = if idx + 1 < self.samples.len() {
                // Linear interpolation between adjacent samples
                self.samples[idx] * (1.0 - frac as f32) + self.samples[idx + 1] * frac as f32
            } else if idx < self.samples.len() {
                self.samples[idx]
            } else {
                0.0
            };

            output.push(sample);
        }

        AudioBuffer::new(output, target_rate, 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Construction / accessors ------------------------------------------

    #[test]
    fn duration_accounts_for_channels() {
        // 32 000 interleaved samples, 2 channels, 16 kHz → 1 second
        let audio = AudioBuffer::new(vec![0.0; 32_000], 16_000, 2);
        assert_eq!(audio.len(), 16_000);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "sample rate must be > 0")]
    fn zero_sample_rate_panics() {
        let _ = AudioBuffer::new(vec![0.0], 0, 1);
    }

    #[test]
    #[should_panic(expected = "channel count must be > 0")]
    fn zero_channels_panics() {
        let _ = AudioBuffer::new(vec![0.0], 16_000, 0);
    }

    // ---- to_mono -----------------------------------------------------------

    #[test]
    fn mono_downmix_averages_channels() {
        let audio = AudioBuffer::new(vec![1.0, -1.0, 0.5, 0.5], 16_000, 2);
        let mono = audio.to_mono();
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.len(), 2);
        assert!((mono.samples()[0] - 0.0).abs() < 1e-6);
        assert!((mono.samples()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mono_downmix_of_mono_is_identity() {
        let audio = AudioBuffer::new(vec![0.1, 0.2, 0.3], 16_000, 1);
        assert_eq!(audio.to_mono(), audio);
    }

    // ---- resampled ---------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let audio = AudioBuffer::new((0..160).map(|i| i as f32 / 160.0).collect(), 16_000, 1);
        let out = audio.resampled(16_000);
        assert_eq!(out, audio);
    }

    #[test]
    fn resample_48k_to_16k_output_length() {
        // 480 samples @ 48 kHz = 10 ms → 160 samples @ 16 kHz
        let audio = AudioBuffer::new(vec![0.5; 480], 48_000, 1);
        let out = audio.resampled(16_000);
        assert_eq!(out.len(), 160);
        assert_eq!(out.sample_rate(), 16_000);
    }

    #[test]
    fn resample_upsamples_from_8k() {
        let audio = AudioBuffer::new(vec![0.0; 80], 8_000, 1); // 10 ms
        let out = audio.resampled(16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn resample_preserves_dc_amplitude() {
        let audio = AudioBuffer::new(vec![0.5; 480], 48_000, 1);
        let out = audio.resampled(16_000);
        for &s in out.samples() {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_empty_stays_empty() {
        let audio = AudioBuffer::new(Vec::new(), 48_000, 1);
        let out = audio.resampled(16_000);
        assert!(out.is_empty());
        assert_eq!(out.sample_rate(), 16_000);
    }
}
