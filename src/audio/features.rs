//! Audio feature extraction — the front half of the transcription core.
//!
//! [`FeatureExtractor`] turns an [`AudioBuffer`] into a [`FeatureSequence`]:
//! one [`FeatureFrame`] per hop interval carrying three feature streams:
//!
//! | Stream | Description |
//! |--------|-------------|
//! | `energy` | short-time RMS over the analysis window |
//! | `salience` | per-bin amplitude on a log-spaced frequency grid |
//! | `onset_strength` | half-wave-rectified first difference of the energy envelope |
//!
//! The salience grid is constant-Q style: bin centers are spaced
//! `2^(1/bins_per_octave)` apart starting at `min_frequency_hz`.  The default
//! of 7 bins per octave matches the 7-tone scale system of the target
//! repertoire; use 12 for standard chromatic material.
//!
//! Input that is not at the configured target rate is downmixed and resampled
//! first (logged at debug level — a declared side effect, not an error).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AudioBuffer;

// ---------------------------------------------------------------------------
// InvalidAudioError
// ---------------------------------------------------------------------------

/// Reason an audio buffer cannot be analyzed.  Never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidAudioError {
    /// The buffer contains no samples.
    #[error("audio buffer is empty")]
    Empty,

    /// Every analysis frame is below the silence floor.
    #[error("audio is silent: peak frame energy {peak:.6} below threshold {threshold:.6}")]
    Silent { peak: f32, threshold: f32 },
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Analysis parameters for [`FeatureExtractor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Sample rate all input is converted to before analysis.
    pub target_sample_rate: u32,
    /// Analysis window length in samples.
    pub frame_size: usize,
    /// Hop between consecutive frames in samples.  Constant across a
    /// sequence — `hop_secs` on the output is derived from it.
    pub hop_size: usize,
    /// Salience bins per octave.  7 for the 7-tone scale system,
    /// 12 for chromatic.
    pub bins_per_octave: u32,
    /// Number of octaves covered above `min_frequency_hz`.
    pub octaves: u32,
    /// Lowest salience bin center frequency in Hz.
    pub min_frequency_hz: f32,
    /// RMS floor below which a frame counts as silent.
    pub silence_epsilon: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            frame_size: 512,
            hop_size: 160, // 10 ms at 16 kHz
            bins_per_octave: 7,
            octaves: 6,
            min_frequency_hz: 55.0,
            silence_epsilon: 1e-4,
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureFrame / FeatureSequence
// ---------------------------------------------------------------------------

/// One time-indexed row of features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    /// Frame start time in seconds from the beginning of the buffer.
    pub time_secs: f32,
    /// Short-time RMS energy.
    pub energy: f32,
    /// Rectified energy rise since the previous frame.
    pub onset_strength: f32,
    /// Amplitude per salience bin, index-aligned with
    /// [`FeatureSequence::bin_frequencies`].
    pub salience: Vec<f32>,
}

/// Ordered frame sequence plus the layout shared by every frame.
///
/// Insertion order is time order; the hop interval and bin layout are
/// constant across the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSequence {
    /// Seconds between consecutive frames.
    pub hop_secs: f32,
    /// Center frequency of each salience bin, ascending.
    pub bin_frequencies: Vec<f32>,
    pub frames: Vec<FeatureFrame>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Converts raw audio into time-indexed feature streams.
///
/// Pure CPU work, no shared state — safe to run on the blocking thread pool
/// and in parallel over independent buffers.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Analyze `audio` into a [`FeatureSequence`].
    ///
    /// Downmixes to mono and resamples to the target rate when needed.
    /// Fails with [`InvalidAudioError`] on empty input or when every frame
    /// falls below the silence floor.
    pub fn extract(&self, audio: &AudioBuffer) -> Result<FeatureSequence, InvalidAudioError> {
        if audio.is_empty() {
            return Err(InvalidAudioError::Empty);
        }

        let mono = audio.to_mono();
        let mono = if mono.sample_rate() != self.config.target_sample_rate {
            log::debug!(
                "resampling {} Hz input to {} Hz for analysis",
                mono.sample_rate(),
                self.config.target_sample_rate
            );
            mono.resampled(self.config.target_sample_rate)
        } else {
            mono
        };

        let samples = mono.samples();
        let sr = self.config.target_sample_rate as f32;
        let hop = self.config.hop_size;
        let bin_frequencies = self.bin_frequencies();

        // Energy envelope first; the silence check runs on it before the
        // (much costlier) salience pass.
        let starts: Vec<usize> = (0..samples.len()).step_by(hop).collect();
        let energies: Vec<f32> = starts
            .iter()
            .map(|&start| {
                let end = (start + self.config.frame_size).min(samples.len());
                rms(&samples[start..end])
            })
            .collect();

        let peak = energies.iter().copied().fold(0.0_f32, f32::max);
        if peak < self.config.silence_epsilon {
            return Err(InvalidAudioError::Silent {
                peak,
                threshold: self.config.silence_epsilon,
            });
        }

        let mut frames = Vec::with_capacity(starts.len());
        for (t, &start) in starts.iter().enumerate() {
            let end = (start + self.config.frame_size).min(samples.len());
            let window = &samples[start..end];

            // First frame: treat the envelope as rising from silence so an
            // onset at t=0 is detectable.
            let onset_strength = if t == 0 {
                energies[0]
            } else {
                (energies[t] - energies[t - 1]).max(0.0)
            };

            let salience = bin_frequencies
                .iter()
                .map(|&freq| bin_amplitude(window, freq, sr))
                .collect();

            frames.push(FeatureFrame {
                time_secs: start as f32 / sr,
                energy: energies[t],
                onset_strength,
                salience,
            });
        }

        Ok(FeatureSequence {
            hop_secs: hop as f32 / sr,
            bin_frequencies,
            frames,
        })
    }

    /// Log-spaced bin center frequencies:
    /// `min_frequency_hz * 2^(k / bins_per_octave)`.
    pub fn bin_frequencies(&self) -> Vec<f32> {
        let total = (self.config.octaves * self.config.bins_per_octave) as usize;
        (0..total)
            .map(|k| {
                self.config.min_frequency_hz
                    * 2.0_f32.powf(k as f32 / self.config.bins_per_octave as f32)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Per-frame math
// ---------------------------------------------------------------------------

fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    (window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32).sqrt()
}

/// Amplitude of the `freq` Hz component of `window` via a single-bin DFT
/// (Goertzel-style correlation).  Returns ≈A for a pure sine of amplitude A
/// at the bin frequency.
fn bin_amplitude(window: &[f32], freq: f32, sample_rate: f32) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let omega = 2.0 * std::f32::consts::PI * freq / sample_rate;
    let mut re = 0.0_f32;
    let mut im = 0.0_f32;
    for (n, &x) in window.iter().enumerate() {
        let phase = omega * n as f32;
        re += x * phase.cos();
        im -= x * phase.sin();
    }
    2.0 * (re * re + im * im).sqrt() / window.len() as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
