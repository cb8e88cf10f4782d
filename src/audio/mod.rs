//! Audio data types and feature extraction.
//!
//! ```text
//! AudioBuffer ──to_mono / resampled──▶ AudioBuffer (target rate, mono)
//!            ──FeatureExtractor─────▶ FeatureSequence (energy, salience,
//!                                                      onset strength)
//! ```

pub mod buffer;
pub mod features;

pub use buffer::AudioBuffer;
pub use features::{
    FeatureConfig, FeatureExtractor, FeatureFrame, FeatureSequence, InvalidAudioError,
};
