//! Transcription agent: audio in, note events out.
//!
//! Wraps the feature extractor and note decoder into one stage pipeline:
//!
//! ```text
//! AudioBuffer ──extract──▶ FeatureSequence ──decode──▶ Vec<NoteEvent>
//!                                                     ──assemble──▶ TranscriptionResult
//! ```
//!
//! The stages are exposed individually so the orchestrator can advance its
//! state machine between them; `transcribe` runs all three for callers that
//! do not care.

use thiserror::Error;

use crate::audio::{AudioBuffer, FeatureExtractor, FeatureSequence, InvalidAudioError};
use crate::config::TranscriptionSettings;
use crate::notes::{NoteDecoder, NoteEvent, NoteTrack, TrackNote};

// ---------------------------------------------------------------------------
// TranscriptionError
// ---------------------------------------------------------------------------

/// Errors that can occur during transcription.
///
/// Decoding and assembly are pure computations over already-validated
/// features, so only the extraction stage can fail.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("invalid input audio: {0}")]
    Extraction(#[from] InvalidAudioError),
}

// ---------------------------------------------------------------------------
// TranscriptionResult
// ---------------------------------------------------------------------------

/// The notes recovered from one piece of audio plus an aggregate confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub notes: Vec<NoteEvent>,
    /// Aggregate confidence in `[0, 1]`; informational only, never a gate.
    pub confidence: f32,
    pub source_duration_secs: f32,
    pub sample_rate: u32,
}

impl TranscriptionResult {
    /// Convert to the persistable artifact form.
    pub fn to_track(&self) -> NoteTrack {
        NoteTrack {
            source_duration_secs: self.source_duration_secs,
            sample_rate: self.sample_rate,
            confidence: self.confidence,
            notes: self.notes.iter().map(TrackNote::from).collect(),
        }
    }

    /// Rebuild a result from a persisted track.
    pub fn from_track(track: &NoteTrack) -> Self {
        Self {
            notes: track.notes.iter().map(TrackNote::to_event).collect(),
            confidence: track.confidence,
            source_duration_secs: track.source_duration_secs,
            sample_rate: track.sample_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionAgent
// ---------------------------------------------------------------------------

/// Reasonable note densities for real music, in notes per second.  Results
/// outside this band have their confidence scaled down.
const MIN_NOTE_RATE: f32 = 0.5;
const MAX_NOTE_RATE: f32 = 8.0;

/// Threshold below which a result is flagged in the logs as low quality.
const LOW_CONFIDENCE_WARN: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct TranscriptionAgent {
    extractor: FeatureExtractor,
    decoder: NoteDecoder,
}

impl TranscriptionAgent {
    pub fn new(settings: &TranscriptionSettings) -> Self {
        Self {
            extractor: FeatureExtractor::new(settings.features.clone()),
            decoder: NoteDecoder::new(settings.decoder.clone()),
        }
    }

    /// Stage 1: audio to feature frames.
    pub fn extract(&self, audio: &AudioBuffer) -> Result<FeatureSequence, TranscriptionError> {
        Ok(self.extractor.extract(audio)?)
    }

    /// Stage 2: feature frames to note events.
    pub fn decode(&self, features: &FeatureSequence) -> Vec<NoteEvent> {
        self.decoder.decode(features)
    }

    /// Stage 3: attach source metadata and score the result.
    pub fn assemble(
        &self,
        notes: Vec<NoteEvent>,
        source_duration_secs: f32,
        sample_rate: u32,
    ) -> TranscriptionResult {
        let confidence = aggregate_confidence(&notes, source_duration_secs);
        if confidence < LOW_CONFIDENCE_WARN {
            log::warn!(
                "low transcription confidence {confidence:.2} ({} notes over {source_duration_secs:.2}s)",
                notes.len()
            );
        }
        TranscriptionResult {
            notes,
            confidence,
            source_duration_secs,
            sample_rate,
        }
    }

    /// Run all three stages.
    pub fn transcribe(&self, audio: &AudioBuffer) -> Result<TranscriptionResult, TranscriptionError> {
        let duration = audio.duration_secs();
        let sample_rate = audio.sample_rate();

        let features = self.extract(audio)?;
        let notes = self.decode(&features);
        log::debug!("decoded {} notes from {} frames", notes.len(), features.len());

        Ok(self.assemble(notes, duration, sample_rate))
    }
}

/// Mean note confidence scaled by how plausible the note density is.
///
/// Density inside `[MIN_NOTE_RATE, MAX_NOTE_RATE]` notes/s leaves the mean
/// untouched; sparser or denser results are scaled down proportionally.  No
/// notes at all scores zero.
fn aggregate_confidence(notes: &[NoteEvent], source_duration_secs: f32) -> f32 {
    if notes.is_empty() || source_duration_secs <= 0.0 {
        return 0.0;
    }

    let mean: f32 = notes.iter().map(|n| n.confidence).sum::<f32>() / notes.len() as f32;

    let rate = notes.len() as f32 / source_duration_secs;
    let density_factor = if rate < MIN_NOTE_RATE {
        rate / MIN_NOTE_RATE
    } else if rate > MAX_NOTE_RATE {
        MAX_NOTE_RATE / rate
    } else {
        1.0
    };

    (mean * density_factor).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;

    fn agent() -> TranscriptionAgent {
        TranscriptionAgent::new(&TranscriptionSettings::default())
    }

    /// 2 s of 16 kHz mono with two clean tone bursts.
    fn two_burst_audio() -> AudioBuffer {
        let rate = 16_000u32;
        let mut samples = vec![0.0f32; 2 * rate as usize];
        for (start, end, freq) in [(0.2f32, 0.6f32, 440.0f32), (1.2, 1.6, 660.0)] {
            let a = (start * rate as f32) as usize;
            let b = (end * rate as f32) as usize;
            for (i, sample) in samples[a..b].iter_mut().enumerate() {
                *sample =
                    0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin();
            }
        }
        AudioBuffer::new(samples, rate, 1)
    }

    #[test]
    fn two_bursts_become_two_ordered_notes() {
        let result = agent().transcribe(&two_burst_audio()).unwrap();

        assert_eq!(result.notes.len(), 2, "notes: {:?}", result.notes);
        assert_eq!(result.notes[0].pitch, 69); // 440 Hz = A4
        assert_eq!(result.notes[1].pitch, 76); // 660 Hz = E5
        assert!(result.notes[0].onset_secs < result.notes[1].onset_secs);
        assert!(result.notes[0].offset_secs <= result.notes[1].onset_secs);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert!((result.source_duration_secs - 2.0).abs() < 1e-6);
        assert_eq!(result.sample_rate, 16_000);
    }

    #[test]
    fn onsets_land_near_the_burst_starts() {
        let result = agent().transcribe(&two_burst_audio()).unwrap();
        assert!((result.notes[0].onset_secs - 0.2).abs() < 0.05);
        assert!((result.notes[1].onset_secs - 1.2).abs() < 0.05);
    }

    #[test]
    fn empty_audio_is_an_extraction_error() {
        let audio = AudioBuffer::new(Vec::new(), 16_000, 1);
        let err = agent().transcribe(&audio).unwrap_err();
        assert!(matches!(err, TranscriptionError::Extraction(_)));
    }

    #[test]
    fn silent_audio_is_an_extraction_error() {
        let audio = AudioBuffer::new(vec![0.0; 16_000], 16_000, 1);
        let err = agent().transcribe(&audio).unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::Extraction(InvalidAudioError::Silent { .. })
        ));
    }

    // ---- Aggregate confidence ----------------------------------------------

    #[test]
    fn no_notes_scores_zero() {
        assert_eq!(aggregate_confidence(&[], 2.0), 0.0);
    }

    #[test]
    fn in_band_density_keeps_the_mean() {
        // 2 notes over 2 s = 1.0 notes/s, inside the band.
        let notes = vec![
            NoteEvent::new(0.0, 0.5, 60, 0.8),
            NoteEvent::new(1.0, 1.5, 62, 0.6),
        ];
        let score = aggregate_confidence(&notes, 2.0);
        let mean = (notes[0].confidence + notes[1].confidence) / 2.0;
        assert!((score - mean).abs() < 1e-6);
    }

    #[test]
    fn sparse_results_are_scaled_down() {
        // 1 note over 10 s = 0.1 notes/s → factor 0.2.
        let notes = vec![NoteEvent::new(0.0, 0.5, 60, 1.0)];
        let score = aggregate_confidence(&notes, 10.0);
        assert!((score - notes[0].confidence * 0.2).abs() < 1e-6);
    }

    #[test]
    fn dense_results_are_scaled_down() {
        // 32 notes over 2 s = 16 notes/s → factor 0.5.
        let notes: Vec<NoteEvent> = (0..32)
            .map(|i| NoteEvent::new(i as f32 * 0.0625, i as f32 * 0.0625 + 0.05, 60, 0.8))
            .collect();
        let score = aggregate_confidence(&notes, 2.0);
        assert!((score - notes[0].confidence * 0.5).abs() < 1e-6);
    }

    // ---- Track round trip --------------------------------------------------

    #[test]
    fn result_round_trips_through_a_track() {
        // Binary-exact times so onset + duration reproduces each offset.
        let result = TranscriptionResult {
            notes: vec![
                NoteEvent::new(0.25, 0.75, 69, 64.0 / 127.0),
                NoteEvent::new(1.0, 1.5, 76, 100.0 / 127.0),
            ],
            confidence: 0.75,
            source_duration_secs: 2.0,
            sample_rate: 16_000,
        };
        let track = result.to_track();
        assert_eq!(TranscriptionResult::from_track(&track), result);
    }
}
