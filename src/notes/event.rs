//! Note events and the serialized MIDI-style note track.
//!
//! [`NoteEvent`] is the in-memory form produced by the decoder.
//! [`NoteTrack`] is the persisted artifact: a flat list of
//! `{onset, duration, pitch, velocity}` rows plus source metadata, JSON via
//! serde.  Converting a result to a track and parsing it back must reproduce
//! the event sequence exactly, which is why confidence is quantized to the
//! 0–127 velocity grid at event construction time.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NoteEvent
// ---------------------------------------------------------------------------

/// A single detected note.
///
/// Invariant: `onset_secs < offset_secs`.  Confidence lies on the
/// `k / 127` grid so velocity round-trips are lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub onset_secs: f32,
    pub offset_secs: f32,
    /// MIDI semitone number (69 = A4 = 440 Hz).
    pub pitch: u8,
    /// Detection confidence in `[0, 1]`, quantized to the velocity grid.
    pub confidence: f32,
}

impl NoteEvent {
    /// Build an event, clamping and quantizing `confidence` onto the
    /// 127-step velocity grid.
    ///
    /// # Panics
    ///
    /// Debug builds assert `onset_secs < offset_secs`.
    pub fn new(onset_secs: f32, offset_secs: f32, pitch: u8, confidence: f32) -> Self {
        debug_assert!(
            onset_secs < offset_secs,
            "note onset {onset_secs} must precede offset {offset_secs}"
        );
        let velocity = (confidence.clamp(0.0, 1.0) * 127.0).round();
        Self {
            onset_secs,
            offset_secs,
            pitch,
            confidence: velocity / 127.0,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        self.offset_secs - self.onset_secs
    }

    /// MIDI velocity equivalent of the confidence score.
    pub fn velocity(&self) -> u8 {
        (self.confidence * 127.0).round() as u8
    }
}

// ---------------------------------------------------------------------------
// NoteTrack
// ---------------------------------------------------------------------------

/// One serialized note row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackNote {
    pub onset: f32,
    pub duration: f32,
    pub pitch: u8,
    pub velocity: u8,
}

/// The persisted MIDI-like artifact for one transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTrack {
    /// Duration of the source audio in seconds.
    pub source_duration_secs: f32,
    /// Sample rate of the source audio.
    pub sample_rate: u32,
    /// Aggregate transcription confidence in `[0, 1]`.
    pub confidence: f32,
    pub notes: Vec<TrackNote>,
}

impl From<&NoteEvent> for TrackNote {
    fn from(event: &NoteEvent) -> Self {
        Self {
            onset: event.onset_secs,
            duration: event.duration_secs(),
            pitch: event.pitch,
            velocity: event.velocity(),
        }
    }
}

impl TrackNote {
    pub fn to_event(&self) -> NoteEvent {
        NoteEvent {
            onset_secs: self.onset,
            offset_secs: self.onset + self.duration,
            pitch: self.pitch,
            confidence: self.velocity as f32 / 127.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_quantized_to_velocity_grid() {
        let event = NoteEvent::new(0.25, 0.75, 69, 0.503);
        // 0.503 · 127 = 63.881 → velocity 64 → confidence 64/127
        assert_eq!(event.velocity(), 64);
        assert_eq!(event.confidence, 64.0 / 127.0);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(NoteEvent::new(0.0, 1.0, 60, 1.7).velocity(), 127);
        assert_eq!(NoteEvent::new(0.0, 1.0, 60, -0.2).velocity(), 0);
    }

    #[test]
    fn duration_is_offset_minus_onset() {
        let event = NoteEvent::new(0.5, 1.25, 72, 0.9);
        assert!((event.duration_secs() - 0.75).abs() < 1e-6);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must precede offset")]
    fn inverted_times_panic_in_debug() {
        let _ = NoteEvent::new(1.0, 0.5, 60, 0.5);
    }

    #[test]
    fn track_note_round_trips_event_exactly() {
        // Binary-exact times so onset + duration reproduces the offset.
        let event = NoteEvent::new(0.25, 0.75, 69, 64.0 / 127.0);
        let row = TrackNote::from(&event);
        assert_eq!(row.to_event(), event);
    }

    #[test]
    fn track_json_round_trip() {
        let track = NoteTrack {
            source_duration_secs: 2.0,
            sample_rate: 16_000,
            confidence: 0.5,
            notes: vec![
                TrackNote {
                    onset: 0.25,
                    duration: 0.5,
                    pitch: 69,
                    velocity: 100,
                },
                TrackNote {
                    onset: 1.0,
                    duration: 0.25,
                    pitch: 76,
                    velocity: 80,
                },
            ],
        };
        let json = serde_json::to_string(&track).unwrap();
        let parsed: NoteTrack = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, track);
    }
}
