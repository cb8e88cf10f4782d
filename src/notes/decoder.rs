//! Note decoding — the back half of the transcription core.
//!
//! [`NoteDecoder`] converts a [`FeatureSequence`] into discrete
//! [`NoteEvent`]s with a threshold-and-group pass:
//!
//! 1. candidate onsets = local maxima of onset strength above
//!    `onset_threshold`; candidates within one hop of each other keep the
//!    stronger one;
//! 2. each onset extends forward while the dominant salience bin stays at or
//!    above `frame_threshold`, closing at the first sub-threshold frame, at
//!    `max_note_secs`, or at the next onset (non-overlap guarantee);
//! 3. notes shorter than `min_note_secs` merge into the preceding note when
//!    the gap is within `merge_gap_secs` and the pitch matches, else drop;
//! 4. pitch is converted to MIDI semitones; notes outside `pitch_range` drop.
//!
//! Output is ordered by onset time and non-overlapping.  An empty feature
//! sequence decodes to an empty event list — that is not an error.

use serde::{Deserialize, Serialize};

use crate::audio::FeatureSequence;
use crate::notes::NoteEvent;

// ---------------------------------------------------------------------------
// DecoderParams
// ---------------------------------------------------------------------------

/// Tuning knobs for [`NoteDecoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderParams {
    /// Minimum onset strength for a local maximum to seed a note.
    pub onset_threshold: f32,
    /// Minimum dominant-bin salience for a note to keep sounding.
    pub frame_threshold: f32,
    /// Notes shorter than this merge into a neighbor or drop.
    pub min_note_secs: f32,
    /// Maximum silence between a short note and its predecessor for a merge.
    pub merge_gap_secs: f32,
    /// Hard cap on a single note's length.
    pub max_note_secs: f32,
    /// Inclusive MIDI pitch range `(low, high)`; notes outside it drop.
    pub pitch_range: (u8, u8),
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            onset_threshold: 0.15,
            frame_threshold: 0.08,
            min_note_secs: 0.05,
            merge_gap_secs: 0.03,
            max_note_secs: 5.0,
            pitch_range: (36, 96),
        }
    }
}

// ---------------------------------------------------------------------------
// NoteDecoder
// ---------------------------------------------------------------------------

/// Threshold-and-group note decoder.  Stateless between calls.
#[derive(Debug, Clone)]
pub struct NoteDecoder {
    params: DecoderParams,
}

/// A grouped note before the duration/pitch filters run.
struct RawNote {
    onset_secs: f32,
    offset_secs: f32,
    pitch: u8,
    confidence: f32,
}

impl NoteDecoder {
    pub fn new(params: DecoderParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    /// Decode `features` into an ordered, non-overlapping note sequence.
    pub fn decode(&self, features: &FeatureSequence) -> Vec<NoteEvent> {
        if features.is_empty() {
            return Vec::new();
        }

        let onsets = self.onset_candidates(features);
        let raw = self.group_notes(features, &onsets);
        let merged = self.enforce_min_duration(raw);

        let (low, high) = self.params.pitch_range;
        merged
            .into_iter()
            .filter(|note| {
                let keep = (low..=high).contains(&note.pitch);
                if !keep {
                    log::trace!("dropping note at pitch {} outside [{low}, {high}]", note.pitch);
                }
                keep
            })
            .map(|note| NoteEvent::new(note.onset_secs, note.offset_secs, note.pitch, note.confidence))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Pass 1: onset candidates
    // -----------------------------------------------------------------------

    /// Frame indices of onset-strength local maxima above the threshold.
    /// Candidates within one hop of each other are collapsed to the stronger.
    fn onset_candidates(&self, features: &FeatureSequence) -> Vec<usize> {
        let os: Vec<f32> = features.frames.iter().map(|f| f.onset_strength).collect();
        let n = os.len();

        let mut candidates: Vec<usize> = Vec::new();
        for t in 0..n {
            if os[t] <= self.params.onset_threshold {
                continue;
            }
            let rising = t == 0 || os[t] >= os[t - 1];
            let falling = t + 1 == n || os[t] > os[t + 1];
            if !(rising && falling) {
                continue;
            }
            // Within-one-hop tie-break: keep the stronger candidate.
            if let Some(&prev) = candidates.last() {
                if t - prev <= 1 {
                    if os[t] > os[prev] {
                        let last = candidates.len() - 1;
                        candidates[last] = t;
                    }
                    continue;
                }
            }
            candidates.push(t);
        }
        candidates
    }

    // -----------------------------------------------------------------------
    // Pass 2: grouping
    // -----------------------------------------------------------------------

    fn group_notes(&self, features: &FeatureSequence, onsets: &[usize]) -> Vec<RawNote> {
        let hop = features.hop_secs;
        let frames = &features.frames;
        let max_frames = (self.params.max_note_secs / hop).round().max(1.0) as usize;

        let mut notes = Vec::with_capacity(onsets.len());
        for (i, &t0) in onsets.iter().enumerate() {
            let Some(bin) = dominant_bin(&frames[t0].salience) else {
                continue;
            };
            // The onset frame itself must be sounding, otherwise the peak was
            // broadband noise with no pitched content.
            if frames[t0].salience[bin] < self.params.frame_threshold {
                continue;
            }

            // Truncate at the next onset so output never overlaps.
            let limit = onsets.get(i + 1).copied().unwrap_or(frames.len());
            let mut end = t0 + 1;
            while end < limit
                && end - t0 < max_frames
                && frames[end].salience[bin] >= self.params.frame_threshold
            {
                end += 1;
            }

            let freq = features.bin_frequencies[bin];
            notes.push(RawNote {
                onset_secs: t0 as f32 * hop,
                offset_secs: end as f32 * hop,
                pitch: midi_from_hz(freq),
                confidence: self.note_confidence(features, t0, end, bin),
            });
        }
        notes
    }

    /// Confidence from the margins over both thresholds: how far the onset
    /// peak cleared `onset_threshold` and how far the sustained salience
    /// cleared `frame_threshold`, averaged.
    fn note_confidence(&self, features: &FeatureSequence, t0: usize, end: usize, bin: usize) -> f32 {
        let peak = features.frames[t0].onset_strength;
        let onset_margin = ((peak - self.params.onset_threshold) / peak).clamp(0.0, 1.0);

        let span = &features.frames[t0..end];
        let salience_margin = span
            .iter()
            .map(|f| {
                let s = f.salience[bin];
                if s > 0.0 {
                    ((s - self.params.frame_threshold) / s).max(0.0)
                } else {
                    0.0
                }
            })
            .sum::<f32>()
            / span.len() as f32;

        0.5 * onset_margin + 0.5 * salience_margin
    }

    // -----------------------------------------------------------------------
    // Pass 3: minimum-duration floor
    // -----------------------------------------------------------------------

    fn enforce_min_duration(&self, notes: Vec<RawNote>) -> Vec<RawNote> {
        let mut kept: Vec<RawNote> = Vec::with_capacity(notes.len());
        for note in notes {
            if note.offset_secs - note.onset_secs + 1e-6 >= self.params.min_note_secs {
                kept.push(note);
                continue;
            }
            // Too short: absorb into the previous note when it is close and
            // at the same pitch, otherwise drop.
            if let Some(prev) = kept.last_mut() {
                if note.pitch == prev.pitch
                    && note.onset_secs - prev.offset_secs <= self.params.merge_gap_secs
                {
                    prev.offset_secs = note.offset_secs;
                    continue;
                }
            }
            log::trace!(
                "dropping {:.0} ms note below the {:.0} ms floor",
                (note.offset_secs - note.onset_secs) * 1000.0,
                self.params.min_note_secs * 1000.0
            );
        }
        kept
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dominant_bin(salience: &[f32]) -> Option<usize> {
    salience
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Nearest MIDI semitone for a frequency: `69 + 12·log2(f / 440)`.
fn midi_from_hz(freq: f32) -> u8 {
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
