//! Artifact I/O: WAV audio and JSON note tracks.

use anyhow::{Context, Result};
use std::path::Path;

use crate::audio::AudioBuffer;
use crate::notes::NoteTrack;

/// Write a buffer as 16-bit PCM WAV.  Samples are clamped to `[-1, 1]`.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in audio.samples() {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(value)?;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize {}", path.display()))
}

/// Read a WAV file into an [`AudioBuffer`] of `f32` samples.
///
/// Integer PCM is scaled to `[-1, 1]`; float samples pass through.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Write a note track as pretty-printed JSON.
pub fn write_note_track(path: &Path, track: &NoteTrack) -> Result<()> {
    let json = serde_json::to_string_pretty(track).context("failed to serialize note track")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write note track to {}", path.display()))
}

pub fn read_note_track(path: &Path) -> Result<NoteTrack> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read note track from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse note track from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::TrackNote;

    #[test]
    fn wav_round_trip_preserves_shape_and_amplitude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..1600)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        let audio = AudioBuffer::new(samples, 16_000, 1);

        write_wav(&path, &audio).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert_eq!(loaded.sample_rate(), 16_000);
        assert_eq!(loaded.channels(), 1);
        assert_eq!(loaded.len(), audio.len());
        for (a, b) in audio.samples().iter().zip(loaded.samples()) {
            assert!((a - b).abs() < 1.0 / 32000.0, "sample drift: {a} vs {b}");
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hot.wav");

        let audio = AudioBuffer::new(vec![2.0, -3.0], 16_000, 1);
        write_wav(&path, &audio).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert!((loaded.samples()[0] - 1.0).abs() < 1e-3);
        assert!((loaded.samples()[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn note_track_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let track = NoteTrack {
            source_duration_secs: 2.0,
            sample_rate: 16_000,
            confidence: 0.8,
            notes: vec![TrackNote {
                onset: 0.25,
                duration: 0.5,
                pitch: 69,
                velocity: 100,
            }],
        };

        write_note_track(&path, &track).unwrap();
        assert_eq!(read_note_track(&path).unwrap(), track);
    }

    #[test]
    fn missing_note_track_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_note_track(&dir.path().join("absent.json")).is_err());
    }
}
