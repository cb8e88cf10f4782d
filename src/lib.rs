//! musepipe — media-to-music pipeline.
//!
//! Turns an image or a text idea into generated music, and recorded audio
//! into a MIDI-style note track, by sequencing a small set of agents:
//!
//! ```text
//!                 ┌─ safety gate ─▶ describe ─▶ generate ─▶ WAV
//!  request ──────┤
//!                 └─ extract ─▶ decode ─▶ transcribe ─▶ note track (JSON)
//! ```
//!
//! The [`pipeline::Orchestrator`] drives both paths through a checked state
//! machine with per-attempt metrics and cooperative cancellation.  Remote
//! agents (description, generation) sit behind async traits over a shared
//! HTTP endpoint seam; the transcription core is local DSP.

pub mod agents;
pub mod audio;
pub mod config;
pub mod metrics;
pub mod notes;
pub mod output;
pub mod pipeline;
pub mod safety;
