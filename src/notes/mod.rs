//! Note decoding: feature frames in, note events out.

pub mod decoder;
pub mod event;

pub use decoder::{DecoderParams, NoteDecoder};
pub use event::{NoteEvent, NoteTrack, TrackNote};
