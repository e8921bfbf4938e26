//! Core types and normalization passes for Descent HMP/HMQ music
//!
//! This crate holds the in-memory sequence model shared by the codecs and the
//! converter, plus the edits applied to a sequence when moving between
//! Standard MIDI Files and the HMI format read by the game's sound driver.
//!
//! # Examples
//!
//! ```
//! use hmi_core::{prepare_for_hmp, Message, Sequence, Track, Format};
//!
//! let mut track = Track::new();
//! track.push(0, Message::note_on(3, 60, 100));
//! track.push(96, Message::note_off(3, 60, 0));
//!
//! let mut seq = Sequence::new(Format::Parallel, 96, vec![track]);
//! prepare_for_hmp(&mut seq);
//!
//! assert_eq!(seq.ppqn, 60);
//! assert_eq!(seq.format, Format::Hmi);
//! ```
//!
//! # Main Components
//!
//! - **Sequence / Track / Message**: the decoded sequence model
//! - **transform**: tempo normalization, PPQN rescale, volume backfill, stripping
//! - **remap**: FM bank program remap tables
//! - **ticks**: the single rounding rule used for every time conversion

pub mod model;
pub mod remap;
pub mod ticks;
pub mod transform;

#[cfg(test)]
mod transform_tests;

pub use model::{controller, Format, Message, Sequence, TimedEvent, Track};
pub use remap::{FmBank, ProgramMap};
pub use transform::{
    backfill_channel_volume, normalize_tempo, prepare_for_hmp, prepare_for_midi, remap_programs,
    rescale, strip_unsupported, TempoMap, HMP_PPQN, MIDI_PPQN, NOMINAL_TEMPO,
};
