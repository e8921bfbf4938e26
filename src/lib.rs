//! Converter between Standard MIDI Files and Descent HMP/HMQ music
//!
//! Paths may name plain files or lumps inside a HOG archive
//! (`missions/songs.hog/game01.hmp`). See [`convert_midi_to_hmp`] and
//! [`convert_hmp_to_midi`] for the two directions.

pub mod convert;
pub mod inspect;
pub mod location;
pub mod logging;
pub mod prompt;

pub use convert::{
    convert_hmp_to_midi, convert_midi_to_hmp, ConvertError, ConvertOptions, Outcome,
};
pub use location::{ContainerCache, Location};
pub use prompt::{Confirm, TerminalConfirm};
