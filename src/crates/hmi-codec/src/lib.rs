//! Readers and writers for the sequence formats the converter handles
//!
//! - Standard MIDI Files, parsed and written with `midly`
//! - HMI "HMIMIDIP" files (.HMP for General MIDI, .HMQ for FM), read and
//!   written by hand
//!
//! Both decode into [`hmi_core::Sequence`].
//!
//! # Examples
//!
//! ```
//! use hmi_codec::{decode, encode_hmp, sniff, SourceFormat};
//! use hmi_core::{Format, Message, Sequence, Track};
//!
//! let mut track = Track::new();
//! track.push(0, Message::note_on(0, 60, 100));
//! let seq = Sequence::new(Format::Hmi, 60, vec![track]);
//!
//! let bytes = encode_hmp(&seq);
//! assert_eq!(sniff(&bytes), Some(SourceFormat::Hmp));
//! let back = decode(&bytes, SourceFormat::Hmp).unwrap();
//! assert_eq!(back.tracks.len(), 1);
//! ```

pub mod error;
pub mod hmp;
pub mod midi;
mod vlq;

pub use error::{DecodeError, EncodeError};
pub use hmp::{decode_hmp, encode_hmp};
pub use midi::{decode_midi, encode_midi};

use hmi_core::Sequence;

/// Container a byte stream is expected to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Midi,
    Hmp,
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Midi => "MIDI",
            SourceFormat::Hmp => "HMP",
        }
    }
}

/// Guess the format from the file signature
pub fn sniff(bytes: &[u8]) -> Option<SourceFormat> {
    if bytes.starts_with(midi::SIGNATURE) {
        Some(SourceFormat::Midi)
    } else if bytes.starts_with(hmp::SIGNATURE) {
        Some(SourceFormat::Hmp)
    } else {
        None
    }
}

/// Decode `bytes` as the given format
pub fn decode(bytes: &[u8], format: SourceFormat) -> Result<Sequence, DecodeError> {
    match format {
        SourceFormat::Midi => decode_midi(bytes),
        SourceFormat::Hmp => decode_hmp(bytes),
    }
}
