use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Ways a byte stream can fail to decode into a sequence
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a {expected} file (bad signature)")]
    BadSignature { expected: &'static str },

    #[error("unsupported HMP variant {0:?}")]
    UnsupportedVariant(String),

    #[error("data ends early at offset {offset:#x}")]
    Truncated { offset: usize },

    #[error("invalid status byte {status:#04x} at offset {offset:#x}")]
    InvalidStatus { status: u8, offset: usize },

    #[error("only metrical timing with a non-zero resolution is supported")]
    UnsupportedTiming,

    #[error("malformed MIDI file: {0}")]
    Midi(#[from] midly::Error),
}

impl DecodeError {
    pub fn truncated(offset: usize) -> Self {
        DecodeError::Truncated { offset }
    }
}

/// Failure while serializing a sequence
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to write MIDI data: {0}")]
    Io(#[from] std::io::Error),
}
