use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HogError>;

#[derive(Debug, Error)]
pub enum HogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a HOG archive (missing DHF signature)")]
    BadSignature,

    #[error("archive truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("no lump named {name:?}")]
    NotFound { name: String },

    #[error("lump name {name:?} is longer than {max} characters", max = crate::MAX_NAME_LEN)]
    NameTooLong { name: String },
}

impl HogError {
    pub fn not_found(name: impl Into<String>) -> Self {
        HogError::NotFound { name: name.into() }
    }
}
