//! Errors which can happen in various parts of the library.

use std::sync::mpsc::SendError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("invalid image variant key `{0}`")]
    InvalidVariantKey(String),
    #[error("packed atlas extent {width}x{height} exceeds the maximum atlas size")]
    AtlasOverflow { width: u32, height: u32 },
    #[error("atlas handoff channel disconnected")]
    Handoff,
}

impl<T> From<SendError<T>> for AtlasError {
    fn from(_e: SendError<T>) -> Self {
        AtlasError::Handoff
    }
}
