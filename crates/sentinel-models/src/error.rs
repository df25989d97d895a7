//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid hex image payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Invalid base64 image payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("Sample for {sample} cannot be folded into a {summary} summary")]
    FeatureMismatch {
        summary: &'static str,
        sample: &'static str,
    },
}
