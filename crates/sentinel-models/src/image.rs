//! Frame and plate image encoding.
//!
//! Frames and plate crops arrive in three shapes: a ready data URI, a bare
//! base64 JPEG, or a hex-encoded JPEG (optionally behind a `prefix,`
//! separator). Everything here is a pure transform into a displayable
//! `data:image/jpeg;base64,...` URI.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{ModelError, ModelResult};

/// Prefix for JPEG data URIs produced by this module.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Whether the payload is already a data URI.
pub fn is_data_uri(raw: &str) -> bool {
    raw.starts_with("data:")
}

/// Wrap a bare base64 JPEG frame as a data URI.
///
/// Frames that already are data URIs pass through untouched.
pub fn frame_data_uri(raw: &str) -> String {
    if is_data_uri(raw) {
        raw.to_string()
    } else {
        format!("{}{}", JPEG_DATA_URI_PREFIX, raw)
    }
}

/// Convert a hex-encoded payload to standard base64.
pub fn hex_to_base64(hex_payload: &str) -> ModelResult<String> {
    let bytes = hex::decode(hex_payload.trim())?;
    Ok(STANDARD.encode(bytes))
}

/// Convert a standard base64 payload back to lowercase hex.
pub fn base64_to_hex(b64: &str) -> ModelResult<String> {
    let bytes = STANDARD.decode(b64.trim())?;
    Ok(hex::encode(bytes))
}

/// Turn a plate image into a displayable data URI.
///
/// Data URIs are returned as-is. Anything else is treated as hex; when the
/// hex carries a `prefix,` header only the part after the first comma is
/// decoded.
pub fn plate_image_data_uri(raw: &str) -> ModelResult<String> {
    if is_data_uri(raw) {
        return Ok(raw.to_string());
    }

    let hex_payload = match raw.split_once(',') {
        Some((_, payload)) => payload,
        None => raw,
    };

    Ok(format!("{}{}", JPEG_DATA_URI_PREFIX, hex_to_base64(hex_payload)?))
}

/// Decode the bytes carried by a base64 data URI.
pub fn decode_data_uri(uri: &str) -> ModelResult<Vec<u8>> {
    if !is_data_uri(uri) {
        return Err(ModelError::MalformedDataUri("missing data: scheme".into()));
    }

    let (_, payload) = uri
        .split_once(";base64,")
        .ok_or_else(|| ModelError::MalformedDataUri("missing ;base64, marker".into()))?;

    Ok(STANDARD.decode(payload)?)
}
