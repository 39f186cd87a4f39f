//! Feed Codec
//!
//! JSON encoding and decoding for the Coinbase ticker feed. Each text frame
//! carries exactly one message object.

use super::messages::{FeedMessage, SubscribeRequest};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the ticker feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object or does not match
    /// the shape its `type` declares.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let trimmed = text.trim();

        if !trimmed.starts_with('{') {
            let preview: String = trimmed.chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {preview}..."
            )));
        }

        Ok(serde_json::from_str(trimmed)?)
    }

    /// Encode a subscribe request.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(&self, request: &SubscribeRequest) -> Result<String, CodecError> {
        Ok(serde_json::to_string(request)?)
    }
}
