//! Error types for vitserve

/// Result type alias using vitserve's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned when the request envelope lacks `inputs.image`
pub const INVALID_INPUT_MESSAGE: &str =
    "Invalid input format - expected 'inputs.image' with base64 data";

/// Core error type for vitserve operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request body declared a content type other than JSON
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// Request envelope is valid JSON but has the wrong shape
    #[error("{}", INVALID_INPUT_MESSAGE)]
    InvalidInput,

    /// Image payload is not valid base64 or not a decodable image
    #[error("decode error: {0}")]
    Decode(String),

    /// Model fetch, construction, or forward pass errors
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new unsupported media type error
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(content_type.into())
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType(_)
                | Self::InvalidInput
                | Self::Decode(_)
                | Self::Serialization(_)
        )
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(format!("invalid base64 payload: {err}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(format!("invalid image payload: {err}"))
    }
}
