//! vitserve Core
//!
//! Types and hooks shared across vitserve components.
//!
//! This crate provides:
//! - The error taxonomy surfaced to the hosting runtime
//! - Wire types for the request envelope and prediction result
//! - The request decoder and response encoder hooks

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode_request, encode_image, encode_response};
pub use error::{Error, Result};
pub use types::{Prediction, RequestEnvelope, APPLICATION_JSON};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{decode_request, encode_response};
    pub use crate::error::{Error, Result};
    pub use crate::types::{Prediction, RequestEnvelope, APPLICATION_JSON};
}
