//! Request decoder and response encoder hooks
//!
//! Both hooks are pure functions of their inputs. The decoder turns a JSON
//! envelope carrying a base64 image into an RGB raster; the encoder always
//! produces JSON, whatever accept type the caller asked for.

use crate::error::{Error, Result};
use crate::types::{Prediction, RequestEnvelope, APPLICATION_JSON};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Decode a request body into an RGB image.
///
/// Only `application/json` bodies of the form
/// `{"inputs": {"image": "<base64>"}}` are accepted.
pub fn decode_request(body: &[u8], content_type: &str) -> Result<RgbImage> {
    info!("Received request with content type: {}", content_type);

    if content_type != APPLICATION_JSON {
        warn!("Rejecting request with content type {}", content_type);
        return Err(Error::unsupported_media_type(content_type));
    }

    let payload: Value = serde_json::from_slice(body).map_err(|e| {
        warn!("Request body is not valid JSON: {}", e);
        Error::from(e)
    })?;

    let envelope: RequestEnvelope = serde_json::from_value(payload).map_err(|e| {
        warn!("Request body is missing inputs.image: {}", e);
        Error::InvalidInput
    })?;

    let bytes = decode_base64(&envelope.inputs.image).map_err(|e| {
        warn!("Image payload failed base64 decoding: {}", e);
        e
    })?;
    debug!("Decoded {} image bytes", bytes.len());

    let image = image::load_from_memory(&bytes)
        .map_err(|e| {
            warn!("Image payload is not a decodable image: {}", e);
            Error::from(e)
        })?
        .to_rgb8();

    debug!("Decoded {}x{} RGB image", image.width(), image.height());
    Ok(image)
}

/// Serialize a prediction, returning the body and its actual content type.
///
/// The content type is always `application/json`.
pub fn encode_response(prediction: &Prediction, accept: Option<&str>) -> Result<(String, &'static str)> {
    info!("Formatting output with accept type: {}", accept.unwrap_or("<unset>"));

    let body = serde_json::to_string(prediction)?;

    if accept != Some(APPLICATION_JSON) {
        debug!("Accept type not JSON; responding with {} anyway", APPLICATION_JSON);
    }

    Ok((body, APPLICATION_JSON))
}

/// Base64-encode raw image bytes for a request envelope
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, tolerating line breaks and other ASCII whitespace
fn decode_base64(data: &str) -> Result<Vec<u8>> {
    if data.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return Ok(STANDARD.decode(compact)?);
    }
    Ok(STANDARD.decode(data)?)
}
