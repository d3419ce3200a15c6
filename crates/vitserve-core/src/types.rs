//! Wire types shared between the hooks and the hosting runtime

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only content type the decoder accepts and the encoder emits
pub const APPLICATION_JSON: &str = "application/json";

/// Incoming request envelope: `{"inputs": {"image": "<base64>"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub inputs: RequestInputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInputs {
    /// Base64-encoded image bytes (any format the image decoder understands)
    pub image: String,
}

impl RequestEnvelope {
    /// Wrap an already-encoded image payload
    pub fn new(image_base64: impl Into<String>) -> Self {
        Self {
            inputs: RequestInputs {
                image: image_base64.into(),
            },
        }
    }
}

/// Prediction returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Best label
    pub prediction: String,

    /// Probability of the best label (0.0-1.0)
    pub confidence: f32,

    /// Probability for every label the classifier knows
    pub probabilities: BTreeMap<String, f32>,
}

impl Prediction {
    /// Build a prediction from the winning label and the full score list.
    ///
    /// `confidence` is read back from the map so it is always exactly
    /// `probabilities[prediction]`.
    pub fn from_scores<I, S>(label: impl Into<String>, scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let prediction = label.into();
        let probabilities: BTreeMap<String, f32> = scores
            .into_iter()
            .map(|(label, score)| (label.into(), score))
            .collect();
        let confidence = probabilities.get(&prediction).copied().unwrap_or(0.0);

        Self {
            prediction,
            confidence,
            probabilities,
        }
    }

    /// Sum of all class probabilities
    pub fn total_probability(&self) -> f32 {
        self.probabilities.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scores_reads_confidence_from_map() {
        let prediction = Prediction::from_scores("Fake", vec![("Real", 0.25), ("Fake", 0.75)]);
        assert_eq!(prediction.prediction, "Fake");
        assert_eq!(prediction.confidence, 0.75);
        assert_eq!(prediction.probabilities.len(), 2);
        assert!((prediction.total_probability() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_serialized_field_order() {
        let prediction = Prediction::from_scores("Real", vec![("Real", 1.0)]);
        let json = serde_json::to_string(&prediction).unwrap();
        assert_eq!(
            json,
            r#"{"prediction":"Real","confidence":1.0,"probabilities":{"Real":1.0}}"#
        );
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = RequestEnvelope::new("aGVsbG8=");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["inputs"]["image"], "aGVsbG8=");
    }
}
