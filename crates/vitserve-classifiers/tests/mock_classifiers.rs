//! Mock classifiers for testing
//!
//! Provides a configurable implementation of the ImageClassifier trait so
//! the handler contract can be exercised without model weights.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vitserve_classifiers::{
    ClassificationResult, ImageClassificationHandler, ImageClassifier, InferenceHandler, LabelTable,
    ModelContext,
};
use vitserve_core::{encode_image, Error, Prediction, Result, APPLICATION_JSON};

/// A mock classifier returning fixed logits
pub struct MockClassifier {
    labels: LabelTable,
    logits: Vec<f32>,
    fail_with: Option<String>,
    call_count: AtomicU32,
}

impl MockClassifier {
    /// Create a new mock classifier over the given labels
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: LabelTable::new(labels.iter().copied()).unwrap(),
            logits: vec![0.0; labels.len()],
            fail_with: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the logits this classifier will produce
    pub fn with_logits(mut self, logits: &[f32]) -> Self {
        self.logits = logits.to_vec();
        self
    }

    /// Make every call fail with a model error
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Get the number of times classify was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl ImageClassifier for MockClassifier {
    fn classify(&self, _image: &RgbImage) -> Result<ClassificationResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = &self.fail_with {
            return Err(Error::model(message.clone()));
        }

        let max = self.logits.iter().cloned().fold(f32::MIN, f32::max);
        let exps: Vec<f32> = self.logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        let probabilities: Vec<f32> = exps.iter().map(|e| e / total).collect();

        ClassificationResult::from_logits(&self.labels, &self.logits, &probabilities)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

fn handler_with(classifier: Arc<MockClassifier>) -> ImageClassificationHandler {
    ImageClassificationHandler::new(ModelContext::new(classifier, "mock", "cpu"))
}

fn solid_image_request(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    serde_json::json!({ "inputs": { "image": encode_image(&buf.into_inner()) } })
        .to_string()
        .into_bytes()
}

#[test]
fn test_prediction_picks_largest_logit() {
    let classifier = Arc::new(MockClassifier::new(&["Real", "Fake"]).with_logits(&[0.5, 2.5]));
    let handler = handler_with(classifier.clone());

    let (body, content_type) = handler
        .invoke(&solid_image_request(224, 224, [255, 0, 0]), APPLICATION_JSON, Some(APPLICATION_JSON))
        .unwrap();
    let prediction: Prediction = serde_json::from_str(&body).unwrap();

    assert_eq!(content_type, APPLICATION_JSON);
    assert_eq!(prediction.prediction, "Fake");
    assert_eq!(prediction.confidence, prediction.probabilities["Fake"]);
    assert!(prediction.probabilities["Fake"] > prediction.probabilities["Real"]);
    assert!((prediction.total_probability() - 1.0).abs() < 1e-4);
    assert_eq!(classifier.call_count(), 1);
}

#[test]
fn test_tied_logits_pick_first_label() {
    let classifier = Arc::new(MockClassifier::new(&["cat", "dog", "bird"]).with_logits(&[1.0, 3.0, 3.0]));
    let handler = handler_with(classifier);

    let image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
    let prediction = handler.predict(image).unwrap();

    assert_eq!(prediction.prediction, "dog");
    assert_eq!(prediction.probabilities["dog"], prediction.probabilities["bird"]);
}

#[test]
fn test_every_label_appears_once() {
    let labels = ["a", "b", "c", "d", "e"];
    let classifier = Arc::new(MockClassifier::new(&labels).with_logits(&[0.1, -0.3, 2.0, 0.0, 1.1]));
    let handler = handler_with(classifier);

    let prediction = handler.predict(RgbImage::new(1, 1)).unwrap();

    assert_eq!(prediction.probabilities.len(), labels.len());
    for label in labels {
        assert!(prediction.probabilities.contains_key(label), "missing {}", label);
    }
}

#[test]
fn test_accept_type_does_not_change_body() {
    let handler = handler_with(Arc::new(MockClassifier::new(&["Real", "Fake"]).with_logits(&[1.0, 0.0])));
    let request = solid_image_request(16, 16, [9, 9, 9]);

    let (json_body, json_type) = handler.invoke(&request, APPLICATION_JSON, Some(APPLICATION_JSON)).unwrap();
    let (text_body, text_type) = handler.invoke(&request, APPLICATION_JSON, Some("text/plain")).unwrap();

    assert_eq!(json_body, text_body);
    assert_eq!(json_type, APPLICATION_JSON);
    assert_eq!(text_type, APPLICATION_JSON);
}

#[test]
fn test_decode_errors_skip_prediction() {
    let classifier = Arc::new(MockClassifier::new(&["Real", "Fake"]));
    let handler = handler_with(classifier.clone());

    let body = br#"{"inputs": {"image": "not-base64!!"}}"#;
    let err = handler.invoke(body, APPLICATION_JSON, None).unwrap_err();

    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(classifier.call_count(), 0);
}

#[test]
fn test_model_errors_propagate() {
    let handler = handler_with(Arc::new(MockClassifier::new(&["Real"]).failing("device lost")));

    let err = handler
        .invoke(&solid_image_request(8, 8, [1, 1, 1]), APPLICATION_JSON, None)
        .unwrap_err();

    assert!(matches!(err, Error::Model(ref msg) if msg == "device lost"));
    assert!(!err.is_client_error());
}
