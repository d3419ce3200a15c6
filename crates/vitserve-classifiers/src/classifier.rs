//! Classifier trait and common types

use image::RgbImage;
use vitserve_core::{Error, Prediction, Result};

use crate::labels::LabelTable;

/// Trait for all image classifiers
pub trait ImageClassifier: Send + Sync {
    /// Classify a decoded RGB image
    fn classify(&self, image: &RgbImage) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Labels this classifier can produce, in class order
    fn labels(&self) -> &LabelTable;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Predicted label
    pub label: String,

    /// Probability of the predicted label (0.0-1.0)
    pub score: f32,

    /// Probability for every class, in class order
    pub all_scores: Vec<(String, f32)>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Build a result from per-class logits and their softmax probabilities.
    ///
    /// The winning class is the index of the largest logit.
    pub fn from_logits(labels: &LabelTable, logits: &[f32], probabilities: &[f32]) -> Result<Self> {
        if logits.len() != labels.len() || probabilities.len() != labels.len() {
            return Err(Error::model(format!(
                "model produced {} logits and {} probabilities for {} labels",
                logits.len(),
                probabilities.len(),
                labels.len()
            )));
        }

        let best = argmax(logits)
            .ok_or_else(|| Error::model("model produced no finite logits"))?;
        let label = labels
            .get(best)
            .ok_or_else(|| Error::model(format!("class index {} out of range", best)))?
            .to_string();

        let all_scores = labels
            .iter()
            .zip(probabilities)
            .map(|(label, prob)| (label.to_string(), *prob))
            .collect();

        Ok(Self {
            label,
            score: probabilities[best],
            all_scores,
            latency_us: 0,
        })
    }

    /// Record how long classification took
    pub fn with_latency_us(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    /// Convert into the wire-level prediction
    pub fn into_prediction(self) -> Prediction {
        Prediction::from_scores(self.label, self.all_scores)
    }
}

/// Index of the largest value; the first index wins on exact ties.
///
/// NaN values never win. Returns `None` when no value is comparable.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
