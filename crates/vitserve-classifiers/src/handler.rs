//! Host contract for serving a classifier
//!
//! A hosting runtime drives an [`InferenceHandler`] in two phases: it
//! constructs the handler once (the load hook), then calls
//! decode → predict → encode for every request.

use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use vitserve_core::{decode_request, encode_response, Prediction, Result};

use crate::classifier::ImageClassifier;
use crate::model_loader::{LoadedModel, ModelConfig};

/// Per-request hooks a hosting runtime calls in order
pub trait InferenceHandler: Send + Sync {
    /// Parsed request payload
    type Input;

    /// Model output before serialization
    type Output;

    /// Turn a raw request body into model input
    fn decode(&self, body: &[u8], content_type: &str) -> Result<Self::Input>;

    /// Run the model on decoded input
    fn predict(&self, input: Self::Input) -> Result<Self::Output>;

    /// Serialize output, returning the body and its actual content type
    fn encode(&self, output: &Self::Output, accept: Option<&str>) -> Result<(String, &'static str)>;

    /// Run decode → predict → encode for one request
    fn invoke(&self, body: &[u8], content_type: &str, accept: Option<&str>) -> Result<(String, &'static str)> {
        let input = self.decode(body, content_type)?;
        let output = self.predict(input)?;
        self.encode(&output, accept)
    }
}

/// Everything loaded once at startup and shared read-only afterwards
#[derive(Clone)]
pub struct ModelContext {
    classifier: Arc<dyn ImageClassifier>,
    model_id: String,
    device: String,
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("classifier", &self.classifier.name())
            .field("model_id", &self.model_id)
            .field("device", &self.device)
            .finish()
    }
}

impl ModelContext {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        model_id: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            model_id: model_id.into(),
            device: device.into(),
        }
    }

    pub fn classifier(&self) -> &Arc<dyn ImageClassifier> {
        &self.classifier
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Device the model was placed on (`cpu`, `cuda`, `metal`)
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl From<LoadedModel> for ModelContext {
    fn from(loaded: LoadedModel) -> Self {
        let (classifier, metadata) = loaded.into_parts();
        Self::new(Arc::new(classifier), metadata.name, metadata.device)
    }
}

/// Image classification over the JSON/base64 request contract
#[derive(Debug, Clone)]
pub struct ImageClassificationHandler {
    context: Arc<ModelContext>,
}

impl ImageClassificationHandler {
    /// Load hook.
    ///
    /// The model comes from `HF_MODEL_ID` (or the default model), not from
    /// `model_dir`; the directory is only logged.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Load hook called with model_dir {}", model_dir.as_ref().display());
        Self::from_config(&ModelConfig::from_env())
    }

    /// Load the model described by `config`
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let loaded = LoadedModel::load(config)?;
        Ok(Self::new(loaded.into()))
    }

    /// Wrap an already-loaded context
    pub fn new(context: ModelContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }
}

impl InferenceHandler for ImageClassificationHandler {
    type Input = RgbImage;
    type Output = Prediction;

    fn decode(&self, body: &[u8], content_type: &str) -> Result<RgbImage> {
        decode_request(body, content_type)
    }

    fn predict(&self, image: RgbImage) -> Result<Prediction> {
        let result = self.context.classifier.classify(&image)?;
        let latency_us = result.latency_us;
        let prediction = result.into_prediction();

        match serde_json::to_string(&prediction) {
            Ok(json) => tracing::info!("Prediction complete in {}us: {}", latency_us, json),
            Err(_) => tracing::info!("Prediction complete in {}us: {}", latency_us, prediction.prediction),
        }
        Ok(prediction)
    }

    fn encode(&self, prediction: &Prediction, accept: Option<&str>) -> Result<(String, &'static str)> {
        encode_response(prediction, accept)
    }
}
