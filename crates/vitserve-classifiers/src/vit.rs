//! Vision Transformer image classifier

use candle_core::{DType, Device, D};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use image::RgbImage;
use std::time::Instant;
use vitserve_core::Result;

use crate::classifier::{ClassificationResult, ImageClassifier};
use crate::labels::LabelTable;
use crate::model_err;
use crate::preprocessor::ImageProcessor;

/// ViT classification model with its matching preprocessor.
///
/// Candle never records gradients for weights read from a VarBuilder and
/// the ViT forward pass has no dropout, so every call is a deterministic
/// inference-only pass.
pub struct VitClassifier {
    name: String,
    model: vit::Model,
    processor: ImageProcessor,
    labels: LabelTable,
    device: Device,
}

impl VitClassifier {
    /// Build the model from weights exposed by `vb`.
    ///
    /// The model and every per-request tensor live on `vb`'s device.
    pub fn from_parts(
        name: impl Into<String>,
        config: &vit::Config,
        processor: ImageProcessor,
        labels: LabelTable,
        vb: VarBuilder,
    ) -> Result<Self> {
        let device = vb.device().clone();
        let model = vit::Model::new(config, labels.len(), vb)
            .map_err(model_err("Failed to build ViT model"))?;

        Ok(Self {
            name: name.into(),
            model,
            processor,
            labels,
            device,
        })
    }

    /// Device the model weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }
}

impl ImageClassifier for VitClassifier {
    fn classify(&self, image: &RgbImage) -> Result<ClassificationResult> {
        let start = Instant::now();
        tracing::debug!("Processing image for prediction");

        let pixel_values = self.processor.preprocess(image, &self.device)?;

        let logits = self
            .model
            .forward(&pixel_values)
            .map_err(model_err("Model forward pass failed"))?
            .to_dtype(DType::F32)
            .map_err(model_err("Failed to convert logits"))?;

        let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)
            .map_err(model_err("Softmax failed"))?
            .squeeze(0)
            .map_err(model_err("Squeeze failed"))?
            .to_vec1::<f32>()
            .map_err(model_err("Failed to convert probabilities"))?;

        let logits = logits
            .squeeze(0)
            .map_err(model_err("Squeeze failed"))?
            .to_vec1::<f32>()
            .map_err(model_err("Failed to convert logits"))?;

        let result = ClassificationResult::from_logits(&self.labels, &logits, &probabilities)?
            .with_latency_us(start.elapsed().as_micros() as u64);

        tracing::debug!(
            "Classified as {} ({:.4}) in {}us",
            result.label,
            result.score,
            result.latency_us
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preprocessor::ImageProcessorConfig;
    use candle_nn::VarMap;
    use image::Rgb;

    /// A randomly initialised two-layer ViT small enough for unit tests
    pub(crate) fn tiny_vit(labels: &[&str]) -> VitClassifier {
        let config: vit::Config = serde_json::from_value(serde_json::json!({
            "hidden_size": 32,
            "num_hidden_layers": 2,
            "num_attention_heads": 4,
            "intermediate_size": 64,
            "hidden_act": "gelu",
            "layer_norm_eps": 1e-12,
            "image_size": 32,
            "patch_size": 16,
            "num_channels": 3,
            "qkv_bias": true
        }))
        .unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let processor = ImageProcessor::new(ImageProcessorConfig::default().with_size(32)).unwrap();

        VitClassifier::from_parts(
            "tiny-vit",
            &config,
            processor,
            LabelTable::new(labels.iter().copied()).unwrap(),
            vb,
        )
        .unwrap()
    }

    #[test]
    fn test_classify_returns_distribution_over_all_labels() {
        let classifier = tiny_vit(&["Real", "Fake", "Unsure"]);
        let image = RgbImage::from_pixel(224, 224, Rgb([120, 40, 200]));

        let result = classifier.classify(&image).unwrap();

        assert_eq!(result.all_scores.len(), 3);
        let total: f32 = result.all_scores.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-4, "probabilities sum to {}", total);
        assert!(classifier.labels().index_of(&result.label).is_some());

        let best = result
            .all_scores
            .iter()
            .map(|(_, p)| *p)
            .fold(f32::MIN, f32::max);
        assert_eq!(result.score, best);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = tiny_vit(&["Real", "Fake"]);
        let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 17]));

        let first = classifier.classify(&image).unwrap();
        let second = classifier.classify(&image).unwrap();

        assert_eq!(first.label, second.label);
        assert_eq!(first.all_scores, second.all_scores);
    }
}
