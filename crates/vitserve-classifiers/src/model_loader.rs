//! Model loading for Candle-based image classifiers

use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use vitserve_core::{Error, Result};

use crate::labels::LabelTable;
use crate::preprocessor::{ImageProcessor, ImageProcessorConfig};
use crate::vit::VitClassifier;

/// Environment variable naming the model to serve
pub const MODEL_ID_ENV: &str = "HF_MODEL_ID";

/// Model served when `HF_MODEL_ID` is unset
pub const DEFAULT_MODEL_ID: &str = "prithivMLmods/Deep-Fake-Detector-Model";

const CONFIG_FILE: &str = "config.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Configuration for loading Candle models
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Source of the model
    pub source: ModelSource,

    /// Device to run inference on
    pub device: DeviceType,
}

/// Source location for model files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Load from a local model directory
    LocalPath(PathBuf),

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
    },
}

impl ModelSource {
    /// Interpret a model identifier.
    ///
    /// An identifier naming an existing directory is loaded from disk,
    /// anything else is treated as a hub repository id.
    pub fn from_identifier(identifier: &str) -> Self {
        let path = Path::new(identifier);
        if path.is_dir() {
            Self::LocalPath(path.to_path_buf())
        } else {
            Self::HuggingFace {
                repo_id: identifier.to_string(),
                revision: None,
            }
        }
    }

    /// Human-readable identifier
    pub fn identifier(&self) -> String {
        match self {
            Self::LocalPath(path) => path.display().to_string(),
            Self::HuggingFace { repo_id, .. } => repo_id.clone(),
        }
    }
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// Fastest available: CUDA, then Metal, then CPU
    #[default]
    Auto,
    /// CPU inference (always available)
    Cpu,
    /// CUDA GPU inference
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => {
                let index = index
                    .parse()
                    .map_err(|_| Error::config(format!("Invalid device index in '{}'", s)))?;
                (kind.to_string(), index)
            }
            None => (s.clone(), 0),
        };

        match kind.as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(index)),
            "metal" | "mps" => Ok(Self::Metal(index)),
            _ => Err(Error::config(format!("Unknown device '{}'", s))),
        }
    }
}

impl DeviceType {
    /// Create the Candle device, probing accelerators for `Auto`
    pub fn create(self) -> Result<Device> {
        match self {
            Self::Auto => {
                if cuda_is_available() {
                    Self::Cuda(0).create()
                } else if metal_is_available() {
                    Self::Metal(0).create()
                } else {
                    Ok(Device::Cpu)
                }
            }
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            Self::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }
}

/// Short name of a device for logs and health output
pub fn device_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_identifier(DEFAULT_MODEL_ID)
    }
}

impl ModelConfig {
    /// Read the model identifier from `HF_MODEL_ID`, falling back to the default
    pub fn from_env() -> Self {
        let identifier = std::env::var(MODEL_ID_ENV)
            .ok()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        Self::from_identifier(&identifier)
    }

    /// Configuration for a hub id or local directory
    pub fn from_identifier(identifier: &str) -> Self {
        Self {
            source: ModelSource::from_identifier(identifier),
            device: DeviceType::Auto,
        }
    }

    /// Create a new model configuration from local path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::LocalPath(path.into()),
            device: DeviceType::Auto,
        }
    }

    /// Create a new model configuration from Hugging Face
    pub fn from_hf(repo_id: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo_id: repo_id.into(),
                revision: None,
            },
            device: DeviceType::Auto,
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set Hugging Face revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        if let ModelSource::HuggingFace { repo_id, .. } = self.source {
            self.source = ModelSource::HuggingFace {
                repo_id,
                revision: Some(revision.into()),
            };
        }
        self
    }

    /// Identifier of the configured model
    pub fn model_id(&self) -> String {
        self.source.identifier()
    }
}

/// Weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch format
    PyTorch,
}

/// Resolved on-disk locations of everything a classifier needs
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub preprocessor_config: PathBuf,
    pub weights: PathBuf,
    pub weights_format: WeightsFormat,
}

impl ModelFiles {
    /// Resolve model files, downloading from the hub when needed
    pub fn resolve(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::LocalPath(dir) => Self::from_dir(dir),
            ModelSource::HuggingFace { repo_id, revision } => Self::download(repo_id, revision.as_deref()),
        }
    }

    fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::config(format!("Model directory not found: {:?}", dir)));
        }

        let required = |name: &str| {
            let path = dir.join(name);
            if path.exists() {
                Ok(path)
            } else {
                Err(Error::config(format!("{} not found in {}", name, dir.display())))
            }
        };

        let (weights, weights_format) = if dir.join(SAFETENSORS_FILE).exists() {
            (dir.join(SAFETENSORS_FILE), WeightsFormat::SafeTensors)
        } else if dir.join(PYTORCH_FILE).exists() {
            (dir.join(PYTORCH_FILE), WeightsFormat::PyTorch)
        } else {
            return Err(Error::config(format!(
                "No model weights found in {} (tried {}, {})",
                dir.display(),
                SAFETENSORS_FILE,
                PYTORCH_FILE
            )));
        };

        Ok(Self {
            config: required(CONFIG_FILE)?,
            preprocessor_config: required(PREPROCESSOR_FILE)?,
            weights,
            weights_format,
        })
    }

    fn download(repo_id: &str, revision: Option<&str>) -> Result<Self> {
        tracing::info!("Downloading model from HuggingFace: {} @ {}", repo_id, revision.unwrap_or("main"));

        let api = Api::new()
            .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.unwrap_or("main").to_string(),
        ));

        let fetch = |name: &str| {
            tracing::debug!("Downloading {}", name);
            repo.get(name)
                .map_err(|e| Error::model(format!("Failed to download {} from {}: {}", name, repo_id, e)))
        };

        let config = fetch(CONFIG_FILE)?;
        let preprocessor_config = fetch(PREPROCESSOR_FILE)?;

        let (weights, weights_format) = match repo.get(SAFETENSORS_FILE) {
            Ok(path) => (path, WeightsFormat::SafeTensors),
            Err(e) => {
                tracing::debug!("{} unavailable ({}), trying {}", SAFETENSORS_FILE, e, PYTORCH_FILE);
                (fetch(PYTORCH_FILE)?, WeightsFormat::PyTorch)
            }
        };

        Ok(Self {
            config,
            preprocessor_config,
            weights,
            weights_format,
        })
    }

    /// Map the weights into a VarBuilder on `device`
    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        match self.weights_format {
            WeightsFormat::SafeTensors => {
                // SAFETY: the weights file is not modified while mapped
                unsafe {
                    VarBuilder::from_mmaped_safetensors(&[&self.weights], DType::F32, device)
                        .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))
                }
            }
            WeightsFormat::PyTorch => VarBuilder::from_pth(&self.weights, DType::F32, device)
                .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e))),
        }
    }
}

/// Parsed `config.json` of an image classification model
#[derive(Debug, Clone)]
pub struct ClassifierModelConfig {
    pub vit: vit::Config,
    pub labels: LabelTable,
}

impl ClassifierModelConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config {}: {}", path.display(), e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if let Some(architectures) = value.get("architectures").and_then(Value::as_array) {
            let supported = architectures
                .iter()
                .filter_map(Value::as_str)
                .any(|arch| arch == "ViTForImageClassification");
            if !supported {
                tracing::warn!(
                    "Model architectures {:?} do not include ViTForImageClassification; loading as ViT anyway",
                    architectures
                );
            }
        }

        let id2label: HashMap<String, String> = match value.get("id2label") {
            Some(map) => serde_json::from_value(map.clone())
                .map_err(|e| Error::config(format!("Invalid id2label: {}", e)))?,
            None => HashMap::new(),
        };
        let num_labels = value
            .get("num_labels")
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        let labels = LabelTable::from_id2label(&id2label, num_labels)?;

        let vit: vit::Config = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid ViT config: {}", e)))?;

        Ok(Self { vit, labels })
    }
}

/// Metadata about a loaded model
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model name/identifier
    pub name: String,

    /// Device the model was placed on
    pub device: &'static str,

    /// Number of labels
    pub num_labels: usize,

    /// Model weights path (for reference)
    pub weights_path: PathBuf,
}

/// Loaded classifier together with what was loaded
pub struct LoadedModel {
    classifier: VitClassifier,
    metadata: ModelMetadata,
}

impl LoadedModel {
    /// Load a model from configuration.
    ///
    /// Errors here are fatal to startup; there is no retry or fallback model.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let name = config.model_id();
        tracing::info!("Loading model from {}", name);

        let files = ModelFiles::resolve(&config.source)?;
        let device = config.device.create()?;

        let model_config = ClassifierModelConfig::from_file(&files.config)?;
        let processor = ImageProcessor::new(ImageProcessorConfig::from_file(&files.preprocessor_config)?)?;
        let vb = files.var_builder(&device)?;

        let metadata = ModelMetadata {
            name: name.clone(),
            device: device_label(&device),
            num_labels: model_config.labels.len(),
            weights_path: files.weights.clone(),
        };

        let classifier = VitClassifier::from_parts(
            name,
            &model_config.vit,
            processor,
            model_config.labels,
            vb,
        )?;

        tracing::info!(
            "Model loaded successfully on {} ({} labels)",
            metadata.device,
            metadata.num_labels
        );

        Ok(Self { classifier, metadata })
    }

    /// Get model metadata
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Get reference to the classifier
    pub fn classifier(&self) -> &VitClassifier {
        &self.classifier
    }

    pub fn into_parts(self) -> (VitClassifier, ModelMetadata) {
        (self.classifier, self.metadata)
    }
}
