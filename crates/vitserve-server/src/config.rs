//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vitserve_classifiers::{DeviceType, ModelConfig};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Model id or local model directory; `HF_MODEL_ID` when unset
    #[serde(default)]
    pub model_id: Option<String>,

    /// Hugging Face revision
    #[serde(default)]
    pub revision: Option<String>,

    /// Inference device (auto, cpu, cuda, cuda:N, metal)
    #[serde(default = "default_device")]
    pub device: String,

    /// Directory the hosting platform mounts model artifacts into
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(model_id) = &cli.model_id {
            config.model_id = Some(model_id.clone());
        }

        if let Some(device) = &cli.device {
            config.device = device.clone();
        }

        if let Some(model_dir) = &cli.model_dir {
            config.model_dir = model_dir.clone();
        }

        Ok(config)
    }

    /// Model loading configuration.
    ///
    /// Falls back to the same `HF_MODEL_ID` resolution as the load hook.
    pub fn model_config(&self) -> anyhow::Result<ModelConfig> {
        let device: DeviceType = self.device.parse()?;

        let mut model = match &self.model_id {
            Some(id) => ModelConfig::from_identifier(id),
            None => ModelConfig::from_env(),
        };
        if let Some(revision) = &self.revision {
            model = model.with_revision(revision.clone());
        }

        Ok(model.with_device(device))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            model_id: None,
            revision: None,
            device: default_device(),
            model_dir: default_model_dir(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("/opt/ml/model")
}

// Hosted real-time endpoints cap payloads at 6 MiB
fn default_max_body_bytes() -> usize {
    6 * 1024 * 1024
}
