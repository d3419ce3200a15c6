//! vitserve Classifiers
//!
//! Candle-backed image classifiers and the handler a hosting runtime drives.
//!
//! Loading happens once: [`ImageClassificationHandler::load`] resolves the
//! model id from `HF_MODEL_ID`, fetches config, preprocessor settings and
//! weights from the Hugging Face Hub (or a local directory), and places the
//! model on the fastest available device. Each request then runs through
//! [`InferenceHandler::invoke`].

pub mod classifier;
pub mod handler;
pub mod labels;
pub mod model_loader;
pub mod preprocessor;
pub mod vit;

pub use classifier::{argmax, ClassificationResult, ImageClassifier};
pub use handler::{ImageClassificationHandler, InferenceHandler, ModelContext};
pub use labels::LabelTable;
pub use model_loader::{
    device_label, DeviceType, LoadedModel, ModelConfig, ModelSource, DEFAULT_MODEL_ID, MODEL_ID_ENV,
};
pub use preprocessor::{ImageProcessor, ImageProcessorConfig};
pub use vit::VitClassifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, ImageClassifier};
    pub use crate::handler::{ImageClassificationHandler, InferenceHandler, ModelContext};
    pub use crate::model_loader::{DeviceType, ModelConfig, ModelSource};
}

/// Wrap a Candle error with context
pub(crate) fn model_err(context: &'static str) -> impl Fn(candle_core::Error) -> vitserve_core::Error {
    move |e| vitserve_core::Error::model(format!("{}: {}", context, e))
}
