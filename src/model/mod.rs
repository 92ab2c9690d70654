//! Trained coverage models and their persisted artifact form.

mod store;
mod train;

use std::fmt;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::ml::forest::ForestRegressor;
use crate::ml::mlp::MlpRegressor;

pub use store::{Cached, ModelStore, StoreError};
pub use train::{Fit, MIN_TRAINING_SAMPLES, TrainError, Trainer};

/// Current artifact layout version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Regression algorithm family used for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Bagged regression trees; robust on small, irregular sample sets.
    #[default]
    Ensemble,
    /// Feed-forward network; smoother interpolation on dense data.
    Neural,
}

impl ModelVariant {
    /// Parse a user-supplied variant name, falling back to [`ModelVariant::Ensemble`].
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "neural" | "mlp" | "nn" => Self::Neural,
            _ => Self::Ensemble,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ensemble => "ensemble",
            Self::Neural => "neural",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted model state tagged by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", content = "state", rename_all = "snake_case")]
pub enum Regressor {
    Ensemble(ForestRegressor),
    Neural(MlpRegressor),
}

impl Regressor {
    pub fn variant(&self) -> ModelVariant {
        match self {
            Self::Ensemble(_) => ModelVariant::Ensemble,
            Self::Neural(_) => ModelVariant::Neural,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Ensemble(model) => model.validate(),
            Self::Neural(model) => model.validate(),
        }
    }

    /// Predicted RSSI at one coordinate.
    pub fn predict(&self, latitude: f64, longitude: f64) -> f64 {
        let features = [latitude, longitude];
        match self {
            Self::Ensemble(model) => model.predict(&features),
            Self::Neural(model) => model.predict(&features),
        }
    }

    /// Predicted RSSI for each `[latitude, longitude]` row.
    pub fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Array1<f64> {
        match self {
            Self::Ensemble(model) => model.predict_batch(rows),
            Self::Neural(model) => model.predict_batch(rows),
        }
    }
}

/// Persisted model plus the metadata needed to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub variant: ModelVariant,
    /// Number of samples the model was fitted on.
    pub sample_count: usize,
    /// RFC 3339 UTC time of training.
    pub trained_at: String,
    pub model: Regressor,
}

impl ModelArtifact {
    /// Check version, variant tag and model structure.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(format!(
                "Unsupported artifact format {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            ));
        }
        if self.variant != self.model.variant() {
            return Err(format!(
                "Artifact tagged {} but holds a {} model",
                self.variant,
                self.model.variant()
            ));
        }
        self.model.validate()
    }
}
