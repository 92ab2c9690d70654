use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::ml::forest::{ForestOptions, train_forest};
use crate::ml::mlp::{MlpOptions, train_mlp};
use crate::samples::{Sample, feature_matrix, target_vector};

use super::{ARTIFACT_FORMAT_VERSION, ModelArtifact, ModelVariant, Regressor};

/// Fewest valid samples a model may be fitted on.
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Reasons a fit produced no model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainError {
    #[error("insufficient_data: {found} valid samples, need at least {required}")]
    InsufficientData { found: usize, required: usize },
    #[error("model fitting failed: {0}")]
    Fit(String),
}

impl TrainError {
    /// Stable short code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Fit(_) => "fit_failed",
        }
    }
}

/// Anything that can turn samples into a model artifact.
pub trait Fit {
    fn fit(&self, samples: &[Sample], variant: ModelVariant) -> Result<ModelArtifact, TrainError>;
}

/// Default fitter with fixed, reproducible hyperparameters.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    pub forest: ForestOptions,
    pub mlp: MlpOptions,
}

impl Fit for Trainer {
    fn fit(&self, samples: &[Sample], variant: ModelVariant) -> Result<ModelArtifact, TrainError> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(TrainError::InsufficientData {
                found: samples.len(),
                required: MIN_TRAINING_SAMPLES,
            });
        }
        let x = feature_matrix(samples);
        let y = target_vector(samples);
        tracing::info!(%variant, samples = samples.len(), "training coverage model");
        let model = match variant {
            ModelVariant::Ensemble => {
                Regressor::Ensemble(train_forest(x.view(), y.view(), &self.forest).map_err(TrainError::Fit)?)
            }
            ModelVariant::Neural => {
                Regressor::Neural(train_mlp(x.view(), y.view(), &self.mlp).map_err(TrainError::Fit)?)
            }
        };
        Ok(ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            variant,
            sample_count: samples.len(),
            trained_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample {
                latitude: 40.0 + (i % 4) as f64 * 0.01,
                longitude: -3.0 + (i / 4) as f64 * 0.01,
                rssi: -40.0 - (i * 3) as f64,
            })
            .collect()
    }

    #[test]
    fn fewer_than_ten_samples_is_insufficient() {
        let err = Trainer::default()
            .fit(&samples(9), ModelVariant::Ensemble)
            .unwrap_err();
        assert_eq!(
            err,
            TrainError::InsufficientData {
                found: 9,
                required: MIN_TRAINING_SAMPLES
            }
        );
        assert_eq!(err.code(), "insufficient_data");
    }

    #[test]
    fn ensemble_artifact_is_tagged_and_valid() {
        let artifact = Trainer::default()
            .fit(&samples(10), ModelVariant::Ensemble)
            .unwrap();
        artifact.validate().unwrap();
        assert_eq!(artifact.variant, ModelVariant::Ensemble);
        assert_eq!(artifact.sample_count, 10);
        match &artifact.model {
            Regressor::Ensemble(forest) => assert_eq!(forest.trees.len(), 150),
            other => panic!("unexpected model {:?}", other.variant()),
        }
    }

    #[test]
    fn neural_artifact_predicts_finite_values() {
        let trainer = Trainer {
            mlp: MlpOptions {
                max_iter: 50,
                ..MlpOptions::default()
            },
            ..Trainer::default()
        };
        let artifact = trainer.fit(&samples(16), ModelVariant::Neural).unwrap();
        artifact.validate().unwrap();
        assert_eq!(artifact.model.variant(), ModelVariant::Neural);
        assert!(artifact.model.predict(40.01, -2.99).is_finite());
    }
}
