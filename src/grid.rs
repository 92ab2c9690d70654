//! Dense coverage predictions over the sampled area.
//!
//! The lattice is a `grid_size x grid_size` set of points spaced linearly in
//! degrees across the bounding box, endpoints included. Points are emitted
//! with longitude in the outer loop and latitude varying fastest, so the point
//! at `(lat_idx, lon_idx)` sits at position `lon_idx * grid_size + lat_idx`.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Cached, Fit, ModelArtifact, ModelStore, ModelVariant, StoreError};
use crate::samples::{BoundingBox, RawSampleRow, SampleSet, extract};

/// Upper bound callers should respect to keep prediction cost reasonable.
pub const MAX_GRID_SIZE: usize = 128;

/// One predicted location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub predicted_rssi: f64,
}

/// Grid predictions plus the bounds they span.
///
/// `bounds` is present whenever at least one valid sample exists, even if no
/// model could be trained and `points` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridPrediction {
    pub points: Vec<GridPoint>,
    pub bounds: Option<BoundingBox>,
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Grid size must be at least 1")]
    EmptyGrid,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let span = end - start;
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        (start + span * (i as f64 / last)).clamp(start.min(end), start.max(end))
                    }
                })
                .collect()
        }
    }
}

/// `(grid_size^2, 2)` matrix of `[latitude, longitude]` lattice points.
pub fn lattice(bounds: &BoundingBox, grid_size: usize) -> Array2<f64> {
    let lats = linspace(bounds.lat_min, bounds.lat_max, grid_size);
    let lons = linspace(bounds.lon_min, bounds.lon_max, grid_size);
    let mut points = Array2::zeros((grid_size * grid_size, 2));
    for (lon_idx, &lon) in lons.iter().enumerate() {
        for (lat_idx, &lat) in lats.iter().enumerate() {
            let row = lon_idx * grid_size + lat_idx;
            points[[row, 0]] = lat;
            points[[row, 1]] = lon;
        }
    }
    points
}

/// Evaluate `artifact` over the lattice in one batched call.
pub fn evaluate(artifact: &ModelArtifact, bounds: &BoundingBox, grid_size: usize) -> Vec<GridPoint> {
    let points = lattice(bounds, grid_size);
    let predictions = artifact.model.predict_batch(points.view());
    points
        .rows()
        .into_iter()
        .zip(predictions.iter())
        .map(|(row, &predicted_rssi)| GridPoint {
            latitude: row[0],
            longitude: row[1],
            predicted_rssi,
        })
        .collect()
}

/// Produces grid predictions, training a model on demand when none is stored.
pub struct GridPredictor<'a, F: Fit> {
    store: &'a ModelStore<F>,
    variant: ModelVariant,
}

impl<'a, F: Fit> GridPredictor<'a, F> {
    /// `variant` is used only when a model has to be trained lazily.
    pub fn new(store: &'a ModelStore<F>, variant: ModelVariant) -> Self {
        Self { store, variant }
    }

    /// Predict over the bounds of the valid samples among `rows`.
    pub fn predict(
        &self,
        rows: &[RawSampleRow],
        model_path: &Path,
        grid_size: usize,
    ) -> Result<GridPrediction, GridError> {
        match extract(rows) {
            Some(set) => self.predict_samples(&set, model_path, grid_size),
            None => Ok(GridPrediction::default()),
        }
    }

    pub fn predict_samples(
        &self,
        set: &SampleSet,
        model_path: &Path,
        grid_size: usize,
    ) -> Result<GridPrediction, GridError> {
        if grid_size == 0 {
            return Err(GridError::EmptyGrid);
        }
        let bounds = set.bounds();
        let artifact = match self
            .store
            .load_or_train(set.samples(), model_path, self.variant)?
        {
            Cached::Hit(artifact) | Cached::Trained(artifact) => artifact,
            Cached::Unavailable(_) => {
                return Ok(GridPrediction {
                    points: Vec::new(),
                    bounds: Some(bounds),
                });
            }
        };
        let points = evaluate(&artifact, &bounds, grid_size);
        tracing::debug!(grid_size, points = points.len(), "evaluated coverage grid");
        Ok(GridPrediction {
            points,
            bounds: Some(bounds),
        })
    }
}
