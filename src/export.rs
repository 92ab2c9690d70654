//! JSON payloads for map front ends.

use serde::Serialize;

use crate::grid::{GridPoint, GridPrediction};
use crate::report::weak_count;
use crate::samples::{BoundingBox, RawSampleRow, RowCheck, check_row};

/// RSSI mapped to zero heat.
pub const HEAT_FLOOR_DBM: f64 = -95.0;
/// RSSI mapped to full heat.
pub const HEAT_CEIL_DBM: f64 = -35.0;

/// Grid predictions plus the number of weak points among them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionExport {
    pub points: Vec<GridPoint>,
    pub bounds: Option<BoundingBox>,
    pub weak_count: usize,
}

impl PredictionExport {
    pub fn new(prediction: GridPrediction, weak_threshold_dbm: f64) -> Self {
        let weak_count = weak_count(&prediction.points, weak_threshold_dbm);
        Self {
            points: prediction.points,
            bounds: prediction.bounds,
            weak_count,
        }
    }

    /// `[latitude, longitude, intensity]` triples for a heat layer.
    pub fn heat_points(&self) -> Vec<[f64; 3]> {
        self.points
            .iter()
            .map(|p| [p.latitude, p.longitude, heat_intensity(Some(p.predicted_rssi))])
            .collect()
    }
}

/// Heat layer entries for the valid logged observations.
pub fn observed_heat(rows: &[RawSampleRow]) -> Vec<[f64; 3]> {
    rows.iter()
        .filter_map(|row| match check_row(row) {
            RowCheck::Valid(sample) => Some([
                sample.latitude,
                sample.longitude,
                heat_intensity(Some(sample.rssi)),
            ]),
            RowCheck::Invalid(_) => None,
        })
        .collect()
}

/// Linear 0..1 intensity for an RSSI between the heat floor and ceiling.
pub fn heat_intensity(rssi_dbm: Option<f64>) -> f64 {
    match rssi_dbm {
        Some(rssi) if rssi.is_finite() => {
            ((rssi - HEAT_FLOOR_DBM) / (HEAT_CEIL_DBM - HEAT_FLOOR_DBM)).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}
