//! Raw sample rows and their validated, model-ready form.
//!
//! Rows arrive from the sample log as loosely typed strings. Extraction checks
//! each row independently, drops the ones missing a numeric latitude, longitude
//! or RSSI, and computes the bounding box of what survives.

pub mod log;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub use log::{LogStats, MemorySampleLog, SampleLog, SampleLogError, SqliteSampleLog, import_csv};

/// One logged observation exactly as stored.
///
/// Numeric fields are kept as text so that legacy or hand-edited logs survive
/// a round trip; validation happens in [`check_row`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSampleRow {
    /// ISO-8601 timestamp of the reading.
    pub timestamp: String,
    /// Network name, possibly empty.
    pub ssid: String,
    pub rssi_dbm: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl RawSampleRow {
    /// Build a row from typed values.
    pub fn from_values(
        timestamp: impl Into<String>,
        ssid: impl Into<String>,
        rssi_dbm: Option<f64>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            ssid: ssid.into(),
            rssi_dbm: rssi_dbm.map(|v| v.to_string()),
            latitude: latitude.map(|v| v.to_string()),
            longitude: longitude.map(|v| v.to_string()),
        }
    }

    /// Parsed RSSI, if present and numeric.
    pub fn rssi(&self) -> Option<f64> {
        parse_field(self.rssi_dbm.as_deref(), SampleField::Rssi).ok()
    }
}

/// A validated observation used for model fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub rssi: f64,
}

/// Field of a raw row that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Latitude,
    Longitude,
    Rssi,
}

/// Why a raw row was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRow {
    /// The field was absent or blank.
    Missing(SampleField),
    /// The field held text that is not a finite number.
    NotNumeric(SampleField),
}

/// Outcome of validating a single raw row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowCheck {
    Valid(Sample),
    Invalid(InvalidRow),
}

/// Validate a raw row without side effects.
pub fn check_row(row: &RawSampleRow) -> RowCheck {
    let parsed = parse_field(row.latitude.as_deref(), SampleField::Latitude).and_then(|lat| {
        let lon = parse_field(row.longitude.as_deref(), SampleField::Longitude)?;
        let rssi = parse_field(row.rssi_dbm.as_deref(), SampleField::Rssi)?;
        Ok(Sample {
            latitude: lat,
            longitude: lon,
            rssi,
        })
    });
    match parsed {
        Ok(sample) => RowCheck::Valid(sample),
        Err(reason) => RowCheck::Invalid(reason),
    }
}

fn parse_field(value: Option<&str>, field: SampleField) -> Result<f64, InvalidRow> {
    let text = value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(InvalidRow::Missing(field))?;
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(InvalidRow::NotNumeric(field))
}

/// Rectangular latitude/longitude extent covering a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Elementwise min/max over the sample coordinates; `None` when empty.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let mut bounds = Self {
            lat_min: first.latitude,
            lon_min: first.longitude,
            lat_max: first.latitude,
            lon_max: first.longitude,
        };
        for sample in &samples[1..] {
            bounds.lat_min = bounds.lat_min.min(sample.latitude);
            bounds.lon_min = bounds.lon_min.min(sample.longitude);
            bounds.lat_max = bounds.lat_max.max(sample.latitude);
            bounds.lon_max = bounds.lon_max.max(sample.longitude);
        }
        Some(bounds)
    }

    /// Inclusive containment test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    /// `(lat_min, lon_min, lat_max, lon_max)`.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.lat_min, self.lon_min, self.lat_max, self.lon_max)
    }
}

/// Non-empty collection of samples in arrival order plus their bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
    bounds: BoundingBox,
}

impl SampleSet {
    /// Wrap already validated samples; `None` when there are none.
    pub fn from_samples(samples: Vec<Sample>) -> Option<Self> {
        let bounds = BoundingBox::from_samples(&samples)?;
        Some(Self { samples, bounds })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; an empty extraction yields no set at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recently logged sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Convert raw rows into a validated sample set.
///
/// Rows that fail validation are skipped. Returns `None` when the input is
/// empty or nothing survives.
pub fn extract(rows: &[RawSampleRow]) -> Option<SampleSet> {
    let mut samples = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match check_row(row) {
            RowCheck::Valid(sample) => samples.push(sample),
            RowCheck::Invalid(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, kept = samples.len(), "skipped incomplete sample rows");
    }
    SampleSet::from_samples(samples)
}

/// `(n, 2)` matrix of `[latitude, longitude]` rows.
pub fn feature_matrix(samples: &[Sample]) -> Array2<f64> {
    let mut features = Array2::zeros((samples.len(), 2));
    for (idx, sample) in samples.iter().enumerate() {
        features[[idx, 0]] = sample.latitude;
        features[[idx, 1]] = sample.longitude;
    }
    features
}

/// RSSI targets aligned with [`feature_matrix`].
pub fn target_vector(samples: &[Sample]) -> Array1<f64> {
    samples.iter().map(|sample| sample.rssi).collect()
}
