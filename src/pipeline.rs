//! One-stop facade tying configuration, the sample log and the model store.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{AppConfig, ConfigError, clamp_grid_size};
use crate::export::PredictionExport;
use crate::geo::{IpGeolocator, Locate, NoLocation};
use crate::grid::{GridError, GridPrediction, GridPredictor};
use crate::model::{
    Fit, MIN_TRAINING_SAMPLES, ModelArtifact, ModelStore, ModelVariant, StoreError, TrainError,
    Trainer,
};
use crate::report;
use crate::samples::{LogStats, RawSampleRow, SampleLog, SampleLogError, SqliteSampleLog, extract};
use crate::scan::{self, ScanError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    SampleLog(#[from] SampleLogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Coverage workflow over one sample log and one model artifact path.
pub struct CoveragePipeline<L: SampleLog, F: Fit = Trainer> {
    config: AppConfig,
    log: L,
    store: ModelStore<F>,
    model_path: PathBuf,
}

impl CoveragePipeline<SqliteSampleLog> {
    /// Open the SQLite sample log and model path named by `config`.
    pub fn open(config: AppConfig) -> Result<Self, PipelineError> {
        let log = SqliteSampleLog::open(config.sample_log_path()?)?;
        Self::new(config, log)
    }
}

impl<L: SampleLog> CoveragePipeline<L> {
    pub fn new(config: AppConfig, log: L) -> Result<Self, PipelineError> {
        Self::with_store(config, log, ModelStore::new())
    }
}

impl<L: SampleLog, F: Fit> CoveragePipeline<L, F> {
    pub fn with_store(config: AppConfig, log: L, store: ModelStore<F>) -> Result<Self, PipelineError> {
        let model_path = config.model_path()?;
        Ok(Self {
            config,
            log,
            store,
            model_path,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn store(&self) -> &ModelStore<F> {
        &self.store
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn stats(&self) -> Result<LogStats, PipelineError> {
        Ok(LogStats::from_rows(&self.log.read_all()?))
    }

    /// Retrain from the full log, replacing any stored artifact.
    pub fn train(&self, variant: ModelVariant) -> Result<ModelArtifact, PipelineError> {
        let rows = self.log.read_all()?;
        let Some(set) = extract(&rows) else {
            return Err(StoreError::Untrainable(TrainError::InsufficientData {
                found: 0,
                required: MIN_TRAINING_SAMPLES,
            })
            .into());
        };
        Ok(self.store.train_and_save(set.samples(), &self.model_path, variant)?)
    }

    /// Make sure a model exists, training one with the configured variant if needed.
    pub fn ensure_model(&self) -> Result<bool, PipelineError> {
        let rows = self.log.read_all()?;
        let samples = extract(&rows)
            .map(|set| set.samples().to_vec())
            .unwrap_or_default();
        Ok(self
            .store
            .ensure(&samples, &self.model_path, self.config.variant())?)
    }

    /// Grid predictions; `grid_size` falls back to the configured size.
    pub fn predict(&self, grid_size: Option<usize>) -> Result<GridPrediction, PipelineError> {
        let rows = self.log.read_all()?;
        self.predict_rows(&rows, grid_size)
    }

    pub fn export(&self, grid_size: Option<usize>) -> Result<PredictionExport, PipelineError> {
        let prediction = self.predict(grid_size)?;
        Ok(PredictionExport::new(
            prediction,
            self.config.report.weak_threshold_dbm,
        ))
    }

    /// Text report over the log and the configured grid.
    pub fn report(&self) -> Result<String, PipelineError> {
        let rows = self.log.read_all()?;
        let prediction = self.predict_rows(&rows, None)?;
        Ok(report::summarize(
            &rows,
            &prediction.points,
            &self.config.report_options(),
        ))
    }

    /// Take one reading, append it to the log and return it.
    pub fn record_scan(&self, location: Option<(f64, f64)>) -> Result<RawSampleRow, PipelineError> {
        let locator = self.locator();
        let row = scan::scan_once(location, locator.as_ref())?;
        self.log.append(&row)?;
        Ok(row)
    }

    /// Append an externally produced row.
    pub fn record(&self, row: &RawSampleRow) -> Result<(), PipelineError> {
        Ok(self.log.append(row)?)
    }

    fn locator(&self) -> Box<dyn Locate> {
        if self.config.geolocation.enabled {
            Box::new(IpGeolocator::new(self.config.geolocation.endpoint.clone()))
        } else {
            Box::new(NoLocation)
        }
    }

    fn predict_rows(
        &self,
        rows: &[RawSampleRow],
        grid_size: Option<usize>,
    ) -> Result<GridPrediction, PipelineError> {
        let grid_size = grid_size.map_or_else(|| self.config.grid_size(), clamp_grid_size);
        let predictor = GridPredictor::new(&self.store, self.config.variant());
        Ok(predictor.predict(rows, &self.model_path, grid_size)?)
    }
}
