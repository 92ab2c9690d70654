use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use thiserror::Error;

use crate::samples::Sample;

use super::train::{Fit, TrainError, Trainer};
use super::{ModelArtifact, ModelVariant};

/// Per-path guards serializing train-and-persist within this process.
/// Entries nobody holds are dropped the next time a guard is taken.
static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Errors raised while reading or writing model artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write model artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode model artifact: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Model artifact {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("Model could not be trained: {0}")]
    Untrainable(#[from] TrainError),
}

/// Result of a cache lookup that falls back to training.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    /// An artifact already existed and was reused as-is.
    Hit(T),
    /// Nothing was stored; a fresh artifact was trained and persisted.
    Trained(T),
    /// Nothing was stored and training was not possible.
    Unavailable(TrainError),
}

impl<T> Cached<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value) | Self::Trained(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

/// Owns the single model artifact stored at each path.
///
/// Artifacts are written to a temporary sibling file and renamed into place,
/// so a reader sees either the previous artifact or the new one. Training for
/// a given path is serialized within the process; separate processes sharing
/// a path may still race and overwrite each other wholesale.
#[derive(Debug, Clone, Default)]
pub struct ModelStore<F = Trainer> {
    fitter: F,
}

impl ModelStore<Trainer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: Fit> ModelStore<F> {
    pub fn with_fitter(fitter: F) -> Self {
        Self { fitter }
    }

    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    /// Load the artifact at `path`, `None` when no file exists.
    pub fn load(&self, path: &Path) -> Result<Option<ModelArtifact>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|err| corrupt(err.to_string()))?;
        artifact.validate().map_err(corrupt)?;
        tracing::debug!(path = %path.display(), variant = %artifact.variant, "loaded model artifact");
        Ok(Some(artifact))
    }

    /// Replace whatever is stored at `path` with `artifact`.
    pub fn save(&self, artifact: &ModelArtifact, path: &Path) -> Result<(), StoreError> {
        let dir = parent_dir(path);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".wifimap-model")
            .tempfile_in(&dir)
            .map_err(write_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, artifact)?;
            writer.flush().map_err(write_err)?;
        }
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(path).map_err(|err| write_err(err.error))?;
        tracing::info!(path = %path.display(), variant = %artifact.variant, "saved model artifact");
        Ok(())
    }

    /// Fit a fresh model and overwrite the artifact at `path`.
    pub fn train_and_save(
        &self,
        samples: &[Sample],
        path: &Path,
        variant: ModelVariant,
    ) -> Result<ModelArtifact, StoreError> {
        let lock = path_lock(path);
        let _guard = lock.lock().unwrap_or_else(|err| err.into_inner());
        self.fit_and_save_locked(samples, path, variant)
    }

    /// Return the stored artifact, training and persisting one when absent.
    ///
    /// A stored artifact is trusted without checking it against `samples`;
    /// callers retrain explicitly when new data makes it stale. A corrupt
    /// artifact is reported, never silently replaced.
    pub fn load_or_train(
        &self,
        samples: &[Sample],
        path: &Path,
        variant: ModelVariant,
    ) -> Result<Cached<ModelArtifact>, StoreError> {
        let lock = path_lock(path);
        let _guard = lock.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(artifact) = self.load(path)? {
            return Ok(Cached::Hit(artifact));
        }
        tracing::debug!(path = %path.display(), "no model artifact; training");
        match self.fit_and_save_locked(samples, path, variant) {
            Ok(artifact) => Ok(Cached::Trained(artifact)),
            Err(StoreError::Untrainable(reason)) => {
                tracing::info!(%reason, "model unavailable");
                Ok(Cached::Unavailable(reason))
            }
            Err(err) => Err(err),
        }
    }

    /// Make sure an artifact exists at `path`; `false` when none could be trained.
    ///
    /// An existing file counts as present without being read.
    pub fn ensure(
        &self,
        samples: &[Sample],
        path: &Path,
        variant: ModelVariant,
    ) -> Result<bool, StoreError> {
        let lock = path_lock(path);
        let _guard = lock.lock().unwrap_or_else(|err| err.into_inner());
        if path.exists() {
            tracing::debug!(path = %path.display(), "model artifact present; skipping training");
            return Ok(true);
        }
        match self.fit_and_save_locked(samples, path, variant) {
            Ok(_) => Ok(true),
            Err(StoreError::Untrainable(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn fit_and_save_locked(
        &self,
        samples: &[Sample],
        path: &Path,
        variant: ModelVariant,
    ) -> Result<ModelArtifact, StoreError> {
        let artifact = self.fitter.fit(samples, variant)?;
        self.save(&artifact, path)?;
        Ok(artifact)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(|err| err.into_inner());
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    locks.entry(key).or_default().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn samples(count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample {
                latitude: 51.5 + (i % 5) as f64 * 0.002,
                longitude: -0.12 + (i / 5) as f64 * 0.002,
                rssi: -45.0 - (i % 7) as f64 * 5.0,
            })
            .collect()
    }

    #[test]
    fn load_missing_path_is_none() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new();
        assert!(store.load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn save_creates_parents_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("model.json");
        let store = ModelStore::new();
        let artifact = store.fitter().fit(&samples(12), ModelVariant::Ensemble).unwrap();
        store.save(&artifact, &path).unwrap();
        assert_eq!(store.load(&path).unwrap(), Some(artifact));
        let leftovers = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".wifimap-model"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_artifact_is_reported_not_retrained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = ModelStore::new();
        let err = store
            .load_or_train(&samples(20), &path, ModelVariant::Ensemble)
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"{not json");
    }

    #[test]
    fn mismatched_variant_tag_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new();
        let mut artifact = store.fitter().fit(&samples(12), ModelVariant::Ensemble).unwrap();
        artifact.variant = ModelVariant::Neural;
        store.save(&artifact, &path).unwrap();
        assert!(matches!(store.load(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn insufficient_data_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new();
        assert!(!store.ensure(&samples(9), &path, ModelVariant::Ensemble).unwrap());
        assert!(!path.exists());
        let cached = store
            .load_or_train(&samples(3), &path, ModelVariant::Neural)
            .unwrap();
        assert!(matches!(cached, Cached::Unavailable(TrainError::InsufficientData { found: 3, .. })));
        assert!(!path.exists());
    }

    #[test]
    fn load_or_train_hits_after_first_training() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new();
        let first = store
            .load_or_train(&samples(15), &path, ModelVariant::Ensemble)
            .unwrap();
        let Cached::Trained(trained) = first else {
            panic!("expected a trained artifact");
        };
        let second = store
            .load_or_train(&samples(40), &path, ModelVariant::Neural)
            .unwrap();
        assert_eq!(second, Cached::Hit(trained));
    }

    #[test]
    fn train_and_save_overwrites_existing_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new();
        store
            .train_and_save(&samples(12), &path, ModelVariant::Ensemble)
            .unwrap();
        let retrained = store
            .train_and_save(&samples(30), &path, ModelVariant::Ensemble)
            .unwrap();
        let loaded = store.load(&path).unwrap().unwrap();
        assert_eq!(loaded.sample_count, 30);
        assert_eq!(loaded, retrained);
    }

    #[test]
    fn path_locks_are_shared_per_path() {
        let dir = tempdir().unwrap();
        let a = path_lock(&dir.path().join("m.json"));
        let b = path_lock(&dir.path().join("m.json"));
        let c = path_lock(&dir.path().join("other.json"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn released_path_locks_are_pruned() {
        let dir = tempdir().unwrap();
        let released = dir.path().join("released.json");
        let held = path_lock(&dir.path().join("held.json"));
        drop(path_lock(&released));

        let _next = path_lock(&dir.path().join("next.json"));
        let locks = PATH_LOCKS.lock().unwrap();
        let key = |path: &Path| std::path::absolute(path).unwrap();
        assert!(!locks.contains_key(&key(&released)));
        assert!(locks.contains_key(&key(&dir.path().join("held.json"))));
        assert!(Arc::ptr_eq(&held, &locks[&key(&dir.path().join("held.json"))]));
    }
}
