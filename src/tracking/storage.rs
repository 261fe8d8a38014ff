//! Storage backends for experiment tracking

use super::tracker::Experiment;
use crate::error::{MortalityError, Result};
use std::fs;
use std::path::PathBuf;

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    fn load_experiments(&self) -> Result<Vec<Experiment>>;
}

/// Single JSON file under a base directory
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn experiments_file(&self) -> PathBuf {
        self.base_dir.join("experiments.json")
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;

        let json = serde_json::to_vec_pretty(experiments)?;
        // Write then rename so readers never see a partial file
        let tmp = self.base_dir.join("experiments.json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.experiments_file())?;

        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let path = self.experiments_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read(&path)?;
        serde_json::from_slice(&contents).map_err(|e| {
            MortalityError::Storage(format!("corrupt experiments file {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));
        assert!(storage.load_experiments().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("experiments.json"), b"{not json").unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(matches!(storage.load_experiments(), Err(MortalityError::Storage(_))));
    }
}
