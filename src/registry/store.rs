//! Blob and metadata storage behind the registry

use super::artifact::{ArtifactFilter, ModelArtifact};
use crate::error::{MortalityError, Result};
use crate::training::ModelFamily;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Key/value blob storage for model and pipeline binaries
pub trait ArtifactStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}

/// Blobs stored as files under a root directory
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MortalityError::Storage(format!("invalid artifact key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Relational side of the registry.
///
/// `activate` is the only way to change `is_active`. It compares the family's
/// activation generation with `expected_generation` and, under one write,
/// deactivates every sibling and activates the target.
pub trait MetadataStore: Send + Sync {
    /// Fails with `Validation` when the id or name already exists
    fn insert(&self, artifact: ModelArtifact) -> Result<()>;

    fn get(&self, id: Uuid) -> Result<Option<ModelArtifact>>;

    fn list(&self, filter: &ArtifactFilter) -> Result<Vec<ModelArtifact>>;

    /// Returns whether a row was removed
    fn delete(&self, id: Uuid) -> Result<bool>;

    fn activation_generation(&self, family: ModelFamily) -> Result<u64>;

    fn activate(&self, id: Uuid, expected_generation: u64) -> Result<ModelArtifact>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MetadataTables {
    rows: BTreeMap<Uuid, ModelArtifact>,
    generations: BTreeMap<ModelFamily, u64>,
}

impl MetadataTables {
    fn insert(&mut self, artifact: ModelArtifact) -> Result<()> {
        if self.rows.contains_key(&artifact.id) {
            return Err(MortalityError::Validation(format!("artifact {} already exists", artifact.id)));
        }
        if self.rows.values().any(|r| r.name == artifact.name) {
            return Err(MortalityError::Validation(format!(
                "artifact name {} already exists",
                artifact.name
            )));
        }
        self.rows.insert(artifact.id, artifact);
        Ok(())
    }

    fn activate(&mut self, id: Uuid, expected_generation: u64) -> Result<ModelArtifact> {
        let family = self
            .rows
            .get(&id)
            .map(|r| r.family)
            .ok_or_else(|| MortalityError::NotFound(format!("model {}", id)))?;

        let generation = self.generations.entry(family).or_insert(0);
        if *generation != expected_generation {
            return Err(MortalityError::ActivationConflict(format!(
                "{} activation generation moved from {} to {}",
                family, expected_generation, generation
            )));
        }
        *generation += 1;

        for row in self.rows.values_mut().filter(|r| r.family == family) {
            let should_be_active = row.id == id;
            if row.is_active != should_be_active {
                row.is_active = should_be_active;
                row.row_version += 1;
            }
        }

        self.rows
            .get(&id)
            .cloned()
            .ok_or_else(|| MortalityError::NotFound(format!("model {}", id)))
    }
}

/// Metadata held in memory, optionally mirrored to a JSON file after every write
pub struct LocalMetadataStore {
    tables: RwLock<MetadataTables>,
    path: Option<PathBuf>,
}

impl LocalMetadataStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(MetadataTables::default()),
            path: None,
        }
    }

    /// Open (or create) `registry.json` under `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join("registry.json");

        let tables = if path.exists() {
            let contents = fs::read(&path)?;
            serde_json::from_slice(&contents).map_err(|e| {
                MortalityError::Storage(format!("corrupt registry index {}: {}", path.display(), e))
            })?
        } else {
            MetadataTables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    /// Apply `f` to a copy of the tables; commit only if the file write succeeds
    fn mutate<T>(&self, f: impl FnOnce(&mut MetadataTables) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write();
        let mut next = tables.clone();
        let out = f(&mut next)?;

        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(&next)?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json)?;
            fs::rename(&tmp, path)?;
        }

        *tables = next;
        Ok(out)
    }
}

impl MetadataStore for LocalMetadataStore {
    fn insert(&self, artifact: ModelArtifact) -> Result<()> {
        self.mutate(|t| t.insert(artifact))
    }

    fn get(&self, id: Uuid) -> Result<Option<ModelArtifact>> {
        Ok(self.tables.read().rows.get(&id).cloned())
    }

    fn list(&self, filter: &ArtifactFilter) -> Result<Vec<ModelArtifact>> {
        Ok(self
            .tables
            .read()
            .rows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        if !self.tables.read().rows.contains_key(&id) {
            return Ok(false);
        }
        self.mutate(|t| Ok(t.rows.remove(&id).is_some()))
    }

    fn activation_generation(&self, family: ModelFamily) -> Result<u64> {
        Ok(self.tables.read().generations.get(&family).copied().unwrap_or(0))
    }

    fn activate(&self, id: Uuid, expected_generation: u64) -> Result<ModelArtifact> {
        self.mutate(|t| t.activate(id, expected_generation))
    }
}
