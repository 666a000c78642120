use std::fs;
use std::io;
use std::path::PathBuf;

use crate::models::Workout;

/// Name of the slot holding the workout list.
pub const WORKOUTS_KEY: &str = "workouts";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not encode workouts: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A string key-value store with named slots.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per slot inside a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        // write aside, then swap in, so a torn write never replaces the slot
        let path = self.slot_path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Saves and restores the workout list in the `workouts` slot.
pub struct WorkoutStore<S> {
    store: S,
}

impl<S: KeyValueStore> WorkoutStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Overwrites the slot with the full list.
    pub fn save<'a>(
        &mut self,
        workouts: impl IntoIterator<Item = &'a Workout>,
    ) -> Result<(), StorageError> {
        let workouts: Vec<&Workout> = workouts.into_iter().collect();
        let json = serde_json::to_string(&workouts)?;
        self.store.set(WORKOUTS_KEY, &json)?;
        tracing::debug!(count = workouts.len(), "saved workouts");
        Ok(())
    }

    /// Missing, unreadable or malformed data all come back as an empty list.
    pub fn load(&self) -> Vec<Workout> {
        let data = match self.store.get(WORKOUTS_KEY) {
            Ok(Some(data)) => data,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored workouts");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Workout>>(&data) {
            Ok(workouts) => {
                tracing::debug!(count = workouts.len(), "loaded workouts");
                workouts
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed stored workouts");
                Vec::new()
            }
        }
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(WORKOUTS_KEY)?;
        tracing::info!("cleared stored workouts");
        Ok(())
    }
}
