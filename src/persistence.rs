use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{LendingError, Result},
    store::{Collections, MemoryStore},
};

/// On-disk representation of a [`MemoryStore`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    /// When the snapshot was written
    saved_at: DateTime<Utc>,
    /// Every collection
    collections: Collections,
}

impl MemoryStore {
    /// Save every collection to a JSON file
    ///
    /// # Errors
    ///
    /// Returns a `LendingError::Persistence` if:
    /// - The state cannot be serialized to JSON
    /// - The file cannot be created
    /// - The data cannot be written to the file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let snapshot = SnapshotFile { saved_at: Utc::now(), collections: self.snapshot() };

        let serialized = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| LendingError::Persistence(e.to_string()))?;

        info!(path = %path.display(), "saving store snapshot");

        let mut file = File::create(path)
            .map_err(|e| LendingError::Persistence(format!("Failed to create file: {e}")))?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| LendingError::Persistence(format!("Failed to write to file: {e}")))?;

        Ok(())
    }

    /// Load a store from a JSON file written by [`MemoryStore::save_to_file`]
    ///
    /// # Errors
    ///
    /// Returns a `LendingError::Load` if:
    /// - The file does not exist
    /// - The file cannot be opened
    /// - The file cannot be read
    /// - The JSON parsing fails
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading store snapshot");

        if !path.exists() {
            return Err(LendingError::Load(format!("File does not exist: {}", path.display())));
        }

        let mut file = File::open(path)
            .map_err(|e| LendingError::Load(format!("Failed to open file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| LendingError::Load(format!("Failed to read file: {e}")))?;

        let snapshot: SnapshotFile = serde_json::from_str(&contents)
            .map_err(|e| LendingError::Load(format!("Failed to parse JSON: {e}")))?;

        Ok(Self::from_collections(snapshot.collections))
    }

    /// Load `path` if it exists, otherwise start empty
    ///
    /// # Errors
    ///
    /// Returns a `LendingError::Load` if the file exists but cannot be loaded
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() { Self::load_from_file(path) } else { Ok(Self::new()) }
    }
}
