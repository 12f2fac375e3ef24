//! On-disk persistence for script records
//!
//! One JSON file per script under `<root>/scripts/`, written with the
//! temp-file + rename pattern so an interrupted write never corrupts an
//! existing record.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::files;
use crate::errors::{RegistryError, RegistryResult};

use super::script::UserScript;

/// File-backed script record store
#[derive(Debug, Clone)]
pub struct ScriptStore {
    scripts_dir: PathBuf,
}

impl ScriptStore {
    /// Create a store rooted at `root`
    pub fn new(root: &Path) -> Self {
        Self {
            scripts_dir: root.join(files::SCRIPTS_DIR),
        }
    }

    /// Create the storage directory if it does not exist
    pub async fn ensure_dirs(&self) -> RegistryResult<()> {
        tokio::fs::create_dir_all(&self.scripts_dir)
            .await
            .map_err(|_| RegistryError::DirectoryNotAccessible {
                path: self.scripts_dir.clone(),
            })
    }

    fn record_path(&self, uuid: &Uuid) -> PathBuf {
        self.scripts_dir
            .join(format!("{uuid}.{}", files::SCRIPT_FILE_EXT))
    }

    /// Persist one record atomically
    pub async fn save(&self, script: &UserScript) -> RegistryResult<()> {
        let final_path = self.record_path(&script.uuid);
        let temp_path = final_path.with_extension(format!(
            "{}{}",
            files::SCRIPT_FILE_EXT,
            files::TEMP_FILE_SUFFIX
        ));

        let json = serde_json::to_vec_pretty(script)?;
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &final_path).await.map_err(|_| {
            RegistryError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: final_path.clone(),
            }
        })?;

        debug!("Saved script record: {}", final_path.display());
        Ok(())
    }

    /// Load every record in the store
    ///
    /// Unreadable records are skipped with a warning rather than failing the
    /// whole load.
    pub async fn load_all(&self) -> RegistryResult<Vec<UserScript>> {
        let mut scripts = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.scripts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(scripts),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(files::SCRIPT_FILE_EXT) {
                continue;
            }
            match self.load_one(&path).await {
                Ok(script) => scripts.push(script),
                Err(e) => warn!("Skipping unreadable script record {}: {}", path.display(), e),
            }
        }

        Ok(scripts)
    }

    async fn load_one(&self, path: &Path) -> RegistryResult<UserScript> {
        let json = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Delete one record
    pub async fn remove(&self, uuid: &Uuid) -> RegistryResult<()> {
        let path = self.record_path(uuid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
