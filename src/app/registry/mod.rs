//! Registry of installed user scripts
//!
//! Owns the set of installed [`UserScript`] records: installs from completed
//! downloads, enforces uniqueness of the derived `namespace/name` identifier,
//! and persists every change through the file-backed store. The download
//! orchestrator hands off here and keeps no storage responsibility of its
//! own.

pub mod script;
pub mod store;

pub use script::{StoredIcon, StoredRequire, StoredResource, UserScript};
pub use store::ScriptStore;

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::downloader::ScriptBundle;
use crate::app::metadata::ScriptMetadata;
use crate::errors::{RegistryError, RegistryResult};

/// The set of installed scripts, memory-resident with file-backed records
#[derive(Debug)]
pub struct ScriptRegistry {
    store: ScriptStore,
    scripts: RwLock<HashMap<Uuid, UserScript>>,
}

impl ScriptRegistry {
    /// Open (and if needed create) a registry rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the storage directory cannot be created or
    /// read.
    pub async fn open(root: &Path) -> RegistryResult<Self> {
        let store = ScriptStore::new(root);
        store.ensure_dirs().await?;

        let loaded = store.load_all().await?;
        info!("Loaded {} installed script(s) from {}", loaded.len(), root.display());

        let scripts = loaded
            .into_iter()
            .map(|script| (script.uuid, script))
            .collect();

        Ok(Self {
            store,
            scripts: RwLock::new(scripts),
        })
    }

    /// Install or update from a completed download
    ///
    /// Looks up by the derived identifier: a script with the same
    /// `namespace/name` is updated in place (same uuid, enabled flag and
    /// install timestamp preserved); otherwise a new record is created.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the record cannot be persisted.
    pub async fn install_from_download(
        &self,
        metadata: &ScriptMetadata,
        bundle: &ScriptBundle,
    ) -> RegistryResult<Uuid> {
        let mut scripts = self.scripts.write().await;

        let id = metadata.id();
        let existing = scripts.values().find(|s| s.id == id).map(|s| s.uuid);

        let script = match existing {
            Some(uuid) => {
                let script = scripts
                    .get_mut(&uuid)
                    .ok_or(RegistryError::NotFound { uuid })?;
                script.update_from_download(metadata, bundle);
                debug!("Updating installed script {} ({})", id, uuid);
                script.clone()
            }
            None => {
                let script = UserScript::from_download(metadata, bundle);
                debug!("Installing new script {} ({})", id, script.uuid);
                scripts.insert(script.uuid, script.clone());
                script
            }
        };

        self.store.save(&script).await?;
        info!("Installed {:?} as {}", script.name, script.uuid);
        Ok(script.uuid)
    }

    /// Persist a modified record, enforcing identifier uniqueness
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Conflict` when another installed script
    /// already uses the record's `namespace/name`.
    pub async fn save(&self, script: UserScript) -> RegistryResult<()> {
        let mut scripts = self.scripts.write().await;

        let collision = scripts
            .values()
            .any(|other| other.id == script.id && other.uuid != script.uuid);
        if collision {
            return Err(RegistryError::Conflict {
                name: script.name.clone(),
                namespace: script.namespace.clone(),
            });
        }

        self.store.save(&script).await?;
        scripts.insert(script.uuid, script);
        Ok(())
    }

    /// Installed scripts, optionally including disabled ones
    pub async fn list(&self, include_disabled: bool) -> Vec<UserScript> {
        let scripts = self.scripts.read().await;
        let mut result: Vec<UserScript> = scripts
            .values()
            .filter(|s| include_disabled || s.enabled)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Look up one script by uuid
    pub async fn get(&self, uuid: &Uuid) -> Option<UserScript> {
        self.scripts.read().await.get(uuid).cloned()
    }

    /// Look up one script by its derived identifier
    pub async fn find_by_id(&self, id: &str) -> Option<UserScript> {
        let scripts = self.scripts.read().await;
        scripts.values().find(|s| s.id == id).cloned()
    }

    /// Flip the enabled flag, returning the new value
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown uuid.
    pub async fn set_enabled(&self, uuid: &Uuid, enabled: bool) -> RegistryResult<bool> {
        let mut scripts = self.scripts.write().await;
        let script = scripts
            .get_mut(uuid)
            .ok_or(RegistryError::NotFound { uuid: *uuid })?;
        script.enabled = enabled;
        let script = script.clone();
        self.store.save(&script).await?;
        Ok(enabled)
    }

    /// Remove a script and its record
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown uuid.
    pub async fn uninstall(&self, uuid: &Uuid) -> RegistryResult<()> {
        let mut scripts = self.scripts.write().await;
        if scripts.remove(uuid).is_none() {
            return Err(RegistryError::NotFound { uuid: *uuid });
        }
        self.store.remove(uuid).await?;
        info!("Uninstalled script {}", uuid);
        Ok(())
    }

    /// Number of installed scripts
    pub async fn len(&self) -> usize {
        self.scripts.read().await.len()
    }

    /// Whether the registry holds no scripts
    pub async fn is_empty(&self) -> bool {
        self.scripts.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(name: &str, namespace: &str) -> (ScriptMetadata, ScriptBundle) {
        let metadata = ScriptMetadata {
            name: name.to_string(),
            namespace: namespace.to_string(),
            version: Some("1.0".to_string()),
            description: None,
            icon_url: None,
            require_urls: vec![],
            resource_urls: vec![],
        };
        let bundle = ScriptBundle {
            source_url: None,
            content: format!("// @name {name}\nbody();\n"),
            icon: None,
            requires: vec![],
            resources: HashMap::new(),
        };
        (metadata, bundle)
    }

    #[tokio::test]
    async fn test_install_creates_then_updates() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();

        let (metadata, bundle) = sample("Foo", "bar");
        let first = registry
            .install_from_download(&metadata, &bundle)
            .await
            .unwrap();
        assert_eq!(registry.len().await, 1);

        // Same id installs again: update in place, same uuid
        let (mut metadata, bundle) = sample("Foo", "bar");
        metadata.version = Some("2.0".to_string());
        let second = registry
            .install_from_download(&metadata, &bundle)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            registry.get(&first).await.unwrap().version.as_deref(),
            Some("2.0")
        );
    }

    #[tokio::test]
    async fn test_save_rejects_id_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();

        let (metadata_a, bundle_a) = sample("A", "ns");
        let (metadata_b, bundle_b) = sample("B", "ns");
        registry
            .install_from_download(&metadata_a, &bundle_a)
            .await
            .unwrap();
        let b_uuid = registry
            .install_from_download(&metadata_b, &bundle_b)
            .await
            .unwrap();

        // Rename B to collide with A
        let mut edited = registry.get(&b_uuid).await.unwrap();
        edited.name = "A".to_string();
        edited.id = "ns/A".to_string();
        let result = registry.save(edited).await;
        assert!(matches!(result, Err(RegistryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_enable_disable_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();

        let (metadata, bundle) = sample("Foo", "bar");
        let uuid = registry
            .install_from_download(&metadata, &bundle)
            .await
            .unwrap();

        assert_eq!(registry.list(false).await.len(), 1);
        registry.set_enabled(&uuid, false).await.unwrap();
        assert!(registry.list(false).await.is_empty());
        assert_eq!(registry.list(true).await.len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_unknown_uuid_fails() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();
        let result = registry.uninstall(&Uuid::new_v4()).await;
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_registry_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let uuid = {
            let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();
            let (metadata, bundle) = sample("Persistent", "ns");
            registry
                .install_from_download(&metadata, &bundle)
                .await
                .unwrap()
        };

        let reopened = ScriptRegistry::open(temp_dir.path()).await.unwrap();
        let script = reopened.get(&uuid).await.unwrap();
        assert_eq!(script.name, "Persistent");
        assert!(reopened.find_by_id("ns/Persistent").await.is_some());
    }
}
