//! Installed user script records

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::app::downloader::{KnownAssets, ScriptBundle};
use crate::app::metadata::ScriptMetadata;

/// Stored icon content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIcon {
    /// URL the icon was fetched from
    pub url: String,
    /// Content-Type reported at fetch time
    pub mime: Option<String>,
    /// Icon bytes
    pub content: Vec<u8>,
}

/// Stored dependency script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRequire {
    /// URL the dependency was fetched from
    pub url: String,
    /// Dependency script text
    pub content: String,
}

/// Stored named resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    /// Declared resource name
    pub name: String,
    /// URL the resource was fetched from
    pub url: String,
    /// Content-Type reported at fetch time
    pub mime: Option<String>,
    /// Resource bytes
    pub content: Vec<u8>,
}

/// One installed user script
///
/// `id` is derived from namespace and name and is unique across the
/// registry; `uuid` is the stable record key that survives re-installs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserScript {
    /// Stable record identifier
    pub uuid: Uuid,
    /// Derived identifier, `namespace/name`
    pub id: String,
    /// Display name
    pub name: String,
    /// Namespace the name lives in
    pub namespace: String,
    /// Declared version, if any
    pub version: Option<String>,
    /// Declared description, if any
    pub description: Option<String>,
    /// URL the script was installed from, when it came over the network
    pub source_url: Option<String>,
    /// The script text
    pub content: String,
    /// Icon, when the script declares one
    pub icon: Option<StoredIcon>,
    /// Dependencies in declaration order
    pub requires: Vec<StoredRequire>,
    /// Named resources
    pub resources: HashMap<String, StoredResource>,
    /// Whether the script is active
    pub enabled: bool,
    /// When the script was first installed
    pub installed_at: DateTime<Utc>,
    /// When the script content was last updated
    pub updated_at: DateTime<Utc>,
}

impl UserScript {
    /// Create a fresh record from a completed download
    pub fn from_download(metadata: &ScriptMetadata, bundle: &ScriptBundle) -> Self {
        let now = Utc::now();
        let mut script = Self {
            uuid: Uuid::new_v4(),
            id: metadata.id(),
            name: metadata.name.clone(),
            namespace: metadata.namespace.clone(),
            version: None,
            description: None,
            source_url: None,
            content: String::new(),
            icon: None,
            requires: Vec::new(),
            resources: HashMap::new(),
            enabled: true,
            installed_at: now,
            updated_at: now,
        };
        script.update_from_download(metadata, bundle);
        script
    }

    /// Refresh an existing record from a completed download
    ///
    /// Keeps the uuid, enabled flag and install timestamp; everything that
    /// comes from the download is replaced.
    pub fn update_from_download(&mut self, metadata: &ScriptMetadata, bundle: &ScriptBundle) {
        self.id = metadata.id();
        self.name = metadata.name.clone();
        self.namespace = metadata.namespace.clone();
        self.version = metadata.version.clone();
        self.description = metadata.description.clone();
        if let Some(url) = &bundle.source_url {
            // A local re-save keeps the URL the script was first fetched from.
            self.source_url = Some(url.to_string());
        }
        self.content = bundle.content.clone();

        self.icon = bundle.icon.as_ref().map(|icon| StoredIcon {
            url: icon.url.to_string(),
            mime: icon.mime.clone(),
            content: icon.content.to_vec(),
        });

        self.requires = bundle
            .requires
            .iter()
            .map(|dep| StoredRequire {
                url: dep.url.to_string(),
                content: dep.content.clone(),
            })
            .collect();

        self.resources = bundle
            .resources
            .iter()
            .map(|(name, resource)| {
                (
                    name.clone(),
                    StoredResource {
                        name: resource.name.clone(),
                        url: resource.url.to_string(),
                        mime: resource.mime.clone(),
                        content: resource.content.to_vec(),
                    },
                )
            })
            .collect();

        self.updated_at = Utc::now();
    }

    /// Look up a stored resource by its declared name
    pub fn resource(&self, name: &str) -> Option<&StoredResource> {
        self.resources.get(name)
    }

    /// The stored assets of this record as known content for a re-download
    ///
    /// Records whose stored URLs no longer parse are skipped rather than
    /// failing the whole conversion.
    pub fn known_assets(&self) -> KnownAssets {
        let mut known = KnownAssets::default();

        if let Some(icon) = &self.icon {
            if let Ok(url) = Url::parse(&icon.url) {
                known.icon = Some((url, Bytes::from(icon.content.clone())));
            }
        }
        for dep in &self.requires {
            if let Ok(url) = Url::parse(&dep.url) {
                known.requires.insert(url, dep.content.clone());
            }
        }
        for resource in self.resources.values() {
            if let Ok(url) = Url::parse(&resource.url) {
                known
                    .resources
                    .insert(url, Bytes::from(resource.content.clone()));
            }
        }

        known
    }
}
