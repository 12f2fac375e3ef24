//! Assembled download results and caller-supplied known content

use std::collections::HashMap;

use bytes::Bytes;
use url::Url;

use crate::app::metadata::ScriptMetadata;

/// The fetched icon
#[derive(Debug, Clone)]
pub struct IconAsset {
    /// URL the icon was declared at
    pub url: Url,
    /// Content-Type reported by the server, if fetched
    pub mime: Option<String>,
    /// Icon bytes
    pub content: Bytes,
}

/// One fetched dependency script
#[derive(Debug, Clone)]
pub struct RequiredScript {
    /// URL the dependency was declared at
    pub url: Url,
    /// Dependency script text
    pub content: String,
}

/// One fetched named resource
#[derive(Debug, Clone)]
pub struct ResourceAsset {
    /// Name the script declared for this resource
    pub name: String,
    /// URL the resource was declared at
    pub url: Url,
    /// Content-Type reported by the server, if fetched
    pub mime: Option<String>,
    /// Resource bytes
    pub content: Bytes,
}

/// Everything one completed install attempt downloaded
///
/// Produced only when every transfer succeeded; there is no partial bundle.
#[derive(Debug, Clone)]
pub struct ScriptBundle {
    /// URL the primary script came from, when known
    ///
    /// Recorded so an installed script can later be re-downloaded from the
    /// same place.
    pub source_url: Option<Url>,
    /// The primary script text
    pub content: String,
    /// The icon, when the script declares one
    pub icon: Option<IconAsset>,
    /// Dependencies in declaration order
    pub requires: Vec<RequiredScript>,
    /// Named resources
    pub resources: HashMap<String, ResourceAsset>,
}

/// Content the caller already holds for specific URLs
///
/// Consulted when child fetches are registered: an exact URL match is served
/// from memory instead of the network. Read-only for the duration of an
/// attempt.
#[derive(Debug, Clone, Default)]
pub struct KnownAssets {
    /// Known icon content, keyed by the URL it was fetched from
    pub icon: Option<(Url, Bytes)>,
    /// Known dependency text by URL
    pub requires: HashMap<Url, String>,
    /// Known resource bytes by URL
    pub resources: HashMap<Url, Bytes>,
}

impl KnownAssets {
    /// Whether nothing is known
    pub fn is_empty(&self) -> bool {
        self.icon.is_none() && self.requires.is_empty() && self.resources.is_empty()
    }

    /// Reuse a previously completed bundle as known content
    ///
    /// Feeding an attempt's own output back in means a re-install of the
    /// same metadata issues no child transfers at all.
    pub fn from_bundle(metadata: &ScriptMetadata, bundle: &ScriptBundle) -> Self {
        let icon = bundle
            .icon
            .as_ref()
            .map(|icon| (icon.url.clone(), icon.content.clone()));

        let requires = bundle
            .requires
            .iter()
            .map(|dep| (dep.url.clone(), dep.content.clone()))
            .collect();

        let mut resources: HashMap<Url, Bytes> = HashMap::new();
        for resource in bundle.resources.values() {
            resources.insert(resource.url.clone(), resource.content.clone());
        }
        // The metadata is the authority on which URLs the next attempt will
        // discover; anything it does not declare is dead weight here.
        resources.retain(|url, _| metadata.resource_urls.iter().any(|(_, u)| u == url));

        Self {
            icon,
            requires,
            resources,
        }
    }
}
