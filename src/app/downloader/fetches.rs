//! Registry of the fetches owned by one install attempt
//!
//! Tracks the primary fetch plus every child fetch discovered from metadata,
//! deduplicated by URL across the icon, dependency and resource roles. The
//! aggregate progress value is recomputed from a snapshot of this set on
//! every read, never cached.

use std::collections::HashMap;

use url::Url;

use crate::app::transfer::AssetFetch;

/// The fetches registered so far for one attempt
#[derive(Debug, Default)]
pub struct FetchSet {
    script: Option<AssetFetch>,
    /// One fetch per distinct URL, shared by whichever roles declared it
    assets: HashMap<Url, AssetFetch>,
    icon_url: Option<Url>,
    /// Dependency URLs in declaration order, first occurrence wins
    require_urls: Vec<Url>,
    /// Resource name to URL; names are unique per the parser
    resource_urls: Vec<(String, Url)>,
}

impl FetchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the primary script fetch
    pub fn set_script(&mut self, fetch: AssetFetch) {
        self.script = Some(fetch);
    }

    /// The primary script fetch, once registered
    pub fn script(&self) -> Option<&AssetFetch> {
        self.script.as_ref()
    }

    /// Register the icon fetch
    pub fn register_icon(&mut self, url: Url, make: impl FnOnce() -> AssetFetch) {
        self.ensure(url.clone(), make);
        self.icon_url = Some(url);
    }

    /// Register a dependency fetch, keeping declaration order
    pub fn register_require(&mut self, url: Url, make: impl FnOnce() -> AssetFetch) {
        self.ensure(url.clone(), make);
        if !self.require_urls.contains(&url) {
            self.require_urls.push(url);
        }
    }

    /// Register a named resource fetch
    pub fn register_resource(&mut self, name: String, url: Url, make: impl FnOnce() -> AssetFetch) {
        self.ensure(url.clone(), make);
        self.resource_urls.push((name, url));
    }

    fn ensure(&mut self, url: Url, make: impl FnOnce() -> AssetFetch) {
        self.assets.entry(url).or_insert_with(make);
    }

    /// Aggregate fractional progress over every currently-registered fetch
    ///
    /// Sum of each fetch's progress over their count. Registering more
    /// fetches grows the denominator; each individual value stays monotone.
    pub fn aggregate_progress(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;

        if let Some(script) = &self.script {
            sum += script.progress();
            count += 1;
        }
        for fetch in self.assets.values() {
            sum += fetch.progress();
            count += 1;
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Handles to every registered fetch, primary included
    pub fn all_fetches(&self) -> Vec<AssetFetch> {
        let mut fetches = Vec::with_capacity(1 + self.assets.len());
        if let Some(script) = &self.script {
            fetches.push(script.clone());
        }
        fetches.extend(self.assets.values().cloned());
        fetches
    }

    /// The icon fetch, when one was targeted
    pub fn icon_entry(&self) -> Option<(Url, AssetFetch)> {
        let url = self.icon_url.clone()?;
        let fetch = self.assets.get(&url)?.clone();
        Some((url, fetch))
    }

    /// Dependency fetches in declaration order
    pub fn require_entries(&self) -> Vec<(Url, AssetFetch)> {
        self.require_urls
            .iter()
            .filter_map(|url| Some((url.clone(), self.assets.get(url)?.clone())))
            .collect()
    }

    /// Resource fetches with their declared names
    pub fn resource_entries(&self) -> Vec<(String, Url, AssetFetch)> {
        self.resource_urls
            .iter()
            .filter_map(|(name, url)| {
                Some((name.clone(), url.clone(), self.assets.get(url)?.clone()))
            })
            .collect()
    }

    /// Number of distinct child fetches that go over the network
    pub fn remote_child_count(&self) -> usize {
        self.assets.values().filter(|f| f.is_remote()).count()
    }
}
