//! Parsed script metadata

use url::Url;

/// Structured metadata extracted from a script's header comments
///
/// Immutable once produced; an install attempt produces it at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMetadata {
    /// Display name (required)
    pub name: String,
    /// Namespace the name lives in; empty when the script declares none
    pub namespace: String,
    /// Declared version string, if any
    pub version: Option<String>,
    /// Declared description, if any
    pub description: Option<String>,
    /// Icon URL, if the script declares one
    pub icon_url: Option<Url>,
    /// Dependency URLs in declaration order
    pub require_urls: Vec<Url>,
    /// Named resources in declaration order; names are unique
    pub resource_urls: Vec<(String, Url)>,
}

impl ScriptMetadata {
    /// Identifier derived from namespace and name
    ///
    /// Two installed scripts may never share this value.
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Look up a declared resource URL by name
    pub fn resource_url(&self, name: &str) -> Option<&Url> {
        self.resource_urls
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url)
    }
}
