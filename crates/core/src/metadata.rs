//! Plugin and transformer identity metadata.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ValidationError};

static PLUGIN_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_-]{0,63}$").expect("plugin id pattern is valid")
});

/// Returns true if `id` is an acceptable plugin id: a lowercase letter
/// followed by up to 63 lowercase letters, digits, `_` or `-`.
pub fn is_valid_plugin_id(id: &str) -> bool {
    PLUGIN_ID.is_match(id)
}

/// Immutable identity of a launch plugin.
///
/// Deserializing goes through [`PluginMetadataBuilder::build`], so a document
/// that violates an invariant is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PluginMetadataDocument")]
pub struct PluginMetadata {
    id: String,
    version: String,
    name: String,
    logo: Option<String>,
    url: Option<String>,
    credits: Option<String>,
    description: Option<String>,
    authors: Vec<String>,
}

impl PluginMetadata {
    /// Starts building metadata for the plugin with the given id.
    pub fn builder(id: impl Into<String>) -> PluginMetadataBuilder {
        PluginMetadataBuilder::create(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn credits(&self) -> Option<&str> {
        self.credits.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }
}

impl fmt::Display for PluginMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.id, self.version)
    }
}

#[derive(Deserialize)]
struct PluginMetadataDocument {
    id: String,
    version: Option<String>,
    name: Option<String>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    credits: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
}

impl TryFrom<PluginMetadataDocument> for PluginMetadata {
    type Error = ValidationError;

    fn try_from(document: PluginMetadataDocument) -> Result<Self> {
        PluginMetadataBuilder {
            id: document.id,
            version: document.version,
            name: document.name,
            logo: document.logo,
            url: document.url,
            credits: document.credits,
            description: document.description,
            authors: document.authors,
        }
        .build()
    }
}

/// Collects plugin metadata; every invariant is checked by [`build`](Self::build).
///
/// The id must be a lowercase letter followed by at most 63 lowercase
/// letters, digits, `_` or `-`.
#[derive(Debug, Clone, Default)]
pub struct PluginMetadataBuilder {
    id: String,
    version: Option<String>,
    name: Option<String>,
    logo: Option<String>,
    url: Option<String>,
    credits: Option<String>,
    description: Option<String>,
    authors: Vec<String>,
}

impl PluginMetadataBuilder {
    pub fn create(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the path of a logo image inside the plugin archive.
    pub fn logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    /// Sets the display URL. Only `http` and `https` are accepted.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn credits(mut self, credits: impl Into<String>) -> Self {
        self.credits = Some(credits.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors.extend(authors.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<PluginMetadata> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if !is_valid_plugin_id(&self.id) {
            return Err(ValidationError::InvalidPluginId(self.id));
        }

        let version = self
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or(ValidationError::MissingField("version"))?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ValidationError::MissingField("name"))?;

        if let Some(url) = &self.url {
            validate_url(url)?;
        }

        let mut seen = HashSet::new();
        for author in &self.authors {
            if !seen.insert(author.as_str()) {
                return Err(ValidationError::DuplicateAuthor(author.clone()));
            }
        }

        Ok(PluginMetadata {
            id: self.id,
            version,
            name,
            logo: self.logo,
            url: self.url,
            credits: self.credits,
            description: self.description,
            authors: self.authors,
        })
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("scheme '{scheme}' is not http or https"),
        }),
    }
}

/// Immutable identity of a transformer, keyed by `pluginId:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TransformerDataDocument")]
pub struct TransformerData {
    plugin_id: String,
    name: String,
    description: Option<String>,
    enabled_by_default: bool,
}

impl TransformerData {
    pub fn builder(plugin_id: impl Into<String>, name: impl Into<String>) -> TransformerDataBuilder {
        TransformerDataBuilder {
            plugin_id: plugin_id.into(),
            name: name.into(),
            description: None,
            enabled_by_default: true,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    /// Unique key of the transformer across all plugins.
    pub fn registry_name(&self) -> String {
        format!("{}:{}", self.plugin_id, self.name)
    }
}

impl fmt::Display for TransformerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_id, self.name)
    }
}

#[derive(Deserialize)]
struct TransformerDataDocument {
    plugin_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "enabled")]
    enabled_by_default: bool,
}

fn enabled() -> bool {
    true
}

impl TryFrom<TransformerDataDocument> for TransformerData {
    type Error = ValidationError;

    fn try_from(document: TransformerDataDocument) -> Result<Self> {
        TransformerDataBuilder {
            plugin_id: document.plugin_id,
            name: document.name,
            description: document.description,
            enabled_by_default: document.enabled_by_default,
        }
        .build()
    }
}

#[derive(Debug, Clone)]
pub struct TransformerDataBuilder {
    plugin_id: String,
    name: String,
    description: Option<String>,
    enabled_by_default: bool,
}

impl TransformerDataBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    pub fn build(self) -> Result<TransformerData> {
        if self.plugin_id.is_empty() {
            return Err(ValidationError::MissingField("plugin_id"));
        }
        if !is_valid_plugin_id(&self.plugin_id) {
            return Err(ValidationError::InvalidPluginId(self.plugin_id));
        }
        if self.name.trim().is_empty() || self.name.contains(':') {
            return Err(ValidationError::InvalidTransformerName(self.name));
        }

        Ok(TransformerData {
            plugin_id: self.plugin_id,
            name: self.name,
            description: self.description,
            enabled_by_default: self.enabled_by_default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercase_id_fails() {
        let result = PluginMetadataBuilder::create("Foo")
            .version("1")
            .name("x")
            .build();
        assert!(matches!(result, Err(ValidationError::InvalidPluginId(_))));
    }

    #[test]
    fn test_single_letter_id_is_valid() {
        assert!(is_valid_plugin_id("a"));
        assert!(is_valid_plugin_id(&format!("a{}", "b".repeat(63))));
        assert!(!is_valid_plugin_id(&format!("a{}", "b".repeat(64))));
        assert!(!is_valid_plugin_id("1a"));
    }

    #[test]
    fn test_missing_version_fails() {
        let result = PluginMetadataBuilder::create("foo").build();
        assert_eq!(result, Err(ValidationError::MissingField("version")));
    }

    #[test]
    fn test_non_http_url_fails() {
        let result = PluginMetadata::builder("foo")
            .version("1")
            .name("x")
            .url("ftp://example.com/foo")
            .build();
        assert!(matches!(result, Err(ValidationError::InvalidUrl { .. })));
    }

    #[test]
    fn test_duplicate_author_fails() {
        let result = PluginMetadata::builder("foo")
            .version("1")
            .name("x")
            .authors(["alice", "bob", "alice"])
            .build();
        assert_eq!(result, Err(ValidationError::DuplicateAuthor("alice".into())));
    }

    #[test]
    fn test_minimal_build_round_trips() {
        let metadata = PluginMetadataBuilder::create("foo")
            .version("1")
            .name("x")
            .build()
            .unwrap();
        assert_eq!(metadata.id(), "foo");
        assert_eq!(metadata.version(), "1");
        assert_eq!(metadata.name(), "x");
        assert_eq!(metadata.logo(), None);
        assert_eq!(metadata.url(), None);
        assert!(metadata.authors().is_empty());
    }

    #[test]
    fn test_full_build_round_trips() {
        let metadata = PluginMetadata::builder("fancy-hud")
            .version("2.1.0")
            .name("Fancy HUD")
            .logo("assets/fancy-hud/icon.png")
            .url("https://example.com/fancy-hud")
            .credits("Everyone")
            .description("Makes the HUD fancy")
            .author("alice")
            .author("bob")
            .build()
            .unwrap();
        assert_eq!(metadata.logo(), Some("assets/fancy-hud/icon.png"));
        assert_eq!(metadata.url(), Some("https://example.com/fancy-hud"));
        assert_eq!(metadata.credits(), Some("Everyone"));
        assert_eq!(metadata.description(), Some("Makes the HUD fancy"));
        assert_eq!(metadata.authors(), ["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_deserialize_validates_metadata() {
        let invalid = serde_json::json!({ "id": "Bad Id!", "version": "1", "name": "x" });
        assert!(serde_json::from_value::<PluginMetadata>(invalid).is_err());

        let insecure = serde_json::json!({
            "id": "foo", "version": "1", "name": "x", "url": "ftp://example.com"
        });
        assert!(serde_json::from_value::<PluginMetadata>(insecure).is_err());

        let metadata = PluginMetadata::builder("foo")
            .version("1")
            .name("x")
            .author("alice")
            .build()
            .unwrap();
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(serde_json::from_value::<PluginMetadata>(value).unwrap(), metadata);
    }

    #[test]
    fn test_deserialize_validates_transformer_data() {
        let colon = serde_json::json!({ "plugin_id": "foo", "name": "a:b" });
        assert!(serde_json::from_value::<TransformerData>(colon).is_err());

        let data: TransformerData =
            serde_json::from_value(serde_json::json!({ "plugin_id": "foo", "name": "widen" }))
                .unwrap();
        assert_eq!(data.registry_name(), "foo:widen");
        assert!(data.enabled_by_default());
    }

    #[test]
    fn test_transformer_name_rejects_colon() {
        let result = TransformerData::builder("foo", "a:b").build();
        assert!(matches!(result, Err(ValidationError::InvalidTransformerName(_))));
    }

    #[test]
    fn test_transformer_registry_name() {
        let data = TransformerData::builder("foo", "widen")
            .description("Widens things")
            .enabled_by_default(false)
            .build()
            .unwrap();
        assert_eq!(data.registry_name(), "foo:widen");
        assert!(!data.enabled_by_default());
        assert_eq!(data.description(), Some("Widens things"));
    }
}
