use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One named release: its tag and the `url@revision` of every component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    #[serde(default)]
    pub release: String,

    #[serde(default)]
    pub components: Vec<String>,

    /// Everything else in the file, visible to checks under `releases.*`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ReleaseDescriptor {
    pub fn new(release: impl Into<String>, components: Vec<String>) -> Self {
        Self {
            release: release.into(),
            components,
            extra: BTreeMap::new(),
        }
    }

    /// Reads a descriptor from a local path or an `http(s)://` URL.
    pub fn load(uri: &str) -> Result<Self> {
        tracing::debug!(file = uri, "loading release descriptor");

        let text = if uri.starts_with("http://") || uri.starts_with("https://") {
            fetch(uri)?
        } else {
            std::fs::read_to_string(uri)
                .with_context(|| format!("Failed to read release descriptor: {}", uri))?
        };

        Self::from_yaml(&text).with_context(|| format!("Invalid release descriptor: {}", uri))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

fn fetch(url: &str) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("relgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {}", url))?;

    response
        .text()
        .with_context(|| format!("Failed to read response body from {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_components_and_keeps_extra_keys() {
        let release = ReleaseDescriptor::from_yaml(
            "release: ZZZ_1.4\ncomponents:\n  - https://git.example.com/core.git@v1.4\ndate: 2024-03-01\n",
        )
        .unwrap();

        assert_eq!(release.release, "ZZZ_1.4");
        assert_eq!(release.components, vec!["https://git.example.com/core.git@v1.4"]);
        assert_eq!(release.extra["date"], serde_json::json!("2024-03-01"));
    }

    #[test]
    fn empty_document_is_empty_release() {
        assert_eq!(ReleaseDescriptor::from_yaml("").unwrap(), ReleaseDescriptor::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yml");
        let err = ReleaseDescriptor::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to read release descriptor"));
    }
}
