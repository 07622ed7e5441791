use crate::environment::DataSource;
use crate::release::ReleaseDescriptor;
use crate::value::Value;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Mounts a JSON or YAML document under a namespace. Used for coverage,
/// test and issue exports produced by other tools.
#[derive(Debug, Clone)]
pub struct FileSource {
    namespace: String,
    path: PathBuf,
    data: Value,
}

impl FileSource {
    pub fn new(namespace: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.as_ref().to_path_buf(),
            data: Value::Null,
        }
    }

    /// Parses `NAME=PATH`.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let (namespace, path) = spec
            .split_once('=')
            .filter(|(name, path)| !name.trim().is_empty() && !path.trim().is_empty())
            .with_context(|| format!("Expected NAME=PATH, got '{}'", spec))?;
        Ok(Self::new(namespace.trim(), path.trim()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&mut self, _old: &ReleaseDescriptor, _new: &ReleaseDescriptor) -> Result<()> {
        tracing::debug!(file = %self.path.display(), namespace = %self.namespace, "loading data file");

        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read data file: {}", self.path.display()))?;

        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let json: serde_json::Value = if is_json {
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON in {}", self.path.display()))?
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("Invalid YAML in {}", self.path.display()))?
        };

        self.data = Value::from_json(json);
        Ok(())
    }

    fn contribute(&self) -> Value {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("coverage.json");
        let yaml = dir.path().join("tests.yml");
        std::fs::write(&json, r#"{"line": 81.5, "modules": ["core"]}"#).unwrap();
        std::fs::write(&yaml, "failed: 0\nsuites:\n  - unit\n").unwrap();

        let release = ReleaseDescriptor::default();

        let mut coverage = FileSource::new("coverage", &json);
        coverage.load(&release, &release).unwrap();
        assert_eq!(coverage.contribute().get_property("line").unwrap(), Value::Number(81.5));

        let mut tests = FileSource::new("tests", &yaml);
        tests.load(&release, &release).unwrap();
        assert_eq!(tests.contribute().get_property("failed").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn spec_parsing() {
        let source = FileSource::from_spec("coverage=out/jacoco.json").unwrap();
        assert_eq!(source.namespace(), "coverage");
        assert_eq!(source.path(), Path::new("out/jacoco.json"));
        assert!(FileSource::from_spec("coverage").is_err());
        assert!(FileSource::from_spec("=x.json").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let release = ReleaseDescriptor::default();
        let mut source = FileSource::new("issues", "/nonexistent/issues.json");
        let err = source.load(&release, &release).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read data file"));
    }
}
