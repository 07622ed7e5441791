//! The read-only namespace map checks are evaluated against.
//!
//! An [`EnvironmentBuilder`] installs `releases`, the `println` and `split`
//! host functions, and one namespace per [`DataSource`]. Every top-level name
//! has exactly one owner; a second writer is an
//! [`EnvironmentError::Collision`].

use crate::release::ReleaseDescriptor;
use crate::value::{Value, split_string};
use anyhow::bail;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("namespace `{name}` is already defined")]
    Collision { name: String },

    #[error("data source `{namespace}` failed")]
    Source {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot convert `{name}` into an environment value")]
    Conversion {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A provider of one environment namespace.
pub trait DataSource {
    fn namespace(&self) -> &str;

    /// Gathers data for the difference between two releases.
    fn load(&mut self, old: &ReleaseDescriptor, new: &ReleaseDescriptor) -> anyhow::Result<()>;

    /// The value mounted under [`DataSource::namespace`].
    fn contribute(&self) -> Value;
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a top-level name. Names are never overwritten.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Result<(), EnvironmentError> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(EnvironmentError::Collision { name });
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Like [`Environment::get`], but a missing name is `null`.
    pub fn lookup(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

pub struct EnvironmentBuilder {
    old: ReleaseDescriptor,
    new: ReleaseDescriptor,
    sources: Vec<Box<dyn DataSource>>,
    values: Vec<(String, Value)>,
}

impl EnvironmentBuilder {
    pub fn new(old: ReleaseDescriptor, new: ReleaseDescriptor) -> Self {
        Self {
            old,
            new,
            sources: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Box<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Box<dyn DataSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Loads every data source in order and assembles the environment.
    pub fn build(mut self) -> Result<Environment, EnvironmentError> {
        let mut env = Environment::new();

        let releases = release_value(&self.old, &self.new)?;
        env.insert("releases", releases)?;
        env.insert("println", Value::function("println", host_println))?;
        env.insert("split", Value::function("split", host_split))?;

        for source in &mut self.sources {
            let namespace = source.namespace().to_string();
            if env.contains(&namespace) {
                return Err(EnvironmentError::Collision { name: namespace });
            }

            tracing::info!(namespace = %namespace, "loading data source");
            source
                .load(&self.old, &self.new)
                .map_err(|source| EnvironmentError::Source {
                    namespace: namespace.clone(),
                    source,
                })?;
            env.insert(namespace, source.contribute())?;
        }

        for (name, value) in self.values {
            env.insert(name, value)?;
        }

        tracing::debug!(names = ?env.names().collect::<Vec<_>>(), "environment ready");
        Ok(env)
    }
}

fn release_value(old: &ReleaseDescriptor, new: &ReleaseDescriptor) -> Result<Value, EnvironmentError> {
    let convert = |descriptor: &ReleaseDescriptor, name: &str| {
        Value::from_serialize(descriptor).map_err(|source| EnvironmentError::Conversion {
            name: name.to_string(),
            source,
        })
    };

    let mut releases = BTreeMap::new();
    releases.insert("old".to_string(), convert(old, "releases.old")?);
    releases.insert("new".to_string(), convert(new, "releases.new")?);
    Ok(Value::Object(releases))
}

fn host_println(args: &[Value]) -> anyhow::Result<Value> {
    let line: Vec<String> = args.iter().map(Value::display).collect();
    println!("{}", line.join(" "));
    Ok(Value::Null)
}

fn host_split(args: &[Value]) -> anyhow::Result<Value> {
    match args {
        [text, separator] => Ok(split_string(&text.as_string()?, &separator.as_string()?)),
        _ => bail!("split() takes exactly 2 arguments, got {}", args.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static {
        namespace: &'static str,
        loaded: bool,
    }

    impl DataSource for Static {
        fn namespace(&self) -> &str {
            self.namespace
        }

        fn load(&mut self, _old: &ReleaseDescriptor, new: &ReleaseDescriptor) -> anyhow::Result<()> {
            if new.release.is_empty() {
                bail!("no release name");
            }
            self.loaded = true;
            Ok(())
        }

        fn contribute(&self) -> Value {
            Value::Bool(self.loaded)
        }
    }

    fn releases() -> (ReleaseDescriptor, ReleaseDescriptor) {
        (
            ReleaseDescriptor::new("ZZZ_1.3", vec!["core@v1".to_string()]),
            ReleaseDescriptor::new("ZZZ_1.4", vec!["core@v2".to_string()]),
        )
    }

    #[test]
    fn builder_installs_releases_and_host_functions() {
        let (old, new) = releases();
        let env = EnvironmentBuilder::new(old, new)
            .with_source(Box::new(Static { namespace: "coverage", loaded: false }))
            .build()
            .unwrap();

        let names: Vec<&str> = env.names().collect();
        assert_eq!(names, vec!["coverage", "println", "releases", "split"]);
        assert_eq!(env.lookup("coverage"), Value::Bool(true));

        let new_release = env.lookup("releases").get_property("new").unwrap();
        assert_eq!(new_release.get_property("release").unwrap(), Value::from("ZZZ_1.4"));
        assert_eq!(env.lookup("missing"), Value::Null);
    }

    #[test]
    fn namespace_collision_is_rejected() {
        let (old, new) = releases();
        let err = EnvironmentBuilder::new(old, new)
            .with_source(Box::new(Static { namespace: "split", loaded: false }))
            .build()
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Collision { ref name } if name == "split"));
    }

    #[test]
    fn source_failure_names_the_namespace() {
        let (old, _) = releases();
        let err = EnvironmentBuilder::new(old, ReleaseDescriptor::default())
            .with_source(Box::new(Static { namespace: "issues", loaded: false }))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "data source `issues` failed");
    }

    #[test]
    fn split_host_function() {
        let result = host_split(&[Value::from("a,b,c"), Value::from(",")]).unwrap();
        assert_eq!(result, Value::from(vec!["a", "b", "c"]));
        assert!(host_split(&[Value::from("a")]).is_err());
    }
}
