use crate::environment::DataSource;
use crate::release::ReleaseDescriptor;
use crate::value::Value;
use anyhow::{Context, Result, bail};
use relgate_git::{CommitRecord, CommitStore, ProvenanceResolver, ResolveError, changed_components};
use serde::Serialize;
use std::collections::BTreeMap;

/// Opens a component URL as a commit store in place of cloning it.
pub type StoreOpener = Box<dyn Fn(&str) -> Result<Box<dyn CommitStore>, ResolveError>>;

/// Provenance of one changed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentProvenance {
    pub name: String,
    pub url: String,
    pub old: String,
    pub new: String,
    pub merge_base: String,
    pub commits: Vec<CommitRecord>,
    pub branches: Vec<String>,
}

/// The `git` namespace: commit history of every component whose revision
/// changed between the two releases.
pub struct CommitSource {
    resolver: ProvenanceResolver,
    project_key: String,
    opener: Option<StoreOpener>,
    branch: String,
    components: Vec<ComponentProvenance>,
    data: Value,
}

impl CommitSource {
    pub fn new(resolver: ProvenanceResolver, project_key: impl Into<String>) -> Self {
        Self {
            resolver,
            project_key: project_key.into(),
            opener: None,
            branch: String::new(),
            components: Vec::new(),
            data: Value::Null,
        }
    }

    pub fn with_opener(
        resolver: ProvenanceResolver,
        project_key: impl Into<String>,
        opener: impl Fn(&str) -> Result<Box<dyn CommitStore>, ResolveError> + 'static,
    ) -> Self {
        let mut source = Self::new(resolver, project_key);
        source.opener = Some(Box::new(opener));
        source
    }

    pub fn components(&self) -> &[ComponentProvenance] {
        &self.components
    }

    fn build_value(&self) -> Result<Value> {
        let commits: Vec<&CommitRecord> = self
            .components
            .iter()
            .flat_map(|c| c.commits.iter())
            .collect();

        let mut branches: Vec<&str> = Vec::new();
        for name in self.components.iter().flat_map(|c| c.branches.iter()) {
            if !branches.contains(&name.as_str()) {
                branches.push(name);
            }
        }

        let mut git = BTreeMap::new();
        git.insert("branch".to_string(), Value::String(self.branch.clone()));
        git.insert("commits".to_string(), Value::from_serialize(&commits)?);
        git.insert("branches".to_string(), Value::from_serialize(&branches)?);
        git.insert("components".to_string(), Value::from_serialize(&self.components)?);
        git.insert(
            "validCommitMsg".to_string(),
            valid_commit_msg(format!("{}-", self.project_key)),
        );
        Ok(Value::Object(git))
    }
}

fn valid_commit_msg(prefix: String) -> Value {
    Value::function("validCommitMsg", move |args| {
        let message = match args {
            [Value::Object(commit)] => match commit.get("message") {
                Some(Value::String(message)) => message.as_str(),
                _ => bail!("commit has no message"),
            },
            [Value::String(message)] => message.as_str(),
            _ => bail!("expected a commit or a commit message"),
        };
        Ok(Value::Bool(message.starts_with(&prefix)))
    })
}

impl DataSource for CommitSource {
    fn namespace(&self) -> &str {
        "git"
    }

    fn load(&mut self, old: &ReleaseDescriptor, new: &ReleaseDescriptor) -> Result<()> {
        for change in changed_components(&old.components, &new.components) {
            let name = change.name();
            tracing::info!(component = %name, old = %change.old_rev, new = %change.new_rev, "resolving commits");

            let resolved = match &self.opener {
                Some(open) => open(&change.url).and_then(|store| {
                    self.resolver
                        .resolve_in(store.as_ref(), &change.old_rev, &change.new_rev)
                }),
                None => self
                    .resolver
                    .resolve(&change.url, &change.old_rev, &change.new_rev),
            };
            let (provenance, branches) =
                resolved.with_context(|| format!("Failed to resolve component {}", name))?;

            tracing::debug!(
                component = %name,
                merge_base = %provenance.merge_base,
                commits = provenance.commits.len(),
                "resolved commit range"
            );

            self.branch = change.new_rev.clone();
            self.components.push(ComponentProvenance {
                name,
                url: change.url,
                old: change.old_rev,
                new: change.new_rev,
                merge_base: provenance.merge_base,
                commits: provenance.commits,
                branches: branches.names().into_iter().map(str::to_string).collect(),
            });
        }

        self.data = self.build_value()?;
        Ok(())
    }

    fn contribute(&self) -> Value {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relgate_git::{Credentials, MemoryRepository, ResolverOptions};

    fn repo_a() -> MemoryRepository {
        let mut repo = MemoryRepository::new("repoA");
        repo.add_commit("c1", &[], "ZZZ-1 start")
            .add_commit("c2", &["c1"], "ZZZ-2 second")
            .add_commit("c3", &["c2"], "wip")
            .set_ref("refs/tags/rev1", "c1")
            .set_ref("refs/tags/rev2", "c3")
            .set_ref("refs/heads/main", "c3");
        repo
    }

    fn source() -> CommitSource {
        let resolver = ProvenanceResolver::new(Credentials::anonymous(), ResolverOptions::default());
        CommitSource::with_opener(resolver, "ZZZ", |url| match url {
            "https://git.example.com/repoA.git" => Ok(Box::new(repo_a()) as Box<dyn CommitStore>),
            other => Err(ResolveError::RepositoryAccess {
                location: other.to_string(),
                source: anyhow::anyhow!("no such repository"),
            }),
        })
    }

    fn releases(old: &str, new: &str) -> (ReleaseDescriptor, ReleaseDescriptor) {
        (
            ReleaseDescriptor::new("ZZZ_1.3", vec![old.to_string()]),
            ReleaseDescriptor::new("ZZZ_1.4", vec![new.to_string()]),
        )
    }

    #[test]
    fn changed_component_contributes_commits() {
        let (old, new) = releases(
            "https://git.example.com/repoA.git@rev1",
            "https://git.example.com/repoA.git@rev2",
        );
        let mut git = source();
        git.load(&old, &new).unwrap();

        let value = git.contribute();
        assert_eq!(value.get_property("branch").unwrap(), Value::from("rev2"));
        let hashes: Vec<String> = match value.get_property("commits").unwrap() {
            Value::Array(commits) => commits
                .iter()
                .map(|c| c.get_property("hash").unwrap().display())
                .collect(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(hashes, vec!["c3", "c2"]);
        assert_eq!(value.get_property("branches").unwrap(), Value::from(vec!["main"]));

        let component = git.components()[0].clone();
        assert_eq!(component.name, "repoA");
        assert_eq!(component.merge_base, "c1");
    }

    #[test]
    fn valid_commit_msg_checks_the_project_key() {
        let (old, new) = releases(
            "https://git.example.com/repoA.git@rev1",
            "https://git.example.com/repoA.git@rev2",
        );
        let mut git = source();
        git.load(&old, &new).unwrap();

        let value = git.contribute();
        let commits = value.get_property("commits").unwrap();
        let first = commits.index(&Value::Number(0.0)).unwrap();
        let second = commits.index(&Value::Number(1.0)).unwrap();
        assert_eq!(value.call_method("validCommitMsg", &[first]).unwrap(), Value::Bool(false));
        assert_eq!(value.call_method("validCommitMsg", &[second]).unwrap(), Value::Bool(true));
        assert!(value.call_method("validCommitMsg", &[Value::Null]).is_err());
    }

    #[test]
    fn unchanged_components_are_not_opened() {
        let (old, new) = releases("https://git.example.com/other.git@v1", "https://git.example.com/other.git@v1");
        let mut git = source();
        git.load(&old, &new).unwrap();
        assert!(git.components().is_empty());
        assert_eq!(git.contribute().get_property("commits").unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn resolution_errors_name_the_component() {
        let (old, new) = releases("https://git.example.com/repoA.git@rev1", "https://git.example.com/repoA.git@nope");
        let err = source().load(&old, &new).unwrap_err();
        assert_eq!(err.to_string(), "Failed to resolve component repoA");
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::UnresolvedRevision { revision }) if revision == "nope"
        ));
    }
}
