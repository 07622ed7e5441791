use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One commit: hash, message, ordered parent hashes, `Name <email>` author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub parents: Vec<String>,
    pub author: String,
}

/// A branch head. `name` is the short branch name (`main`, `release/1.4`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    pub name: String,
    pub hash: String,
}

/// Read access to a commit graph.
pub trait CommitStore {
    /// Human-readable location, used in error messages.
    fn location(&self) -> &str;

    /// Resolves a fully qualified ref (`refs/heads/main`) to a commit hash.
    fn resolve_ref(&self, refname: &str) -> Result<Option<String>>;

    /// Resolves a full or abbreviated commit hash.
    fn resolve_hash(&self, rev: &str) -> Result<Option<String>>;

    fn commit(&self, hash: &str) -> Result<CommitRecord>;

    /// Branch heads of `remote`, or local heads when no such remote exists.
    fn branches(&self, remote: &str) -> Result<Vec<BranchRef>>;

    /// Best common ancestors of `a` and `b`, sorted by hash.
    fn merge_bases(&self, a: &str, b: &str) -> Result<Vec<String>> {
        crate::graph::merge_bases(self, a, b)
    }

    /// Commits reachable from `head` but not from `base`, newest first.
    fn commit_range(&self, base: &str, head: &str) -> Result<Vec<CommitRecord>> {
        crate::graph::commit_range(self, base, head)
    }
}

/// In-memory commit graph for synthetic histories.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    location: String,
    commits: HashMap<String, CommitRecord>,
    refs: BTreeMap<String, String>,
}

impl MemoryRepository {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn add_commit(&mut self, hash: &str, parents: &[&str], message: &str) -> &mut Self {
        self.insert(CommitRecord {
            hash: hash.to_string(),
            message: message.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            author: "relgate <relgate@localhost>".to_string(),
        })
    }

    pub fn insert(&mut self, commit: CommitRecord) -> &mut Self {
        self.commits.insert(commit.hash.clone(), commit);
        self
    }

    pub fn set_ref(&mut self, refname: &str, hash: &str) -> &mut Self {
        self.refs.insert(refname.to_string(), hash.to_string());
        self
    }
}

impl CommitStore for MemoryRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn resolve_ref(&self, refname: &str) -> Result<Option<String>> {
        Ok(self.refs.get(refname).cloned())
    }

    fn resolve_hash(&self, rev: &str) -> Result<Option<String>> {
        if self.commits.contains_key(rev) {
            return Ok(Some(rev.to_string()));
        }

        let mut candidates = self.commits.keys().filter(|h| h.starts_with(rev));
        match (candidates.next(), candidates.next()) {
            (Some(hash), None) if rev.len() >= 4 => Ok(Some(hash.clone())),
            _ => Ok(None),
        }
    }

    fn commit(&self, hash: &str) -> Result<CommitRecord> {
        self.commits
            .get(hash)
            .cloned()
            .ok_or_else(|| anyhow!("commit {} not found in {}", hash, self.location))
    }

    fn branches(&self, remote: &str) -> Result<Vec<BranchRef>> {
        let remote_prefix = format!("refs/remotes/{}/", remote);
        let remote_heads: Vec<BranchRef> = self
            .refs
            .iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix(&remote_prefix).map(|short| BranchRef {
                    name: short.to_string(),
                    hash: hash.clone(),
                })
            })
            .collect();

        if !remote_heads.is_empty() {
            return Ok(remote_heads);
        }

        Ok(self
            .refs
            .iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix("refs/heads/").map(|short| BranchRef {
                    name: short.to_string(),
                    hash: hash.clone(),
                })
            })
            .collect())
    }
}
