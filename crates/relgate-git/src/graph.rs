//! Commit graph algorithms over a [`CommitStore`].

use crate::store::{CommitRecord, CommitStore};
use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;

/// `start` and all of its ancestors.
fn ancestors<S: CommitStore + ?Sized>(store: &S, start: &str) -> Result<FxHashSet<String>> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start.to_string()];

    while let Some(hash) = stack.pop() {
        if !seen.insert(hash.clone()) {
            continue;
        }
        let commit = store.commit(&hash)?;
        stack.extend(commit.parents.into_iter().filter(|p| !seen.contains(p)));
    }

    Ok(seen)
}

/// Best common ancestors of `a` and `b`: common ancestors that are not an
/// ancestor of another common ancestor. Sorted by hash.
pub fn merge_bases<S: CommitStore + ?Sized>(store: &S, a: &str, b: &str) -> Result<Vec<String>> {
    let left = ancestors(store, a)?;
    let right = ancestors(store, b)?;
    let common: FxHashSet<&String> = left.intersection(&right).collect();

    let mut redundant: FxHashSet<String> = FxHashSet::default();
    let mut queue: VecDeque<String> = VecDeque::new();
    for hash in &common {
        queue.extend(store.commit(hash)?.parents);
    }
    while let Some(hash) = queue.pop_front() {
        if !redundant.insert(hash.clone()) {
            continue;
        }
        queue.extend(
            store
                .commit(&hash)?
                .parents
                .into_iter()
                .filter(|p| !redundant.contains(p)),
        );
    }

    let mut best: Vec<String> = common
        .into_iter()
        .filter(|h| !redundant.contains(*h))
        .cloned()
        .collect();
    best.sort();
    Ok(best)
}

#[derive(Debug, Error)]
pub enum MergeBaseError {
    #[error("expected 2 commits, got {0}")]
    Inputs(usize),
    #[error("expected 1 common ancestor, got {0}")]
    Ambiguous(usize),
    #[error(transparent)]
    Store(anyhow::Error),
}

/// The single merge base of exactly two commits, as reported by
/// [`CommitStore::merge_bases`].
pub fn merge_base<S: CommitStore + ?Sized>(
    store: &S,
    commits: &[String],
) -> std::result::Result<String, MergeBaseError> {
    let [a, b] = commits else {
        return Err(MergeBaseError::Inputs(commits.len()));
    };

    let mut bases = store.merge_bases(a, b).map_err(MergeBaseError::Store)?;
    if bases.len() != 1 {
        return Err(MergeBaseError::Ambiguous(bases.len()));
    }

    let base = bases.remove(0);
    tracing::debug!(old = %a, new = %b, hash = %base, "resolved merge base");
    Ok(base)
}

/// Commits reachable from `head` but not from `base`, each listed before all
/// of its parents (newest first). `base` itself is excluded.
pub fn commit_range<S: CommitStore + ?Sized>(
    store: &S,
    base: &str,
    head: &str,
) -> Result<Vec<CommitRecord>> {
    let excluded = ancestors(store, base)?;

    let mut included: FxHashMap<String, CommitRecord> = FxHashMap::default();
    let mut stack = vec![head.to_string()];
    while let Some(hash) = stack.pop() {
        if excluded.contains(&hash) || included.contains_key(&hash) {
            continue;
        }
        let commit = store.commit(&hash)?;
        stack.extend(commit.parents.iter().cloned());
        included.insert(hash, commit);
    }

    let mut children: FxHashMap<&str, usize> = FxHashMap::default();
    for commit in included.values() {
        for parent in &commit.parents {
            if included.contains_key(parent) {
                *children.entry(parent.as_str()).or_default() += 1;
            }
        }
    }

    let mut queue: VecDeque<&str> = included
        .keys()
        .map(String::as_str)
        .filter(|h| !children.contains_key(h))
        .collect();
    let mut ordered = Vec::with_capacity(included.len());

    while let Some(hash) = queue.pop_front() {
        let commit = &included[hash];
        for parent in &commit.parents {
            if let Some(count) = children.get_mut(parent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(parent.as_str());
                }
            }
        }
        ordered.push(commit.clone());
    }

    Ok(ordered)
}

enum Frame {
    Enter(String),
    Exit(String, Vec<String>),
}

/// Memoized "does this commit reach the target" answers for one target.
///
/// Shared across every branch query of a single resolution so that history
/// common to several branches is walked once.
pub struct ReachabilityCache {
    target: String,
    memo: FxHashMap<String, bool>,
}

impl ReachabilityCache {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            memo: FxHashMap::default(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Whether `target` is `start` or one of its ancestors.
    pub fn reaches<S: CommitStore + ?Sized>(&mut self, store: &S, start: &str) -> Result<bool> {
        if let Some(known) = self.memo.get(start) {
            return Ok(*known);
        }

        let mut stack = vec![Frame::Enter(start.to_string())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(hash) => {
                    if self.memo.contains_key(&hash) {
                        continue;
                    }
                    if hash == self.target {
                        self.memo.insert(hash, true);
                        continue;
                    }

                    let parents = store.commit(&hash)?.parents;
                    let pending: Vec<String> = parents
                        .iter()
                        .filter(|p| !self.memo.contains_key(*p))
                        .cloned()
                        .collect();

                    stack.push(Frame::Exit(hash, parents));
                    stack.extend(pending.into_iter().rev().map(Frame::Enter));
                }
                Frame::Exit(hash, parents) => {
                    let reached = parents.iter().any(|p| self.memo.get(p) == Some(&true));
                    self.memo.insert(hash, reached);
                }
            }
        }

        Ok(self.memo.get(start).copied().unwrap_or(false))
    }
}
