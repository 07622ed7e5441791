//! Component references of the form `<url>@<revision>`.

use serde::Serialize;
use std::collections::HashMap;

/// A component whose revision differs between two releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentChange {
    pub url: String,
    pub old_rev: String,
    pub new_rev: String,
}

impl ComponentChange {
    pub fn name(&self) -> String {
        component_name(&self.url)
    }
}

/// Splits `url@revision` at the last `@`, so `git@host:org/repo.git@v1`
/// keeps its user part. A reference without a revision suffix has an empty
/// revision.
pub fn parse_component(reference: &str) -> (String, String) {
    match reference.rsplit_once('@') {
        Some((url, rev)) if !url.is_empty() && !rev.contains(':') => {
            (url.trim().to_string(), rev.trim().to_string())
        }
        _ => (reference.trim().to_string(), String::new()),
    }
}

/// Short component name: last path segment of the URL without `.git`.
pub fn component_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let base = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    base.strip_suffix(".git").unwrap_or(base).to_string()
}

/// Components present in both lists with differing revisions, in the order
/// of `new`. Unchanged and newly added components are not reported.
pub fn changed_components(old: &[String], new: &[String]) -> Vec<ComponentChange> {
    let previous: HashMap<String, String> = old.iter().map(|c| parse_component(c)).collect();

    new.iter()
        .map(|c| parse_component(c))
        .filter_map(|(url, new_rev)| match previous.get(&url) {
            Some(old_rev) if *old_rev != new_rev => Some(ComponentChange {
                url,
                old_rev: old_rev.clone(),
                new_rev,
            }),
            _ => None,
        })
        .collect()
}
