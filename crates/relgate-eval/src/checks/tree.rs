use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// One check-definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTree {
    /// Skip condition; the file is skipped when it evaluates to `false`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cond: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Newline separated clauses.
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub output: String,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,

    /// Glob pattern of check files to evaluate in place of this step, or
    /// `-` for the externally supplied check file.
    #[serde(default, deserialize_with = "null_as_default")]
    pub import: String,
}

/// One line of a step condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause<'a> {
    /// `<field> valid: <rule>`
    Validation {
        text: &'a str,
        field: &'a str,
        rule: &'a str,
    },
    Expression { text: &'a str },
}

impl<'a> Clause<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') || text.starts_with("//") {
            return None;
        }

        if let Some((field, rest)) = text.split_once(char::is_whitespace)
            && let Some(rule) = rest.trim_start().strip_prefix("valid:")
            && (rule.is_empty() || rule.starts_with(char::is_whitespace))
        {
            return Some(Clause::Validation {
                text,
                field,
                rule: rule.trim(),
            });
        }

        Some(Clause::Expression { text })
    }

    pub fn text(&self) -> &'a str {
        match self {
            Clause::Validation { text, .. } | Clause::Expression { text } => text,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl CheckTree {
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(file = %path.display(), "loading check file");
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid check file {}", path.display()))
    }

    /// An empty document is a tree without steps.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

impl Step {
    pub fn is_import(&self) -> bool {
        !self.import.trim().is_empty()
    }

    /// Clauses of the condition in order, without blank and comment lines.
    pub fn clauses(&self) -> impl Iterator<Item = Clause<'_>> {
        self.condition.split('\n').filter_map(Clause::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tree_with_nulls() {
        let tree = CheckTree::from_yaml(
            "cond: git.branch != ''\nsteps:\n  - name: Commits\n    description:\n    type: git\n    condition: |\n      len(git.commits) > 0\n  - import: checks/*.yml\n",
        )
        .unwrap();

        assert_eq!(tree.cond, "git.branch != ''");
        assert_eq!(tree.steps.len(), 2);
        assert_eq!(tree.steps[0].kind, "git");
        assert_eq!(tree.steps[0].description, "");
        assert!(!tree.steps[0].is_import());
        assert!(tree.steps[1].is_import());
    }

    #[test]
    fn empty_document_has_no_steps() {
        assert_eq!(CheckTree::from_yaml("\n").unwrap(), CheckTree::default());
        assert_eq!(CheckTree::from_yaml("steps:\n").unwrap(), CheckTree::default());
    }

    #[test]
    fn comments_and_blank_lines_are_not_clauses() {
        let step = Step {
            condition: "# heading\n\n   \r\n// note\n  1 == 1\r\nrelease valid: required\n".to_string(),
            ..Default::default()
        };
        let clauses: Vec<Clause<'_>> = step.clauses().collect();
        assert_eq!(
            clauses,
            vec![
                Clause::Expression { text: "1 == 1" },
                Clause::Validation {
                    text: "release valid: required",
                    field: "release",
                    rule: "required",
                },
            ]
        );
    }

    #[test]
    fn validation_marker_must_be_the_second_token() {
        assert!(matches!(Clause::parse("a  valid:  email"), Some(Clause::Validation { field: "a", rule: "email", .. })));
        assert!(matches!(Clause::parse("x == 'valid: y'"), Some(Clause::Expression { .. })));
        assert!(matches!(Clause::parse("a valid:email"), Some(Clause::Expression { .. })));
        assert!(matches!(Clause::parse("a b valid: c"), Some(Clause::Expression { .. })));
    }
}
