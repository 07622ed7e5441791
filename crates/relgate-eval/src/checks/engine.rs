//! Recursive evaluation of check trees.

use super::result::{CheckResult, Status};
use super::tree::{CheckTree, Clause, Step};
use crate::environment::Environment;
use crate::error::CheckError;
use crate::expr::ExpressionAdapter;
use crate::validate::validate_field;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happens when a clause cannot be compiled, evaluated or validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop the run.
    #[default]
    Abort,
    /// Record a Failed result carrying the error and continue.
    Record,
}

/// How a non-boolean clause value maps to a status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusRule {
    /// OK iff the value is the zero value of its type.
    #[default]
    ZeroIsOk,
    /// OK iff the value is not the zero value of its type.
    Truthy,
}

impl StatusRule {
    pub fn status(&self, value: &Value) -> Status {
        match value {
            Value::Bool(b) => Status::from_bool(*b),
            other => match self {
                StatusRule::ZeroIsOk => Status::from_bool(other.is_zero()),
                StatusRule::Truthy => Status::from_bool(!other.is_zero()),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Directory relative import patterns are resolved against; the working
    /// directory when unset.
    pub base_dir: Option<PathBuf>,
    /// Substituted for the `-` import pattern.
    pub external_path: Option<PathBuf>,
    pub error_policy: ErrorPolicy,
    pub status_rule: StatusRule,
}

pub struct CheckEngine<'env> {
    env: &'env Environment,
    adapter: ExpressionAdapter,
    options: EngineOptions,
    open: Vec<PathBuf>,
}

impl<'env> CheckEngine<'env> {
    pub fn new(env: &'env Environment, options: EngineOptions) -> Self {
        Self {
            env,
            adapter: ExpressionAdapter::new(),
            options,
            open: Vec::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Evaluates the check tree at `path` and everything it imports.
    pub fn evaluate(&mut self, path: &Path) -> Result<Vec<CheckResult>, CheckError> {
        self.open.clear();
        self.visit(path, true)
    }

    fn visit(&mut self, path: &Path, root: bool) -> Result<Vec<CheckResult>, CheckError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            _ => {
                tracing::debug!(file = %path.display(), "no check file");
                return Ok(Vec::new());
            }
        }

        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.open.contains(&canonical) {
            return Err(CheckError::ImportCycle {
                path: canonical,
                chain: self.open.clone(),
            });
        }

        let tree = match CheckTree::load(path) {
            Ok(tree) => tree,
            Err(source) if root => {
                return Err(CheckError::ConfigLoad {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %format!("{:#}", e), "ignoring unreadable import");
                return Ok(Vec::new());
            }
        };

        if !self.should_run(path, &tree)? {
            tracing::info!(file = %path.display(), "skipping file");
            return Ok(Vec::new());
        }

        self.open.push(canonical);
        let results = self.run_steps(&tree);
        self.open.pop();
        results
    }

    fn should_run(&self, path: &Path, tree: &CheckTree) -> Result<bool, CheckError> {
        let cond = tree.cond.trim();
        if cond.is_empty() {
            return Ok(true);
        }

        match self.eval_expression(cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(CheckError::SkipCondition {
                path: path.to_path_buf(),
                cond: cond.to_string(),
                found: format!("{} `{}`", other.type_name(), other.display()),
            }),
        }
    }

    fn run_steps(&mut self, tree: &CheckTree) -> Result<Vec<CheckResult>, CheckError> {
        let mut results = Vec::new();

        for step in &tree.steps {
            if step.is_import() {
                results.extend(self.run_import(&step.import)?);
                continue;
            }

            tracing::info!(check = %step.name, "running");
            for clause in step.clauses() {
                match self.run_clause(step, &clause) {
                    Ok(result) => results.push(result),
                    Err(e) if self.options.error_policy == ErrorPolicy::Record && e.is_recordable() => {
                        tracing::warn!(check = %step.name, clause = clause.text(), error = %e, "recording failed clause");
                        results.push(CheckResult {
                            name: step.name.clone(),
                            status: Status::Failed,
                            reference: clause.text().to_string(),
                            comment: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(results)
    }

    fn run_import(&mut self, pattern: &str) -> Result<Vec<CheckResult>, CheckError> {
        let pattern = pattern.trim();

        let paths = if pattern == "-" {
            let external = self.options.external_path.clone().ok_or_else(|| {
                CheckError::ImportExpansion {
                    pattern: pattern.to_string(),
                    reason: "no external check file was supplied".to_string(),
                }
            })?;
            vec![external]
        } else {
            self.expand(pattern)?
        };

        let mut results = Vec::new();
        for path in paths {
            tracing::info!(file = %path.display(), "importing");
            results.extend(self.visit(&path, false)?);
        }
        Ok(results)
    }

    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>, CheckError> {
        let full = match &self.options.base_dir {
            Some(base) if !Path::new(pattern).is_absolute() => {
                let base = glob::Pattern::escape(&base.to_string_lossy());
                format!("{}/{}", base.trim_end_matches('/'), pattern)
            }
            _ => pattern.to_string(),
        };

        let entries = glob::glob(&full).map_err(|e| CheckError::ImportExpansion {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(pattern, error = %e, "skipping unreadable import match"),
            }
        }
        paths.sort();

        if paths.is_empty() {
            tracing::debug!(pattern, "import matched no files");
        }
        Ok(paths)
    }

    fn run_clause(&self, step: &Step, clause: &Clause<'_>) -> Result<CheckResult, CheckError> {
        let (status, comment) = match *clause {
            Clause::Validation { text, field, rule } => {
                let value = self.env.lookup(field);
                let ok = validate_field(field, &value, rule).map_err(|source| {
                    CheckError::ValidationRule {
                        clause: text.to_string(),
                        source,
                    }
                })?;
                log_clause(text, ok, &ok.to_string());
                (Status::from_bool(ok), ok.to_string())
            }
            Clause::Expression { text } => {
                let value = self.eval_expression(text)?;
                let status = self.options.status_rule.status(&value);
                let comment = value.display();
                log_clause(text, status == Status::Ok, &comment);
                (status, comment)
            }
        };

        Ok(CheckResult {
            name: step.name.clone(),
            status,
            reference: clause.text().to_string(),
            comment,
        })
    }

    fn eval_expression(&self, source: &str) -> Result<Value, CheckError> {
        let compiled = self.adapter.compile(source, self.env).map_err(|source_err| {
            CheckError::ExpressionCompile {
                expression: source.to_string(),
                source: source_err,
            }
        })?;

        self.adapter
            .evaluate(&compiled, self.env)
            .map_err(|e| CheckError::ExpressionEval {
                expression: source.to_string(),
                source: e,
            })
    }
}

fn log_clause(clause: &str, ok: bool, result: &str) {
    if ok {
        tracing::debug!(clause, result, "clause passed");
    } else {
        tracing::warn!(clause, result, "clause failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn zero_is_ok_rule() {
        let rule = StatusRule::ZeroIsOk;
        assert_eq!(rule.status(&Value::Bool(true)), Status::Ok);
        assert_eq!(rule.status(&Value::Bool(false)), Status::Failed);
        assert_eq!(rule.status(&Value::Number(0.0)), Status::Ok);
        assert_eq!(rule.status(&Value::Number(2.0)), Status::Failed);
        assert_eq!(rule.status(&Value::from("")), Status::Ok);
        assert_eq!(rule.status(&Value::from("x")), Status::Failed);
        assert_eq!(rule.status(&Value::Array(vec![])), Status::Ok);
        assert_eq!(rule.status(&Value::Object(BTreeMap::new())), Status::Ok);
        assert_eq!(rule.status(&Value::Null), Status::Ok);
    }

    #[test]
    fn truthy_rule_only_changes_non_booleans() {
        let rule = StatusRule::Truthy;
        assert_eq!(rule.status(&Value::Bool(true)), Status::Ok);
        assert_eq!(rule.status(&Value::Bool(false)), Status::Failed);
        assert_eq!(rule.status(&Value::Number(0.0)), Status::Failed);
        assert_eq!(rule.status(&Value::Number(2.0)), Status::Ok);
        assert_eq!(rule.status(&Value::from("x")), Status::Ok);
    }

    #[test]
    fn policy_names() {
        let rule: StatusRule = serde_json::from_str("\"zero-is-ok\"").unwrap();
        assert_eq!(rule, StatusRule::ZeroIsOk);
        let policy: ErrorPolicy = serde_json::from_str("\"record\"").unwrap();
        assert_eq!(policy, ErrorPolicy::Record);
    }
}
