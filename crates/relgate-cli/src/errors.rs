use colored::*;
use relgate::{CheckError, ResolveError};
use relgate_syntax::{Span, format_error_with_source};
use std::fmt;

/// A fatal error with its cause chain, an optional source snippet and hints.
pub struct EnhancedError {
    pub message: String,
    pub causes: Vec<String>,
    pub span: Option<Span>,
    pub source: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
}

impl EnhancedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            span: None,
            source: None,
            suggestion: None,
            help: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.message.bold());

        for cause in &self.causes {
            eprintln!("  {} {}", "caused by:".yellow(), cause);
        }

        if let (Some(source), Some(span)) = (&self.source, self.span) {
            let label = self.causes.last().unwrap_or(&self.message);
            eprintln!();
            eprintln!("{}", format_error_with_source(label, source, span).dimmed());
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!();
            eprintln!("{} {}", "suggestion:".green().bold(), suggestion);
        }

        if let Some(help) = &self.help {
            eprintln!();
            eprintln!("{} {}", "help:".cyan().bold(), help);
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnhancedError: {}", self.message)
    }
}

impl std::error::Error for EnhancedError {}

/// Converts a fatal run error into an [`EnhancedError`] with hints for the
/// failures users hit most often.
pub fn enhance_error(err: anyhow::Error) -> EnhancedError {
    let mut enhanced = EnhancedError::new(err.to_string());

    // thiserror messages often embed their source already
    let mut shown = enhanced.message.clone();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !shown.contains(&text) {
            shown = text.clone();
            enhanced = enhanced.with_cause(text);
        }
    }

    if let Some(check) = err.chain().find_map(|c| c.downcast_ref::<CheckError>()) {
        enhanced = enhance_check_error(enhanced, check);
    } else if let Some(resolve) = err.chain().find_map(|c| c.downcast_ref::<ResolveError>()) {
        enhanced = enhance_resolve_error(enhanced, resolve);
    }

    enhanced
}

fn enhance_check_error(enhanced: EnhancedError, err: &CheckError) -> EnhancedError {
    match err {
        CheckError::ExpressionCompile { expression, source } => {
            let enhanced = enhanced
                .with_source(expression.clone())
                .with_suggestion("Check the expression syntax and the names it uses");
            match source.span() {
                Some(span) => enhanced.with_span(span),
                None => enhanced,
            }
        }
        CheckError::ExpressionEval { expression, source } => {
            let enhanced = enhanced.with_source(expression.clone());
            match source.span {
                Some(span) => enhanced.with_span(span),
                None => enhanced,
            }
        }
        CheckError::ValidationRule { .. } => enhanced.with_help(
            "Validation clauses look like `field valid: rule`, e.g. `releases.new.release valid: required,semver`",
        ),
        CheckError::SkipCondition { .. } => enhanced
            .with_suggestion("Make `cond` a comparison, e.g. `cond: len(releases.new.components) > 0`")
            .with_help("A skip condition must evaluate to true or false"),
        CheckError::ImportCycle { chain, .. } => {
            let chain: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
            enhanced.with_help(format!("Import chain: {}", chain.join(" -> ")))
        }
        CheckError::ImportExpansion { pattern, .. } if pattern.trim() == "-" => enhanced
            .with_help("`import: -` stands for the check file passed on the command line"),
        CheckError::ImportExpansion { .. } => {
            enhanced.with_help("Import patterns are globs relative to the working directory")
        }
        CheckError::ConfigLoad { .. } => {
            enhanced.with_suggestion("Check that the file is valid YAML with a `steps` list")
        }
    }
}

fn enhance_resolve_error(enhanced: EnhancedError, err: &ResolveError) -> EnhancedError {
    match err {
        ResolveError::RepositoryAccess { .. } => enhanced
            .with_suggestion("Set GIT_USERNAME and GIT_PASSWORD for private repositories")
            .with_help("Use --no-git to run the checks without commit data"),
        ResolveError::UnresolvedRevision { .. } => enhanced
            .with_help("Revisions are looked up as branch, tag, remote branch, then commit hash"),
        ResolveError::MergeBaseAmbiguity { .. } | ResolveError::MergeBaseInputs { .. } => {
            enhanced.with_help("The two revisions must share exactly one merge base")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn embedded_sources_are_not_repeated() {
        let err = anyhow::Error::new(CheckError::ConfigLoad {
            path: PathBuf::from("checks.yml"),
            source: anyhow::anyhow!("No such file"),
        });
        let enhanced = enhance_error(err);
        assert_eq!(enhanced.message, "cannot load check file checks.yml");
        assert_eq!(enhanced.causes, vec!["No such file"]);
        assert!(enhanced.suggestion.is_some());
    }

    #[test]
    fn context_layers_become_causes() {
        let err = anyhow::Error::new(ResolveError::UnresolvedRevision {
            revision: "v9".to_string(),
        })
        .context("Failed to resolve component repo");
        let enhanced = enhance_error(err);
        assert_eq!(enhanced.message, "Failed to resolve component repo");
        assert_eq!(enhanced.causes.len(), 1);
        assert!(enhanced.help.unwrap().contains("branch, tag"));
    }

    #[test]
    fn sentinel_import_gets_dedicated_help() {
        let err = anyhow::Error::new(CheckError::ImportExpansion {
            pattern: "-".to_string(),
            reason: "no check file given".to_string(),
        });
        assert!(enhance_error(err).help.unwrap().contains("command line"));
    }
}
