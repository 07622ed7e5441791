//! Error types for expression evaluation and check execution.
//!
//! [`EvalError`] carries an optional [`Span`] so runtime failures can be shown
//! under the offending clause. [`CheckError`] is the taxonomy of fatal engine
//! failures.

use crate::validate::ValidationError;
use relgate_syntax::{ParseError, Span};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A runtime evaluation error that carries an optional source [`Span`].
///
/// Inside the evaluator these travel as `anyhow::Error` (see [`bail_span!`])
/// and are recovered with `downcast` at the adapter boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
    pub span: Option<Span>,
}

impl EvalError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn spanned(message: impl Into<String>, span: &Span) -> Self {
        Self {
            message: message.into(),
            span: Some(*span),
        }
    }

    /// Recovers the innermost `EvalError` from an `anyhow` chain, or wraps
    /// the whole chain (host function failures) without a span.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<EvalError>() {
            Ok(eval) => eval,
            Err(other) => EvalError::new(format!("{:#}", other), None),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Bail out of a function with an [`EvalError`] that includes a source span.
///
/// ```ignore
/// bail_span!(span, "unknown method '{}'", name);
/// bail_span!(None::<Span>, "division by zero");
/// ```
#[macro_export]
macro_rules! bail_span {
    ($span:expr, $($arg:tt)*) => {
        return Err(anyhow::anyhow!($crate::error::EvalError::new(
            format!($($arg)*),
            $crate::error::into_option_span($span),
        )))
    };
}

pub fn into_option_span(span: impl IntoOptionSpan) -> Option<Span> {
    span.into_option_span()
}

/// Span-like values accepted by [`bail_span!`].
pub trait IntoOptionSpan {
    fn into_option_span(self) -> Option<Span>;
}

impl IntoOptionSpan for Span {
    fn into_option_span(self) -> Option<Span> {
        Some(self)
    }
}

impl IntoOptionSpan for &Span {
    fn into_option_span(self) -> Option<Span> {
        Some(*self)
    }
}

impl IntoOptionSpan for Option<Span> {
    fn into_option_span(self) -> Option<Span> {
        self
    }
}

/// Compilation failure of a clause.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("unknown name '{name}'")]
    UnknownName { name: String, span: Span },
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Syntax(e) => e.span(),
            CompileError::UnknownName { span, .. } => Some(*span),
        }
    }
}

/// Fatal failures of the check engine.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("cannot load check file {}", path.display())]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot compile `{expression}`: {source}")]
    ExpressionCompile {
        expression: String,
        #[source]
        source: CompileError,
    },

    #[error("cannot evaluate `{expression}`: {source}")]
    ExpressionEval {
        expression: String,
        #[source]
        source: EvalError,
    },

    #[error("invalid validation `{clause}`: {source}")]
    ValidationRule {
        clause: String,
        #[source]
        source: ValidationError,
    },

    #[error("cannot expand import `{pattern}`: {reason}")]
    ImportExpansion { pattern: String, reason: String },

    /// An import re-entered a file that is still being evaluated. This is a
    /// kind of import expansion failure.
    #[error("import cycle: {} is already being evaluated", path.display())]
    ImportCycle { path: PathBuf, chain: Vec<PathBuf> },

    #[error("skip condition `{cond}` in {} evaluated to {found}, expected a boolean", path.display())]
    SkipCondition {
        path: PathBuf,
        cond: String,
        found: String,
    },
}

impl CheckError {
    /// Errors that [`crate::checks::ErrorPolicy::Record`] turns into results.
    pub fn is_recordable(&self) -> bool {
        matches!(
            self,
            CheckError::ExpressionCompile { .. }
                | CheckError::ExpressionEval { .. }
                | CheckError::ValidationRule { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bail_span_macro_produces_eval_error() {
        fn try_bail() -> anyhow::Result<()> {
            let span = Span::new(5, 10, 40, 50);
            bail_span!(&span, "variable '{}' not found", "x");
        }
        let err = EvalError::from_anyhow(try_bail().unwrap_err());
        assert_eq!(err.message, "variable 'x' not found");
        assert_eq!(err.span, Some(Span::new(5, 10, 40, 50)));
    }

    #[test]
    fn foreign_errors_keep_their_chain() {
        let err = anyhow::anyhow!("inner").context("outer");
        let eval = EvalError::from_anyhow(err);
        assert_eq!(eval.message, "outer: inner");
        assert!(eval.span.is_none());
    }

    #[test]
    fn only_clause_errors_are_recordable() {
        let eval = CheckError::ExpressionEval {
            expression: "1 / 0".to_string(),
            source: EvalError::new("division by zero", None),
        };
        assert!(eval.is_recordable());
        assert_eq!(eval.to_string(), "cannot evaluate `1 / 0`: division by zero");

        let import = CheckError::ImportExpansion {
            pattern: "-".to_string(),
            reason: "no external check file".to_string(),
        };
        assert!(!import.is_recordable());
    }
}
