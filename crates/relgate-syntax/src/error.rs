use std::fmt;

/// Renders `error_msg` under the offending line of `source` with a caret.
pub fn format_error_with_source(error_msg: &str, source: &str, span: Span) -> String {
    let lines: Vec<&str> = source.lines().collect();

    let line_idx = if span.line > 0 { span.line - 1 } else { 0 };

    if line_idx >= lines.len() {
        return format!("{} at line {}", error_msg, span.line);
    }

    let error_line = lines[line_idx];
    let line_num = span.line;

    let mut output = String::new();
    output.push_str(&format!("  --> line {}:{}\n", line_num, span.col));
    output.push_str("   |\n");

    if line_idx > 0 {
        output.push_str(&format!(" {} | {}\n", line_num - 1, lines[line_idx - 1]));
    }

    output.push_str(&format!(" {} | {}\n", line_num, error_line));

    output.push_str(&format!(
        "   | {}^ {}\n",
        " ".repeat(span.col.saturating_sub(1)),
        error_msg
    ));

    if line_idx + 1 < lines.len() {
        output.push_str(&format!(" {} | {}\n", line_num + 1, lines[line_idx + 1]));
    }

    output.push_str("   |");

    output
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, start: usize, end: usize) -> Self {
        Self { line, col, start, end }
    }

    pub fn single(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, start: offset, end: offset + 1 }
    }

    pub fn merge(&self, other: &Span) -> Self {
        Self {
            line: self.line.min(other.line),
            col: if self.line == other.line { self.col.min(other.col) } else { self.col },
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedChar { ch: char, span: Span, suggestion: Option<String> },
    UnterminatedString { span: Span },
    InvalidNumber { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, suggestion, .. } => {
                write!(f, "unexpected character '{}'", ch)?;
                if let Some(s) = suggestion {
                    write!(f, " (did you mean '{}'?)", s)?;
                }
                Ok(())
            }
            LexError::UnterminatedString { .. } => {
                write!(f, "unterminated string literal")
            }
            LexError::InvalidNumber { text, .. } => {
                write!(f, "invalid number: '{}'", text)
            }
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken { expected: String, found: String, span: Span },
    UnexpectedEof { expected: String, context: Option<String> },
    LexError(LexError),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } => None,
            ParseError::LexError(e) => Some(e.span()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found, .. } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseError::UnexpectedEof { expected, context } => {
                if let Some(ctx) = context {
                    write!(f, "unexpected end of expression while parsing {}, expected {}", ctx, expected)
                } else {
                    write!(f, "unexpected end of expression, expected {}", expected)
                }
            }
            ParseError::LexError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::LexError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_spans_on_same_line() {
        let a = Span::new(1, 5, 4, 6);
        let b = Span::new(1, 2, 1, 3);
        let merged = a.merge(&b);
        assert_eq!(merged.col, 2);
        assert_eq!(merged.start, 1);
        assert_eq!(merged.end, 6);
    }

    #[test]
    fn parse_error_exposes_lex_span() {
        let span = Span::single(1, 3, 2);
        let err = ParseError::from(LexError::UnterminatedString { span });
        assert_eq!(err.span(), Some(span));
        assert_eq!(err.to_string(), "unterminated string literal");
    }

    #[test]
    fn unexpected_end_has_no_span() {
        let err = ParseError::UnexpectedEof {
            expected: "expression".to_string(),
            context: Some("call arguments".to_string()),
        };
        assert_eq!(err.span(), None);
        assert_eq!(
            err.to_string(),
            "unexpected end of expression while parsing call arguments, expected expression"
        );
    }

    #[test]
    fn format_error_points_at_column() {
        let rendered = format_error_with_source("bad token", "a + ^", Span::single(1, 5, 4));
        assert!(rendered.contains(" 1 | a + ^"));
        assert!(rendered.contains("    ^ bad token"));
    }
}
