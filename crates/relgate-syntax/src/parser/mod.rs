mod expressions;

use crate::ast::Expression;
use crate::error::{ParseError, Span};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Recursive-descent parser for check expressions.
///
/// Consumes a sequence of [`SpannedToken`]s and produces a single
/// [`Expression`]. Use [`parse()`] or [`parse_source()`] as entry points.
pub struct Parser {
    pub(super) tokens: Vec<SpannedToken>,
    pub(super) pos: usize,
}

pub(super) type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    #[inline]
    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.pos).map(|st| st.span)
    }

    #[inline]
    pub(super) fn advance(&mut self) -> Option<SpannedToken> {
        if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    pub(super) fn expect(&mut self, expected: Token, context: &str) -> Result<Span> {
        match self.advance() {
            Some(st) if st.token == expected => Ok(st.span),
            Some(st) => Err(ParseError::UnexpectedToken {
                expected: expected.display_name(),
                found: st.token.display_name(),
                span: st.span,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.display_name(),
                context: Some(context.to_string()),
            }),
        }
    }

    /// Comma-separated expressions up to (and including) `close`.
    pub(super) fn parse_list(&mut self, close: Token, context: &str) -> Result<(Vec<Expression>, Span)> {
        let mut items = Vec::with_capacity(4);

        while self.peek().is_some_and(|t| *t != close) {
            items.push(self.parse_expression()?);

            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
            } else {
                break;
            }
        }

        let end_span = self.expect(close, context)?;
        Ok((items, end_span))
    }
}

/// Parses a token stream into exactly one [`Expression`].
///
/// Trailing tokens after a complete expression are an error.
pub fn parse(tokens: Vec<SpannedToken>) -> Result<Expression> {
    let mut parser = Parser::new(tokens);

    if parser.peek().is_none() {
        return Err(ParseError::UnexpectedEof {
            expected: "expression".to_string(),
            context: None,
        });
    }

    let expr = parser.parse_expression()?;

    if let Some(st) = parser.advance() {
        return Err(ParseError::UnexpectedToken {
            expected: "end of expression".to_string(),
            found: st.token.display_name(),
            span: st.span,
        });
    }

    Ok(expr)
}

/// Tokenizes and parses `source` in one step.
pub fn parse_source(source: &str) -> Result<Expression> {
    let tokens = tokenize(source)?;
    parse(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    #[test]
    fn test_parse_comparison() {
        let expr = parse_source("len(git.commits) > 0").unwrap();
        assert!(matches!(expr, Expression::Binary { op: BinaryOp::Gt, .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_source("a b").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = parse_source("   ").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_unclosed_call_reports_context() {
        let err = parse_source("split(a, ").unwrap_err();
        match err {
            ParseError::UnexpectedEof { context, .. } => {
                assert_eq!(context.as_deref(), Some("call arguments"));
            }
            other => panic!("expected eof error, got {:?}", other),
        }
    }
}
