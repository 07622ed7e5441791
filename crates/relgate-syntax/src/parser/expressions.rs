//! Expression parsing methods for the recursive-descent parser.

use super::{Parser, Result};
use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{SpannedToken, Token};

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expression> {
        let condition = self.parse_logical_or()?;

        if !matches!(self.peek(), Some(Token::Question)) {
            return Ok(condition);
        }
        self.advance();

        let then_expr = self.parse_conditional()?;
        self.expect(Token::Colon, "conditional expression")?;
        let else_expr = self.parse_conditional()?;
        let span = condition.span().merge(&else_expr.span());

        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            span,
        })
    }

    fn parse_logical_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_logical_and()?;

        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_logical_and()?;
            let span = left.span().merge(&right.span());

            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_comparison()?;

        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span().merge(&right.span());

            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let left = self.parse_additive()?;

        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::In) => BinaryOp::In,
            Some(Token::Not) if matches!(self.peek_nth(1), Some(Token::In)) => {
                self.advance();
                BinaryOp::NotIn
            }
            Some(Token::Identifier(word)) => match word.as_str() {
                "contains" => BinaryOp::Contains,
                "startsWith" => BinaryOp::StartsWith,
                "endsWith" => BinaryOp::EndsWith,
                "matches" => BinaryOp::Matches,
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_additive()?;
        let span = left.span().merge(&right.span());

        Ok(Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
            span,
        })
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();

            let right = self.parse_multiplicative()?;
            let span = left.span().merge(&right.span());

            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();

            let right = self.parse_unary()?;
            let span = left.span().merge(&right.span());

            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.peek() {
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Minus,
            _ => return self.parse_postfix(),
        };

        let start_span = self.peek_span().unwrap_or_default();
        self.advance();
        let expr = self.parse_unary()?;
        let span = start_span.merge(&expr.span());

        Ok(Expression::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        while let Some(token) = self.peek() {
            match token {
                Token::Dot => {
                    self.advance();

                    let (name, name_span) = match self.advance() {
                        Some(SpannedToken {
                            token: Token::Identifier(id),
                            span,
                        }) => (id, span),
                        Some(st) => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "member name after '.'".to_string(),
                                found: st.token.display_name(),
                                span: st.span,
                            });
                        }
                        None => {
                            return Err(ParseError::UnexpectedEof {
                                expected: "member name".to_string(),
                                context: Some("member access".to_string()),
                            });
                        }
                    };

                    if matches!(self.peek(), Some(Token::LeftParen)) {
                        self.advance();
                        let (args, end_span) =
                            self.parse_list(Token::RightParen, "method arguments")?;
                        let span = expr.span().merge(&end_span);

                        expr = Expression::MethodCall {
                            receiver: Box::new(expr),
                            method: name,
                            args,
                            span,
                        };
                    } else {
                        let span = expr.span().merge(&name_span);

                        expr = Expression::PropertyAccess {
                            receiver: Box::new(expr),
                            property: name,
                            span,
                        };
                    }
                }
                Token::LeftParen => {
                    self.advance();
                    let (args, end_span) = self.parse_list(Token::RightParen, "call arguments")?;
                    let span = expr.span().merge(&end_span);

                    expr = Expression::Call {
                        function: Box::new(expr),
                        args,
                        span,
                    };
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end_span = self.expect(Token::RightBracket, "index access")?;
                    let span = expr.span().merge(&end_span);

                    expr = Expression::IndexAccess {
                        receiver: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let Some(st) = self.advance() else {
            return Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
                context: None,
            });
        };

        match st.token {
            Token::True => Ok(Expression::Bool(true, st.span)),
            Token::False => Ok(Expression::Bool(false, st.span)),
            Token::Null => Ok(Expression::Null(st.span)),
            Token::Number(n) => Ok(Expression::Number(n, st.span)),
            Token::String(s) => Ok(Expression::String(s, st.span)),

            Token::Identifier(id) => {
                if matches!(self.peek(), Some(Token::FatArrow)) {
                    self.advance();
                    let body = self.parse_expression()?;
                    let span = st.span.merge(&body.span());
                    Ok(Expression::Closure {
                        param: id,
                        body: Box::new(body),
                        span,
                    })
                } else {
                    Ok(Expression::Identifier(id, st.span))
                }
            }

            Token::LeftBracket => {
                let (items, end_span) = self.parse_list(Token::RightBracket, "list literal")?;
                Ok(Expression::Array(items, st.span.merge(&end_span)))
            }

            Token::LeftBrace => self.parse_map_literal(st.span),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen, "parenthesized expression")?;
                Ok(expr)
            }

            other => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: other.display_name(),
                span: st.span,
            }),
        }
    }

    fn parse_map_literal(&mut self, start_span: crate::error::Span) -> Result<Expression> {
        let mut entries = Vec::with_capacity(4);

        while self.peek().is_some_and(|t| *t != Token::RightBrace) {
            let key = match self.advance() {
                Some(SpannedToken {
                    token: Token::Identifier(k) | Token::String(k),
                    ..
                }) => k,
                Some(SpannedToken {
                    token: Token::Number(n),
                    ..
                }) => n.to_string(),
                Some(st) => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "mapping key".to_string(),
                        found: st.token.display_name(),
                        span: st.span,
                    });
                }
                None => break,
            };

            self.expect(Token::Colon, "mapping literal")?;
            let value = self.parse_expression()?;
            entries.push((key, value));

            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
            } else {
                break;
            }
        }

        let end_span = self.expect(Token::RightBrace, "mapping literal")?;
        Ok(Expression::Map(entries, start_span.merge(&end_span)))
    }
}
