use crate::error::{LexError, Span};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(16);
    m.insert("in", Token::In);
    m.insert("not", Token::Not);
    m.insert("and", Token::And);
    m.insert("or", Token::Or);
    m.insert("true", Token::True);
    m.insert("false", Token::False);
    m.insert("null", Token::Null);
    m.insert("nil", Token::Null);
    m
});

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    In,
    Not,
    And,
    Or,
    True,
    False,
    Null,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Question,
    Colon,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Dot,
    Comma,
    FatArrow,
    Identifier(String),
    String(String),
    Number(f64),
}

impl Token {
    pub fn display_name(&self) -> String {
        match self {
            Token::In => "keyword 'in'".to_string(),
            Token::Not => "keyword 'not'".to_string(),
            Token::And => "keyword 'and'".to_string(),
            Token::Or => "keyword 'or'".to_string(),
            Token::True => "keyword 'true'".to_string(),
            Token::False => "keyword 'false'".to_string(),
            Token::Null => "keyword 'null'".to_string(),
            Token::Identifier(s) => format!("'{}'", s),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            other => format!("'{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens = Vec::with_capacity(input.len() / 4);
    let mut chars = input.chars().peekable();

    let mut line = 1;
    let mut col = 1;
    let mut offset = 0;

    let bump = |ch: char, line: &mut usize, col: &mut usize, offset: &mut usize| {
        if ch == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *offset += ch.len_utf8();
    };

    while let Some(&ch) = chars.peek() {
        let start_line = line;
        let start_col = col;
        let start_offset = offset;

        macro_rules! single {
            ($tok:expr) => {{
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
                tokens.push(SpannedToken {
                    token: $tok,
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }};
        }

        macro_rules! pair {
            ($next:expr, $double:expr, $single:expr) => {{
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
                let token = if chars.peek() == Some(&$next) {
                    chars.next();
                    bump($next, &mut line, &mut col, &mut offset);
                    $double
                } else {
                    $single
                };
                tokens.push(SpannedToken {
                    token,
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }};
        }

        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
            }

            '#' => {
                while let Some(&ch) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                }
            }

            '"' | '\'' => {
                let quote = ch;
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                let mut string = String::new();
                let mut escaped = false;
                let mut terminated = false;

                while let Some(&ch) = chars.peek() {
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                    if escaped {
                        string.push(match ch {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == quote {
                        terminated = true;
                        break;
                    } else {
                        string.push(ch);
                    }
                }

                if !terminated {
                    return Err(LexError::UnterminatedString {
                        span: Span::new(start_line, start_col, start_offset, offset),
                    });
                }

                tokens.push(SpannedToken {
                    token: Token::String(string),
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '0'..='9' => {
                let mut num_str = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '_' {
                        if ch != '_' {
                            num_str.push(ch);
                        }
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    } else if ch == '.' {
                        // `1.5` is a number, `list[0].name` is member access
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if num_str.contains('.') || !matches!(lookahead.peek(), Some(c) if c.is_ascii_digit()) {
                            break;
                        }
                        num_str.push(ch);
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    } else if (ch == 'e' || ch == 'E') && !num_str.contains('e') {
                        num_str.push('e');
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                        if let Some(&sign) = chars.peek()
                            && (sign == '+' || sign == '-')
                        {
                            num_str.push(sign);
                            chars.next();
                            bump(sign, &mut line, &mut col, &mut offset);
                        }
                    } else {
                        break;
                    }
                }

                let span = Span::new(start_line, start_col, start_offset, offset);

                if let Some(&ch) = chars.peek()
                    && (ch.is_alphabetic() || ch == '_')
                {
                    return Err(LexError::InvalidNumber {
                        text: format!("{}{}", num_str, ch),
                        span,
                    });
                }

                let num = num_str
                    .parse::<f64>()
                    .map_err(|_| LexError::InvalidNumber { text: num_str, span })?;

                tokens.push(SpannedToken {
                    token: Token::Number(num),
                    span,
                });
            }

            '=' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                let token = match chars.peek() {
                    Some(&'=') => Token::Eq,
                    Some(&'>') => Token::FatArrow,
                    _ => {
                        return Err(LexError::UnexpectedChar {
                            ch: '=',
                            span: Span::new(start_line, start_col, start_offset, offset),
                            suggestion: Some("==".to_string()),
                        });
                    }
                };
                if let Some(next) = chars.next() {
                    bump(next, &mut line, &mut col, &mut offset);
                }
                tokens.push(SpannedToken {
                    token,
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '!' => pair!('=', Token::Ne, Token::Not),
            '<' => pair!('=', Token::Le, Token::Lt),
            '>' => pair!('=', Token::Ge, Token::Gt),

            '&' | '|' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                if chars.peek() != Some(&ch) {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: Span::new(start_line, start_col, start_offset, offset),
                        suggestion: Some(format!("{}{}", ch, ch)),
                    });
                }
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
                tokens.push(SpannedToken {
                    token: if ch == '&' { Token::And } else { Token::Or },
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '/' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                if chars.peek() == Some(&'/') {
                    while let Some(&ch) = chars.peek() {
                        if ch == '\n' {
                            break;
                        }
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    }
                } else {
                    tokens.push(SpannedToken {
                        token: Token::Slash,
                        span: Span::new(start_line, start_col, start_offset, offset),
                    });
                }
            }

            '+' => single!(Token::Plus),
            '-' => single!(Token::Minus),
            '*' => single!(Token::Star),
            '%' => single!(Token::Percent),
            '?' => single!(Token::Question),
            ':' => single!(Token::Colon),
            '{' => single!(Token::LeftBrace),
            '}' => single!(Token::RightBrace),
            '[' => single!(Token::LeftBracket),
            ']' => single!(Token::RightBracket),
            '(' => single!(Token::LeftParen),
            ')' => single!(Token::RightParen),
            '.' => single!(Token::Dot),
            ',' => single!(Token::Comma),

            _ if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let mut ident = String::with_capacity(16);
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                        ident.push(ch);
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    } else {
                        break;
                    }
                }

                let token = KEYWORDS
                    .get(ident.as_str())
                    .cloned()
                    .unwrap_or(Token::Identifier(ident));

                tokens.push(SpannedToken {
                    token,
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            _ => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    span: Span::single(start_line, start_col, start_offset),
                    suggestion: None,
                });
            }
        }
    }

    Ok(tokens)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::In => write!(f, "in"),
            Token::Not => write!(f, "not"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::FatArrow => write!(f, "=>"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Number(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("in not and or true false null nil"),
            vec![
                Token::In,
                Token::Not,
                Token::And,
                Token::Or,
                Token::True,
                Token::False,
                Token::Null,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("== != < <= > >= + - * / % ! && || ? : =>"),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Not,
                Token::And,
                Token::Or,
                Token::Question,
                Token::Colon,
                Token::FatArrow,
            ]
        );
    }

    #[test]
    fn test_number_then_member_access() {
        assert_eq!(
            kinds("items[0].name"),
            vec![
                Token::Identifier("items".to_string()),
                Token::LeftBracket,
                Token::Number(0.0),
                Token::RightBracket,
                Token::Dot,
                Token::Identifier("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_assign_is_rejected() {
        let err = tokenize("a = 1").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '=', .. }));
    }

    #[test]
    fn test_span_tracking() {
        let tokens = tokenize("len(x)").unwrap();
        assert_eq!(tokens[0].span.col, 1);
        assert_eq!(tokens[1].span.col, 4);
        assert_eq!(tokens[2].span.col, 5);
    }
}
