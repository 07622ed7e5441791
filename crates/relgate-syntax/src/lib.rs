//! # relgate syntax
//!
//! Lexer, parser and AST for the expression language used in release check
//! trees.
//!
//! ## Architecture
//!
//! ```text
//! clause text
//!     ↓
//! Lexer (tokenize)
//!     ↓
//! Vec<SpannedToken>
//!     ↓
//! Parser (parse)
//!     ↓
//! Expression (AST)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use relgate_syntax::{parse_source, Expression, BinaryOp};
//!
//! let expr = parse_source("git.commits.all(c => git.validCommitMsg(c))").unwrap();
//! assert!(matches!(expr, Expression::MethodCall { .. }));
//!
//! let cmp = parse_source("releases.new.release != releases.old.release").unwrap();
//! assert!(matches!(cmp, Expression::Binary { op: BinaryOp::Ne, .. }));
//! ```
//!
//! ## Grammar overview
//!
//! ```text
//! expr        := or ("?" expr ":" expr)?
//! or          := and (("or" | "||") and)*
//! and         := cmp (("and" | "&&") cmp)*
//! cmp         := add (cmp_op add)?
//! cmp_op      := == != < <= > >= in "not in" contains startsWith endsWith matches
//! add         := mul (("+" | "-") mul)*
//! mul         := unary (("*" | "/" | "%") unary)*
//! unary       := ("not" | "!" | "-") unary | postfix
//! postfix     := primary ("." name ("(" args ")")? | "(" args ")" | "[" expr "]")*
//! primary     := literal | name | name "=>" expr | "[" args "]" | "{" entries "}" | "(" expr ")"
//! ```
//!
//! Errors carry a [`Span`]; [`format_error_with_source`] renders them under
//! the offending line.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use error::{LexError, ParseError, Span, format_error_with_source};
pub use lexer::{SpannedToken, Token, tokenize};
pub use parser::{parse, parse_source};
