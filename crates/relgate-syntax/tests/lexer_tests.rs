use relgate_syntax::lexer::{Token, tokenize};
use relgate_syntax::LexError;

#[test]
fn test_strings() {
    let source = r#""hello" 'single' "escaped \"quotes\"" "newline\n""#;
    let tokens = tokenize(source).unwrap();

    let strings: Vec<String> = tokens
        .into_iter()
        .map(|t| match t.token {
            Token::String(s) => s,
            other => panic!("Expected string token, got {:?}", other),
        })
        .collect();

    assert_eq!(strings, vec!["hello", "single", "escaped \"quotes\"", "newline\n"]);
}

#[test]
fn test_numbers() {
    let tokens = tokenize("42 3.25 1e3 1_000").unwrap();
    let numbers: Vec<f64> = tokens
        .into_iter()
        .map(|t| match t.token {
            Token::Number(n) => n,
            other => panic!("Expected number token, got {:?}", other),
        })
        .collect();

    assert_eq!(numbers, vec![42.0, 3.25, 1000.0, 1000.0]);
}

#[test]
fn test_comments_are_skipped() {
    let tokens = tokenize("a # trailing\n// whole line\nb").unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[1].span.line, 3);
}

#[test]
fn test_unterminated_string() {
    let err = tokenize("'open").unwrap_err();
    assert!(matches!(err, LexError::UnterminatedString { .. }));
}

#[test]
fn test_invalid_number_suffix() {
    let err = tokenize("12abc").unwrap_err();
    assert!(matches!(err, LexError::InvalidNumber { .. }));
}

#[test]
fn test_single_ampersand_suggests_double() {
    match tokenize("a & b").unwrap_err() {
        LexError::UnexpectedChar { ch, suggestion, span } => {
            assert_eq!(ch, '&');
            assert_eq!(suggestion.as_deref(), Some("&&"));
            assert_eq!(span.col, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_identifiers_with_dollar_and_underscore() {
    let tokens = tokenize("$env _private camelCase").unwrap();
    assert!(
        tokens
            .iter()
            .all(|t| matches!(t.token, Token::Identifier(_)))
    );
}
