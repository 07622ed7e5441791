use relgate_syntax::ast::{BinaryOp, Expression, UnaryOp};
use relgate_syntax::{ParseError, parse_source};

#[test]
fn test_precedence_of_arithmetic() {
    let expr = parse_source("1 + 2 * 3").unwrap();
    match expr {
        Expression::Binary { op: BinaryOp::Add, right, .. } => {
            assert!(matches!(*right, Expression::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("Expected addition at the root, got {:?}", other),
    }
}

#[test]
fn test_and_binds_tighter_than_or() {
    let expr = parse_source("a or b and c").unwrap();
    match expr {
        Expression::Binary { op: BinaryOp::Or, right, .. } => {
            assert!(matches!(*right, Expression::Binary { op: BinaryOp::And, .. }));
        }
        other => panic!("Expected or at the root, got {:?}", other),
    }
}

#[test]
fn test_symbolic_logical_operators() {
    let expr = parse_source("!a && b || c").unwrap();
    match expr {
        Expression::Binary { op: BinaryOp::Or, left, .. } => match *left {
            Expression::Binary { op: BinaryOp::And, left, .. } => {
                assert!(matches!(*left, Expression::Unary { op: UnaryOp::Not, .. }));
            }
            other => panic!("Expected and, got {:?}", other),
        },
        other => panic!("Expected or at the root, got {:?}", other),
    }
}

#[test]
fn test_word_comparison_operators() {
    for (source, expected) in [
        ("a contains 'x'", BinaryOp::Contains),
        ("a startsWith 'x'", BinaryOp::StartsWith),
        ("a endsWith 'x'", BinaryOp::EndsWith),
        ("a matches '^x'", BinaryOp::Matches),
        ("a in ['x']", BinaryOp::In),
        ("a not in ['x']", BinaryOp::NotIn),
    ] {
        match parse_source(source).unwrap() {
            Expression::Binary { op, .. } => assert_eq!(op, expected, "{}", source),
            other => panic!("Expected binary for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_ternary_is_right_associative() {
    let expr = parse_source("a ? 1 : b ? 2 : 3").unwrap();
    match expr {
        Expression::Conditional { else_expr, .. } => {
            assert!(matches!(*else_expr, Expression::Conditional { .. }));
        }
        other => panic!("Expected conditional, got {:?}", other),
    }
}

#[test]
fn test_member_index_and_method_chain() {
    let expr = parse_source("git.components[0].commits.map(c => c.hash).join(',')").unwrap();
    match expr {
        Expression::MethodCall { method, receiver, args, .. } => {
            assert_eq!(method, "join");
            assert_eq!(args.len(), 1);
            match *receiver {
                Expression::MethodCall { method, args, .. } => {
                    assert_eq!(method, "map");
                    assert!(matches!(args[0], Expression::Closure { ref param, .. } if param == "c"));
                }
                other => panic!("Expected map call, got {:?}", other),
            }
        }
        other => panic!("Expected method call, got {:?}", other),
    }
}

#[test]
fn test_namespace_function_call() {
    let expr = parse_source("git.validCommitMsg(c)").unwrap();
    assert!(matches!(expr, Expression::MethodCall { ref method, .. } if method == "validCommitMsg"));

    let expr = parse_source("split(releases.new.release, '-')").unwrap();
    match expr {
        Expression::Call { function, args, .. } => {
            assert!(matches!(*function, Expression::Identifier(ref n, _) if n == "split"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("Expected call, got {:?}", other),
    }
}

#[test]
fn test_map_literal() {
    let expr = parse_source("{name: 'core', \"count\": 2, 3: true}").unwrap();
    match expr {
        Expression::Map(entries, _) => {
            let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["name", "count", "3"]);
        }
        other => panic!("Expected map literal, got {:?}", other),
    }
}

#[test]
fn test_trailing_comma_in_list() {
    let expr = parse_source("[1, 2, ]").unwrap();
    assert!(matches!(expr, Expression::Array(ref items, _) if items.len() == 2));
}

#[test]
fn test_error_span_points_at_token() {
    let err = parse_source("a == )").unwrap_err();
    let span = err.span().expect("token errors carry a span");
    assert_eq!(span.col, 6);
}

#[test]
fn test_missing_colon_in_ternary() {
    let err = parse_source("a ? b").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof { .. }));
}

#[test]
fn test_free_names_after_parse() {
    let expr = parse_source("commits.filter(c => c.author == owner).len() > limit").unwrap();
    let names: Vec<String> = expr.free_names().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["commits", "owner", "limit"]);
}
