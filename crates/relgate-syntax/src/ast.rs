use crate::error::Span;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Null(Span),
    Bool(bool, Span),
    Number(f64, Span),
    String(String, Span),
    Identifier(String, Span),
    Array(Vec<Expression>, Span),
    Map(Vec<(String, Expression)>, Span),

    PropertyAccess {
        receiver: Box<Expression>,
        property: String,
        span: Span,
    },
    IndexAccess {
        receiver: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
        span: Span,
    },
    /// `f(args)` where `f` is any expression evaluating to a function.
    Call {
        function: Box<Expression>,
        args: Vec<Expression>,
        span: Span,
    },
    Closure {
        param: String,
        body: Box<Expression>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
        span: Span,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
        span: Span,
    },
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,

    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "startsWith",
            BinaryOp::EndsWith => "endsWith",
            BinaryOp::Matches => "matches",
        }
    }
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Null(span)
            | Expression::Bool(_, span)
            | Expression::Number(_, span)
            | Expression::String(_, span)
            | Expression::Identifier(_, span)
            | Expression::Array(_, span)
            | Expression::Map(_, span) => *span,
            Expression::PropertyAccess { span, .. }
            | Expression::IndexAccess { span, .. }
            | Expression::MethodCall { span, .. }
            | Expression::Call { span, .. }
            | Expression::Closure { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Conditional { span, .. } => *span,
        }
    }

    /// Identifiers referenced by this expression that are not bound by an
    /// enclosing closure, each with the span of its first occurrence.
    pub fn free_names(&self) -> Vec<(String, Span)> {
        let mut bound = Vec::new();
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect_free(&mut bound, &mut seen, &mut out);
        out
    }

    fn collect_free(
        &self,
        bound: &mut Vec<String>,
        seen: &mut BTreeSet<String>,
        out: &mut Vec<(String, Span)>,
    ) {
        match self {
            Expression::Null(_)
            | Expression::Bool(..)
            | Expression::Number(..)
            | Expression::String(..) => {}
            Expression::Identifier(name, span) => {
                if !bound.iter().any(|b| b == name) && seen.insert(name.clone()) {
                    out.push((name.clone(), *span));
                }
            }
            Expression::Array(items, _) => {
                for item in items {
                    item.collect_free(bound, seen, out);
                }
            }
            Expression::Map(entries, _) => {
                for (_, value) in entries {
                    value.collect_free(bound, seen, out);
                }
            }
            Expression::PropertyAccess { receiver, .. } => receiver.collect_free(bound, seen, out),
            Expression::IndexAccess { receiver, index, .. } => {
                receiver.collect_free(bound, seen, out);
                index.collect_free(bound, seen, out);
            }
            Expression::MethodCall { receiver, args, .. } => {
                receiver.collect_free(bound, seen, out);
                for arg in args {
                    arg.collect_free(bound, seen, out);
                }
            }
            Expression::Call { function, args, .. } => {
                function.collect_free(bound, seen, out);
                for arg in args {
                    arg.collect_free(bound, seen, out);
                }
            }
            Expression::Closure { param, body, .. } => {
                bound.push(param.clone());
                body.collect_free(bound, seen, out);
                bound.pop();
            }
            Expression::Unary { expr, .. } => expr.collect_free(bound, seen, out),
            Expression::Binary { left, right, .. } => {
                left.collect_free(bound, seen, out);
                right.collect_free(bound, seen, out);
            }
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                condition.collect_free(bound, seen, out);
                then_expr.collect_free(bound, seen, out);
                else_expr.collect_free(bound, seen, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expression {
        Expression::Identifier(name.to_string(), Span::single(1, 1, 0))
    }

    #[test]
    fn closure_parameter_is_not_free() {
        let expr = Expression::MethodCall {
            receiver: Box::new(ident("commits")),
            method: "all".to_string(),
            args: vec![Expression::Closure {
                param: "c".to_string(),
                body: Box::new(Expression::Binary {
                    left: Box::new(ident("c")),
                    op: BinaryOp::Eq,
                    right: Box::new(ident("other")),
                    span: Span::single(1, 1, 0),
                }),
                span: Span::single(1, 1, 0),
            }],
            span: Span::single(1, 1, 0),
        };

        let names: Vec<String> = expr.free_names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["commits".to_string(), "other".to_string()]);
    }

    #[test]
    fn property_names_are_not_free() {
        let expr = Expression::PropertyAccess {
            receiver: Box::new(ident("releases")),
            property: "old".to_string(),
            span: Span::single(1, 1, 0),
        };
        assert_eq!(expr.free_names().len(), 1);
    }
}
