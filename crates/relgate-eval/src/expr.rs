//! Compilation and evaluation of free expression clauses.
//!
//! Compiling parses the clause and checks every free name against the
//! environment and the builtin registry, so a typo in a check file fails
//! before anything runs. Evaluation walks the AST with a stack of closure
//! locals on top of the environment.

use crate::bail_span;
use crate::builtins::BuiltinRegistry;
use crate::environment::Environment;
use crate::error::{CompileError, EvalError};
use crate::value::{Value, cached_regex};
use anyhow::{Result, anyhow};
use relgate_syntax::{BinaryOp, Expression, Span, UnaryOp, parse_source};
use std::collections::BTreeMap;

const CLOSURE_METHODS: &[&str] = &["filter", "map", "find", "any", "all", "count"];

/// A parsed clause that passed name resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    ast: Expression,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expression {
        &self.ast
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpressionAdapter {
    builtins: BuiltinRegistry,
}

impl ExpressionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, source: &str, env: &Environment) -> Result<CompiledExpression, CompileError> {
        let ast = parse_source(source)?;

        for (name, span) in ast.free_names() {
            if !env.contains(&name) && !self.builtins.has(&name) {
                return Err(CompileError::UnknownName { name, span });
            }
        }

        Ok(CompiledExpression {
            source: source.to_string(),
            ast,
        })
    }

    pub fn evaluate(&self, compiled: &CompiledExpression, env: &Environment) -> Result<Value, EvalError> {
        Evaluator::new(env, &self.builtins)
            .eval(&compiled.ast)
            .map_err(EvalError::from_anyhow)
    }

    /// Compiles and evaluates in one go; compile errors are reported as
    /// evaluation errors with their span.
    pub fn eval_str(&self, source: &str, env: &Environment) -> Result<Value, EvalError> {
        let compiled = self
            .compile(source, env)
            .map_err(|e| EvalError::new(e.to_string(), e.span()))?;
        self.evaluate(&compiled, env)
    }
}

struct Evaluator<'a> {
    env: &'a Environment,
    builtins: &'a BuiltinRegistry,
    locals: Vec<(String, Value)>,
}

impl<'a> Evaluator<'a> {
    fn new(env: &'a Environment, builtins: &'a BuiltinRegistry) -> Self {
        Self {
            env,
            builtins,
            locals: Vec::new(),
        }
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        self.locals
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.env.get(name).cloned())
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Null(_) => Ok(Value::Null),
            Expression::Bool(b, _) => Ok(Value::Bool(*b)),
            Expression::Number(n, _) => Ok(Value::Number(*n)),
            Expression::String(s, _) => Ok(Value::String(s.clone())),

            Expression::Identifier(name, span) => match self.resolve(name) {
                Some(value) => Ok(value),
                None if self.builtins.has(name) => {
                    bail_span!(span, "builtin '{}' must be called", name)
                }
                None => bail_span!(span, "unknown name '{}'", name),
            },

            Expression::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }

            Expression::Map(entries, _) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }

            Expression::PropertyAccess {
                receiver,
                property,
                span,
            } => {
                let value = self.eval(receiver)?;
                value.get_property(property).map_err(|e| locate(e, span))
            }

            Expression::IndexAccess {
                receiver,
                index,
                span,
            } => {
                let value = self.eval(receiver)?;
                let index = self.eval(index)?;
                value.index(&index).map_err(|e| locate(e, span))
            }

            Expression::MethodCall {
                receiver,
                method,
                args,
                span,
            } => {
                let value = self.eval(receiver)?;

                if CLOSURE_METHODS.contains(&method.as_str())
                    && let [Expression::Closure { param, body, .. }] = args.as_slice()
                    && matches!(value, Value::Array(_))
                {
                    return self.eval_closure_method(&value, method, param, body, span);
                }

                let args = self.eval_args(args)?;
                value.call_method(method, &args).map_err(|e| locate(e, span))
            }

            Expression::Call {
                function,
                args,
                span,
            } => {
                if let Expression::Identifier(name, _) = function.as_ref()
                    && self.resolve(name).is_none()
                {
                    let args = self.eval_args(args)?;
                    return match self.builtins.call(name, &args) {
                        Ok(Some(result)) => Ok(result),
                        Ok(None) => bail_span!(span, "unknown function '{}'", name),
                        Err(e) => Err(locate(e, span)),
                    };
                }

                let callee = self.eval(function)?;
                let args = self.eval_args(args)?;
                match callee {
                    Value::Function(f) => f.call(&args).map_err(|e| locate(e, span)),
                    other => bail_span!(span, "{} is not callable", other.type_name()),
                }
            }

            Expression::Closure { span, .. } => {
                bail_span!(
                    span,
                    "closures can only be passed to filter, map, find, any, all or count"
                )
            }

            Expression::Unary { op, expr, span } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Minus => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => bail_span!(span, "cannot negate {}", other.type_name()),
                    },
                }
            }

            Expression::Binary {
                left,
                op: BinaryOp::And,
                right,
                ..
            } => {
                let left = self.eval(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }

            Expression::Binary {
                left,
                op: BinaryOp::Or,
                right,
                ..
            } => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }

            Expression::Binary {
                left,
                op,
                right,
                span,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_binary_op(&left, *op, &right).map_err(|e| locate(e, span))
            }

            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expression]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval_closure_method(
        &mut self,
        list: &Value,
        method: &str,
        param: &str,
        body: &Expression,
        span: &Span,
    ) -> Result<Value> {
        let Value::Array(items) = list else {
            bail_span!(span, "cannot call '{}' on {}", method, list.type_name());
        };

        self.locals.push((param.to_string(), Value::Null));
        let result = self.run_closure(items, method, body, span);
        self.locals.pop();
        result
    }

    fn call_closure(&mut self, item: &Value, body: &Expression) -> Result<Value> {
        if let Some(slot) = self.locals.last_mut() {
            slot.1 = item.clone();
        }
        self.eval(body)
    }

    fn run_closure(&mut self, items: &[Value], method: &str, body: &Expression, span: &Span) -> Result<Value> {
        match method {
            "filter" => {
                let mut kept = Vec::new();
                for item in items {
                    if self.call_closure(item, body)?.is_truthy() {
                        kept.push(item.clone());
                    }
                }
                Ok(Value::Array(kept))
            }
            "map" => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(self.call_closure(item, body)?);
                }
                Ok(Value::Array(mapped))
            }
            "find" => {
                for item in items {
                    if self.call_closure(item, body)?.is_truthy() {
                        return Ok(item.clone());
                    }
                }
                Ok(Value::Null)
            }
            "any" => {
                for item in items {
                    if self.call_closure(item, body)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "all" => {
                for item in items {
                    if !self.call_closure(item, body)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "count" => {
                let mut count = 0usize;
                for item in items {
                    if self.call_closure(item, body)?.is_truthy() {
                        count += 1;
                    }
                }
                Ok(Value::Number(count as f64))
            }
            _ => bail_span!(span, "unknown closure method: {}", method),
        }
    }
}

/// Attaches `span` to errors raised below the evaluator, keeping any
/// span already present.
fn locate(err: anyhow::Error, span: &Span) -> anyhow::Error {
    if err.downcast_ref::<EvalError>().is_some() {
        return err;
    }
    anyhow!(EvalError::spanned(format!("{:#}", err), span))
}

fn eval_binary_op(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), r) => Ok(Value::String(format!("{}{}", l, r.display()))),
            (l, Value::String(r)) => Ok(Value::String(format!("{}{}", l.display(), r))),
            (Value::Array(l), Value::Array(r)) => {
                Ok(Value::Array(l.iter().chain(r).cloned().collect()))
            }
            _ => anyhow::bail!("cannot add {} and {}", left.type_name(), right.type_name()),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let (Value::Number(l), Value::Number(r)) = (left, right) else {
                anyhow::bail!(
                    "operator '{}' needs numbers, got {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                );
            };
            match op {
                BinaryOp::Sub => Ok(Value::Number(l - r)),
                BinaryOp::Mul => Ok(Value::Number(l * r)),
                BinaryOp::Div if *r == 0.0 => anyhow::bail!("division by zero"),
                BinaryOp::Div => Ok(Value::Number(l / r)),
                BinaryOp::Mod if *r == 0.0 => anyhow::bail!("modulo by zero"),
                _ => Ok(Value::Number(l % r)),
            }
        }

        BinaryOp::Eq => Ok(Value::Bool(left.equals(right))),
        BinaryOp::Ne => Ok(Value::Bool(!left.equals(right))),
        BinaryOp::Lt => Ok(Value::Bool(left.compare(right)?.is_lt())),
        BinaryOp::Le => Ok(Value::Bool(left.compare(right)?.is_le())),
        BinaryOp::Gt => Ok(Value::Bool(left.compare(right)?.is_gt())),
        BinaryOp::Ge => Ok(Value::Bool(left.compare(right)?.is_ge())),

        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),

        BinaryOp::In => Ok(Value::Bool(right.contains_value(left)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!right.contains_value(left)?)),
        BinaryOp::Contains => Ok(Value::Bool(left.contains_value(right)?)),
        BinaryOp::StartsWith | BinaryOp::EndsWith | BinaryOp::Matches => {
            let (Value::String(text), Value::String(pattern)) = (left, right) else {
                anyhow::bail!(
                    "'{}' needs strings, got {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                );
            };
            let result = match op {
                BinaryOp::StartsWith => text.starts_with(pattern.as_str()),
                BinaryOp::EndsWith => text.ends_with(pattern.as_str()),
                _ => cached_regex(pattern)?.is_match(text),
            };
            Ok(Value::Bool(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.insert(
            "git",
            Value::from_json(serde_json::json!({
                "branch": "rev2",
                "commits": [
                    {"hash": "c3", "message": "ZZZ-3 third"},
                    {"hash": "c2", "message": "ZZZ-2 second"},
                    {"hash": "c1", "message": "wip"},
                ],
            })),
        )
        .unwrap();
        env.insert("coverage", Value::Number(81.5)).unwrap();
        env.insert("empty", Value::from("")).unwrap();
        env
    }

    fn eval(source: &str) -> Value {
        ExpressionAdapter::new().eval_str(source, &env()).unwrap()
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("coverage >= 80"), Value::Bool(true));
        assert_eq!(eval("10 % 4 == 2 and not false"), Value::Bool(true));
        assert_eq!(eval("'ZZZ' + '-' + 1"), Value::from("ZZZ-1"));
    }

    #[test]
    fn member_access_and_missing_keys() {
        assert_eq!(eval("git.branch"), Value::from("rev2"));
        assert_eq!(eval("git.missing"), Value::Null);
        assert_eq!(eval("git.commits[0].hash"), Value::from("c3"));
        assert_eq!(eval("git['branch']"), Value::from("rev2"));
    }

    #[test]
    fn closure_methods() {
        assert_eq!(
            eval("git.commits.filter(c => c.message startsWith 'ZZZ-').map(c => c.hash)"),
            Value::from(vec!["c3", "c2"])
        );
        assert_eq!(eval("git.commits.count(c => c.message == 'wip')"), Value::Number(1.0));
        assert_eq!(eval("git.commits.all(c => len(c.hash) == 2)"), Value::Bool(true));
        assert_eq!(eval("git.commits.find(c => c.hash == 'c9')"), Value::Null);
    }

    #[test]
    fn closure_parameter_shadows_environment() {
        assert_eq!(eval("[1, 2].map(coverage => coverage * 2)"), Value::from(vec![2.0, 4.0]));
        assert_eq!(eval("coverage"), Value::Number(81.5));
    }

    #[test]
    fn operators_on_collections() {
        assert_eq!(eval("'c2' in git.commits.map(c => c.hash)"), Value::Bool(true));
        assert_eq!(eval("'branch' in git"), Value::Bool(true));
        assert_eq!(eval("'x' not in ['a', 'b']"), Value::Bool(true));
        assert_eq!(eval("git.branch matches '^rev[0-9]+$'"), Value::Bool(true));
        assert_eq!(eval("empty == '' ? 'none' : empty"), Value::from("none"));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(eval("false and 1 / 0"), Value::Bool(false));
        assert_eq!(eval("true || git.missing.deeper"), Value::Bool(true));
    }

    #[test]
    fn unknown_names_fail_compilation() {
        let err = ExpressionAdapter::new()
            .compile("jira.issues", &env())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownName { ref name, .. } if name == "jira"));
        assert_eq!(err.span().map(|s| s.col), Some(1));
    }

    #[test]
    fn syntax_errors_fail_compilation() {
        let err = ExpressionAdapter::new().compile("1 +", &env()).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn runtime_errors_carry_spans() {
        let err = ExpressionAdapter::new()
            .eval_str("coverage / 0", &env())
            .unwrap_err();
        assert_eq!(err.message, "division by zero");
        assert!(err.span.is_some());
    }

    #[test]
    fn host_functions_are_callable() {
        let mut env = env();
        env.insert(
            "twice",
            Value::function("twice", |args| Ok(Value::Number(args[0].as_number()? * 2.0))),
        )
        .unwrap();
        let adapter = ExpressionAdapter::new();
        assert_eq!(adapter.eval_str("twice(21)", &env).unwrap(), Value::Number(42.0));
        assert_eq!(adapter.eval_str("upper(git.branch)", &env).unwrap(), Value::from("REV2"));
    }
}
