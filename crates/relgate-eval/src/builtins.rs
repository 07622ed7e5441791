use crate::value::Value;
use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub type BuiltinFn = fn(&[Value]) -> Result<Value>;

static BUILTIN_FUNCTIONS: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("len", builtin_len as BuiltinFn);
    map.insert("keys", builtin_keys as BuiltinFn);
    map.insert("string", builtin_string as BuiltinFn);
    map.insert("number", builtin_number as BuiltinFn);
    map.insert("lower", builtin_lower as BuiltinFn);
    map.insert("upper", builtin_upper as BuiltinFn);
    map
});

/// Global functions available to every expression. Environment names shadow
/// them.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Option<Value>> {
        if let Some(func) = BUILTIN_FUNCTIONS.get(name) {
            Ok(Some(func(args)?))
        } else {
            Ok(None)
        }
    }

    pub fn has(&self, name: &str) -> bool {
        BUILTIN_FUNCTIONS.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = BUILTIN_FUNCTIONS.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn single<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value> {
    match args {
        [value] => Ok(value),
        _ => bail!("{}() takes exactly 1 argument, got {}", name, args.len()),
    }
}

pub fn builtin_len(args: &[Value]) -> Result<Value> {
    let len = match single("len", args)? {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => bail!("len() is not defined for {}", other.type_name()),
    };
    Ok(Value::Number(len as f64))
}

pub fn builtin_keys(args: &[Value]) -> Result<Value> {
    match single("keys", args)? {
        Value::Object(map) => Ok(Value::Array(
            map.keys().cloned().map(Value::String).collect(),
        )),
        other => bail!("keys() requires a map, got {}", other.type_name()),
    }
}

pub fn builtin_string(args: &[Value]) -> Result<Value> {
    Ok(Value::String(single("string", args)?.display()))
}

pub fn builtin_number(args: &[Value]) -> Result<Value> {
    match single("number", args)? {
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        other => Ok(Value::Number(other.as_number()?)),
    }
}

pub fn builtin_lower(args: &[Value]) -> Result<Value> {
    Ok(Value::String(single("lower", args)?.as_string()?.to_lowercase()))
}

pub fn builtin_upper(args: &[Value]) -> Result<Value> {
    Ok(Value::String(single("upper", args)?.as_string()?.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_dispatches_by_name() {
        let registry = BuiltinRegistry::new();
        assert!(registry.has("len"));
        assert!(!registry.has("println"));
        let result = registry.call("upper", &[Value::from("zzz")]).unwrap();
        assert_eq!(result, Some(Value::from("ZZZ")));
        assert_eq!(registry.call("nope", &[]).unwrap(), None);
    }

    #[test]
    fn conversions() {
        assert_eq!(builtin_number(&[Value::from(" 42 ")]).unwrap(), Value::Number(42.0));
        assert_eq!(builtin_number(&[Value::Bool(true)]).unwrap(), Value::Number(1.0));
        assert!(builtin_number(&[Value::from("four")]).is_err());
        assert_eq!(builtin_string(&[Value::Number(7.0)]).unwrap(), Value::from("7"));
    }

    #[test]
    fn arity_is_checked() {
        let err = builtin_len(&[]).unwrap_err();
        assert_eq!(err.to_string(), "len() takes exactly 1 argument, got 0");
    }
}
