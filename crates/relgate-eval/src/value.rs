use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A callable value installed into the environment by the host.
#[derive(Clone)]
pub struct Function {
    name: String,
    func: HostFn,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args).with_context(|| format!("{}() failed", self.name))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Function(Function),
}

static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compiles `pattern` once per process.
pub(crate) fn cached_regex(pattern: &str) -> Result<Regex> {
    let mut cache = REGEX_CACHE
        .lock()
        .map_err(|_| anyhow!("regex cache lock poisoned"))?;

    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(pattern).with_context(|| format!("invalid regex '{}'", pattern))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

impl Value {
    pub fn function(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Value::Function(Function::new(name, func))
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts any serializable host value through its JSON form.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value).context("value is not representable")?;
        Ok(Value::from_json(json))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "map",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_zero()
    }

    /// The zero value of the value's type: `0`, `""`, `false`, `null`, an
    /// empty list or an empty map. Functions are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !*b,
            Value::Number(n) => *n == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Function(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Result<String> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Number(_) | Value::Bool(_) | Value::Null => Ok(self.display()),
            _ => bail!("cannot convert {} to string", self.type_name()),
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| anyhow!("cannot parse '{}' as number", s)),
            _ => bail!("cannot convert {} to number", self.type_name()),
        }
    }

    /// Member access; a missing map key yields `null`.
    pub fn get_property(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
            _ => bail!("cannot access property '{}' on {}", name, self.type_name()),
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value> {
        match (self, index) {
            (Value::Object(map), Value::String(key)) => {
                Ok(map.get(key).cloned().unwrap_or(Value::Null))
            }
            (Value::Array(items), Value::Number(n)) => {
                let len = items.len() as i64;
                let i = if *n < 0.0 { len + *n as i64 } else { *n as i64 };
                if i < 0 || i >= len {
                    bail!("index {} out of bounds (list length {})", n, len);
                }
                Ok(items[i as usize].clone())
            }
            (Value::String(s), Value::Number(n)) => {
                let i = *n as usize;
                s.chars()
                    .nth(i)
                    .map(|c| Value::String(c.to_string()))
                    .ok_or_else(|| anyhow!("index {} out of bounds (string length {})", i, s.chars().count()))
            }
            _ => bail!("cannot index {} with {}", self.type_name(), index.type_name()),
        }
    }

    /// Non-closure methods. Closure methods on lists are handled by the
    /// evaluator since they need the body expression.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self {
            Value::String(s) => call_string_method(s, name, args),
            Value::Number(n) => call_number_method(*n, name, args),
            Value::Array(items) => call_array_method(items, name, args),
            Value::Object(map) => call_object_method(map, name, args),
            Value::Function(f) if name == "call" => f.call(args),
            _ => bail!("cannot call method '{}' on {}", name, self.type_name()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| v.display()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.display()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.name()),
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => (a - b).abs() < f64::EPSILON,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            _ => false,
        }
    }

    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).ok_or_else(|| anyhow!("cannot compare NaN"))
            }
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => bail!("cannot compare {} with {}", self.type_name(), other.type_name()),
        }
    }

    /// `needle in self`.
    pub fn contains_value(&self, needle: &Value) -> Result<bool> {
        match (self, needle) {
            (Value::Array(items), _) => Ok(items.iter().any(|v| v.equals(needle))),
            (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
            (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
            (Value::Null, _) => Ok(false),
            _ => bail!("cannot search {} in {}", needle.type_name(), self.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        bail!("{}() expects {} argument(s), got {}", name, count, args.len());
    }
    Ok(())
}

fn call_string_method(s: &str, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "len" | "length" => {
            expect_args(name, args, 0)?;
            Ok(Value::Number(s.chars().count() as f64))
        }
        "isEmpty" | "is_empty" => {
            expect_args(name, args, 0)?;
            Ok(Value::Bool(s.is_empty()))
        }
        "lower" | "toLower" | "to_lowercase" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(s.to_lowercase()))
        }
        "upper" | "toUpper" | "to_uppercase" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(s.to_uppercase()))
        }
        "trim" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(s.trim().to_string()))
        }
        "contains" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(s.contains(args[0].as_string()?.as_str())))
        }
        "startsWith" | "starts_with" | "hasPrefix" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(s.starts_with(args[0].as_string()?.as_str())))
        }
        "endsWith" | "ends_with" | "hasSuffix" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(s.ends_with(args[0].as_string()?.as_str())))
        }
        "matches" => {
            expect_args(name, args, 1)?;
            let regex = cached_regex(&args[0].as_string()?)?;
            Ok(Value::Bool(regex.is_match(s)))
        }
        "split" => {
            expect_args(name, args, 1)?;
            Ok(split_string(s, &args[0].as_string()?))
        }
        "replace" => {
            expect_args(name, args, 2)?;
            let from = args[0].as_string()?;
            let to = args[1].as_string()?;
            Ok(Value::String(s.replace(&from, &to)))
        }
        _ => bail!("unknown string method: {}", name),
    }
}

fn call_number_method(n: f64, name: &str, args: &[Value]) -> Result<Value> {
    expect_args(name, args, 0)?;
    match name {
        "abs" => Ok(Value::Number(n.abs())),
        "floor" => Ok(Value::Number(n.floor())),
        "ceil" => Ok(Value::Number(n.ceil())),
        "round" => Ok(Value::Number(n.round())),
        _ => bail!("unknown number method: {}", name),
    }
}

fn call_array_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "len" | "length" => {
            expect_args(name, args, 0)?;
            Ok(Value::Number(items.len() as f64))
        }
        "isEmpty" | "is_empty" => {
            expect_args(name, args, 0)?;
            Ok(Value::Bool(items.is_empty()))
        }
        "first" => Ok(items.first().cloned().unwrap_or(Value::Null)),
        "last" => Ok(items.last().cloned().unwrap_or(Value::Null)),
        "join" => {
            let separator = args
                .first()
                .map(|v| v.as_string())
                .transpose()?
                .unwrap_or_else(|| ", ".to_string());
            let strings: Vec<String> = items.iter().map(|v| v.display()).collect();
            Ok(Value::String(strings.join(&separator)))
        }
        "reverse" => {
            let mut reversed = items.to_vec();
            reversed.reverse();
            Ok(Value::Array(reversed))
        }
        "sort" => {
            let mut sorted = items.to_vec();
            sorted.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
            Ok(Value::Array(sorted))
        }
        "contains" | "includes" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(items.iter().any(|v| v.equals(&args[0]))))
        }
        "filter" | "map" | "find" | "any" | "all" | "count" => {
            bail!("{}() requires a closure argument such as `x => ...`", name)
        }
        _ => bail!("unknown list method: {}", name),
    }
}

fn call_object_method(map: &BTreeMap<String, Value>, name: &str, args: &[Value]) -> Result<Value> {
    if let Some(Value::Function(f)) = map.get(name) {
        return f.call(args);
    }

    match name {
        "keys" => {
            expect_args(name, args, 0)?;
            Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
        }
        "values" => {
            expect_args(name, args, 0)?;
            Ok(Value::Array(map.values().cloned().collect()))
        }
        "has" | "hasKey" | "has_key" | "contains" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(map.contains_key(&args[0].as_string()?)))
        }
        "len" | "length" => {
            expect_args(name, args, 0)?;
            Ok(Value::Number(map.len() as f64))
        }
        _ => bail!("unknown map method: {}", name),
    }
}

pub(crate) fn split_string(s: &str, separator: &str) -> Value {
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(separator).map(|p| Value::String(p.to_string())).collect()
    };
    Value::Array(parts)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
