use crate::ast::FunctionDef;
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Longest string, in bytes, a script can build.
pub const MAX_STRING_LENGTH: usize = 1 << 24;

/// Deepest array/object nesting that display and JSON rendering follow.
pub const MAX_RENDER_DEPTH: usize = 512;

/// Why a value could not be rendered as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    Circular,
    TooDeep,
    TooLarge,
}

impl RenderError {
    /// The `(name, message)` of the error a script observes.
    pub fn error_parts(&self) -> (&'static str, &'static str) {
        match self {
            RenderError::Circular => ("TypeError", "Converting circular structure to JSON"),
            RenderError::TooDeep => ("RangeError", "Maximum call stack size exceeded"),
            RenderError::TooLarge => ("RangeError", "Invalid string length"),
        }
    }
}

type Seen = Vec<*const ()>;

fn enter(seen: &mut Seen, id: *const ()) -> Result<(), RenderError> {
    if seen.contains(&id) {
        return Err(RenderError::Circular);
    }
    if seen.len() >= MAX_RENDER_DEPTH {
        return Err(RenderError::TooDeep);
    }
    seen.push(id);
    Ok(())
}

fn spend(budget: &mut usize, bytes: usize) -> Result<(), RenderError> {
    *budget = budget.checked_sub(bytes).ok_or(RenderError::TooLarge)?;
    Ok(())
}

/// Built-in namespaces a script can reach through its global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Global,
    Console,
    Math,
    Json,
    Date,
    Object,
    Array,
}

impl Namespace {
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Global => "globalThis",
            Namespace::Console => "console",
            Namespace::Math => "Math",
            Namespace::Json => "JSON",
            Namespace::Date => "Date",
            Namespace::Object => "Object",
            Namespace::Array => "Array",
        }
    }

    /// Members callable on the namespace. Anything else reads as `undefined`.
    pub fn members(&self) -> &'static [&'static str] {
        match self {
            Namespace::Global => &[
                "parseInt",
                "parseFloat",
                "isNaN",
                "isFinite",
                "encodeURIComponent",
                "decodeURIComponent",
                "String",
                "Number",
                "Boolean",
                "Error",
                "TypeError",
                "RangeError",
                "setTimeout",
                "clearTimeout",
            ],
            Namespace::Console => &["log", "info", "warn", "error", "debug"],
            Namespace::Math => &[
                "abs", "floor", "ceil", "round", "trunc", "sign", "sqrt", "cbrt", "pow", "min",
                "max", "random", "log", "log2", "log10", "exp", "sin", "cos", "tan", "hypot",
            ],
            Namespace::Json => &["stringify", "parse"],
            Namespace::Date => &["now"],
            Namespace::Object => &["keys", "values", "entries"],
            Namespace::Array => &["isArray"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Native {
    pub namespace: Namespace,
    pub name: &'static str,
}

pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.def.name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Native(Native),
    Namespace(Namespace),
    /// Milliseconds since the Unix epoch.
    Date(f64),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(fields: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(fields)))
    }

    pub fn error(name: &str, message: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Value::string(name));
        fields.insert("message".to_string(), Value::string(message.into()));
        Value::object(fields)
    }

    /// `(name, message)` when the value looks like an `Error` instance.
    pub fn as_error(&self) -> Option<(String, String)> {
        self.error_parts(&mut Vec::new())
    }

    fn error_parts(&self, seen: &mut Seen) -> Option<(String, String)> {
        let Value::Object(obj) = self else {
            return None;
        };
        let id = Rc::as_ptr(obj) as *const ();
        let fields = obj.borrow();
        match (fields.get("name"), fields.get("message")) {
            (Some(Value::Str(name)), Some(message)) if name.ends_with("Error") => {
                let mut text = String::new();
                if enter(seen, id).is_ok() {
                    message.write_display(&mut text, seen);
                    seen.pop();
                }
                Some((name.to_string(), text))
            }
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Namespace(_)
            | Value::Date(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => parse_numeric(s),
            Value::Array(items) => match items.borrow().len() {
                0 => 0.0,
                1 => parse_numeric(&self.to_display()),
                _ => f64::NAN,
            },
            Value::Date(ms) => *ms,
            _ => f64::NAN,
        }
    }

    /// `String(value)` semantics. An array already being rendered shows as
    /// an empty string. Output stops growing once it passes
    /// [`MAX_STRING_LENGTH`]; callers building strings check the length.
    pub fn to_display(&self) -> String {
        let mut out = String::new();
        self.write_display(&mut out, &mut Vec::new());
        out
    }

    /// `Array.prototype.join` over `items`.
    pub fn join(items: &ArrayRef, separator: &str) -> String {
        let mut out = String::new();
        let mut seen = vec![Rc::as_ptr(items) as *const ()];
        write_joined(items, separator, &mut out, &mut seen);
        out
    }

    fn write_display(&self, out: &mut String, seen: &mut Seen) {
        match self {
            Value::Str(s) => out.push_str(s),
            Value::Array(items) => {
                if enter(seen, Rc::as_ptr(items) as *const ()).is_ok() {
                    write_joined(items, ",", out, seen);
                    seen.pop();
                }
            }
            Value::Object(_) => match self.error_parts(seen) {
                Some((name, message)) if message.is_empty() => out.push_str(&name),
                Some((name, message)) => {
                    out.push_str(&name);
                    out.push_str(": ");
                    out.push_str(&message);
                }
                None => out.push_str("[object Object]"),
            },
            other => out.push_str(&other.scalar_display()),
        }
    }

    fn scalar_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(_) | Value::Object(_) => self.to_display(),
            Value::Function(closure) => format!(
                "function {}() {{ [code] }}",
                closure.def.name.as_deref().unwrap_or("")
            ),
            Value::Native(native) => format!("function {}() {{ [native code] }}", native.name),
            Value::Namespace(ns) => format!("[object {}]", ns.name()),
            Value::Date(ms) => format_iso_date(*ms).unwrap_or_else(|| "Invalid Date".to_string()),
        }
    }

    /// Strict (`===`) equality. Reference types compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }

    /// Loose (`==`) equality, limited to the coercions scripts rely on:
    /// `null == undefined` and number/string/boolean comparisons.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (
                Value::Number(_) | Value::Str(_) | Value::Bool(_),
                Value::Number(_) | Value::Str(_) | Value::Bool(_),
            ) if std::mem::discriminant(self) != std::mem::discriminant(other) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    /// Converts to JSON the way `JSON.stringify` does. `Ok(None)` means the
    /// value is skipped (functions, `undefined`).
    pub fn to_json(&self) -> Result<Option<serde_json::Value>, RenderError> {
        let mut budget = MAX_STRING_LENGTH;
        self.json_within(&mut Vec::new(), &mut budget)
    }

    fn json_within(
        &self,
        seen: &mut Seen,
        budget: &mut usize,
    ) -> Result<Option<serde_json::Value>, RenderError> {
        let json = match self {
            Value::Undefined | Value::Function(_) | Value::Native(_) => return Ok(None),
            Value::Null => {
                spend(budget, 4)?;
                serde_json::Value::Null
            }
            Value::Bool(b) => {
                spend(budget, 5)?;
                serde_json::Value::Bool(*b)
            }
            Value::Number(n) => {
                spend(budget, 8)?;
                number_to_json(*n)
            }
            Value::Str(s) => {
                spend(budget, s.len() + 2)?;
                serde_json::Value::String(s.to_string())
            }
            Value::Array(items) => {
                enter(seen, Rc::as_ptr(items) as *const ())?;
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    spend(budget, 1)?;
                    out.push(
                        item.json_within(seen, budget)?
                            .unwrap_or(serde_json::Value::Null),
                    );
                }
                seen.pop();
                serde_json::Value::Array(out)
            }
            Value::Object(fields) => {
                enter(seen, Rc::as_ptr(fields) as *const ())?;
                let mut map = serde_json::Map::new();
                for (key, value) in fields.borrow().iter() {
                    if let Some(json) = value.json_within(seen, budget)? {
                        spend(budget, key.len() + 4)?;
                        map.insert(key.clone(), json);
                    }
                }
                seen.pop();
                serde_json::Value::Object(map)
            }
            Value::Namespace(_) => serde_json::Value::Object(serde_json::Map::new()),
            Value::Date(ms) => {
                spend(budget, 26)?;
                format_iso_date(*ms)
                    .map(serde_json::Value::String)
                    .unwrap_or(serde_json::Value::Null)
            }
        };
        Ok(Some(json))
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

fn write_joined(items: &ArrayRef, separator: &str, out: &mut String, seen: &mut Seen) {
    for (i, item) in items.borrow().iter().enumerate() {
        if out.len() > MAX_STRING_LENGTH {
            return;
        }
        if i > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            item.write_display(out, seen);
        }
    }
}

/// Renders a number the way JavaScript's `String(n)` does for the common cases.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn parse_numeric(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

pub fn format_iso_date(ms: f64) -> Option<String> {
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
}

/// Lexical environment. Cloning shares the underlying scope.
#[derive(Debug, Clone, Default)]
pub struct Env(Rc<RefCell<Scope>>);

pub enum Lookup {
    Found(Value),
    Missing,
}

pub enum AssignOutcome {
    Assigned,
    Constant,
    Undeclared,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Returns `false` when the name already exists in this scope.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) -> bool {
        let mut scope = self.0.borrow_mut();
        if scope.vars.contains_key(name) {
            return false;
        }
        scope.vars.insert(name.to_string(), Binding { value, mutable });
        true
    }

    /// Unconditional (re)definition, used for `var` and hoisted functions.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(
            name.to_string(),
            Binding {
                value,
                mutable: true,
            },
        );
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().vars.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let scope = env.0.borrow();
            if let Some(binding) = scope.vars.get(name) {
                return Lookup::Found(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        Lookup::Missing
    }

    pub fn assign(&self, name: &str, value: Value) -> AssignOutcome {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let mut scope = env.0.borrow_mut();
            if let Some(binding) = scope.vars.get_mut(name) {
                if !binding.mutable {
                    return AssignOutcome::Constant;
                }
                binding.value = value;
                return AssignOutcome::Assigned;
            }
            current = scope.parent.clone();
        }
        AssignOutcome::Undeclared
    }

    /// Copies the named bindings into a fresh child of `parent`, giving each
    /// loop iteration its own `let` bindings.
    pub fn copy_into(&self, names: &[String], parent: &Env) -> Env {
        let next = parent.child();
        {
            let scope = self.0.borrow();
            let mut target = next.0.borrow_mut();
            for name in names {
                if let Some(binding) = scope.vars.get(name) {
                    target.vars.insert(
                        name.clone(),
                        Binding {
                            value: binding.value.clone(),
                            mutable: binding.mutable,
                        },
                    );
                }
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(40.0), "40");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(!Value::Number(1.0).strict_equals(&Value::string("1")));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_env_constants() {
        let env = Env::new();
        assert!(env.declare("x", Value::Number(1.0), false));
        assert!(!env.declare("x", Value::Number(2.0), true));
        let child = env.child();
        assert!(matches!(child.assign("x", Value::Null), AssignOutcome::Constant));
        assert!(matches!(child.assign("y", Value::Null), AssignOutcome::Undeclared));
    }

    #[test]
    fn test_error_display() {
        let err = Value::error("TypeError", "boom");
        assert_eq!(err.to_display(), "TypeError: boom");
        assert_eq!(err.as_error(), Some(("TypeError".into(), "boom".into())));
    }

    #[test]
    fn test_cyclic_array_rendering() {
        let value = Value::array(vec![Value::Number(1.0)]);
        let Value::Array(items) = &value else {
            unreachable!()
        };
        items.borrow_mut().push(value.clone());

        assert_eq!(value.to_display(), "1,");
        assert_eq!(Value::join(items, "-"), "1-");
        assert_eq!(value.to_json(), Err(RenderError::Circular));

        items.borrow_mut().clear();
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut value = Value::Number(0.0);
        for _ in 0..(MAX_RENDER_DEPTH + 8) {
            value = Value::array(vec![value]);
        }
        assert_eq!(value.to_json(), Err(RenderError::TooDeep));

        let shared = Value::array(vec![Value::Number(2.0)]);
        let twice = Value::array(vec![shared.clone(), shared]);
        assert_eq!(twice.to_display(), "2,2");
    }
}
