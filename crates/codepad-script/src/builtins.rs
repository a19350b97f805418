use crate::console::Channel;
use crate::error::ScriptError;
use crate::interpreter::{
    format_console_value, range_error, reference_error, syntax_error, type_error, Eval, Fault,
    Interpreter, Timer, MAX_ARRAY_LENGTH,
};
use crate::value::{
    format_iso_date, format_number, Env, Lookup, Namespace, Native, Value, MAX_STRING_LENGTH,
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;

const GLOBAL_NAMESPACES: &[Namespace] = &[
    Namespace::Console,
    Namespace::Math,
    Namespace::Json,
    Namespace::Date,
    Namespace::Object,
    Namespace::Array,
];

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

/// Resolves a possibly negative relative index against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn array_index(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => *n,
        Value::Str(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    if n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

impl Interpreter {
    pub(crate) fn install_globals(&self) {
        let globals: &Env = &self.globals;
        for ns in GLOBAL_NAMESPACES {
            globals.define(ns.name(), Value::Namespace(*ns));
        }
        for name in Namespace::Global.members().iter().copied() {
            globals.define(
                name,
                Value::Native(Native {
                    namespace: Namespace::Global,
                    name,
                }),
            );
        }
        globals.define("globalThis", Value::Namespace(Namespace::Global));
        globals.define("NaN", Value::Number(f64::NAN));
        globals.define("Infinity", Value::Number(f64::INFINITY));
    }

    pub(crate) fn get_property(&mut self, target: &Value, name: &str) -> Eval<Value> {
        match target {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                target.to_display(),
                name
            ))),
            Value::Str(s) => {
                self.charge_bytes(s.len())?;
                Ok(match name {
                    "length" => Value::Number(s.chars().count() as f64),
                    _ => match array_index(&Value::string(name)) {
                        Some(i) => s
                            .chars()
                            .nth(i)
                            .map(|c| Value::string(c.to_string()))
                            .unwrap_or(Value::Undefined),
                        None => Value::Undefined,
                    },
                })
            }
            Value::Array(items) => Ok(match name {
                "length" => Value::Number(items.borrow().len() as f64),
                _ => match array_index(&Value::string(name)) {
                    Some(i) => items.borrow().get(i).cloned().unwrap_or(Value::Undefined),
                    None => Value::Undefined,
                },
            }),
            Value::Object(fields) => Ok(fields.borrow().get(name).cloned().unwrap_or(Value::Undefined)),
            Value::Namespace(ns) => Ok(self.namespace_property(*ns, name)),
            Value::Function(closure) => Ok(match name {
                "name" => Value::string(closure.def.name.as_deref().unwrap_or("")),
                "length" => Value::Number(closure.def.params.len() as f64),
                _ => Value::Undefined,
            }),
            Value::Native(native) => Ok(match name {
                "name" => Value::string(native.name),
                _ => Value::Undefined,
            }),
            Value::Bool(_) | Value::Number(_) | Value::Date(_) => Ok(Value::Undefined),
        }
    }

    fn namespace_property(&self, ns: Namespace, name: &str) -> Value {
        if ns == Namespace::Math {
            let constant = match name {
                "PI" => Some(std::f64::consts::PI),
                "E" => Some(std::f64::consts::E),
                "LN2" => Some(std::f64::consts::LN_2),
                "LN10" => Some(std::f64::consts::LN_10),
                "SQRT2" => Some(std::f64::consts::SQRT_2),
                _ => None,
            };
            if let Some(constant) = constant {
                return Value::Number(constant);
            }
        }
        if ns == Namespace::Global {
            if let Lookup::Found(value) = self.globals.lookup(name) {
                return value;
            }
        }
        match ns.members().iter().copied().find(|member| *member == name) {
            Some(member) => Value::Native(Native {
                namespace: ns,
                name: member,
            }),
            None => Value::Undefined,
        }
    }

    pub(crate) fn get_index(&mut self, target: &Value, key: &Value) -> Eval<Value> {
        if let (Value::Array(items), Some(i)) = (target, array_index(key)) {
            return Ok(items.borrow().get(i).cloned().unwrap_or(Value::Undefined));
        }
        self.get_property(target, &key.to_display())
    }

    pub(crate) fn set_property(&mut self, target: &Value, name: &str, value: Value) -> Eval<()> {
        match target {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                target.to_display(),
                name
            ))),
            Value::Object(fields) => {
                fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                if name == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 || len >= MAX_ARRAY_LENGTH as f64 {
                        return Err(range_error("Invalid array length"));
                    }
                    self.charge_elements(len as usize)?;
                    items.borrow_mut().resize(len as usize, Value::Undefined);
                    return Ok(());
                }
                if let Some(i) = array_index(&Value::string(name)) {
                    if i >= MAX_ARRAY_LENGTH {
                        return Err(range_error("Invalid array length"));
                    }
                    let len = items.borrow().len();
                    if i >= len {
                        self.charge_elements(i + 1 - len)?;
                    }
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                }
                Ok(())
            }
            Value::Namespace(ns) => Err(type_error(format!(
                "Cannot assign to read only property '{}' of object '{}'",
                name,
                ns.name()
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn call_method(
        &mut self,
        target: &Value,
        name: &str,
        args: Vec<Value>,
        label: &str,
    ) -> Eval<Value> {
        let result = match target {
            Value::Undefined | Value::Null => {
                return Err(type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.to_display(),
                    name
                )))
            }
            Value::Str(s) => self.string_method(s, name, &args)?,
            Value::Number(n) => number_method(*n, name, &args)?,
            Value::Array(_) => self.array_method(target, name, &args)?,
            Value::Date(ms) => date_method(*ms, name),
            _ => None,
        };
        if let Some(value) = result {
            return Ok(value);
        }

        let callee = self.get_property(target, name)?;
        self.call_value(&callee, args, label)
    }

    pub(crate) fn construct(&mut self, constructor: &str, args: Vec<Value>, env: &Env) -> Eval<Value> {
        match constructor {
            "Date" => Ok(Value::Date(self.date_from_args(&args))),
            "Error" | "TypeError" | "RangeError" | "SyntaxError" | "ReferenceError" => {
                Ok(make_error(constructor, &args))
            }
            "Array" => {
                if let [Value::Number(n)] = args.as_slice() {
                    let n = *n;
                    if n < 0.0 || n.fract() != 0.0 || n >= MAX_ARRAY_LENGTH as f64 {
                        return Err(range_error("Invalid array length"));
                    }
                    self.charge_elements(n as usize)?;
                    return Ok(Value::array(vec![Value::Undefined; n as usize]));
                }
                Ok(Value::array(args))
            }
            "Object" => Ok(Value::object(IndexMap::new())),
            other => match env.lookup(other) {
                Lookup::Found(Value::Function(closure)) => {
                    let result = self.call_function(&closure, args)?;
                    match result {
                        Value::Object(_) | Value::Array(_) => Ok(result),
                        _ => Ok(Value::object(IndexMap::new())),
                    }
                }
                Lookup::Found(_) => Err(type_error(format!("{} is not a constructor", other))),
                Lookup::Missing => Err(reference_error(format!("{} is not defined", other))),
            },
        }
    }

    fn date_from_args(&self, args: &[Value]) -> f64 {
        match args {
            [] => self.now_ms(),
            [Value::Str(s)] => parse_date(s),
            [Value::Date(ms)] => *ms,
            [single] => single.to_number(),
            parts => {
                let part = |i: usize, default: f64| {
                    parts.get(i).map(|v| v.to_number()).unwrap_or(default)
                };
                let (year, month, day) = (part(0, f64::NAN), part(1, 0.0), part(2, 1.0));
                let (hour, minute, second, millis) =
                    (part(3, 0.0), part(4, 0.0), part(5, 0.0), part(6, 0.0));
                if [year, month, day, hour, minute, second, millis]
                    .iter()
                    .any(|n| !n.is_finite())
                {
                    return f64::NAN;
                }
                NaiveDate::from_ymd_opt(year as i32, 1, 1)
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|base| {
                        let dt = add_months(Utc.from_utc_datetime(&base), month as i64);
                        let offset_ms = (day - 1.0) * 86_400_000.0
                            + hour * 3_600_000.0
                            + minute * 60_000.0
                            + second * 1000.0
                            + millis;
                        dt.timestamp_millis() as f64 + offset_ms
                    })
                    .unwrap_or(f64::NAN)
            }
        }
    }

    pub(crate) fn call_native(&mut self, native: &Native, args: Vec<Value>) -> Eval<Value> {
        match native.namespace {
            Namespace::Console => {
                let channel = Channel::from_method(native.name).unwrap_or(Channel::Log);
                let text = args
                    .iter()
                    .map(format_console_value)
                    .collect::<Eval<Vec<_>>>()?
                    .join(" ");
                self.write_console(channel, text)?;
                Ok(Value::Undefined)
            }
            Namespace::Math => Ok(math(native.name, &args)),
            Namespace::Json => self.json(native.name, &args),
            Namespace::Date => Ok(Value::Number(self.now_ms().floor())),
            Namespace::Object => {
                let size = match args.first() {
                    Some(Value::Object(fields)) => fields.borrow().len(),
                    Some(Value::Array(items)) => items.borrow().len(),
                    Some(Value::Str(s)) => s.len(),
                    _ => 0,
                };
                self.charge_elements(size)?;
                Ok(object_static(native.name, &args))
            }
            Namespace::Array => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
            Namespace::Global => self.global(native.name, args),
        }
    }

    fn global(&mut self, name: &str, args: Vec<Value>) -> Eval<Value> {
        let first = arg(&args, 0);
        match name {
            "parseInt" => Ok(Value::Number(parse_int(
                &first.to_display(),
                arg(&args, 1).to_number(),
            ))),
            "parseFloat" => Ok(Value::Number(parse_float(&first.to_display()))),
            "isNaN" => Ok(Value::Bool(first.to_number().is_nan())),
            "isFinite" => Ok(Value::Bool(first.to_number().is_finite())),
            "encodeURIComponent" => Ok(Value::string(
                urlencoding::encode(&first.to_display()).into_owned(),
            )),
            "decodeURIComponent" => match urlencoding::decode(&first.to_display()) {
                Ok(decoded) => Ok(Value::string(decoded.into_owned())),
                Err(_) => Err(Fault::Throw(Value::error("URIError", "URI malformed"))),
            },
            "String" => Ok(Value::string(match args.first() {
                Some(value) => value.to_display(),
                None => String::new(),
            })),
            "Number" => Ok(Value::Number(match args.first() {
                Some(value) => value.to_number(),
                None => 0.0,
            })),
            "Boolean" => Ok(Value::Bool(first.truthy())),
            "Error" | "TypeError" | "RangeError" => Ok(make_error(name, &args)),
            "setTimeout" => self.set_timeout(args),
            "clearTimeout" => {
                let id = first.to_number();
                self.timers.retain(|timer| timer.id as f64 != id);
                Ok(Value::Undefined)
            }
            _ => Err(type_error(format!("{} is not a function", name))),
        }
    }

    fn set_timeout(&mut self, args: Vec<Value>) -> Eval<Value> {
        let mut args = args.into_iter();
        let callback = args.next().unwrap_or(Value::Undefined);
        if !callback.is_callable() {
            return Err(type_error(
                "The \"callback\" argument must be of type function",
            ));
        }
        let delay = args.next().map(|v| v.to_number()).unwrap_or(0.0);
        let delay = if delay.is_nan() || delay < 0.0 { 0.0 } else { delay };
        if delay > self.limits.timer_ceiling_ms {
            return Err(Fault::Fatal(ScriptError::Policy(format!(
                "Timeout too long (max {} seconds)",
                format_number(self.limits.timer_ceiling_ms / 1000.0)
            ))));
        }

        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(Timer {
            id,
            due: self.clock + delay,
            callback,
            args: args.collect(),
        });
        Ok(Value::Number(id as f64))
    }

    fn json(&mut self, name: &str, args: &[Value]) -> Eval<Value> {
        match name {
            "stringify" => {
                let Some(json) = arg(args, 0).to_json()? else {
                    return Ok(Value::Undefined);
                };
                let indent = match arg(args, 2) {
                    Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                    Value::Str(s) => s.chars().take(10).collect(),
                    _ => String::new(),
                };
                let text = if indent.is_empty() {
                    serde_json::to_string(&json)
                } else {
                    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                    let mut serializer =
                        serde_json::Serializer::with_formatter(Vec::new(), formatter);
                    match json.serialize(&mut serializer) {
                        Ok(()) => Ok(String::from_utf8_lossy(&serializer.into_inner()).into_owned()),
                        Err(e) => Err(e),
                    }
                };
                let text =
                    text.map_err(|e| type_error(format!("Converting to JSON failed: {}", e)))?;
                self.checked_string(text)
            }
            "parse" => {
                let text = arg(args, 0).to_display();
                self.charge_bytes(text.len())?;
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|json| Value::from_json(&json))
                    .map_err(|e| syntax_error(format!("Unexpected token in JSON: {}", e)))
            }
            _ => Err(type_error(format!("JSON.{} is not a function", name))),
        }
    }

    fn string_method(&mut self, s: &str, name: &str, args: &[Value]) -> Eval<Option<Value>> {
        self.charge_bytes(s.len())?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        let text = |i: usize| arg(args, i).to_display();
        let slice = |start: usize, end: usize| -> String {
            if start >= end {
                String::new()
            } else {
                chars[start..end].iter().collect()
            }
        };

        let value = match name {
            "toUpperCase" => self.checked_string(s.to_uppercase())?,
            "toLowerCase" => self.checked_string(s.to_lowercase())?,
            "trim" => Value::string(s.trim()),
            "trimStart" => Value::string(s.trim_start()),
            "trimEnd" => Value::string(s.trim_end()),
            "toString" | "valueOf" => Value::string(s),
            "includes" => Value::Bool(s.contains(text(0).as_str())),
            "startsWith" => Value::Bool(s.starts_with(text(0).as_str())),
            "endsWith" => Value::Bool(s.ends_with(text(0).as_str())),
            "indexOf" => {
                let needle = text(0);
                Value::Number(match s.find(&needle) {
                    Some(byte) => s[..byte].chars().count() as f64,
                    None => -1.0,
                })
            }
            "lastIndexOf" => {
                let needle = text(0);
                Value::Number(match s.rfind(&needle) {
                    Some(byte) => s[..byte].chars().count() as f64,
                    None => -1.0,
                })
            }
            "charAt" => Value::string(
                chars
                    .get(arg(args, 0).to_number().max(0.0) as usize)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            ),
            "charCodeAt" => Value::Number(
                chars
                    .get(arg(args, 0).to_number().max(0.0) as usize)
                    .map(|c| *c as u32 as f64)
                    .unwrap_or(f64::NAN),
            ),
            "at" => {
                let i = arg(args, 0).to_number();
                let i = if i < 0.0 { len as f64 + i } else { i };
                if i < 0.0 {
                    Value::Undefined
                } else {
                    chars
                        .get(i as usize)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or(Value::Undefined)
                }
            }
            "slice" => {
                let start = relative_index(&arg(args, 0), len, 0);
                let end = relative_index(&arg(args, 1), len, len);
                Value::string(slice(start, end))
            }
            "substring" => {
                let clamp = |v: &Value, default: usize| match v {
                    Value::Undefined => default,
                    v => {
                        let n = v.to_number();
                        if n.is_nan() || n < 0.0 {
                            0
                        } else {
                            (n as usize).min(len)
                        }
                    }
                };
                let a = clamp(&arg(args, 0), 0);
                let b = clamp(&arg(args, 1), len);
                Value::string(slice(a.min(b), a.max(b)))
            }
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Undefined) => vec![Value::string(s)],
                    Some(sep) => {
                        let sep = sep.to_display();
                        if sep.is_empty() {
                            self.charge_elements(len)?;
                            chars.iter().map(|c| Value::string(c.to_string())).collect()
                        } else {
                            self.charge_elements(s.matches(sep.as_str()).count() + 1)?;
                            s.split(sep.as_str()).map(Value::string).collect()
                        }
                    }
                };
                Value::array(parts)
            }
            "replace" => {
                let (needle, replacement) = (text(0), text(1));
                self.reserve_string(s.len() + replacement.len())?;
                Value::string(s.replacen(needle.as_str(), &replacement, 1))
            }
            "replaceAll" => {
                let (needle, replacement) = (text(0), text(1));
                let hits = s.matches(needle.as_str()).count();
                self.reserve_string(s.len().saturating_add(hits.saturating_mul(replacement.len())))?;
                Value::string(s.replace(needle.as_str(), &replacement))
            }
            "repeat" => {
                let count = arg(args, 0).to_number();
                if count < 0.0 || !count.is_finite() {
                    return Err(range_error(format!(
                        "Invalid count value: {}",
                        format_number(count)
                    )));
                }
                if s.len() as f64 * count > MAX_STRING_LENGTH as f64 {
                    return Err(range_error("Invalid string length"));
                }
                self.reserve_string(s.len() * count as usize)?;
                Value::string(s.repeat(count as usize))
            }
            "padStart" | "padEnd" => {
                let target = arg(args, 0).to_number();
                let fill = match args.get(1) {
                    Some(Value::Undefined) | None => " ".to_string(),
                    Some(v) => v.to_display(),
                };
                if target > MAX_STRING_LENGTH as f64 {
                    return Err(range_error("Invalid string length"));
                }
                let target = target.max(0.0) as usize;
                if target <= len || fill.is_empty() {
                    Value::string(s)
                } else {
                    let widest = fill.chars().map(char::len_utf8).max().unwrap_or(1);
                    self.reserve_string(s.len() + (target - len) * widest)?;
                    let padding: String = fill.chars().cycle().take(target - len).collect();
                    if name == "padStart" {
                        Value::string(format!("{}{}", padding, s))
                    } else {
                        Value::string(format!("{}{}", s, padding))
                    }
                }
            }
            "concat" => {
                let mut out = s.to_string();
                for value in args {
                    out.push_str(&value.to_display());
                    if out.len() > MAX_STRING_LENGTH {
                        return Err(range_error("Invalid string length"));
                    }
                }
                self.checked_string(out)?
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn array_method(&mut self, target: &Value, name: &str, args: &[Value]) -> Eval<Option<Value>> {
        let Value::Array(items) = target else {
            return Ok(None);
        };
        let len = items.borrow().len();
        if matches!(
            name,
            "shift"
                | "unshift"
                | "forEach"
                | "map"
                | "filter"
                | "find"
                | "findIndex"
                | "some"
                | "every"
                | "reduce"
                | "includes"
                | "indexOf"
                | "join"
                | "concat"
                | "reverse"
                | "fill"
                | "toString"
        ) {
            self.charge_elements(len)?;
        }
        // Callbacks may mutate the array, so iterate over a snapshot.
        let snapshot = || items.borrow().clone();
        let callback = |label: &str| -> Eval<Value> {
            let callback = arg(args, 0);
            if callback.is_callable() {
                Ok(callback)
            } else {
                Err(type_error(format!(
                    "{} is not a function",
                    if label.is_empty() {
                        callback.to_display()
                    } else {
                        label.to_string()
                    }
                )))
            }
        };

        let value = match name {
            "push" => {
                if len + args.len() >= MAX_ARRAY_LENGTH {
                    return Err(range_error("Invalid array length"));
                }
                let mut items = items.borrow_mut();
                items.extend(args.iter().cloned());
                Value::Number(items.len() as f64)
            }
            "pop" => items.borrow_mut().pop().unwrap_or(Value::Undefined),
            "shift" => {
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                let mut items = items.borrow_mut();
                for (i, value) in args.iter().enumerate() {
                    items.insert(i, value.clone());
                }
                Value::Number(items.len() as f64)
            }
            "forEach" => {
                let f = callback("")?;
                for (i, item) in snapshot().into_iter().enumerate() {
                    self.call_value(&f, vec![item, Value::Number(i as f64), target.clone()], "callback")?;
                }
                Value::Undefined
            }
            "map" => {
                let f = callback("")?;
                let mut out = Vec::new();
                for (i, item) in snapshot().into_iter().enumerate() {
                    out.push(self.call_value(
                        &f,
                        vec![item, Value::Number(i as f64), target.clone()],
                        "callback",
                    )?);
                }
                Value::array(out)
            }
            "filter" => {
                let f = callback("")?;
                let mut out = Vec::new();
                for (i, item) in snapshot().into_iter().enumerate() {
                    let keep = self.call_value(
                        &f,
                        vec![item.clone(), Value::Number(i as f64), target.clone()],
                        "callback",
                    )?;
                    if keep.truthy() {
                        out.push(item);
                    }
                }
                Value::array(out)
            }
            "find" | "findIndex" => {
                let f = callback("")?;
                let mut found = None;
                for (i, item) in snapshot().into_iter().enumerate() {
                    let hit = self.call_value(
                        &f,
                        vec![item.clone(), Value::Number(i as f64), target.clone()],
                        "callback",
                    )?;
                    if hit.truthy() {
                        found = Some((i, item));
                        break;
                    }
                }
                match (name, found) {
                    ("find", Some((_, item))) => item,
                    ("find", None) => Value::Undefined,
                    (_, Some((i, _))) => Value::Number(i as f64),
                    (_, None) => Value::Number(-1.0),
                }
            }
            "some" | "every" => {
                let f = callback("")?;
                let want = name == "some";
                let mut result = !want;
                for (i, item) in snapshot().into_iter().enumerate() {
                    let hit = self
                        .call_value(&f, vec![item, Value::Number(i as f64), target.clone()], "callback")?
                        .truthy();
                    if hit == want {
                        result = want;
                        break;
                    }
                }
                Value::Bool(result)
            }
            "reduce" => {
                let f = callback("")?;
                let mut iter = snapshot().into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(type_error("Reduce of empty array with no initial value"))
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call_value(
                        &f,
                        vec![acc, item, Value::Number(i as f64), target.clone()],
                        "callback",
                    )?;
                }
                acc
            }
            "includes" => {
                let needle = arg(args, 0);
                Value::Bool(items.borrow().iter().any(|item| {
                    item.strict_equals(&needle)
                        || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
                }))
            }
            "indexOf" => {
                let needle = arg(args, 0);
                Value::Number(
                    items
                        .borrow()
                        .iter()
                        .position(|item| item.strict_equals(&needle))
                        .map(|i| i as f64)
                        .unwrap_or(-1.0),
                )
            }
            "join" => {
                let sep = match args.first() {
                    None | Some(Value::Undefined) => ",".to_string(),
                    Some(sep) => sep.to_display(),
                };
                self.reserve_string(len.saturating_sub(1).saturating_mul(sep.len()))?;
                self.checked_string(Value::join(items, &sep))?
            }
            "slice" => {
                let start = relative_index(&arg(args, 0), len, 0);
                let end = relative_index(&arg(args, 1), len, len);
                self.charge_elements(end.saturating_sub(start))?;
                let items = items.borrow();
                let (start, end) = (start.min(items.len()), end.min(items.len()));
                Value::array(if start < end {
                    items[start..end].to_vec()
                } else {
                    Vec::new()
                })
            }
            "concat" => {
                let added: usize = args
                    .iter()
                    .map(|value| match value {
                        Value::Array(other) => other.borrow().len(),
                        _ => 1,
                    })
                    .sum();
                if len + added >= MAX_ARRAY_LENGTH {
                    return Err(range_error("Invalid array length"));
                }
                self.charge_elements(added)?;
                let mut out = snapshot();
                for value in args {
                    match value {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Value::array(out)
            }
            "reverse" => {
                items.borrow_mut().reverse();
                target.clone()
            }
            "at" => {
                let items = items.borrow();
                let i = arg(args, 0).to_number();
                let i = if i < 0.0 { items.len() as f64 + i } else { i };
                if i < 0.0 {
                    Value::Undefined
                } else {
                    items.get(i as usize).cloned().unwrap_or(Value::Undefined)
                }
            }
            "fill" => {
                let value = arg(args, 0);
                for item in items.borrow_mut().iter_mut() {
                    *item = value.clone();
                }
                target.clone()
            }
            "flat" => {
                let nested: usize = items
                    .borrow()
                    .iter()
                    .map(|item| match item {
                        Value::Array(inner) => inner.borrow().len(),
                        _ => 1,
                    })
                    .sum();
                if nested >= MAX_ARRAY_LENGTH {
                    return Err(range_error("Invalid array length"));
                }
                self.charge_elements(nested)?;
                let mut out = Vec::new();
                for item in snapshot() {
                    match item {
                        Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                }
                Value::array(out)
            }
            "sort" => {
                let comparator = match args.first() {
                    None | Some(Value::Undefined) => None,
                    Some(_) => Some(callback("The comparison function")?),
                };
                let mut sorted = snapshot();
                let Some(comparator) = comparator else {
                    let rounds = (usize::BITS - len.leading_zeros()) as usize;
                    self.charge_elements(len.saturating_mul(rounds))?;
                    sorted.sort_by(default_compare);
                    *items.borrow_mut() = sorted;
                    return Ok(Some(target.clone()));
                };
                // Insertion sort so that a throwing comparator can abort midway.
                // Each comparator call is charged as a step.
                for i in 1..sorted.len() {
                    let mut j = i;
                    while j > 0 {
                        let n = self
                            .call_value(
                                &comparator,
                                vec![sorted[j - 1].clone(), sorted[j].clone()],
                                "comparator",
                            )?
                            .to_number();
                        if !(n > 0.0) {
                            break;
                        }
                        sorted.swap(j - 1, j);
                        j -= 1;
                    }
                }
                *items.borrow_mut() = sorted;
                target.clone()
            }
            "toString" => self.checked_string(target.to_display())?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Default `sort` order: by string form, `undefined` last. A total order,
/// so it is safe to hand to the standard library sort.
fn default_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => a.to_display().cmp(&b.to_display()),
    }
}

fn make_error(name: &str, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => value.to_display(),
    };
    Value::error(name, message)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Eval<Option<Value>> {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(range_error("toFixed() digits argument must be between 0 and 100"));
            }
            if n.is_finite() {
                Value::string(format!("{:.*}", digits as usize, n))
            } else {
                Value::string(format_number(n))
            }
        }
        "toString" => match arg(args, 0) {
            Value::Undefined => Value::string(format_number(n)),
            radix => {
                let radix = radix.to_number();
                if !(2.0..=36.0).contains(&radix) {
                    return Err(range_error("toString() radix must be between 2 and 36"));
                }
                Value::string(to_radix(n, radix as u32))
            }
        },
        "valueOf" => Value::Number(n),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn to_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() || n.fract() != 0.0 || radix == 10 {
        return format_number(n);
    }
    let negative = n < 0.0;
    let mut value = n.abs() as u64;
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('?'));
        value /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn date_method(ms: f64, name: &str) -> Option<Value> {
    let dt: Option<DateTime<Utc>> = if ms.is_finite() {
        Utc.timestamp_millis_opt(ms as i64).single()
    } else {
        None
    };
    let field = |f: fn(&DateTime<Utc>) -> f64| Value::Number(dt.as_ref().map(f).unwrap_or(f64::NAN));

    let value = match name {
        "getTime" | "valueOf" => Value::Number(ms),
        "getFullYear" => field(|d| d.year() as f64),
        "getMonth" => field(|d| d.month0() as f64),
        "getDate" => field(|d| d.day() as f64),
        "getDay" => field(|d| d.weekday().num_days_from_sunday() as f64),
        "getHours" => field(|d| d.hour() as f64),
        "getMinutes" => field(|d| d.minute() as f64),
        "getSeconds" => field(|d| d.second() as f64),
        "getMilliseconds" => field(|d| (d.timestamp_subsec_millis()) as f64),
        "toISOString" | "toJSON" | "toString" => {
            Value::string(format_iso_date(ms).unwrap_or_else(|| "Invalid Date".to_string()))
        }
        "toLocaleDateString" => Value::string(
            dt.map(|d| format!("{}/{}/{}", d.month(), d.day(), d.year()))
                .unwrap_or_else(|| "Invalid Date".to_string()),
        ),
        "toLocaleTimeString" => Value::string(
            dt.map(|d| {
                let (pm, hour) = d.hour12();
                format!(
                    "{}:{:02}:{:02} {}",
                    hour,
                    d.minute(),
                    d.second(),
                    if pm { "PM" } else { "AM" }
                )
            })
            .unwrap_or_else(|| "Invalid Date".to_string()),
        ),
        _ => return None,
    };
    Some(value)
}

fn add_months(dt: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    let total = dt.year() as i64 * 12 + dt.month0() as i64 + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
}

fn parse_date(s: &str) -> f64 {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_millis() as f64;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&naive).timestamp_millis() as f64;
        }
    }
    f64::NAN
}

fn math(name: &str, args: &[Value]) -> Value {
    let x = arg(args, 0).to_number();
    let y = arg(args, 1).to_number();
    let n = match name {
        "abs" => x.abs(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        // JavaScript rounds halves toward positive infinity.
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "sqrt" => x.sqrt(),
        "cbrt" => x.cbrt(),
        "pow" => x.powf(y),
        "log" => x.ln(),
        "log2" => x.log2(),
        "log10" => x.log10(),
        "exp" => x.exp(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "hypot" => args
            .iter()
            .map(|v| v.to_number().powi(2))
            .sum::<f64>()
            .sqrt(),
        "random" => rand::random::<f64>(),
        "min" | "max" => {
            let values: Vec<f64> = args.iter().map(Value::to_number).collect();
            if values.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else if name == "min" {
                values.into_iter().fold(f64::INFINITY, f64::min)
            } else {
                values.into_iter().fold(f64::NEG_INFINITY, f64::max)
            }
        }
        _ => f64::NAN,
    };
    Value::Number(n)
}

fn object_static(name: &str, args: &[Value]) -> Value {
    let entries: Vec<(String, Value)> = match arg(args, 0) {
        Value::Object(fields) => fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::string(c.to_string())))
            .collect(),
        _ => Vec::new(),
    };

    Value::array(match name {
        "keys" => entries.into_iter().map(|(k, _)| Value::string(k)).collect(),
        "values" => entries.into_iter().map(|(_, v)| v).collect(),
        _ => entries
            .into_iter()
            .map(|(k, v)| Value::array(vec![Value::string(k), v]))
            .collect(),
    })
}

fn parse_int(s: &str, radix: f64) -> f64 {
    let s = s.trim_start();
    let (negative, mut digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let explicit = !(radix.is_nan() || radix == 0.0);
    let mut radix = if explicit { radix as u32 } else { 10 };
    if (!explicit || radix == 16) && (digits.starts_with("0x") || digits.starts_with("0X")) {
        radix = 16;
        digits = &digits[2..];
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in valid.chars() {
        value = value * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64;
    }
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if s.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }

    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    while end < bytes.len() {
        let c = bytes[end] as char;
        match c {
            '0'..='9' => seen_digit = true,
            '+' | '-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }

    let mut candidate = &s[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    f64::NAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", f64::NAN), 42.0);
        assert_eq!(parse_int("  -17", f64::NAN), -17.0);
        assert_eq!(parse_int("ff", 16.0), 255.0);
        assert_eq!(parse_int("0x1A", f64::NAN), 26.0);
        assert!(parse_int("abc", f64::NAN).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert_eq!(parse_float("-0.5"), -0.5);
        assert!(parse_float("x1").is_nan());
    }

    #[test]
    fn test_to_radix() {
        assert_eq!(to_radix(255.0, 16), "ff");
        assert_eq!(to_radix(-5.0, 2), "-101");
        assert_eq!(to_radix(0.0, 2), "0");
    }

    #[test]
    fn test_math_round_halves_up() {
        assert_eq!(math("round", &[Value::Number(2.5)]).to_number(), 3.0);
        assert_eq!(math("round", &[Value::Number(-2.5)]).to_number(), -2.0);
        assert!(math("max", &[]).to_number().is_infinite());
    }
}
