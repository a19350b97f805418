use crate::ast::*;
use crate::console::{Channel, Console, ConsoleLine};
use crate::error::ScriptError;
use crate::parser::Parser;
use crate::value::{AssignOutcome, Closure, Env, Lookup, RenderError, Value, MAX_STRING_LENGTH};
use chrono::Utc;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub(crate) const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Bytes a native operation may produce or scan per step charged.
const BYTES_PER_STEP: usize = 64;

/// Array elements a native operation may touch per step charged.
const ELEMENTS_PER_STEP: usize = 16;

/// The wall clock is checked whenever the step count crosses a multiple of this.
const CLOCK_CHECK_INTERVAL: u64 = 256;

/// Resource ceilings for a single script run.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub wall_clock: Duration,
    /// Largest delay `setTimeout` accepts, in milliseconds.
    pub timer_ceiling_ms: f64,
    pub max_output_bytes: usize,
    /// Stack size of the thread the interpreter runs on.
    pub stack_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 5_000_000,
            max_call_depth: 300,
            wall_clock: Duration::from_secs(5),
            timer_ceiling_ms: 5000.0,
            max_output_bytes: 1024 * 1024,
            stack_size: 128 * 1024 * 1024,
        }
    }
}

/// Everything a run produced: the console transcript and, when the program
/// did not finish normally, the fault that stopped it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub console: Vec<ConsoleLine>,
    pub fault: Option<ScriptError>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

/// Parses and runs `source` on a dedicated thread, returning once the main
/// program and every pending timer have finished.
pub fn run(source: &str, limits: &Limits) -> Completion {
    let source = source.to_string();
    let thread_limits = limits.clone();

    let handle = std::thread::Builder::new()
        .name("codepad-script".into())
        .stack_size(limits.stack_size)
        .spawn(move || run_inline(&source, &thread_limits));

    match handle {
        Ok(handle) => match handle.join() {
            Ok(completion) => completion,
            Err(_) => Completion {
                console: Vec::new(),
                fault: Some(ScriptError::Thrown("Internal interpreter error".into())),
            },
        },
        Err(e) => {
            warn!("Failed to spawn interpreter thread: {}", e);
            Completion {
                console: Vec::new(),
                fault: Some(ScriptError::Thrown(format!(
                    "Failed to start interpreter: {}",
                    e
                ))),
            }
        }
    }
}

fn run_inline(source: &str, limits: &Limits) -> Completion {
    let program = match Parser::parse_string(source) {
        Ok(program) => program,
        Err(e) => {
            debug!("Script rejected by parser: {}", e);
            return Completion {
                console: Vec::new(),
                fault: Some(e),
            };
        }
    };

    let mut interpreter = Interpreter::new(limits.clone());
    let outcome = interpreter.execute(&program);
    let fault = match outcome {
        Ok(()) => None,
        Err(Fault::Throw(value)) => Some(ScriptError::Thrown(render_uncaught(&value))),
        Err(Fault::Fatal(e)) => Some(e),
    };

    debug!(
        "Script finished after {} steps ({} console lines)",
        interpreter.steps,
        interpreter.console_len()
    );

    Completion {
        console: interpreter.console.into_lines(),
        fault,
    }
}

fn render_uncaught(value: &Value) -> String {
    match value.as_error() {
        Some((_, message)) => message,
        None => format_console_value(value).unwrap_or_else(|_| value.to_display()),
    }
}

/// How a single console argument is printed. Arrays and objects print as
/// indented JSON, so a cyclic structure throws like `JSON.stringify`.
pub(crate) fn format_console_value(value: &Value) -> Eval<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        Value::Array(_) | Value::Object(_) | Value::Namespace(_) => {
            if value.as_error().is_some() {
                return Ok(value.to_display());
            }
            Ok(value
                .to_json()?
                .and_then(|json| serde_json::to_string_pretty(&json).ok())
                .unwrap_or_else(|| value.to_display()))
        }
        other => Ok(other.to_display()),
    }
}

pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Non-local exit from evaluation. `Throw` can be caught by `try`; `Fatal`
/// always ends the run.
pub(crate) enum Fault {
    Throw(Value),
    Fatal(ScriptError),
}

pub(crate) type Eval<T> = std::result::Result<T, Fault>;

impl From<RenderError> for Fault {
    fn from(err: RenderError) -> Self {
        let (name, message) = err.error_parts();
        Fault::Throw(Value::error(name, message))
    }
}

pub(crate) fn type_error(message: impl Into<String>) -> Fault {
    Fault::Throw(Value::error("TypeError", message))
}

pub(crate) fn range_error(message: impl Into<String>) -> Fault {
    Fault::Throw(Value::error("RangeError", message))
}

pub(crate) fn reference_error(message: impl Into<String>) -> Fault {
    Fault::Throw(Value::error("ReferenceError", message))
}

pub(crate) fn syntax_error(message: impl Into<String>) -> Fault {
    Fault::Throw(Value::error("SyntaxError", message))
}

pub(crate) struct Timer {
    pub id: u32,
    pub due: f64,
    pub callback: Value,
    pub args: Vec<Value>,
}

pub(crate) struct Interpreter {
    pub(crate) limits: Limits,
    pub(crate) console: Console,
    pub(crate) globals: Env,
    pub(crate) timers: Vec<Timer>,
    pub(crate) next_timer_id: u32,
    /// Virtual milliseconds advanced by fired timers.
    pub(crate) clock: f64,
    pub(crate) epoch_ms: f64,
    started: Instant,
    steps: u64,
    depth: usize,
}

impl Interpreter {
    pub(crate) fn new(limits: Limits) -> Self {
        let console = Console::new(limits.max_output_bytes);
        let interpreter = Self {
            limits,
            console,
            globals: Env::new(),
            timers: Vec::new(),
            next_timer_id: 1,
            clock: 0.0,
            epoch_ms: Utc::now().timestamp_millis() as f64,
            started: Instant::now(),
            steps: 0,
            depth: 0,
        };
        interpreter.install_globals();
        interpreter
    }

    fn console_len(&self) -> usize {
        self.console.len()
    }

    pub(crate) fn now_ms(&self) -> f64 {
        self.epoch_ms + self.started.elapsed().as_millis() as f64 + self.clock
    }

    pub(crate) fn execute(&mut self, program: &Program) -> Eval<()> {
        let scope = self.globals.child();
        self.hoist(&program.body, &scope);
        for stmt in &program.body {
            if let Flow::Return(_) = self.exec(stmt, &scope)? {
                break;
            }
        }
        self.drain_timers()
    }

    pub(crate) fn write_console(&mut self, channel: Channel, text: String) -> Eval<()> {
        if self.console.write(channel, text) {
            Ok(())
        } else {
            Err(Fault::Fatal(ScriptError::Budget(format!(
                "console output exceeded {} bytes",
                self.limits.max_output_bytes
            ))))
        }
    }

    pub(crate) fn tick(&mut self) -> Eval<()> {
        self.charge(1)
    }

    /// Counts `units` steps of work against the step and wall-clock budgets.
    pub(crate) fn charge(&mut self, units: u64) -> Eval<()> {
        let before = self.steps;
        self.steps = self.steps.saturating_add(units);
        if self.steps > self.limits.max_steps {
            return Err(Fault::Fatal(ScriptError::Budget(format!(
                "more than {} steps",
                self.limits.max_steps
            ))));
        }
        if self.steps / CLOCK_CHECK_INTERVAL != before / CLOCK_CHECK_INTERVAL
            && self.started.elapsed() > self.limits.wall_clock
        {
            return Err(Fault::Fatal(ScriptError::Budget(format!(
                "ran longer than {}ms",
                self.limits.wall_clock.as_millis()
            ))));
        }
        Ok(())
    }

    pub(crate) fn charge_bytes(&mut self, bytes: usize) -> Eval<()> {
        self.charge((bytes / BYTES_PER_STEP) as u64)
    }

    pub(crate) fn charge_elements(&mut self, elements: usize) -> Eval<()> {
        self.charge((elements / ELEMENTS_PER_STEP) as u64)
    }

    /// Admits a string of `bytes` about to be built, or throws the
    /// `RangeError` JavaScript raises for oversized strings.
    pub(crate) fn reserve_string(&mut self, bytes: usize) -> Eval<()> {
        if bytes > MAX_STRING_LENGTH {
            return Err(range_error("Invalid string length"));
        }
        self.charge_bytes(bytes)
    }

    /// Wraps an already built string after checking its length.
    pub(crate) fn checked_string(&mut self, text: String) -> Eval<Value> {
        self.reserve_string(text.len())?;
        Ok(Value::string(text))
    }

    fn drain_timers(&mut self) -> Eval<()> {
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
                .map(|(i, _)| i);
            let Some(index) = next else {
                return Ok(());
            };

            let timer = self.timers.remove(index);
            self.tick()?;
            if timer.due > self.clock {
                self.clock = timer.due;
            }
            debug!("Firing timer {} at {}ms", timer.id, self.clock);
            self.call_value(&timer.callback, timer.args, "setTimeout callback")?;
        }
    }

    pub(crate) fn hoist(&self, body: &[Stmt], env: &Env) {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    env.define(
                        name,
                        Value::Function(Rc::new(Closure {
                            def: def.clone(),
                            env: env.clone(),
                        })),
                    );
                }
            }
        }
    }

    fn exec_block(&mut self, body: &[Stmt], env: &Env) -> Eval<Flow> {
        let scope = env.child();
        self.hoist(body, &scope);
        for stmt in body {
            match self.exec(stmt, &scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Declaration { kind, declarators } => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    self.bind(env, *kind, &declarator.name, value)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Block(body) => self.exec_block(body, env),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, env),
            Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let items: Vec<Value> = match self.eval(iterable, env)? {
                    Value::Array(items) => {
                        self.charge_elements(items.borrow().len())?;
                        items.borrow().clone()
                    }
                    Value::Str(s) => {
                        self.charge_elements(s.len())?;
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    }
                    other => {
                        return Err(type_error(format!(
                            "{} is not iterable",
                            other.to_display()
                        )))
                    }
                };
                for item in items {
                    let scope = env.child();
                    self.bind(&scope, *kind, binding, item)?;
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { test, body } => {
                while self.eval(test, env)?.truthy() {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, env)?;
                Err(Fault::Throw(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, env);
                if let Some(handler) = handler {
                    if let Err(Fault::Throw(thrown)) = result {
                        let scope = env.child();
                        if let Some(param) = param {
                            scope.define(param, thrown);
                        }
                        result = self.exec_block(handler, &scope);
                    }
                }

                if let Err(Fault::Fatal(_)) = result {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, env)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result
            }
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        env: &Env,
    ) -> Eval<Flow> {
        let loop_env = env.child();
        let per_iteration: Vec<String> = match init {
            Some(Stmt::Declaration {
                kind: DeclKind::Let,
                declarators,
            }) => declarators.iter().map(|d| d.name.clone()).collect(),
            _ => Vec::new(),
        };
        if let Some(init) = init {
            self.exec(init, &loop_env)?;
        }

        let mut iteration_env = if per_iteration.is_empty() {
            loop_env.clone()
        } else {
            loop_env.copy_into(&per_iteration, env)
        };

        loop {
            if let Some(test) = test {
                if !self.eval(test, &iteration_env)?.truthy() {
                    break;
                }
            }
            match self.exec(body, &iteration_env)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if !per_iteration.is_empty() {
                iteration_env = iteration_env.copy_into(&per_iteration, env);
            }
            if let Some(update) = update {
                self.eval(update, &iteration_env)?;
            }
            self.tick()?;
        }
        Ok(Flow::Normal)
    }

    fn bind(&mut self, env: &Env, kind: DeclKind, name: &str, value: Value) -> Eval<()> {
        match kind {
            DeclKind::Var => {
                env.define(name, value);
                Ok(())
            }
            DeclKind::Let | DeclKind::Const => {
                if env.declare(name, value, kind.is_mutable()) {
                    Ok(())
                } else {
                    Err(syntax_error(format!(
                        "Identifier '{}' has already been declared",
                        name
                    )))
                }
            }
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env) -> Eval<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&self.eval(expr, env)?.to_display()),
                    }
                    if out.len() > MAX_STRING_LENGTH {
                        return Err(range_error("Invalid string length"));
                    }
                }
                self.checked_string(out)
            }
            Expr::Ident(name) => match env.lookup(name) {
                Lookup::Found(value) => Ok(value),
                Lookup::Missing => Err(reference_error(format!("{} is not defined", name))),
            },
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Ok(Value::array(values))
            }
            Expr::Object(properties) => {
                let mut fields = indexmap::IndexMap::new();
                for (key, value) in properties {
                    let value = self.eval(value, env)?;
                    fields.insert(key.clone(), value);
                }
                Ok(Value::object(fields))
            }
            Expr::Function(def) => Ok(Value::Function(Rc::new(Closure {
                def: def.clone(),
                env: env.clone(),
            }))),
            Expr::Member { object, property } => {
                let target = self.eval(object, env)?;
                self.get_property(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.get_index(&target, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
            Expr::New { constructor, args } => {
                let args = self.eval_args(args, env)?;
                self.construct(constructor, args, env)
            }
            Expr::Unary { op, operand } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand.as_ref()) {
                    return Ok(Value::string(match env.lookup(name) {
                        Lookup::Found(value) => value.type_of(),
                        Lookup::Missing => "undefined",
                    }));
                }
                let value = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op.binary() {
                    None => self.eval(value, env)?,
                    Some(binary) => {
                        let current = self.eval(target, env)?;
                        let rhs = self.eval(value, env)?;
                        self.binary(binary, &current, &rhs)?
                    }
                };
                self.assign_to(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Update { increment, target } => {
                let old = self.eval(target, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), env)?;
                Ok(Value::Number(old))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], env: &Env) -> Eval<Value> {
        match callee {
            Expr::Member { object, property } => {
                let target = self.eval(object, env)?;
                let args = self.eval_args(args, env)?;
                let label = call_label(object, property);
                self.call_method(&target, property, args, &label)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, env)?;
                let key = self.eval(index, env)?.to_display();
                let args = self.eval_args(args, env)?;
                let label = call_label(object, &key);
                self.call_method(&target, &key, args, &label)
            }
            other => {
                let function = self.eval(other, env)?;
                let args = self.eval_args(args, env)?;
                let label = match other {
                    Expr::Ident(name) => name.clone(),
                    _ => "expression".to_string(),
                };
                self.call_value(&function, args, &label)
            }
        }
    }

    pub(crate) fn call_value(&mut self, callee: &Value, args: Vec<Value>, label: &str) -> Eval<Value> {
        match callee {
            Value::Function(closure) => self.call_function(closure, args),
            Value::Native(native) => {
                let native = native.clone();
                self.tick()?;
                self.call_native(&native, args)
            }
            _ => Err(type_error(format!("{} is not a function", label))),
        }
    }

    pub(crate) fn call_function(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        self.tick()?;
        if self.depth >= self.limits.max_call_depth {
            return Err(range_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        let result = self.invoke(closure, args);
        self.depth -= 1;
        result
    }

    fn invoke(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        let def = &closure.def;
        let scope = closure.env.child();
        if let Some(name) = &def.name {
            scope.define(name, Value::Function(closure.clone()));
        }

        let mut args = args.into_iter();
        for param in &def.params {
            let mut value = args.next().unwrap_or(Value::Undefined);
            if let (Value::Undefined, Some(default)) = (&value, &param.default) {
                value = self.eval(default, &scope)?;
            }
            scope.define(&param.name, value);
        }

        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => {
                self.hoist(body, &scope);
                for stmt in body {
                    match self.exec(stmt, &scope)? {
                        Flow::Return(value) => return Ok(value),
                        Flow::Break | Flow::Continue => break,
                        Flow::Normal => {}
                    }
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value, env: &Env) -> Eval<()> {
        match target {
            Expr::Ident(name) => match env.assign(name, value) {
                AssignOutcome::Assigned => Ok(()),
                AssignOutcome::Constant => Err(type_error("Assignment to constant variable.")),
                AssignOutcome::Undeclared => {
                    Err(reference_error(format!("{} is not defined", name)))
                }
            },
            Expr::Member { object, property } => {
                let target = self.eval(object, env)?;
                self.set_property(&target, property, value)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                if let (Value::Array(items), Value::Number(n)) = (&target, &key) {
                    let n = *n;
                    if n >= 0.0 && n.fract() == 0.0 {
                        let i = n as usize;
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
                        return Ok(());
                    }
                }
                self.set_property(&target, &key.to_display(), value)
            }
            _ => Err(syntax_error("Invalid left-hand side in assignment")),
        }
    }

    /// Applies a binary operator, bounding the strings `+` builds.
    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
        if op == BinaryOp::Add && concatenates(left, right) {
            let (left, right) = (left.to_display(), right.to_display());
            self.reserve_string(left.len() + right.len())?;
            return Ok(Value::string(left + &right));
        }
        Ok(binary_op(op, left, right))
    }
}

fn concatenates(left: &Value, right: &Value) -> bool {
    let primitive = |v: &Value| {
        matches!(
            v,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
        )
    };
    !primitive(left) || !primitive(right)
}

fn call_label(object: &Expr, property: &str) -> String {
    match object {
        Expr::Ident(name) => format!("{}.{}", name, property),
        _ => property.to_string(),
    }
}

pub(crate) fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if concatenates(left, right) {
                Value::string(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Eq => Value::Bool(left.strict_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.strict_equals(right)),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}
