//! The tree-walking evaluator and its owning session.
//!
//! A [`Session`] holds the scope chain, settings with their mode
//! stacks, the constants worker and the output sink. `process` runs
//! one unit of input: parse, then evaluate each top-level statement,
//! echoing results through the displayer. Errors and the `leave`/
//! `next` signals both travel on the `Result` rail, so every frame
//! restores its scope and mode-stack state while they propagate.

use std::rc::Rc;
use std::time::Instant;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use tally_diagnostic::Diagnostic;
use tally_ir::{
    BinaryOp, CaseBlock, CaseSelector, CompareOp, Connective, Directive, ModeSetting, ModeValue,
    NodeArena, NodeId, NodeKind, Param, RangeSpec, ReductionOp, RegexFlags, Span, TrigUnits,
};
use tally_num::MathContext;
use tracing::debug;

use crate::builtins::{call_builtin, BuiltinCtx};
use crate::compare::{compare, CompareFlags};
use crate::convert::{to_boolean, to_index, to_integer};
use crate::displayer::{Channel, Displayer};
use crate::environment::{Environment, ScopeKind};
use crate::errors::{
    assertion_failed, leave_signal, next_signal, not_callable, null_value, undefined_name,
    ControlSignal, ErrorKind, EvalError, EvalResult,
};
use crate::host::{Host, StdHost};
use crate::operators::{binary_op, unary_op, OpSettings};
use crate::pi_worker::ConstantsWorker;
use crate::range::NumericRange;
use crate::render::{render, RenderConfig};
use crate::settings::Settings;
use crate::value::{
    Binding, BindingKind, FunctionDecl, ObjectMap, SystemVar, Value,
};

/// Interpreter version, used by `:require` and the `:save` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One parsed unit of input.
struct Unit {
    arena: Rc<NodeArena>,
    source: Rc<str>,
}

/// What `process` reports back to the driver.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub last_value: Option<Value>,
    pub quit: bool,
}

/// One interpreter instance: scope chain, settings, constants worker
/// and output sink.
pub struct Session {
    env: Environment,
    settings: Settings,
    constants: ConstantsWorker,
    displayer: Displayer,
    host: Box<dyn Host>,
    positionals: Vec<Value>,
    /// Nonzero while evaluating call arguments; suppresses the
    /// zero-parameter auto-call.
    param_eval_depth: usize,
    /// Nonzero inside function bodies, interpolation and case blocks;
    /// suppresses directive acknowledgments.
    quiet_depth: usize,
    quit: bool,
}

impl Session {
    pub fn new(displayer: Displayer, host: Box<dyn Host>) -> Self {
        let settings = Settings::new();
        let constants = ConstantsWorker::start(settings.precision());
        let mut session = Session {
            env: Environment::new(),
            settings,
            constants,
            displayer,
            host,
            positionals: Vec::new(),
            param_eval_depth: 0,
            quiet_depth: 0,
            quit: false,
        };
        session.install_predefined();
        session
    }

    pub fn with_console() -> Self {
        Session::new(Displayer::console(), Box::new(StdHost))
    }

    fn install_predefined(&mut self) {
        let system = [
            ("pi", SystemVar::Pi),
            ("e", SystemVar::E),
            ("phi", SystemVar::Phi),
            ("today", SystemVar::Today),
            ("now", SystemVar::Now),
        ];
        for (name, var) in system {
            self.env.define_global(
                name,
                Binding::of_kind(Value::Null, BindingKind::SystemBacked(var)),
                false,
            );
        }
        self.env.define_global(
            "version",
            Binding::of_kind(Value::string(VERSION), BindingKind::Predefined),
            false,
        );
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn displayer(&self) -> &Displayer {
        &self.displayer
    }

    pub fn set_positionals(&mut self, args: Vec<Value>) {
        self.positionals = args;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Wait for any pending constants recomputation; used after a
    /// precision change when the next statement needs pi immediately.
    pub fn sync_constants(&self) {
        self.constants.sync();
    }

    fn op_settings(&self) -> OpSettings {
        OpSettings::new(
            self.settings.rational(),
            self.settings.ignore_case(),
            self.settings.math_context(),
        )
    }

    fn math_context(&self) -> MathContext {
        self.settings.math_context()
    }

    fn compare_flags(&self, equality: bool) -> CompareFlags {
        CompareFlags {
            strict: false,
            allow_nulls: equality,
            ignore_case: self.settings.ignore_case(),
            natural_order: false,
            equality,
        }
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            quote_strings: self.settings.mode(ModeSetting::QuoteStrings),
            separators: self.settings.mode(ModeSetting::Separators),
            indent: None,
        }
    }

    /// Render for display, honoring the sort-keys mode.
    fn render_value(&self, value: &Value, config: &RenderConfig) -> String {
        if self.settings.mode(ModeSetting::SortKeys) {
            if let Value::Object(o) = value {
                let mut sorted = o.borrow().clone();
                sorted.sort_by_key_name();
                return render(&Value::object(sorted), config);
            }
        }
        render(value, config)
    }

    fn builtin_ctx(&self) -> BuiltinCtx {
        let snapshot = self.constants.snapshot();
        BuiltinCtx {
            rational: self.settings.rational(),
            ignore_case: self.settings.ignore_case(),
            ctx: self.math_context(),
            trig: self.settings.trig_mode(),
            pi: snapshot.pi,
        }
    }

    /// Parse and evaluate one unit of input, echoing per-statement
    /// results. The first failing statement aborts the unit.
    pub fn process(&mut self, source: &str) -> Result<ProcessOutcome, Diagnostic> {
        let parsed = tally_parse::parse(source)?;
        let unit = Unit {
            arena: Rc::new(parsed.arena),
            source: Rc::from(source),
        };
        let NodeKind::Block(statements) = unit.arena.kind(parsed.root) else {
            return Err(Diagnostic::new(
                tally_diagnostic::Category::Internal,
                "parse produced a non-block root",
            ));
        };
        let statements = statements.clone();

        let mut last = None;
        for stmt in statements {
            let started = Instant::now();
            let span = unit.arena.span(stmt);
            let result = self.eval_node(&unit, stmt);
            if self.settings.mode(ModeSetting::Timing) {
                let secs = started.elapsed().as_secs_f64();
                self.displayer.timing(snippet(source, span), secs);
            }
            match result {
                Ok(value) => {
                    self.echo_statement(&unit, stmt, &value, span);
                    last = Some(value);
                }
                Err(err) => return Err(err.with_span(span).into_diagnostic()),
            }
            if self.quit {
                break;
            }
        }
        Ok(ProcessOutcome {
            last_value: last,
            quit: self.quit,
        })
    }

    /// Evaluate a unit without echoing; returns its last value.
    pub fn eval(&mut self, source: &str) -> Result<Value, Diagnostic> {
        self.quiet_depth += 1;
        let outcome = self.process(source);
        self.quiet_depth -= 1;
        Ok(outcome?.last_value.unwrap_or(Value::Null))
    }

    fn echo_statement(&mut self, unit: &Unit, stmt: NodeId, value: &Value, span: Span) {
        if self.quiet_depth > 0 || self.settings.mode(ModeSetting::Quiet) {
            return;
        }
        // Directives and definitions acknowledge through the action
        // channel instead of echoing a value.
        if matches!(
            unit.arena.kind(stmt),
            NodeKind::Directive(_) | NodeKind::Define { .. }
        ) {
            return;
        }
        let rendered = self.render_value(value, &self.render_config());
        if self.settings.mode(ModeSetting::ResultsOnly) {
            self.displayer.message(Channel::Output, &rendered);
        } else {
            self.displayer.result(snippet(&unit.source, span), &rendered);
        }
    }

    // ----- node dispatch -------------------------------------------------

    fn eval_node(&mut self, unit: &Unit, id: NodeId) -> EvalResult {
        let span = unit.arena.span(id);
        match unit.arena.kind(id) {
            NodeKind::Null => Ok(Value::Null),
            NodeKind::Bool(b) => Ok(Value::Boolean(*b)),
            NodeKind::Integer(n) => Ok(Value::Integer(n.clone())),
            NodeKind::Decimal(d) => Ok(Value::Decimal(d.clone())),
            NodeKind::Imaginary(d) => Ok(Value::Complex(tally_num::Complex::new(
                tally_num::Real::zero_decimal(),
                tally_num::Real::Decimal(d.clone()),
            ))),
            NodeKind::Str(s) => Ok(Value::string(s.clone())),
            NodeKind::InterpStr(raw) => {
                let raw = raw.clone();
                self.interpolate(&raw).map_err(|e| e.with_span(span))
            }
            NodeKind::ArrayLit(items) => {
                let items = items.clone();
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_node(unit, item)?);
                }
                Ok(Value::array(out))
            }
            NodeKind::SetLit(items) => {
                let items = items.clone();
                let mut out: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    let v = self.eval_node(unit, item)?;
                    if !self.set_contains(&out, &v)? {
                        out.push(v);
                    }
                }
                Ok(Value::set(out))
            }
            NodeKind::ObjectLit(entries) => {
                let entries = entries.clone();
                let mut map = ObjectMap::new();
                let ignore_case = self.settings.ignore_case();
                for (key, expr) in entries {
                    let v = self.eval_node(unit, expr)?;
                    map.insert(key, v, ignore_case);
                }
                Ok(Value::object(map))
            }
            NodeKind::EmptyCollection => Ok(Value::object(ObjectMap::new())),

            NodeKind::Ident(name) => {
                let name = name.clone();
                self.resolve_name(&name).map_err(|e| e.with_span(span))
            }
            NodeKind::GlobalIdent(name) => {
                let name = name.clone();
                let binding = self
                    .env
                    .global()
                    .get(&name, self.settings.ignore_case())
                    .cloned()
                    .ok_or_else(|| undefined_name(&name).with_span(span))?;
                self.binding_value(binding)
            }
            NodeKind::Positional(n) => {
                let n = *n as usize;
                Ok(match n.checked_sub(1) {
                    Some(i) => self.positionals.get(i).cloned().unwrap_or(Value::Null),
                    // `$0` is the whole argument list.
                    None => Value::array(self.positionals.clone()),
                })
            }
            NodeKind::Member { target, name } => {
                let name = name.clone();
                let target = *target;
                let value = self.eval_node(unit, target)?;
                self.member_get(&value, &name).map_err(|e| e.with_span(span))
            }
            NodeKind::Index { target, index } => {
                let (target, index) = (*target, *index);
                let base = self.eval_node(unit, target)?;
                let idx = self.eval_node(unit, index)?;
                self.index_get(&base, &idx).map_err(|e| e.with_span(span))
            }
            NodeKind::Call { callee, args } => {
                let (callee, args) = (*callee, args.clone());
                self.eval_call(unit, callee, &args).map_err(|e| e.with_span(span))
            }

            NodeKind::Unary { op, expr } => {
                let (op, expr) = (*op, *expr);
                let v = self.eval_node(unit, expr)?;
                unary_op(op, &v, self.op_settings()).map_err(|e| e.with_span(span))
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                self.eval_binary(unit, op, lhs, rhs).map_err(|e| e.with_span(span))
            }
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let (cond, then_expr, else_expr) = (*cond, *then_expr, *else_expr);
                let c = self.eval_node(unit, cond)?;
                if to_boolean(&c) {
                    self.eval_node(unit, then_expr)
                } else {
                    self.eval_node(unit, else_expr)
                }
            }
            NodeKind::Reduction { op, spec } => {
                let (op, spec) = (*op, spec.clone());
                self.eval_reduction(unit, op, &spec).map_err(|e| e.with_span(span))
            }
            NodeKind::Range(_) => Err(EvalError::new(
                ErrorKind::Conversion,
                "a range is only meaningful after `in`",
            )
            .with_span(span)),

            NodeKind::Block(statements) => {
                let statements = statements.clone();
                let mut last = Value::Null;
                for stmt in statements {
                    last = self.eval_node(unit, stmt)?;
                }
                Ok(last)
            }
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let (cond, then_block, else_block) = (*cond, *then_block, *else_block);
                let c = self.eval_node(unit, cond)?;
                let branch = if to_boolean(&c) {
                    Some(then_block)
                } else {
                    else_block
                };
                match branch {
                    Some(block) => self.eval_scoped(unit, block, ScopeKind::If),
                    None => Ok(Value::Null),
                }
            }
            NodeKind::While { label, cond, body } => {
                let (label, cond, body) = (label.clone(), *cond, *body);
                self.eval_while(unit, label.as_deref(), cond, body)
            }
            NodeKind::Loop {
                label,
                var,
                spec,
                within,
                body,
            } => {
                let (label, var, spec, within, body) =
                    (label.clone(), var.clone(), spec.clone(), *within, *body);
                self.eval_loop(unit, label.as_deref(), var.as_deref(), &spec, within, body)
                    .map_err(|e| e.with_span(span))
            }
            NodeKind::Case { value, blocks } => {
                let (value, blocks) = (*value, blocks.clone());
                self.eval_case(unit, value, &blocks).map_err(|e| e.with_span(span))
            }
            NodeKind::Define { name, params, body } => {
                let (name, params, body) = (name.clone(), params.clone(), *body);
                self.eval_define(unit, &name, params, body, span)
            }
            NodeKind::ConstDecl { name, expr } => {
                let (name, expr) = (name.clone(), *expr);
                let v = self.eval_node(unit, expr)?;
                self.declare(&name, Binding::of_kind(v.clone(), BindingKind::Constant))
                    .map_err(|e| e.with_span(span))?;
                Ok(v)
            }
            NodeKind::VarDecl { name, expr } => {
                let (name, expr) = (name.clone(), *expr);
                let v = self.eval_node(unit, expr)?;
                self.declare(&name, Binding::normal(v.clone()))
                    .map_err(|e| e.with_span(span))?;
                Ok(v)
            }
            NodeKind::EnumDecl(names) => {
                let names = names.clone();
                let ignore_case = self.settings.ignore_case();
                for (i, name) in names.iter().enumerate() {
                    self.env.define_local(
                        name,
                        Binding::of_kind(Value::integer(i as u64), BindingKind::EnumMember),
                        ignore_case,
                    );
                }
                Ok(Value::Null)
            }
            NodeKind::Assign { target, op, expr } => {
                let (target, op, expr) = (*target, *op, *expr);
                self.eval_assign(unit, target, op, expr).map_err(|e| e.with_span(span))
            }
            NodeKind::Leave { label, value } => {
                let (label, value) = (label.clone(), *value);
                let carried = match value {
                    Some(expr) => Some(self.eval_node(unit, expr)?),
                    None => None,
                };
                Err(leave_signal(label, carried))
            }
            NodeKind::Next => Err(next_signal()),
            NodeKind::TimeThis { body } => {
                let body = *body;
                let started = Instant::now();
                let result = self.eval_scoped(unit, body, ScopeKind::Block);
                let secs = started.elapsed().as_secs_f64();
                self.displayer.timing(snippet(&unit.source, span), secs);
                result
            }
            NodeKind::Directive(directive) => {
                let directive = directive.clone();
                self.eval_directive(unit, &directive).map_err(|e| e.with_span(span))
            }
        }
    }

    // ----- names ---------------------------------------------------------

    fn resolve_name(&mut self, name: &str) -> EvalResult {
        if let Some(binding) = self.env.lookup(name, self.settings.ignore_case()).cloned() {
            return self.binding_value(binding);
        }
        Err(undefined_name(name))
    }

    /// Materialize a binding: system variables compute on read, and a
    /// bare zero-parameter function reference calls it.
    fn binding_value(&mut self, binding: Binding) -> EvalResult {
        if let BindingKind::SystemBacked(var) = binding.kind {
            return Ok(self.system_value(var));
        }
        if let Value::Function(decl) = &binding.value {
            if decl.params.is_empty() && self.param_eval_depth == 0 {
                let decl = Rc::clone(decl);
                return self.call_function(&decl, Vec::new());
            }
        }
        Ok(binding.value)
    }

    fn system_value(&self, var: SystemVar) -> Value {
        let snapshot = self.constants.snapshot();
        match var {
            SystemVar::Pi => Value::Decimal(snapshot.pi),
            SystemVar::E => Value::Decimal(snapshot.e),
            SystemVar::Phi => Value::Decimal(snapshot.phi),
            SystemVar::Today => Value::string(today_string()),
            SystemVar::Now => Value::Decimal(now_seconds()),
        }
    }

    // ----- operators -----------------------------------------------------

    fn eval_binary(&mut self, unit: &Unit, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> EvalResult {
        match op {
            BinaryOp::And => {
                let l = self.eval_node(unit, lhs)?;
                if !to_boolean(&l) {
                    return Ok(Value::Boolean(false));
                }
                let r = self.eval_node(unit, rhs)?;
                Ok(Value::Boolean(to_boolean(&r)))
            }
            BinaryOp::Or => {
                let l = self.eval_node(unit, lhs)?;
                if to_boolean(&l) {
                    return Ok(Value::Boolean(true));
                }
                let r = self.eval_node(unit, rhs)?;
                Ok(Value::Boolean(to_boolean(&r)))
            }
            BinaryOp::In => {
                let l = self.eval_node(unit, lhs)?;
                self.eval_membership(unit, &l, rhs)
            }
            _ => {
                let l = self.eval_node(unit, lhs)?;
                let r = self.eval_node(unit, rhs)?;
                binary_op(op, &l, &r, self.op_settings())
            }
        }
    }

    fn eval_membership(&mut self, unit: &Unit, needle: &Value, rhs: NodeId) -> EvalResult {
        if let NodeKind::Range(RangeSpec::Dots { start, stop, step }) = unit.arena.kind(rhs) {
            let (start, stop, step) = (*start, *stop, *step);
            let range = self.resolve_dots(unit, start, stop, step, false)?;
            return Ok(Value::Boolean(range.contains(needle)?));
        }
        let haystack = self.eval_node(unit, rhs)?;
        let found = match &haystack {
            Value::Array(items) => {
                let items = items.borrow().clone();
                self.set_contains(&items, needle)?
            }
            Value::Set(items) => {
                let items = items.borrow().clone();
                self.set_contains(&items, needle)?
            }
            Value::Object(map) => {
                let key = render(needle, &RenderConfig::plain());
                map.borrow().contains_key(&key, self.settings.ignore_case())
            }
            Value::Str(s) => {
                let fragment = render(needle, &RenderConfig::plain());
                s.contains(&fragment)
            }
            other if other.numeric_priority().is_some() => {
                let range =
                    NumericRange::new(None, other, None, false, self.settings.rational())?;
                range.contains(needle)?
            }
            other => {
                return Err(EvalError::new(
                    ErrorKind::Conversion,
                    format!("`in` is not defined for {}", other.type_name()),
                ))
            }
        };
        Ok(Value::Boolean(found))
    }

    fn set_contains(&self, items: &[Value], needle: &Value) -> Result<bool, EvalError> {
        let flags = self.compare_flags(true);
        let ctx = self.math_context();
        for item in items {
            if compare(item, needle, flags, ctx)? == std::cmp::Ordering::Equal {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ----- member and index access ---------------------------------------

    /// Reading an absent object member yields `null`, so scripts can
    /// probe before assigning.
    fn member_get(&self, target: &Value, name: &str) -> EvalResult {
        match target {
            Value::Object(map) => Ok(map
                .borrow()
                .get(name, self.settings.ignore_case())
                .cloned()
                .unwrap_or(Value::Null)),
            Value::Null => Err(null_value("member access")),
            other => Err(EvalError::new(
                ErrorKind::Conversion,
                format!("{} value has no members", other.type_name()),
            )),
        }
    }

    fn index_get(&self, base: &Value, index: &Value) -> EvalResult {
        let ctx = self.math_context();
        match base {
            Value::Array(items) => {
                let items = items.borrow();
                let i = to_index(index, items.len(), ctx)?;
                Ok(items[i].clone())
            }
            Value::Set(items) => {
                let items = items.borrow();
                let i = to_index(index, items.len(), ctx)?;
                Ok(items[i].clone())
            }
            Value::Object(map) => {
                let key = match index {
                    Value::Str(s) => s.clone(),
                    other => render(other, &RenderConfig::plain()),
                };
                Ok(map
                    .borrow()
                    .get(&key, self.settings.ignore_case())
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = to_index(index, chars.len(), ctx)?;
                Ok(Value::string(chars[i].to_string()))
            }
            Value::Null => Err(null_value("index access")),
            other => Err(EvalError::new(
                ErrorKind::Conversion,
                format!("{} value is not indexable", other.type_name()),
            )),
        }
    }

    // ----- assignment ----------------------------------------------------

    fn eval_assign(
        &mut self,
        unit: &Unit,
        target: NodeId,
        op: Option<BinaryOp>,
        expr: NodeId,
    ) -> EvalResult {
        let rhs = self.eval_node(unit, expr)?;
        let new_value = match op {
            None => rhs,
            Some(op) => {
                let current = self.eval_node(unit, target)?;
                binary_op(op, &current, &rhs, self.op_settings())?
            }
        };
        self.store(unit, target, new_value.clone())?;
        Ok(new_value)
    }

    fn store(&mut self, unit: &Unit, target: NodeId, value: Value) -> Result<(), EvalError> {
        let ignore_case = self.settings.ignore_case();
        match unit.arena.kind(target) {
            NodeKind::Ident(name) => {
                let name = name.clone();
                self.env
                    .assign(&name, value, ignore_case)
                    .map_err(|msg| EvalError::new(ErrorKind::Conversion, msg))
            }
            NodeKind::GlobalIdent(name) => {
                let name = name.clone();
                self.env
                    .assign_global(&name, value, ignore_case)
                    .map_err(|msg| EvalError::new(ErrorKind::Conversion, msg))
            }
            NodeKind::Member { target, name } => {
                let name = name.clone();
                let target = *target;
                let base = self.eval_node(unit, target)?;
                match base {
                    Value::Object(map) => {
                        map.borrow_mut().insert(name, value, ignore_case);
                        Ok(())
                    }
                    Value::Null => Err(null_value("member assignment")),
                    other => Err(EvalError::new(
                        ErrorKind::Conversion,
                        format!("{} value has no members", other.type_name()),
                    )),
                }
            }
            NodeKind::Index { target, index } => {
                let (target, index) = (*target, *index);
                let base = self.eval_node(unit, target)?;
                let idx = self.eval_node(unit, index)?;
                self.index_set(&base, &idx, value)
            }
            _ => Err(EvalError::new(
                ErrorKind::Conversion,
                "assignment target must be a name, member or index",
            )),
        }
    }

    /// Array index assignment extends the array with nulls when the
    /// index is one or more past the end.
    fn index_set(&mut self, base: &Value, index: &Value, value: Value) -> Result<(), EvalError> {
        let ctx = self.math_context();
        match base {
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                let raw = to_integer(index, ctx)?;
                if !raw.is_negative() {
                    if let Some(i) = raw.to_usize() {
                        if i >= items.len() {
                            items.resize(i + 1, Value::Null);
                        }
                        items[i] = value;
                        return Ok(());
                    }
                }
                let i = to_index(index, items.len(), ctx)?;
                items[i] = value;
                Ok(())
            }
            Value::Object(map) => {
                let key = match index {
                    Value::Str(s) => s.clone(),
                    other => render(other, &RenderConfig::plain()),
                };
                map.borrow_mut().insert(key, value, self.settings.ignore_case());
                Ok(())
            }
            Value::Null => Err(null_value("index assignment")),
            other => Err(EvalError::new(
                ErrorKind::Conversion,
                format!("{} value is not indexable", other.type_name()),
            )),
        }
    }

    // ----- declarations and calls ----------------------------------------

    fn declare(&mut self, name: &str, binding: Binding) -> Result<(), EvalError> {
        let ignore_case = self.settings.ignore_case();
        // Declarations never stack: a second `var`/`const` for a name
        // already held by the current scope is an error.
        if self.env.current().get(name, ignore_case).is_some() {
            return Err(EvalError::new(
                ErrorKind::Conversion,
                format!("`{name}` is already defined in this scope"),
            ));
        }
        self.env.define_local(name, binding, ignore_case);
        Ok(())
    }

    fn eval_define(
        &mut self,
        unit: &Unit,
        name: &str,
        params: Vec<Param>,
        body: NodeId,
        span: Span,
    ) -> EvalResult {
        let ignore_case = self.settings.ignore_case();
        // Redefining a function replaces its body, but constants and
        // system names stay off limits.
        if let Some(kind) = self.env.global().get(name, ignore_case).map(|b| b.kind) {
            if kind.is_protected() || kind == BindingKind::Constant {
                return Err(EvalError::new(
                    ErrorKind::Conversion,
                    format!("`{name}` is not assignable"),
                ));
            }
        }
        let decl = Rc::new(FunctionDecl {
            name: name.to_owned(),
            params,
            body,
            arena: Rc::clone(&unit.arena),
            source: Rc::clone(&unit.source),
            decl_span: span,
        });
        self.env.define_global(
            name,
            Binding::normal(Value::Function(Rc::clone(&decl))),
            ignore_case,
        );
        self.acknowledge(&format!("defined {}", decl.signature()));
        Ok(Value::Function(decl))
    }

    fn eval_call(&mut self, unit: &Unit, callee: NodeId, args: &[NodeId]) -> EvalResult {
        // Builtin dispatch happens on a name that no scope defines.
        let callee_name = match unit.arena.kind(callee) {
            NodeKind::Ident(name) => Some(name.clone()),
            _ => None,
        };

        self.param_eval_depth += 1;
        let mut arg_values = Vec::with_capacity(args.len());
        let mut arg_err = None;
        for arg in args {
            match self.eval_node(unit, *arg) {
                Ok(v) => arg_values.push(v),
                Err(e) => {
                    arg_err = Some(e);
                    break;
                }
            }
        }
        self.param_eval_depth -= 1;
        if let Some(e) = arg_err {
            return Err(e);
        }

        if let Some(name) = &callee_name {
            let defined = self.env.is_defined(name, self.settings.ignore_case());
            if !defined {
                if let Some(result) = call_builtin(name, &arg_values, &self.builtin_ctx()) {
                    return result;
                }
                return Err(undefined_name(name));
            }
        }

        self.param_eval_depth += 1;
        let callee_value = self.eval_node(unit, callee);
        self.param_eval_depth -= 1;
        match callee_value? {
            Value::Function(decl) => self.call_function(&decl, arg_values),
            other => Err(not_callable(other.type_name())),
        }
    }

    /// Push a function scope, bind parameters, run the body quietly,
    /// pop the scope on every exit path.
    fn call_function(&mut self, decl: &Rc<FunctionDecl>, args: Vec<Value>) -> EvalResult {
        let unit = Unit {
            arena: Rc::clone(&decl.arena),
            source: Rc::clone(&decl.source),
        };
        let ignore_case = self.settings.ignore_case();
        let depth = self.env.depth();
        self.env.push(ScopeKind::Function);
        self.quiet_depth += 1;

        let result = self.bind_params_and_run(&unit, decl, args, ignore_case);

        self.quiet_depth -= 1;
        self.env.truncate(depth);

        match result {
            Err(err) if err.is_control_flow() => match err.control_flow {
                Some(ControlSignal::Leave { label, value }) => {
                    let matches_function = match &label {
                        None => true,
                        Some(l) => label_matches(l, &decl.name, ignore_case),
                    };
                    if matches_function {
                        Ok(value.unwrap_or(Value::Null))
                    } else {
                        Err(leave_signal(label, value))
                    }
                }
                _ => Err(err),
            },
            other => other,
        }
    }

    fn bind_params_and_run(
        &mut self,
        unit: &Unit,
        decl: &FunctionDecl,
        mut args: Vec<Value>,
        ignore_case: bool,
    ) -> EvalResult {
        let mut arg_iter = args.drain(..);
        for param in &decl.params {
            if param.rest {
                let rest: Vec<Value> = arg_iter.by_ref().collect();
                self.env.define_local(
                    &param.name,
                    Binding::of_kind(Value::array(rest), BindingKind::Parameter),
                    ignore_case,
                );
                continue;
            }
            let value = match arg_iter.next() {
                Some(v) => v,
                // Defaults evaluate lazily, only for omitted arguments.
                None => match param.default {
                    Some(default) => self.eval_node(unit, default)?,
                    None => Value::Null,
                },
            };
            self.env.define_local(
                &param.name,
                Binding::of_kind(value, BindingKind::Parameter),
                ignore_case,
            );
        }
        drop(arg_iter);
        self.eval_node(unit, decl.body)
    }

    // ----- blocks, loops, case -------------------------------------------

    fn eval_scoped(&mut self, unit: &Unit, block: NodeId, kind: ScopeKind) -> EvalResult {
        let depth = self.env.depth();
        self.env.push(kind);
        let result = self.eval_node(unit, block);
        self.env.truncate(depth);
        result
    }

    fn eval_while(
        &mut self,
        unit: &Unit,
        label: Option<&str>,
        cond: NodeId,
        body: NodeId,
    ) -> EvalResult {
        let ignore_case = self.settings.ignore_case();
        let depth = self.env.depth();
        self.env.push(ScopeKind::While);
        let mut last = Value::Null;
        let outcome = loop {
            let c = match self.eval_node(unit, cond) {
                Ok(v) => v,
                Err(e) => break Err(e),
            };
            if !to_boolean(&c) {
                break Ok(last);
            }
            // Fresh locals each iteration.
            self.env.current_mut().clear_plain();
            match self.eval_node(unit, body) {
                Ok(v) => last = v,
                Err(err) => match loop_signal(err, label, ignore_case) {
                    LoopStep::Continue => {}
                    LoopStep::Break(value) => break Ok(value.unwrap_or(last)),
                    LoopStep::Propagate(e) => break Err(e),
                },
            }
        };
        self.env.truncate(depth);
        outcome
    }

    fn eval_loop(
        &mut self,
        unit: &Unit,
        label: Option<&str>,
        var: Option<&str>,
        spec: &RangeSpec,
        within: bool,
        body: NodeId,
    ) -> EvalResult {
        let iterable = self.resolve_iterable(unit, spec, within)?;
        let ignore_case = self.settings.ignore_case();
        let ctx = self.math_context();
        let depth = self.env.depth();
        self.env.push(ScopeKind::Loop);

        let mut last = Value::Null;
        let outcome = 'done: {
            match iterable {
                Iterable::Range(range) => {
                    let count = range.count();
                    let mut i = BigInt::zero();
                    while i < count {
                        let element = range.nth(&i, ctx);
                        match self.run_iteration(unit, var, element, body, ignore_case) {
                            Ok(v) => last = v,
                            Err(err) => match loop_signal(err, label, ignore_case) {
                                LoopStep::Continue => {}
                                LoopStep::Break(value) => break 'done Ok(value.unwrap_or(last)),
                                LoopStep::Propagate(e) => break 'done Err(e),
                            },
                        }
                        i += 1;
                    }
                }
                Iterable::Values(values) => {
                    for element in values {
                        match self.run_iteration(unit, var, element, body, ignore_case) {
                            Ok(v) => last = v,
                            Err(err) => match loop_signal(err, label, ignore_case) {
                                LoopStep::Continue => {}
                                LoopStep::Break(value) => break 'done Ok(value.unwrap_or(last)),
                                LoopStep::Propagate(e) => break 'done Err(e),
                            },
                        }
                    }
                }
            }
            Ok(last)
        };
        self.env.truncate(depth);
        outcome
    }

    fn run_iteration(
        &mut self,
        unit: &Unit,
        var: Option<&str>,
        element: Value,
        body: NodeId,
        ignore_case: bool,
    ) -> EvalResult {
        self.env.current_mut().clear_plain();
        if let Some(var) = var {
            self.env.define_local(var, Binding::normal(element), ignore_case);
        }
        self.eval_node(unit, body)
    }

    fn eval_case(&mut self, unit: &Unit, value: NodeId, blocks: &[CaseBlock]) -> EvalResult {
        let subject = self.eval_node(unit, value)?;
        let default_index = blocks
            .iter()
            .position(|b| b.selectors.iter().any(|s| matches!(s, CaseSelector::Default)));

        let mut current = self.find_match(unit, &subject, blocks, 0)?;
        let mut used_default = false;
        if current.is_none() {
            current = default_index;
            used_default = true;
        }

        let mut last = Value::Null;
        while let Some(index) = current {
            let result = self.run_case_block(unit, blocks[index].body);
            match result {
                Ok(v) => return Ok(v),
                Err(err) if matches!(err.control_flow, Some(ControlSignal::Next)) => {
                    // Fall through: resume selector matching at the
                    // next block, the one after `default` included.
                    let resume = index + 1;
                    last = Value::Null;
                    current = self.find_match(unit, &subject, blocks, resume)?;
                    if current.is_none() && !used_default {
                        // Only the very first pass may fall back to
                        // the default block.
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(last)
    }

    fn run_case_block(&mut self, unit: &Unit, body: NodeId) -> EvalResult {
        self.quiet_depth += 1;
        let result = self.eval_scoped(unit, body, ScopeKind::Case);
        self.quiet_depth -= 1;
        result
    }

    fn find_match(
        &mut self,
        unit: &Unit,
        subject: &Value,
        blocks: &[CaseBlock],
        from: usize,
    ) -> Result<Option<usize>, EvalError> {
        for (offset, block) in blocks[from.min(blocks.len())..].iter().enumerate() {
            for selector in &block.selectors {
                if self.selector_matches(unit, subject, selector)? {
                    return Ok(Some(from + offset));
                }
            }
        }
        Ok(None)
    }

    fn selector_matches(
        &mut self,
        unit: &Unit,
        subject: &Value,
        selector: &CaseSelector,
    ) -> Result<bool, EvalError> {
        match selector {
            CaseSelector::Default => Ok(false),
            CaseSelector::Value(expr) => {
                let candidate = self.eval_node(unit, *expr)?;
                Ok(compare(
                    subject,
                    &candidate,
                    self.compare_flags(true),
                    self.math_context(),
                )? == std::cmp::Ordering::Equal)
            }
            CaseSelector::Range { start, stop, step } => {
                let range = self.resolve_dots(unit, *start, *stop, *step, false)?;
                range.contains(subject)
            }
            CaseSelector::Regex { pattern, flags } => {
                let text = render(subject, &RenderConfig::plain());
                let re = build_regex(pattern, *flags)?;
                Ok(re.is_match(&text))
            }
            CaseSelector::Compare { first, second } => {
                let lhs = self.compare_test(unit, subject, first.0, first.1)?;
                match second {
                    None => Ok(lhs),
                    Some((Connective::And, op, expr)) => {
                        if !lhs {
                            return Ok(false);
                        }
                        self.compare_test(unit, subject, *op, *expr)
                    }
                    Some((Connective::Or, op, expr)) => {
                        if lhs {
                            return Ok(true);
                        }
                        self.compare_test(unit, subject, *op, *expr)
                    }
                    Some((Connective::Xor, op, expr)) => {
                        let rhs = self.compare_test(unit, subject, *op, *expr)?;
                        Ok(lhs != rhs)
                    }
                }
            }
        }
    }

    fn compare_test(
        &mut self,
        unit: &Unit,
        subject: &Value,
        op: CompareOp,
        expr: NodeId,
    ) -> Result<bool, EvalError> {
        let operand = self.eval_node(unit, expr)?;
        let equality = matches!(op, CompareOp::Equal | CompareOp::NotEqual);
        let ord = compare(subject, &operand, self.compare_flags(equality), self.math_context())?;
        Ok(match op {
            CompareOp::Equal => ord == std::cmp::Ordering::Equal,
            CompareOp::NotEqual => ord != std::cmp::Ordering::Equal,
            CompareOp::Less => ord == std::cmp::Ordering::Less,
            CompareOp::LessEqual => ord != std::cmp::Ordering::Greater,
            CompareOp::Greater => ord == std::cmp::Ordering::Greater,
            CompareOp::GreaterEqual => ord != std::cmp::Ordering::Less,
        })
    }

    // ----- ranges and reductions -----------------------------------------

    fn resolve_dots(
        &mut self,
        unit: &Unit,
        start: Option<NodeId>,
        stop: NodeId,
        step: Option<NodeId>,
        within: bool,
    ) -> Result<NumericRange, EvalError> {
        let start_v = match start {
            Some(id) => Some(self.eval_node(unit, id)?),
            None => None,
        };
        let stop_v = self.eval_node(unit, stop)?;
        let step_v = match step {
            Some(id) => Some(self.eval_node(unit, id)?),
            None => None,
        };
        NumericRange::new(
            start_v.as_ref(),
            &stop_v,
            step_v.as_ref(),
            within,
            self.settings.rational(),
        )
    }

    fn resolve_iterable(
        &mut self,
        unit: &Unit,
        spec: &RangeSpec,
        within: bool,
    ) -> Result<Iterable, EvalError> {
        match spec {
            RangeSpec::Dots { start, stop, step } => {
                if within && start.is_some() {
                    return Err(EvalError::new(
                        ErrorKind::Conversion,
                        "`within` does not take an explicit starting bound",
                    ));
                }
                Ok(Iterable::Range(self.resolve_dots(
                    unit, *start, *stop, *step, within,
                )?))
            }
            RangeSpec::Exprs(items) if items.len() == 1 => {
                let value = self.eval_node(unit, items[0])?;
                match &value {
                    Value::Array(a) => Ok(Iterable::Values(a.borrow().clone())),
                    Value::Set(s) => Ok(Iterable::Values(s.borrow().clone())),
                    Value::Object(o) => {
                        // Objects enumerate their values.
                        Ok(Iterable::Values(o.borrow().values().cloned().collect()))
                    }
                    Value::Str(s) => Ok(Iterable::Values(
                        s.chars().map(|c| Value::string(c.to_string())).collect(),
                    )),
                    other => Ok(Iterable::Range(NumericRange::new(
                        None,
                        other,
                        None,
                        within,
                        self.settings.rational(),
                    )?)),
                }
            }
            RangeSpec::Exprs(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_node(unit, *item)?);
                }
                Ok(Iterable::Values(values))
            }
        }
    }

    fn eval_reduction(&mut self, unit: &Unit, op: ReductionOp, spec: &RangeSpec) -> EvalResult {
        let iterable = self.resolve_iterable(unit, spec, false)?;
        let opts = self.op_settings();
        let ctx = self.math_context();
        match iterable {
            Iterable::Range(range) => match op {
                ReductionOp::SumOf => Ok(range.sum(ctx)),
                ReductionOp::ProductOf => range.product(ctx),
                ReductionOp::LengthOf => Ok(Value::Integer(range.count())),
                ReductionOp::ArrayOf => {
                    let count = range.count();
                    let mut out = Vec::new();
                    let mut i = BigInt::zero();
                    while i < count {
                        out.push(range.nth(&i, ctx));
                        i += 1;
                    }
                    Ok(Value::array(out))
                }
            },
            Iterable::Values(values) => match op {
                ReductionOp::SumOf => {
                    let mut acc = Value::integer(0);
                    for v in &values {
                        acc = binary_op(BinaryOp::Add, &acc, v, opts)?;
                    }
                    Ok(acc)
                }
                ReductionOp::ProductOf => {
                    let mut acc = Value::integer(1);
                    for v in &values {
                        acc = binary_op(BinaryOp::Multiply, &acc, v, opts)?;
                    }
                    Ok(acc)
                }
                ReductionOp::LengthOf => Ok(Value::integer(values.len() as u64)),
                ReductionOp::ArrayOf => Ok(Value::array(values)),
            },
        }
    }

    // ----- interpolation --------------------------------------------------

    /// Re-scan a double-quoted string for `$name`, `$$global`, `$n`
    /// and `${expr}` and splice in rendered values. `${...}` contents
    /// go through the full parser, so nesting recurses naturally.
    fn interpolate(&mut self, raw: &str) -> EvalResult {
        let mut out = String::with_capacity(raw.len());
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '$' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            // `$$name`: global lookup.
            if i + 1 < chars.len() && chars[i + 1] == '$' {
                let (name, consumed) = take_identifier(&chars[i + 2..]);
                if name.is_empty() {
                    out.push('$');
                    i += 1;
                    continue;
                }
                let binding = self
                    .env
                    .global()
                    .get(&name, self.settings.ignore_case())
                    .cloned()
                    .ok_or_else(|| undefined_name(&name))?;
                let value = self.binding_value(binding)?;
                out.push_str(&render(&value, &RenderConfig::plain()));
                i += 2 + consumed;
                continue;
            }
            // `${expr}`: quiet sub-evaluation of the parsed text.
            if i + 1 < chars.len() && chars[i + 1] == '{' {
                let Some(end) = matching_brace(&chars, i + 1) else {
                    return Err(EvalError::new(
                        ErrorKind::Conversion,
                        "unterminated ${...} in string interpolation",
                    ));
                };
                let expr: String = chars[i + 2..end].iter().collect();
                let value = self.eval(&expr).map_err(|d| {
                    EvalError::new(ErrorKind::from_category(d.category), d.message)
                })?;
                out.push_str(&render(&value, &RenderConfig::plain()));
                i = end + 1;
                continue;
            }
            // `$n`: positional argument.
            if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                let mut j = i + 1;
                let mut n: usize = 0;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    n = n * 10 + (chars[j] as usize - '0' as usize);
                    j += 1;
                }
                let value = if n >= 1 {
                    self.positionals.get(n - 1).cloned().unwrap_or(Value::Null)
                } else {
                    Value::array(self.positionals.clone())
                };
                out.push_str(&render(&value, &RenderConfig::plain()));
                i = j;
                continue;
            }
            // `$name`: scope lookup.
            let (name, consumed) = take_identifier(&chars[i + 1..]);
            if name.is_empty() {
                out.push('$');
                i += 1;
                continue;
            }
            let binding = self
                .env
                .lookup(&name, self.settings.ignore_case())
                .cloned()
                .ok_or_else(|| undefined_name(&name))?;
            let value = self.binding_value(binding)?;
            out.push_str(&render(&value, &RenderConfig::plain()));
            i += 1 + consumed;
        }
        Ok(Value::string(out))
    }

    // ----- directives ----------------------------------------------------

    fn eval_directive(&mut self, unit: &Unit, directive: &Directive) -> EvalResult {
        match directive {
            Directive::Mode {
                setting,
                value,
                block,
            } => self.eval_mode(unit, *setting, value, *block),
            Directive::Precision { value, block } => self.eval_precision(unit, value, *block),
            Directive::TrigUnits(units) => {
                self.settings.set_trig_units(*units);
                let name = match units {
                    TrigUnits::Degrees => "degrees",
                    TrigUnits::Radians => "radians",
                    TrigUnits::Grads => "grads",
                };
                self.acknowledge(&format!("trig units set to {name}"));
                Ok(Value::Null)
            }
            Directive::Clear(names) => {
                if names.is_empty() {
                    self.env.global_mut().clear_plain();
                    self.acknowledge("cleared all variables");
                } else {
                    let ignore_case = self.settings.ignore_case();
                    for name in names {
                        self.env.global_mut().remove(name, ignore_case);
                    }
                    self.acknowledge(&format!("cleared {}", names.join(", ")));
                }
                Ok(Value::Null)
            }
            Directive::Save(path) => self.eval_save(path),
            Directive::Open(path) => {
                let text = self.host.read_text(path)?;
                // Re-feed the saved file through normal evaluation,
                // keeping the inner category (a stale `:require` still
                // reports a version mismatch).
                self.eval(&text).map_err(|d| {
                    EvalError::new(
                        ErrorKind::from_category(d.category),
                        format!("{path}: {}", d.message),
                    )
                })?;
                self.acknowledge(&format!("loaded {path}"));
                Ok(Value::Null)
            }
            Directive::Assert { cond, message } => {
                let span = unit.arena.span(*cond);
                let value = self.eval_node(unit, *cond)?;
                if to_boolean(&value) {
                    return Ok(Value::Boolean(true));
                }
                let text = match message {
                    Some(expr) => {
                        let v = self.eval_node(unit, *expr)?;
                        render(&v, &RenderConfig::plain())
                    }
                    None => snippet(&unit.source, span).to_owned(),
                };
                Err(assertion_failed(&text))
            }
            Directive::Require(version) => {
                if version_at_least(VERSION, version) {
                    Ok(Value::Null)
                } else {
                    Err(EvalError::new(
                        ErrorKind::VersionMismatch,
                        format!("requires version {version}, this is {VERSION}"),
                    ))
                }
            }
            Directive::Echo(expr) => {
                let text = match expr {
                    Some(id) => {
                        let v = self.eval_node(unit, *id)?;
                        render(&v, &RenderConfig::plain())
                    }
                    None => String::new(),
                };
                self.displayer.message(Channel::Output, &text);
                Ok(Value::Null)
            }
            Directive::Quit => {
                self.quit = true;
                Ok(Value::Null)
            }
        }
    }

    fn eval_mode(
        &mut self,
        unit: &Unit,
        setting: ModeSetting,
        value: &ModeValue,
        block: Option<NodeId>,
    ) -> EvalResult {
        let new_value = match value {
            ModeValue::Pop => {
                let restored = self.settings.pop_mode(setting);
                self.acknowledge(&format!("{} reset to {restored}", setting.name()));
                return Ok(Value::Boolean(restored));
            }
            ModeValue::Initial => {
                let restored = self.settings.reset_mode(setting);
                self.acknowledge(&format!("{} reset to {restored}", setting.name()));
                return Ok(Value::Boolean(restored));
            }
            ModeValue::Expr(expr) => {
                let v = self.eval_node(unit, *expr)?;
                to_boolean(&v)
            }
        };
        debug!(setting = setting.name(), value = new_value, "mode change");
        self.settings.push_mode(setting, new_value);
        match block {
            None => {
                self.acknowledge(&format!("{} set to {new_value}", setting.name()));
                Ok(Value::Boolean(new_value))
            }
            Some(block) => {
                // The pop happens on success, error and signal alike.
                let result = self.eval_scoped(unit, block, ScopeKind::Block);
                self.settings.pop_mode(setting);
                result
            }
        }
    }

    fn eval_precision(
        &mut self,
        unit: &Unit,
        value: &ModeValue,
        block: Option<NodeId>,
    ) -> EvalResult {
        let digits = match value {
            ModeValue::Pop => {
                let restored = self.settings.pop_precision();
                self.constants.request(restored);
                self.acknowledge(&format!("precision reset to {restored}"));
                return Ok(Value::integer(restored));
            }
            ModeValue::Initial => {
                let restored = self.settings.reset_precision();
                self.constants.request(restored);
                self.acknowledge(&format!("precision reset to {restored}"));
                return Ok(Value::integer(restored));
            }
            ModeValue::Expr(expr) => {
                let v = self.eval_node(unit, *expr)?;
                let n = to_integer(&v, self.math_context())?;
                n.to_u64().ok_or_else(|| {
                    EvalError::new(ErrorKind::Arithmetic, "precision out of range")
                })?
            }
        };
        self.settings.push_precision(digits);
        self.constants.request(digits);
        match block {
            None => {
                self.acknowledge(&format!("precision set to {digits}"));
                Ok(Value::integer(digits))
            }
            Some(block) => {
                let result = self.eval_scoped(unit, block, ScopeKind::Block);
                let restored = self.settings.pop_precision();
                self.constants.request(restored);
                result
            }
        }
    }

    fn eval_save(&mut self, path: &str) -> EvalResult {
        let mut text = format!(":require {VERSION}\n");
        let config = RenderConfig {
            quote_strings: true,
            separators: false,
            indent: None,
        };
        let mut count = 0usize;
        for (name, binding) in self.env.global().iter() {
            match binding.kind {
                BindingKind::Normal | BindingKind::Constant | BindingKind::EnumMember => {}
                _ => continue,
            }
            match &binding.value {
                Value::Function(decl) => {
                    text.push_str(decl.declaration_text());
                    text.push('\n');
                }
                value => {
                    text.push_str(&format!("{name} = {}\n", render(value, &config)));
                }
            }
            count += 1;
        }
        self.host.write_text(path, &text)?;
        self.acknowledge(&format!("saved {count} variable(s) to {path}"));
        Ok(Value::Null)
    }

    fn acknowledge(&self, message: &str) {
        if self.quiet_depth == 0
            && !self.settings.mode(ModeSetting::SilenceDirectives)
            && !self.settings.mode(ModeSetting::Quiet)
        {
            self.displayer.action(message);
        }
    }
}

enum Iterable {
    Range(NumericRange),
    Values(Vec<Value>),
}

/// What a loop boundary does with an error from its body.
enum LoopStep {
    Continue,
    Break(Option<Value>),
    Propagate(EvalError),
}

fn loop_signal(err: EvalError, label: Option<&str>, ignore_case: bool) -> LoopStep {
    match err.control_flow {
        Some(ControlSignal::Next) => LoopStep::Continue,
        Some(ControlSignal::Leave {
            label: signal_label,
            value,
        }) => {
            let matched = match (&signal_label, label) {
                (None, None) => true,
                (Some(s), Some(l)) => label_matches(s, l, ignore_case),
                _ => false,
            };
            if matched {
                LoopStep::Break(value)
            } else {
                LoopStep::Propagate(leave_signal(signal_label, value))
            }
        }
        None => LoopStep::Propagate(err),
    }
}

fn label_matches(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// The statement's source text, single-line and trimmed, for echoes.
fn snippet(source: &str, span: Span) -> &str {
    let start = (span.start as usize).min(source.len());
    let end = (span.end as usize).min(source.len());
    source.get(start..end).unwrap_or("").trim()
}

fn take_identifier(chars: &[char]) -> (String, usize) {
    let mut name = String::new();
    for &c in chars {
        let ok = if name.is_empty() {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        name.push(c);
    }
    let len = name.chars().count();
    (name, len)
}

/// Index of the `}` matching the `{` at `open`, honoring nesting.
fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn build_regex(pattern: &str, flags: RegexFlags) -> Result<regex::Regex, EvalError> {
    let body = if flags.literal {
        regex::escape(pattern)
    } else {
        pattern.to_owned()
    };
    let mut inline = String::new();
    if flags.case_insensitive || flags.unicode_case {
        inline.push('i');
    }
    if flags.dot_all {
        inline.push('s');
    }
    if flags.multiline || flags.unix_lines {
        inline.push('m');
    }
    // Whole-string match, like the original selector semantics.
    let full = if inline.is_empty() {
        format!("^(?:{body})$")
    } else {
        format!("(?{inline})^(?:{body})$")
    };
    regex::Regex::new(&full)
        .map_err(|e| EvalError::new(ErrorKind::Conversion, format!("bad pattern: {e}")))
}

/// `current >= required` comparing dotted numeric components.
fn version_at_least(current: &str, required: &str) -> bool {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let cur = parse(current);
    let req = parse(required);
    for i in 0..cur.len().max(req.len()) {
        let c = cur.get(i).copied().unwrap_or(0);
        let r = req.get(i).copied().unwrap_or(0);
        if c != r {
            return c > r;
        }
    }
    true
}

fn today_string() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let days = (secs / 86_400) as i64;
    let (year, month, day) = civil_from_days(days);
    format!("{year:04}-{month:02}-{day:02}")
}

fn now_seconds() -> bigdecimal::BigDecimal {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    bigdecimal::BigDecimal::new(BigInt::from(nanos), 9)
}

/// Days-since-epoch to calendar date (proleptic Gregorian).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use num_rational::BigRational;
    use pretty_assertions::assert_eq;
    use tally_diagnostic::Category;

    fn session() -> Session {
        Session::new(Displayer::buffer(), Box::new(MemoryHost::new()))
    }

    fn run(s: &mut Session, source: &str) -> Value {
        match s.eval(source) {
            Ok(v) => v,
            Err(e) => panic!("eval of {source:?} failed: {e}"),
        }
    }

    fn text(v: &Value) -> String {
        render(v, &RenderConfig::plain())
    }

    #[test]
    fn arithmetic_and_variables() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "x = 3\ny = 4\nx * x + y * y")), "25");
        assert_eq!(text(&run(&mut s, "x")), "3");
    }

    #[test]
    fn rational_mode_keeps_thirds_exact() {
        let mut s = session();
        run(&mut s, ":rational on");
        let v = run(&mut s, "1/3 + 0.5");
        let Value::Fraction(f) = v else {
            panic!("expected a fraction, got {v:?}");
        };
        assert_eq!(f, BigRational::new(5.into(), 6.into()));
    }

    #[test]
    fn mode_block_restores_after_error() {
        let mut s = session();
        assert!(s.eval(":rational on { 1/0 }").is_err());
        assert!(!s.settings().mode(ModeSetting::Rational));
    }

    #[test]
    fn precision_block_restores() {
        let mut s = session();
        run(&mut s, ":precision 10 { 1 }");
        assert_eq!(s.settings().precision(), crate::settings::DEFAULT_PRECISION);
    }

    #[test]
    fn sum_shortcut_matches_traversal() {
        let mut s = session();
        let direct = run(&mut s, "sumof 1..100");
        let looped = run(&mut s, "x = 0\nloop i in 1..100 { x += i }\nx");
        assert_eq!(text(&direct), "5050");
        assert_eq!(text(&looped), "5050");
    }

    #[test]
    fn within_starts_at_zero() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "a = 0\nloop i within 3 { a += i }\na")), "3");
        assert_eq!(text(&run(&mut s, "b = 0\nloop i in 3 { b += i }\nb")), "6");
    }

    #[test]
    fn while_loop_counts() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "i = 0\nwhile i < 5 { i += 1 }\ni")), "5");
    }

    #[test]
    fn unlabeled_leave_stops_innermost_loop() {
        let mut s = session();
        let v = run(
            &mut s,
            "n = 0\nloop i in 1..3 { loop j in 1..10 { leave 0 }\nn += 1 }\nn",
        );
        assert_eq!(text(&v), "3");
    }

    #[test]
    fn labeled_leave_crosses_inner_loops() {
        let mut s = session();
        let v = run(
            &mut s,
            "outer: loop i in 1..3 { loop j in 1..3 { leave outer 99 } }",
        );
        assert_eq!(text(&v), "99");
    }

    #[test]
    fn leave_returns_from_function() {
        let mut s = session();
        run(&mut s, "define f(x) { if x > 1 { leave x * 2 }\n0 }");
        assert_eq!(text(&run(&mut s, "f(5)")), "10");
        assert_eq!(text(&run(&mut s, "f(0)")), "0");
    }

    #[test]
    fn zero_param_function_auto_calls() {
        let mut s = session();
        run(&mut s, "define answer() = 42");
        assert_eq!(text(&run(&mut s, "answer")), "42");
        assert_eq!(text(&run(&mut s, "answer + 1")), "43");
    }

    #[test]
    fn defaults_and_rest_params() {
        let mut s = session();
        run(&mut s, "define g(a, b = 2, ...rest) = a + b + lengthof rest");
        assert_eq!(text(&run(&mut s, "g(1)")), "3");
        assert_eq!(text(&run(&mut s, "g(1, 5, 7, 8, 9)")), "9");
    }

    #[test]
    fn case_matches_ranges_and_regex() {
        let mut s = session();
        let v = run(
            &mut s,
            "case 7 of { 1..5: 'low'\n6..10: 'mid'\ndefault: 'other' }",
        );
        assert_eq!(text(&v), "mid");
        let v = run(
            &mut s,
            "case 'Apple' of { matches 'a.*' i: 'fruit'\ndefault: 'other' }",
        );
        assert_eq!(text(&v), "fruit");
    }

    #[test]
    fn case_next_falls_through_to_later_match() {
        let mut s = session();
        let v = run(
            &mut s,
            "case 5 of { 1..10: { next }\n5: 'exact'\ndefault: 'none' }",
        );
        assert_eq!(text(&v), "exact");
    }

    #[test]
    fn case_without_match_uses_default() {
        let mut s = session();
        let v = run(&mut s, "case 42 of { 1: 'one'\ndefault: 'other' }");
        assert_eq!(text(&v), "other");
    }

    #[test]
    fn empty_collection_adopts_either_side() {
        let mut s = session();
        let v = run(&mut s, "{} + [1, 2]");
        assert!(matches!(v, Value::Array(_)));
        let v = run(&mut s, "{} + { a: 1 }");
        let Value::Object(o) = v else {
            panic!("expected object");
        };
        assert!(o.borrow().contains_key("a", false));
    }

    #[test]
    fn object_merge_right_side_wins() {
        let mut s = session();
        let v = run(&mut s, "{ a: 1, b: 2 } + { b: 9 }");
        assert_eq!(text(&v), "{ a: 1, b: 9 }");
    }

    #[test]
    fn membership_forms() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "5 in 1..10")), "true");
        assert_eq!(text(&run(&mut s, "11 in 1..10")), "false");
        assert_eq!(text(&run(&mut s, "'ell' in 'hello'")), "true");
        assert_eq!(text(&run(&mut s, "'a' in { a: 1 }")), "true");
        assert_eq!(text(&run(&mut s, "2 in [1, 2, 3]")), "true");
    }

    #[test]
    fn index_assignment_extends_with_nulls() {
        let mut s = session();
        let v = run(&mut s, "a = [1]\na[3] = 9\na");
        let Value::Array(items) = v else {
            panic!("expected array");
        };
        let items = items.borrow();
        assert_eq!(items.len(), 4);
        assert!(items[1].is_null());
        assert!(items[2].is_null());
    }

    #[test]
    fn missing_member_reads_null() {
        let mut s = session();
        assert!(run(&mut s, "o = { a: 1 }\no.b").is_null());
    }

    #[test]
    fn interpolation_resolves_names_and_expressions() {
        let mut s = session();
        run(&mut s, "name = 'world'");
        assert_eq!(text(&run(&mut s, "\"hello $name\"")), "hello world");
        assert_eq!(text(&run(&mut s, "\"sum is ${2 + 3}\"")), "sum is 5");
    }

    #[test]
    fn const_rejects_reassignment() {
        let mut s = session();
        run(&mut s, "const k = 1");
        assert!(s.eval("k = 2").is_err());
    }

    #[test]
    fn global_sigil_respects_protected_bindings() {
        let mut s = session();
        assert!(s.eval("$pi = 3").is_err());
        assert!(s.eval("const k = 1\n$k = 2").is_err());
        assert_eq!(text(&run(&mut s, "k")), "1");
        run(&mut s, "$g = 7");
        assert_eq!(text(&run(&mut s, "g")), "7");
    }

    #[test]
    fn interpolation_computes_system_values() {
        let mut s = session();
        assert!(text(&run(&mut s, "\"$pi\"")).starts_with("3.14"));
        assert!(text(&run(&mut s, "\"$$e\"")).starts_with("2.71"));
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_rejected() {
        let mut s = session();
        run(&mut s, "var x = 1");
        assert!(s.eval("var x = 2").is_err());
        assert_eq!(text(&run(&mut s, "x")), "1");
        // A shadow in an inner scope is fine.
        assert_eq!(text(&run(&mut s, "if true { var x = 9\nx }")), "9");
    }

    #[test]
    fn define_cannot_replace_a_constant() {
        let mut s = session();
        run(&mut s, "const k = 1");
        assert!(s.eval("define k() = 2").is_err());
        assert_eq!(text(&run(&mut s, "k")), "1");
    }

    #[test]
    fn define_still_replaces_a_previous_body() {
        let mut s = session();
        run(&mut s, "define f(x) = x + 1");
        run(&mut s, "define f(x) = x + 2");
        assert_eq!(text(&run(&mut s, "f(1)")), "3");
    }

    #[test]
    fn opening_a_stale_file_reports_version_mismatch() {
        let host = MemoryHost::new();
        host.preload("old.tally", ":require 999.0\nx = 1\n");
        let mut s = Session::new(Displayer::buffer(), Box::new(host));
        let err = s.eval(":open old.tally").unwrap_err();
        assert_eq!(err.category, Category::VersionMismatch);
    }

    #[test]
    fn enum_members_number_from_zero() {
        let mut s = session();
        run(&mut s, "enum red, green, blue");
        assert_eq!(text(&run(&mut s, "green")), "1");
        assert_eq!(text(&run(&mut s, "blue")), "2");
    }

    #[test]
    fn assert_failure_reports_assertion_category() {
        let mut s = session();
        let err = s.eval(":assert 1 == 2, 'boom'").unwrap_err();
        assert_eq!(err.category, Category::Assertion);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn save_clear_open_round_trips() {
        let mut s = session();
        run(&mut s, "a = 5\nb = 'text'");
        run(&mut s, ":save vars.tally");
        run(&mut s, ":clear");
        assert!(s.eval("a").is_err());
        run(&mut s, ":open vars.tally");
        assert_eq!(text(&run(&mut s, "a")), "5");
        assert_eq!(text(&run(&mut s, "b")), "text");
    }

    #[test]
    fn saved_functions_survive_reload() {
        let mut s = session();
        run(&mut s, "define double(x) = x * 2");
        run(&mut s, ":save fns.tally");
        run(&mut s, ":clear");
        run(&mut s, ":open fns.tally");
        assert_eq!(text(&run(&mut s, "double(21)")), "42");
    }

    #[test]
    fn quit_directive_stops_the_unit() {
        let mut s = session();
        let outcome = s.process("10\n:quit\n20").unwrap();
        assert!(outcome.quit);
        let shown = s.displayer().captured_output();
        assert!(shown.contains("10"));
        assert!(!shown.contains("20"));
    }

    #[test]
    fn require_newer_version_fails() {
        let mut s = session();
        let err = s.eval(":require 999.0").unwrap_err();
        assert_eq!(err.category, Category::VersionMismatch);
    }

    #[test]
    fn ignore_case_mode_unifies_names() {
        let mut s = session();
        run(&mut s, "Total = 10");
        run(&mut s, ":ignorecase on");
        assert_eq!(text(&run(&mut s, "total + 1")), "11");
    }

    #[test]
    fn spaceship_and_ternary() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "(3 <=> 5) < 0 ? 'up' : 'down'")), "up");
    }

    #[test]
    fn positional_arguments_render_in_strings() {
        let mut s = session();
        s.set_positionals(vec![Value::string("first"), Value::integer(2)]);
        assert_eq!(text(&run(&mut s, "$1")), "first");
        assert_eq!(text(&run(&mut s, "\"got $2\"")), "got 2");
        assert!(run(&mut s, "$9").is_null());
        assert_eq!(text(&run(&mut s, "length($0)")), "2");
    }

    #[test]
    fn prefix_increment_updates_in_place() {
        let mut s = session();
        assert_eq!(text(&run(&mut s, "n = 5\n++n")), "6");
        assert_eq!(text(&run(&mut s, "--n\nn")), "5");
        assert_eq!(text(&run(&mut s, "a = [1, 2]\n++a[1]\na")), "[ 1, 3 ]");
    }

    #[test]
    fn version_comparison_is_componentwise() {
        assert!(version_at_least("1.10", "1.9"));
        assert!(version_at_least("2.0", "2.0"));
        assert!(!version_at_least("1.2", "1.10"));
    }

    #[test]
    fn civil_dates_line_up() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
    }
}
