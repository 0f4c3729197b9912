//! Tree-walking evaluator.
//!
//! One [`Interpreter`] runs every unit parsed into one [`AstContext`], keeping
//! its globals and the cumulative resolution map between calls to
//! [`Interpreter::evaluate`].

pub mod environment;
mod error;
pub mod value;

#[cfg(test)]
mod test;

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

pub use environment::{EnvId, EnvRegistry, Environment};
pub use error::RuntimeError;
pub use value::{Callable, CallableKind, Value};

use crate::config::Options;
use crate::diagnostics::{DiagnosticSink, OutputSink};
use crate::parser::ast::*;
use crate::parser::{Token, TokenType, TokenValue};
use crate::resolver::{Resolution, Resolver};
use crate::stack::ensure_sufficient_stack;

/// How a statement finished.
#[derive(Debug)]
pub enum FlowControl {
    NextStatement,
    Return(Value),
}

type Exec = Result<FlowControl, RuntimeError>;
type Eval = Result<Value, RuntimeError>;

pub struct Interpreter<'s> {
    envs: EnvRegistry,
    /// Active environments, innermost last; `stack[0]` is always the globals.
    stack: Vec<EnvId>,
    /// Callees and arguments of calls still being set up.
    pending: Vec<Value>,
    resolution: Resolution,
    calls_since_collect: usize,
    options: Options,
    diag: &'s dyn DiagnosticSink,
    out: &'s dyn OutputSink,
}

fn clock(_: &[Value]) -> Value {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    Value::Number(now)
}

impl<'s> Interpreter<'s> {
    pub fn new(options: Options, diag: &'s dyn DiagnosticSink, out: &'s dyn OutputSink) -> Self {
        let mut interpreter = Self {
            envs: EnvRegistry::new(),
            stack: vec![EnvId::GLOBAL],
            pending: vec![],
            resolution: Resolution::default(),
            calls_since_collect: 0,
            options,
            diag,
            out,
        };
        interpreter.define_native("clock", 0, clock);
        interpreter
    }

    fn define_native(&mut self, name: &str, arity: usize, func: value::NativeFn) {
        let native = Callable {
            name: name.to_string(),
            arity,
            closure: EnvId::GLOBAL,
            kind: CallableKind::Native(func),
        };
        if let Some(globals) = self.envs.get_mut(EnvId::GLOBAL) {
            globals.define(name, Value::Callable(Rc::new(native)));
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Looks up a global binding.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.envs.get(EnvId::GLOBAL)?.get(name)
    }

    /// Registered environments, globals included.
    pub fn live_environments(&self) -> usize {
        self.envs.len()
    }

    /// Runs a mark-sweep pass now. Returns the number of environments freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.calls_since_collect = 0;
        self.envs
            .collect(self.stack.iter().copied(), self.pending.iter())
    }

    fn maybe_collect(&mut self) {
        let threshold = self.options.collect_threshold;
        if self.calls_since_collect >= threshold
            || self.envs.allocated_since_collect() >= threshold
        {
            self.collect_garbage();
        }
    }

    /// Resolves and runs `unit`, which must belong to `ctx`, the same arena
    /// every earlier unit came from.
    ///
    /// Static and runtime errors are reported to the diagnostic sink before
    /// they are returned.
    pub fn evaluate(&mut self, ctx: &AstContext, unit: Idx<Unit>) -> crate::Result<()> {
        let resolution = Resolver::new(ctx, self.diag)
            .resolve_unit(unit)
            .map_err(crate::Error::Resolve)?;
        self.resolution.extend(resolution);

        match self.execute(ctx, StatementIndex::Unit(unit)) {
            Ok(_) => Ok(()),
            Err(error) => {
                let line = ctx.token(error.token).line();
                tracing::debug!(line, message = %error.message, "runtime error");
                self.diag.error(line, &error.message);
                self.stack.truncate(1);
                self.pending.clear();
                Err(crate::Error::Runtime {
                    line,
                    message: error.message,
                })
            }
        }
    }

    fn current(&self) -> EnvId {
        self.stack.last().copied().unwrap_or(EnvId::GLOBAL)
    }

    fn define(&mut self, name: &str, value: Value) {
        let current = self.current();
        if let Some(env) = self.envs.get_mut(current) {
            env.define(name, value);
        }
    }

    fn execute(&mut self, ctx: &AstContext, stmt: StatementIndex) -> Exec {
        ensure_sufficient_stack(|| self.execute_stmt(ctx, stmt))
    }

    fn execute_stmt(&mut self, ctx: &AstContext, stmt: StatementIndex) -> Exec {
        self.maybe_collect();
        match stmt {
            StatementIndex::Expression(idx) => {
                self.evaluate_expr(ctx, ctx[idx].expr)?;
                Ok(FlowControl::NextStatement)
            }
            StatementIndex::Print(idx) => {
                let value = self.evaluate_expr(ctx, ctx[idx].expr)?;
                self.out.println(&value.to_string());
                Ok(FlowControl::NextStatement)
            }
            StatementIndex::Var(idx) => {
                let node = &ctx[idx];
                let value = match node.init {
                    Some(init) => self.evaluate_expr(ctx, init)?,
                    None => Value::Nil,
                };
                self.define(ctx.token(node.name).text(), value);
                Ok(FlowControl::NextStatement)
            }
            StatementIndex::Function(idx) => {
                let node = &ctx[idx];
                let name = ctx.token(node.name).text();
                let function = Callable {
                    name: name.to_string(),
                    arity: node.params.len(),
                    closure: self.current(),
                    kind: CallableKind::Function(idx),
                };
                self.define(name, Value::Callable(Rc::new(function)));
                Ok(FlowControl::NextStatement)
            }
            StatementIndex::Return(idx) => {
                let value = match ctx[idx].value {
                    Some(value) => self.evaluate_expr(ctx, value)?,
                    None => Value::Nil,
                };
                Ok(FlowControl::Return(value))
            }
            StatementIndex::Block(idx) => {
                let env = self.envs.alloc(self.current());
                self.execute_in(ctx, &ctx[idx].statements, env)
            }
            StatementIndex::If(idx) => {
                let node = &ctx[idx];
                if self.evaluate_expr(ctx, node.condition)?.is_truthy() {
                    self.execute(ctx, node.then_branch)
                } else if let Some(else_branch) = node.else_branch {
                    self.execute(ctx, else_branch)
                } else {
                    Ok(FlowControl::NextStatement)
                }
            }
            StatementIndex::While(idx) => {
                let node = &ctx[idx];
                while self.evaluate_expr(ctx, node.condition)?.is_truthy() {
                    let flow = self.execute(ctx, node.body)?;
                    if !matches!(flow, FlowControl::NextStatement) {
                        return Ok(flow);
                    }
                }
                Ok(FlowControl::NextStatement)
            }
            StatementIndex::Unit(idx) => self.execute_all(ctx, &ctx[idx].statements),
        }
    }

    fn execute_all(&mut self, ctx: &AstContext, stmts: &[StatementIndex]) -> Exec {
        for &stmt in stmts {
            let flow = self.execute(ctx, stmt)?;
            if !matches!(flow, FlowControl::NextStatement) {
                return Ok(flow);
            }
        }
        Ok(FlowControl::NextStatement)
    }

    /// Runs `stmts` with `env` as the current environment, popping it again
    /// on every exit path.
    fn execute_in(&mut self, ctx: &AstContext, stmts: &[StatementIndex], env: EnvId) -> Exec {
        self.stack.push(env);
        let flow = self.execute_all(ctx, stmts);
        self.stack.pop();
        flow
    }

    fn evaluate_expr(&mut self, ctx: &AstContext, expr: ExpressionIndex) -> Eval {
        ensure_sufficient_stack(|| self.eval_expr(ctx, expr))
    }

    fn eval_expr(&mut self, ctx: &AstContext, expr: ExpressionIndex) -> Eval {
        match expr {
            ExpressionIndex::Literal(idx) => Ok(literal(ctx.token(ctx[idx].value))),
            ExpressionIndex::Grouping(idx) => self.evaluate_expr(ctx, ctx[idx].inner),
            ExpressionIndex::Variable(idx) => self.look_up(ctx, expr, ctx[idx].name),
            ExpressionIndex::Assign(idx) => {
                let node = &ctx[idx];
                let value = self.evaluate_expr(ctx, node.value)?;
                self.assign(ctx, expr, node.name, value.clone())?;
                Ok(value)
            }
            ExpressionIndex::Unary(idx) => {
                let node = &ctx[idx];
                let operand = self.evaluate_expr(ctx, node.operand)?;
                match ctx.token(node.op).typ() {
                    TokenType::MINUS => match operand {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::operand_not_number(node.op)),
                    },
                    _ => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            ExpressionIndex::Logical(idx) => {
                let node = &ctx[idx];
                let left = self.evaluate_expr(ctx, node.left)?;
                let decided = match ctx.token(node.op).typ() {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.evaluate_expr(ctx, node.right)
                }
            }
            ExpressionIndex::Binary(idx) => {
                let node = &ctx[idx];
                let left = self.evaluate_expr(ctx, node.left)?;
                // The left value stays rooted while the right side may call.
                self.pending.push(left);
                let right = self.evaluate_expr(ctx, node.right)?;
                let left = self.pending.pop().unwrap_or(Value::Nil);
                binary(ctx.token(node.op).typ(), node.op, left, right)
            }
            ExpressionIndex::Call(idx) => self.call_expr(ctx, &ctx[idx]),
        }
    }

    fn look_up(&self, ctx: &AstContext, expr: ExpressionIndex, name: Idx<Token>) -> Eval {
        let text = ctx.token(name).text();
        let found = match self.resolution.get(&expr) {
            Some(&hops) => self.envs.get_at(self.current(), hops, text),
            None => self.global(text),
        };
        found
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_variable(name, text))
    }

    fn assign(
        &mut self,
        ctx: &AstContext,
        expr: ExpressionIndex,
        name: Idx<Token>,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let text = ctx.token(name).text();
        let hops = self.resolution.get(&expr).copied();
        let assigned = match hops {
            Some(hops) => self.envs.assign_at(self.current(), hops, text, value),
            None => self.envs.assign_at(EnvId::GLOBAL, 0, text, value),
        };
        if assigned {
            Ok(())
        } else {
            Err(RuntimeError::undefined_variable(name, text))
        }
    }

    fn call_expr(&mut self, ctx: &AstContext, call: &Call) -> Eval {
        let callee = self.evaluate_expr(ctx, call.callee)?;
        let Some(callable) = callee.as_callable().cloned() else {
            return Err(RuntimeError::not_callable(call.paren));
        };
        if callable.arity != call.args.len() {
            return Err(RuntimeError::arity(
                call.paren,
                callable.arity,
                call.args.len(),
            ));
        }

        let base = self.pending.len();
        self.pending.push(callee);
        for &arg in &call.args {
            let value = self.evaluate_expr(ctx, arg)?;
            self.pending.push(value);
        }
        let args = self.pending.split_off(base + 1);
        self.pending.truncate(base);

        let result = self.call(ctx, &callable, args);
        self.calls_since_collect += 1;
        result
    }

    fn call(&mut self, ctx: &AstContext, callable: &Callable, args: Vec<Value>) -> Eval {
        match callable.kind {
            CallableKind::Native(func) => Ok(func(&args)),
            CallableKind::Function(decl) => {
                let decl = &ctx[decl];
                tracing::trace!(name = %callable.name, depth = self.stack.len(), "call");
                let env = self.envs.alloc(callable.closure);
                if let Some(frame) = self.envs.get_mut(env) {
                    for (&param, arg) in decl.params.iter().zip(args) {
                        frame.define(ctx.token(param).text(), arg);
                    }
                }
                match self.execute_in(ctx, &decl.body, env)? {
                    FlowControl::Return(value) => Ok(value),
                    FlowControl::NextStatement => Ok(Value::Nil),
                }
            }
        }
    }
}

fn literal(token: &Token) -> Value {
    match (token.typ(), token.value()) {
        (TokenType::TRUE, _) => Value::Bool(true),
        (TokenType::FALSE, _) => Value::Bool(false),
        (_, TokenValue::Number(n)) => Value::Number(*n),
        (_, TokenValue::Str(s)) => Value::from(s.as_str()),
        _ => Value::Nil,
    }
}

fn binary(op: TokenType, token: Idx<Token>, left: Value, right: Value) -> Eval {
    use TokenType as TT;

    match op {
        TT::EQEQUAL => return Ok(Value::Bool(left == right)),
        TT::NOTEQUAL => return Ok(Value::Bool(left != right)),
        TT::PLUS => {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}").into())),
                (left, right) if !left.same_kind(&right) => {
                    Err(RuntimeError::type_mismatch(token))
                }
                _ => Err(RuntimeError::unsupported_operands(token)),
            }
        }
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(RuntimeError::operand_not_number(token));
    };
    Ok(match op {
        TT::MINUS => Value::Number(a - b),
        TT::STAR => Value::Number(a * b),
        TT::SLASH => Value::Number(a / b),
        TT::GREATER => Value::Bool(a > b),
        TT::GREATEREQUAL => Value::Bool(a >= b),
        TT::LESS => Value::Bool(a < b),
        TT::LESSEQUAL => Value::Bool(a <= b),
        _ => return Err(RuntimeError::new(token, "Unexpected value.")),
    })
}
