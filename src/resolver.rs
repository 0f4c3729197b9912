//! Static scope resolution.
//!
//! Walks a unit before it runs and records, for every local variable read or
//! assignment, how many environments out from the current one its binding
//! lives. Names not found in any enclosing local scope are globals and get no
//! entry.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::diagnostics::DiagnosticSink;
use crate::parser::ast::*;
use crate::parser::Token;
use crate::stack::ensure_sufficient_stack;

pub type Resolution = FxHashMap<ExpressionIndex, usize>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub(crate) token: Idx<Token>,
    pub(crate) message: String,
}

// name -> fully defined yet
type Scope = FxHashMap<String, bool>;

pub struct Resolver<'a> {
    ctx: &'a AstContext,
    diag: &'a dyn DiagnosticSink,
    scopes: Vec<Scope>,
    resolution: Resolution,
    in_function: bool,
    errors: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a AstContext, diag: &'a dyn DiagnosticSink) -> Self {
        Self {
            ctx,
            diag,
            scopes: vec![],
            resolution: Resolution::default(),
            in_function: false,
            errors: 0,
        }
    }

    /// Resolves a whole unit. Every static error is reported; on failure the
    /// error count is returned.
    pub fn resolve_unit(mut self, unit: Idx<Unit>) -> Result<Resolution, usize> {
        self.resolve_stmt(StatementIndex::Unit(unit));
        tracing::debug!(
            locals = self.resolution.len(),
            errors = self.errors,
            "resolved unit"
        );
        if self.errors > 0 {
            Err(self.errors)
        } else {
            Ok(self.resolution)
        }
    }

    fn fail(&mut self, error: CompileError) {
        self.errors += 1;
        self.diag
            .error(self.ctx.token(error.token).line, &error.message);
    }

    fn name(&self, token: Idx<Token>) -> &'a str {
        let ctx = self.ctx;
        ctx.token(token).text()
    }

    fn begin_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, token: Idx<Token>) {
        let name = self.name(token);
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(name) {
            self.fail(CompileError {
                token,
                message: format!("Already a variable with name '{name}' in this scope."),
            });
            return;
        }
        scope.insert(name.to_string(), false);
    }

    fn define(&mut self, token: Idx<Token>) {
        let name = self.name(token);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn resolve_local(&mut self, expr: ExpressionIndex, name: &str) {
        let depth = self.scopes.len();
        if let Some(i) = self.scopes.iter().rposition(|s| s.contains_key(name)) {
            self.resolution.insert(expr, depth - 1 - i);
        }
    }

    fn resolve_stmts(&mut self, stmts: &[StatementIndex]) {
        for &stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: StatementIndex) {
        ensure_sufficient_stack(|| self.resolve_stmt_inner(stmt))
    }

    fn resolve_stmt_inner(&mut self, stmt: StatementIndex) {
        let ctx = self.ctx;
        match stmt {
            StatementIndex::Expression(idx) => self.resolve_expr(ctx[idx].expr),
            StatementIndex::Print(idx) => self.resolve_expr(ctx[idx].expr),
            StatementIndex::Var(idx) => {
                let node = &ctx[idx];
                self.declare(node.name);
                if let Some(init) = node.init {
                    self.resolve_expr(init);
                }
                self.define(node.name);
            }
            StatementIndex::Function(idx) => {
                let node = &ctx[idx];
                self.declare(node.name);
                self.define(node.name);

                let enclosing = std::mem::replace(&mut self.in_function, true);
                self.begin_scope();
                for &param in &node.params {
                    self.declare(param);
                    self.define(param);
                }
                self.resolve_stmts(&node.body);
                self.end_scope();
                self.in_function = enclosing;
            }
            StatementIndex::Return(idx) => {
                let node = &ctx[idx];
                if !self.in_function {
                    self.fail(CompileError {
                        token: node.keyword,
                        message: "Can't return from top level code.".to_string(),
                    });
                }
                if let Some(value) = node.value {
                    self.resolve_expr(value);
                }
            }
            StatementIndex::Block(idx) => {
                self.begin_scope();
                self.resolve_stmts(&ctx[idx].statements);
                self.end_scope();
            }
            StatementIndex::If(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.condition);
                self.resolve_stmt(node.then_branch);
                if let Some(else_branch) = node.else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            StatementIndex::While(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.condition);
                self.resolve_stmt(node.body);
            }
            StatementIndex::Unit(idx) => self.resolve_stmts(&ctx[idx].statements),
        }
    }

    fn resolve_expr(&mut self, expr: ExpressionIndex) {
        ensure_sufficient_stack(|| self.resolve_expr_inner(expr))
    }

    fn resolve_expr_inner(&mut self, expr: ExpressionIndex) {
        let ctx = self.ctx;
        match expr {
            ExpressionIndex::Binary(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.left);
                self.resolve_expr(node.right);
            }
            ExpressionIndex::Logical(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.left);
                self.resolve_expr(node.right);
            }
            ExpressionIndex::Assign(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.value);
                self.resolve_local(expr, self.name(node.name));
            }
            ExpressionIndex::Unary(idx) => self.resolve_expr(ctx[idx].operand),
            ExpressionIndex::Literal(_) => {}
            ExpressionIndex::Grouping(idx) => self.resolve_expr(ctx[idx].inner),
            ExpressionIndex::Variable(idx) => {
                let token = ctx[idx].name;
                let name = self.name(token);
                let uninitialized = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(name) == Some(&false));
                if uninitialized {
                    self.fail(CompileError {
                        token,
                        message: "Can't read local variable in its own initializer.".to_string(),
                    });
                }
                self.resolve_local(expr, name);
            }
            ExpressionIndex::Call(idx) => {
                let node = &ctx[idx];
                self.resolve_expr(node.callee);
                for &arg in &node.args {
                    self.resolve_expr(arg);
                }
            }
        }
    }
}
