//! Parenthesized rendering of a parsed tree, e.g. `(unit (print 5.000000))`.

use super::ast::*;
use crate::stack::ensure_sufficient_stack;

pub struct AstPrinter<'a> {
    ctx: &'a AstContext,
}

fn parenthesize<I>(head: &str, children: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut result = format!("({head}");
    for child in children {
        result.push(' ');
        result.push_str(&child);
    }
    result.push(')');
    result
}

const NULL: &str = "<NULL>";

impl<'a> AstPrinter<'a> {
    pub fn new(ctx: &'a AstContext) -> Self {
        Self { ctx }
    }

    pub fn print_unit(&self, unit: Idx<Unit>) -> String {
        self.print_stmt(StatementIndex::Unit(unit))
    }

    pub fn print_expr(&self, expr: ExpressionIndex) -> String {
        ensure_sufficient_stack(|| self.print_expr_inner(expr))
    }

    pub fn print_stmt(&self, stmt: StatementIndex) -> String {
        ensure_sufficient_stack(|| self.print_stmt_inner(stmt))
    }

    fn print_expr_inner(&self, expr: ExpressionIndex) -> String {
        let ctx = self.ctx;
        match expr {
            ExpressionIndex::Binary(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    &ctx.token(node.op).to_string(),
                    [self.print_expr(node.left), self.print_expr(node.right)],
                )
            }
            ExpressionIndex::Logical(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    &ctx.token(node.op).to_string(),
                    [self.print_expr(node.left), self.print_expr(node.right)],
                )
            }
            ExpressionIndex::Assign(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    "=",
                    [ctx.token(node.name).to_string(), self.print_expr(node.value)],
                )
            }
            ExpressionIndex::Unary(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    &ctx.token(node.op).to_string(),
                    [self.print_expr(node.operand)],
                )
            }
            ExpressionIndex::Literal(idx) => ctx.token(ctx[idx].value).to_string(),
            ExpressionIndex::Grouping(idx) => {
                parenthesize("group", [self.print_expr(ctx[idx].inner)])
            }
            ExpressionIndex::Variable(idx) => ctx.token(ctx[idx].name).to_string(),
            ExpressionIndex::Call(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    "call",
                    std::iter::once(self.print_expr(node.callee))
                        .chain(node.args.iter().map(|&arg| self.print_expr(arg))),
                )
            }
        }
    }

    fn print_stmt_inner(&self, stmt: StatementIndex) -> String {
        let ctx = self.ctx;
        match stmt {
            StatementIndex::Expression(idx) => {
                parenthesize("exprStmt", [self.print_expr(ctx[idx].expr)])
            }
            StatementIndex::Print(idx) => parenthesize("print", [self.print_expr(ctx[idx].expr)]),
            StatementIndex::Var(idx) => {
                let node = &ctx[idx];
                parenthesize("var", [ctx.token(node.name).to_string(), self.print_opt(node.init)])
            }
            StatementIndex::Function(idx) => {
                let node = &ctx[idx];
                let body = parenthesize("body", self.print_stmts(&node.body));
                parenthesize(
                    "fun",
                    std::iter::once(ctx.token(node.name).to_string())
                        .chain(node.params.iter().map(|&p| ctx.token(p).to_string()))
                        .chain(std::iter::once(body)),
                )
            }
            StatementIndex::Return(idx) => parenthesize("return", [self.print_opt(ctx[idx].value)]),
            StatementIndex::Block(idx) => parenthesize("block", self.print_stmts(&ctx[idx].statements)),
            StatementIndex::If(idx) => {
                let node = &ctx[idx];
                let else_branch = match node.else_branch {
                    Some(stmt) => self.print_stmt(stmt),
                    None => NULL.to_string(),
                };
                parenthesize(
                    "if",
                    [
                        self.print_expr(node.condition),
                        self.print_stmt(node.then_branch),
                        else_branch,
                    ],
                )
            }
            StatementIndex::While(idx) => {
                let node = &ctx[idx];
                parenthesize(
                    "while",
                    [self.print_expr(node.condition), self.print_stmt(node.body)],
                )
            }
            StatementIndex::Unit(idx) => parenthesize("unit", self.print_stmts(&ctx[idx].statements)),
        }
    }

    fn print_opt(&self, expr: Option<ExpressionIndex>) -> String {
        match expr {
            Some(expr) => self.print_expr(expr),
            None => NULL.to_string(),
        }
    }

    fn print_stmts(&self, stmts: &[StatementIndex]) -> Vec<String> {
        stmts.iter().map(|&stmt| self.print_stmt(stmt)).collect()
    }
}
