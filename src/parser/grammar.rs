// # ========================= START OF THE GRAMMAR =========================
//
// unit:        declaration* ENDMARKER
// declaration: fun_decl | var_decl | statement
// statement:   for_stmt | if_stmt | print_stmt | return_stmt | while_stmt
//            | block | expr_stmt
//
// Expressions climb from the loosest binding level (assignment) down to
// primary. Every rule returns `Err` at the first unexpected token; recovery
// happens only around whole declarations.

use super::ast::*;
use super::error::{PResult, ParseError};
use super::token_stream::TokenStream;
use super::tokenizer::{Token, TokenType as TT};
use crate::diagnostics::DiagnosticSink;
use crate::stack::ensure_sufficient_stack;

const MAX_ARGS: usize = 255;

/// Recursive-descent parser over the tokens of its own [`AstContext`].
///
/// Parsing is re-entrant: tokens appended after a `parse` call are picked up
/// by the next one, which returns a fresh [`Unit`] in the same arena.
pub struct Parser<'d> {
    context: AstContext,
    current: usize,
    errors: usize,
    diag: &'d dyn DiagnosticSink,
}

impl<'d> Parser<'d> {
    pub fn new(diag: &'d dyn DiagnosticSink) -> Self {
        let context = AstContext::new();
        let current = context.tokens().first_source_index();
        Self {
            context,
            current,
            errors: 0,
            diag,
        }
    }

    pub fn add_tokens(&mut self, batch: TokenStream) {
        self.context.add_tokens(batch);
    }

    pub fn context(&self) -> &AstContext {
        &self.context
    }

    /// Skips every token appended since the last parse.
    pub fn discard_pending(&mut self) {
        let tokens = self.context.tokens();
        self.current = (tokens.len() - 1).max(tokens.first_source_index());
    }

    /// Parses every declaration up to the end marker into one unit.
    ///
    /// On failure returns the number of syntax errors found, all of them
    /// already reported; the cursor still ends up at the end marker.
    pub fn parse(&mut self) -> Result<Idx<Unit>, usize> {
        self.errors = 0;
        let mut statements = vec![];
        while !self.is_at_end() {
            if let Some(stmt) = self.recovering_declaration(false) {
                statements.push(stmt);
            }
        }
        tracing::debug!(
            statements = statements.len(),
            errors = self.errors,
            "parsed unit"
        );
        if self.errors > 0 {
            return Err(self.errors);
        }
        Ok(self.context.insert(Unit { statements }))
    }

    fn recovering_declaration(&mut self, in_block: bool) -> Option<StatementIndex> {
        match self.declaration() {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                error.report(self.diag);
                self.errors += 1;
                self.synchronize(in_block);
                None
            }
        }
    }

    // declaration: 'fun' function | 'var' var_decl | statement
    fn declaration(&mut self) -> PResult<StatementIndex> {
        ensure_sufficient_stack(|| self.declaration_inner())
    }

    fn declaration_inner(&mut self) -> PResult<StatementIndex> {
        if self.matches(&[TT::FUN]) {
            self.fun_declaration()
        } else if self.matches(&[TT::VAR]) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    // function: NAME '(' [NAME (',' NAME)*] ')' '{' declaration* '}'
    fn fun_declaration(&mut self) -> PResult<StatementIndex> {
        let name = self.consume(TT::NAME, "Expect function name.")?;
        self.consume(TT::LPAR, "Expect '(' after function name.")?;
        let mut params = vec![];
        if !self.check(TT::RPAR) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(self.error(self.peek(), "Can't have more than 255 parameters."));
                }
                params.push(self.consume(TT::NAME, "Expect parameter name.")?);
                if !self.matches(&[TT::COMMA]) {
                    break;
                }
            }
        }
        self.consume(TT::RPAR, "Expect ')' after parameters.")?;
        self.consume(TT::LBRACE, "Expect '{' before function body.")?;
        let body = self.statement_list()?;
        Ok(StatementIndex::Function(self.context.insert(FunDecl {
            name,
            params,
            body,
        })))
    }

    // var_decl: NAME ['=' expression] ';'
    fn var_declaration(&mut self) -> PResult<StatementIndex> {
        let name = self.consume(TT::NAME, "Expect variable name.")?;
        let init = if self.matches(&[TT::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TT::SEMI, "Expect ';' after variable declaration.")?;
        Ok(StatementIndex::Var(self.context.insert(VarDecl { name, init })))
    }

    fn statement(&mut self) -> PResult<StatementIndex> {
        ensure_sufficient_stack(|| self.statement_inner())
    }

    fn statement_inner(&mut self) -> PResult<StatementIndex> {
        if self.matches(&[TT::FOR]) {
            return self.for_statement();
        }
        if self.matches(&[TT::IF]) {
            return self.if_statement();
        }
        if self.matches(&[TT::PRINT]) {
            return self.print_statement();
        }
        if self.matches(&[TT::RETURN]) {
            return self.return_statement();
        }
        if self.matches(&[TT::WHILE]) {
            return self.while_statement();
        }
        if self.matches(&[TT::LBRACE]) {
            let statements = self.statement_list()?;
            return Ok(self.context.make_block(statements));
        }
        self.expression_statement()
    }

    // for_stmt: 'for' '(' (var_decl | expr_stmt | ';') [expression] ';' [expression] ')' statement
    //
    // Desugars to `{ init; while (cond) { body; increment; } }`.
    fn for_statement(&mut self) -> PResult<StatementIndex> {
        self.consume(TT::LPAR, "Expect '(' after for.")?;

        let init = if self.matches(&[TT::SEMI]) {
            None
        } else if self.matches(&[TT::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TT::SEMI) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TT::SEMI, "Expect ';' after loop condition.")?;

        let increment = if self.check(TT::RPAR) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TT::RPAR, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            let increment = self.context.make_expr_stmt(increment);
            body = self.context.make_block(vec![body, increment]);
        }
        let condition = match condition {
            Some(condition) => condition,
            None => self.context.make_literal(TokenStream::synthetic_true()),
        };
        body = self.context.make_while(condition, body);

        match init {
            Some(init) => Ok(self.context.make_block(vec![init, body])),
            None => Ok(body),
        }
    }

    // if_stmt: 'if' '(' expression ')' statement ['else' statement]
    fn if_statement(&mut self) -> PResult<StatementIndex> {
        self.consume(TT::LPAR, "Expect '(' after if.")?;
        let condition = self.expression()?;
        self.consume(TT::RPAR, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.matches(&[TT::ELSE]) {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(StatementIndex::If(self.context.insert(If {
            condition,
            then_branch,
            else_branch,
        })))
    }

    // print_stmt: 'print' expression ';'
    fn print_statement(&mut self) -> PResult<StatementIndex> {
        let expr = self.expression()?;
        self.consume(TT::SEMI, "Expect ';' after value.")?;
        Ok(StatementIndex::Print(self.context.insert(PrintStmt { expr })))
    }

    // return_stmt: 'return' [expression] ';'
    fn return_statement(&mut self) -> PResult<StatementIndex> {
        let keyword = self.previous();
        let value = if self.check(TT::SEMI) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TT::SEMI, "Expect ';' after return value.")?;
        Ok(StatementIndex::Return(
            self.context.insert(Return { keyword, value }),
        ))
    }

    // while_stmt: 'while' '(' expression ')' statement
    fn while_statement(&mut self) -> PResult<StatementIndex> {
        self.consume(TT::LPAR, "Expect '(' after while.")?;
        let condition = self.expression()?;
        self.consume(TT::RPAR, "Expect ')' after while condition.")?;
        let body = self.statement()?;
        Ok(self.context.make_while(condition, body))
    }

    // block: '{' declaration* '}'
    //
    // The opening brace is already consumed. Broken declarations inside the
    // block are reported and skipped without failing the block itself.
    fn statement_list(&mut self) -> PResult<Vec<StatementIndex>> {
        let mut statements = vec![];
        while !self.check(TT::RBRACE) && !self.is_at_end() {
            if let Some(stmt) = self.recovering_declaration(true) {
                statements.push(stmt);
            }
        }
        self.consume(TT::RBRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    // expr_stmt: expression ';'
    fn expression_statement(&mut self) -> PResult<StatementIndex> {
        let expr = self.expression()?;
        self.consume(TT::SEMI, "Expect ';' after value.")?;
        Ok(self.context.make_expr_stmt(expr))
    }

    fn expression(&mut self) -> PResult<ExpressionIndex> {
        self.assignment()
    }

    // assignment: NAME '=' assignment | logic_or
    fn assignment(&mut self) -> PResult<ExpressionIndex> {
        ensure_sufficient_stack(|| self.assignment_inner())
    }

    fn assignment_inner(&mut self) -> PResult<ExpressionIndex> {
        let expr = self.or()?;

        if self.matches(&[TT::EQUAL]) {
            let equals = self.previous();
            let value = self.assignment()?;
            if let ExpressionIndex::Variable(variable) = expr {
                let name = self.context[variable].name;
                return Ok(ExpressionIndex::Assign(
                    self.context.insert(Assign { name, value }),
                ));
            }
            return Err(self.error(equals, "Invalid assignment target."));
        }

        Ok(expr)
    }

    // logic_or: logic_and ('or' logic_and)*
    fn or(&mut self) -> PResult<ExpressionIndex> {
        let mut expr = self.and()?;
        while self.matches(&[TT::OR]) {
            let op = self.previous();
            let right = self.and()?;
            expr = self.context.make_logical(expr, op, right);
        }
        Ok(expr)
    }

    // logic_and: equality ('and' equality)*
    fn and(&mut self) -> PResult<ExpressionIndex> {
        let mut expr = self.equality()?;
        while self.matches(&[TT::AND]) {
            let op = self.previous();
            let right = self.equality()?;
            expr = self.context.make_logical(expr, op, right);
        }
        Ok(expr)
    }

    // equality: comparison (('!=' | '==') comparison)*
    fn equality(&mut self) -> PResult<ExpressionIndex> {
        self.left_assoc(&[TT::NOTEQUAL, TT::EQEQUAL], Self::comparison)
    }

    // comparison: term (('>' | '>=' | '<' | '<=') term)*
    fn comparison(&mut self) -> PResult<ExpressionIndex> {
        self.left_assoc(
            &[TT::GREATER, TT::GREATEREQUAL, TT::LESS, TT::LESSEQUAL],
            Self::term,
        )
    }

    // term: factor (('-' | '+') factor)*
    fn term(&mut self) -> PResult<ExpressionIndex> {
        self.left_assoc(&[TT::MINUS, TT::PLUS], Self::factor)
    }

    // factor: unary (('/' | '*') unary)*
    fn factor(&mut self) -> PResult<ExpressionIndex> {
        self.left_assoc(&[TT::SLASH, TT::STAR], Self::unary)
    }

    fn left_assoc(
        &mut self,
        ops: &[TT],
        operand: fn(&mut Self) -> PResult<ExpressionIndex>,
    ) -> PResult<ExpressionIndex> {
        let mut expr = operand(self)?;
        while self.matches(ops) {
            let op = self.previous();
            let right = operand(self)?;
            expr = self.context.make_binary(expr, op, right);
        }
        Ok(expr)
    }

    // unary: ('!' | '-') unary | call
    fn unary(&mut self) -> PResult<ExpressionIndex> {
        ensure_sufficient_stack(|| self.unary_inner())
    }

    fn unary_inner(&mut self) -> PResult<ExpressionIndex> {
        if self.matches(&[TT::EXCLAMATION, TT::MINUS]) {
            let op = self.previous();
            let operand = self.unary()?;
            return Ok(ExpressionIndex::Unary(
                self.context.insert(Unary { op, operand }),
            ));
        }
        self.call()
    }

    // call: primary ('(' [arguments] ')')*
    fn call(&mut self) -> PResult<ExpressionIndex> {
        let mut expr = self.primary()?;
        while self.matches(&[TT::LPAR]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    // arguments: expression (',' expression)*
    fn finish_call(&mut self, callee: ExpressionIndex) -> PResult<ExpressionIndex> {
        let paren = self.previous();
        let mut args = vec![];
        if !self.check(TT::RPAR) {
            loop {
                if args.len() >= MAX_ARGS {
                    return Err(self.error(self.peek(), "Can't have more than 255 arguments."));
                }
                args.push(self.expression()?);
                if !self.matches(&[TT::COMMA]) {
                    break;
                }
            }
        }
        self.consume(TT::RPAR, "Expect ')' after arguments.")?;
        Ok(ExpressionIndex::Call(self.context.insert(Call {
            callee,
            paren,
            args,
        })))
    }

    // primary: 'true' | 'false' | 'nil' | NUMBER | STRING | NAME | '(' expression ')'
    fn primary(&mut self) -> PResult<ExpressionIndex> {
        if self.matches(&[TT::FALSE, TT::TRUE, TT::NIL, TT::NUMBER, TT::STRING]) {
            return Ok(self.context.make_literal(self.previous()));
        }
        if self.matches(&[TT::NAME]) {
            let name = self.previous();
            return Ok(ExpressionIndex::Variable(
                self.context.insert(Variable { name }),
            ));
        }
        if self.matches(&[TT::LPAR]) {
            let begin = self.previous();
            let inner = self.expression()?;
            let end = self.consume(TT::RPAR, "Expect ')' after expression.")?;
            return Ok(ExpressionIndex::Grouping(self.context.insert(Grouping {
                begin,
                inner,
                end,
            })));
        }
        Err(self.error(self.peek(), "Unexpected token."))
    }

    // Panic mode: skip to just past a ';' or to a token that starts a statement.
    // Inside a block the closing '}' is left for the block to consume.
    fn synchronize(&mut self, in_block: bool) {
        if in_block && self.check(TT::RBRACE) {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.token(self.previous()).typ == TT::SEMI {
                return;
            }
            if in_block && self.check(TT::RBRACE) {
                return;
            }
            match self.token(self.peek()).typ {
                TT::CLASS
                | TT::FUN
                | TT::VAR
                | TT::FOR
                | TT::IF
                | TT::WHILE
                | TT::PRINT
                | TT::RETURN => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn token(&self, idx: Idx<Token>) -> &Token {
        self.context.token(idx)
    }

    fn peek(&self) -> Idx<Token> {
        let last = self.context.tokens().len() - 1;
        Idx::new(self.current.min(last))
    }

    fn previous(&self) -> Idx<Token> {
        Idx::new(self.current - 1)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.context.tokens().len()
            || self.token(self.peek()).typ == TT::ENDMARKER
    }

    fn check(&self, typ: TT) -> bool {
        !self.is_at_end() && self.token(self.peek()).typ == typ
    }

    fn matches(&mut self, types: &[TT]) -> bool {
        if types.iter().any(|&typ| self.check(typ)) {
            self.advance();
            return true;
        }
        false
    }

    fn advance(&mut self) -> Idx<Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn consume(&mut self, typ: TT, message: &str) -> PResult<Idx<Token>> {
        if self.check(typ) {
            return Ok(self.advance());
        }
        Err(self.error(self.peek(), message))
    }

    fn error(&self, idx: Idx<Token>, message: &str) -> ParseError {
        let token = self.token(idx);
        let location = if token.typ == TT::ENDMARKER {
            "at end of file".to_string()
        } else {
            format!("at '{token}'")
        };
        ParseError::new(token.line, location, message)
    }
}
