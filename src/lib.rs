//! A tree-walking interpreter for a small dynamically typed scripting
//! language with first-class functions and lexical closures.
//!
//! Source flows through [`parser::Tokenizer`], [`parser::Parser`],
//! [`resolver::Resolver`] and [`interpreter::Interpreter`]. [`Session`] drives
//! all four and can be fed source incrementally, one REPL line at a time.

pub mod config;
pub mod diagnostics;
mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
mod stack;

pub use config::Options;
pub use diagnostics::{BufferEmitter, DiagnosticSink, OutputSink, StreamEmitter};
pub use error::{Error, Result};
pub use interpreter::{Interpreter, Value};

use parser::{AstPrinter, Parser, Tokenizer};

/// Lexer, parser and interpreter sharing one arena and one global scope.
pub struct Session<'s> {
    tokenizer: Tokenizer<'s>,
    parser: Parser<'s>,
    interpreter: Interpreter<'s>,
    out: &'s dyn OutputSink,
}

impl<'s> Session<'s> {
    pub fn new(options: Options, diag: &'s dyn DiagnosticSink, out: &'s dyn OutputSink) -> Self {
        Self {
            tokenizer: Tokenizer::new(diag),
            parser: Parser::new(diag),
            interpreter: Interpreter::new(options, diag, out),
            out,
        }
    }

    /// Lexes `source` and queues its tokens for the next [`Session::run_pending`].
    ///
    /// Returns the bracket balance of everything queued so far; a positive
    /// balance means the input is not complete yet.
    pub fn add_source(&mut self, source: &str) -> Result<isize> {
        let batch = self.tokenizer.tokenize(source).map_err(Error::Lex)?;
        self.parser.add_tokens(batch);
        Ok(self.tokenizer.bracket_balance())
    }

    /// Parses, resolves and runs everything queued since the last run.
    pub fn run_pending(&mut self) -> Result<()> {
        self.tokenizer.reset_bracket_balance();
        let unit = self.parser.parse().map_err(Error::Parse)?;
        let ctx = self.parser.context();
        if self.interpreter.options().dump_ast {
            self.out.println(&AstPrinter::new(ctx).print_unit(unit));
        }
        self.interpreter.evaluate(ctx, unit)
    }

    /// Drops queued input without running it.
    pub fn discard_pending(&mut self) {
        self.tokenizer.reset_bracket_balance();
        self.parser.discard_pending();
    }

    pub fn run(&mut self, source: &str) -> Result<()> {
        if let Err(error) = self.add_source(source) {
            self.discard_pending();
            return Err(error);
        }
        self.run_pending()
    }

    pub fn interpreter(&self) -> &Interpreter<'s> {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter<'s> {
        &mut self.interpreter
    }
}

/// Runs a complete program with default options.
pub fn run_source(source: &str, diag: &dyn DiagnosticSink, out: &dyn OutputSink) -> Result<()> {
    Session::new(Options::default(), diag, out).run(source)
}
