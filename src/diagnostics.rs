//! Sinks the pipeline writes to.
//!
//! Compile and runtime errors go to a [`DiagnosticSink`] as `(line, where, message)`
//! triples, `print` output goes to an [`OutputSink`]. Both take `&self` so one
//! emitter can be shared by the lexer, parser, resolver and interpreter at once.

use std::cell::RefCell;
use std::io::Write;

pub trait DiagnosticSink {
    fn report(&self, line: usize, location: &str, message: &str);

    fn error(&self, line: usize, message: &str) {
        self.report(line, "", message);
    }
}

pub trait OutputSink {
    fn println(&self, text: &str);
}

pub(crate) fn format_diagnostic(line: usize, location: &str, message: &str) -> String {
    format!("[line {line}] Error {location}: {message}")
}

/// Writes diagnostics to stderr and program output to stdout.
#[derive(Default)]
pub struct StreamEmitter;

impl DiagnosticSink for StreamEmitter {
    fn report(&self, line: usize, location: &str, message: &str) {
        let mut err = std::io::stderr().lock();
        // Nowhere left to report a failing stderr.
        let _ = writeln!(err, "{}", format_diagnostic(line, location, message));
    }
}

impl OutputSink for StreamEmitter {
    fn println(&self, text: &str) {
        println!("{text}");
    }
}

/// Captures diagnostics and output in memory.
#[derive(Default)]
pub struct BufferEmitter {
    output: RefCell<String>,
    diagnostics: RefCell<Vec<String>>,
}

impl BufferEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.borrow().clone()
    }

    pub fn clear(&self) {
        self.output.borrow_mut().clear();
        self.diagnostics.borrow_mut().clear();
    }
}

impl DiagnosticSink for BufferEmitter {
    fn report(&self, line: usize, location: &str, message: &str) {
        self.diagnostics
            .borrow_mut()
            .push(format_diagnostic(line, location, message));
    }
}

impl OutputSink for BufferEmitter {
    fn println(&self, text: &str) {
        let mut output = self.output.borrow_mut();
        output.push_str(text);
        output.push('\n');
    }
}
