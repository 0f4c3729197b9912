use pretty_assertions::assert_eq;

use lox::{BufferEmitter, Error, Options, Session};

fn repl_lines(session: &mut Session<'_>, lines: &[&str]) {
    for line in lines {
        match session.add_source(line) {
            Ok(depth) if depth > 0 => continue,
            Ok(_) => {
                let _ = session.run_pending();
            }
            Err(_) => session.discard_pending(),
        }
    }
}

#[test]
fn globals_persist_between_runs() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(session.run("var a = 1;"), Ok(()));
    assert_eq!(session.run("a = a + 1;"), Ok(()));
    assert_eq!(session.run("print a;"), Ok(()));
    assert_eq!(diag.output(), "2\n");
}

#[test]
fn resolution_accumulates_across_units() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(
        session.run("fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; }"),
        Ok(())
    );
    assert_eq!(session.run("var counter = makeCounter();"), Ok(()));
    for _ in 0..3 {
        assert_eq!(session.run("counter();"), Ok(()));
    }
    assert_eq!(diag.output(), "1\n2\n3\n");
}

#[test]
fn multi_line_input_waits_for_balanced_brackets() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    repl_lines(
        &mut session,
        &[
            "fun greet(name) {",
            "  if (name == nil) {",
            "    return \"hello, nobody\";",
            "  }",
            "  return \"hello, \" + name;",
            "}",
            "print greet(nil);",
            "print greet(\"you\");",
        ],
    );
    assert_eq!(diag.diagnostics(), Vec::<String>::new());
    assert_eq!(diag.output(), "hello, nobody\nhello, you\n");
}

#[test]
fn add_source_reports_bracket_balance() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(session.add_source("{"), Ok(1));
    assert_eq!(session.add_source("{ print 1;"), Ok(2));
    assert_eq!(session.add_source("} }"), Ok(0));
    assert_eq!(session.run_pending(), Ok(()));
    assert_eq!(diag.output(), "1\n");
}

#[test]
fn errors_do_not_end_the_session() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    repl_lines(
        &mut session,
        &[
            "var a = 1;",
            "print a +;",
            "print @;",
            "return a;",
            "print a + \"x\";",
            "print a;",
        ],
    );
    assert_eq!(
        diag.diagnostics(),
        vec![
            "[line 1] Error at ';': Unexpected token.",
            "[line 1] Error at '@': Unexpected character.",
            "[line 1] Error : Can't return from top level code.",
            "[line 1] Error : Operands' type mismatch.",
        ]
    );
    assert_eq!(diag.output(), "1\n");
}

#[test]
fn failed_units_report_their_stage() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(session.run("print \"open"), Err(Error::Lex(1)));
    assert_eq!(session.run("print ;"), Err(Error::Parse(1)));
    assert_eq!(session.run("{ var a = a; }"), Err(Error::Resolve(1)));
    assert_eq!(
        session.run("missing();"),
        Err(Error::Runtime {
            line: 1,
            message: "Undefined variable: 'missing'.".to_string()
        })
    );
    assert_eq!(session.run("print \"still here\";"), Ok(()));
    assert_eq!(diag.output(), "still here\n");
}

#[test]
fn dump_ast_prints_each_unit_before_running_it() {
    let diag = BufferEmitter::new();
    let options = Options {
        dump_ast: true,
        ..Options::default()
    };
    let mut session = Session::new(options, &diag, &diag);
    assert_eq!(session.run("var a = 2;"), Ok(()));
    assert_eq!(session.run("print a * 3;"), Ok(()));
    assert_eq!(
        diag.output(),
        "(unit (var a 2.000000))\n(unit (print (* a 3.000000)))\n6\n"
    );
}

#[test]
fn run_source_runs_a_whole_program() {
    let diag = BufferEmitter::new();
    let program = "
        // Sum of the first ten squares.
        fun square(x) { return x * x; }
        var total = 0;
        for (var i = 1; i <= 10; i = i + 1) {
            total = total + square(i);
        }
        print total;
    ";
    assert_eq!(lox::run_source(program, &diag, &diag), Ok(()));
    assert_eq!(diag.output(), "385\n");
}
