use pretty_assertions::assert_eq;

use crate::{run_source, BufferEmitter, Error, Options, Session};

fn run_ok(source: &str) -> String {
    let diag = BufferEmitter::new();
    let result = run_source(source, &diag, &diag);
    assert_eq!(diag.diagnostics(), Vec::<String>::new(), "running {source:?}");
    assert_eq!(result, Ok(()));
    diag.output()
}

fn assert_raises_error(source: &str, msg: &str) -> Error {
    let diag = BufferEmitter::new();
    let result = run_source(source, &diag, &diag);
    assert_eq!(diag.diagnostics(), vec![msg.to_string()], "running {source:?}");
    match result {
        Err(error) => error,
        Ok(()) => panic!("{source:?} ran without error"),
    }
}

fn assert_runtime_error(source: &str, line: usize, message: &str) {
    let error = assert_raises_error(source, &format!("[line {line}] Error : {message}"));
    assert_eq!(
        error,
        Error::Runtime {
            line,
            message: message.to_string()
        }
    );
}

fn assert_static_error(source: &str, msg: &str) {
    assert_eq!(assert_raises_error(source, msg), Error::Resolve(1));
}

#[test]
fn test_arithmetic() {
    assert_eq!(run_ok("print 2 + 3 * 4 - 6;"), "8\n");
    assert_eq!(run_ok("print (2 + 3) * (4 - 6);"), "-10\n");
    assert_eq!(run_ok("print 1 / 2; print 10 / 4; print -(3);"), "0.5\n2.5\n-3\n");
    assert_eq!(run_ok("print 8 - 4 - 2;"), "2\n");
}

#[test]
fn test_comparison() {
    assert_eq!(
        run_ok("print 1 < 2; print 2 <= 2; print 1 > 2; print 3 >= 4;"),
        "true\ntrue\nfalse\nfalse\n"
    );
}

#[test]
fn test_strings() {
    assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    assert_eq!(run_ok("print \"tab\\tend\";"), "tab\tend\n");
}

#[test]
fn test_truthiness() {
    assert_eq!(
        run_ok("print !0; print !\"\"; print !nil; print !false; print !true;"),
        "false\nfalse\ntrue\ntrue\nfalse\n"
    );
    assert_eq!(
        run_ok("if (0) print \"zero\"; if (nil) print \"nil\"; else print \"else\";"),
        "zero\nelse\n"
    );
}

#[test]
fn test_logical_operators() {
    assert_eq!(
        run_ok("print false or 5; print nil and 1; print 1 and 2; print nil or false;"),
        "5\nnil\n2\nfalse\n"
    );
    // The right operand is never evaluated once the left decides.
    assert_eq!(run_ok("print 1 or missing; print false and missing;"), "1\nfalse\n");
}

#[test]
fn test_equality() {
    assert_eq!(
        run_ok("print 1 == 1; print \"a\" == \"a\"; print nil == false; print 1 != 2; print nil == nil;"),
        "true\ntrue\nfalse\ntrue\ntrue\n"
    );
    assert_eq!(run_ok("print 1 == \"1\"; print true != nil;"), "false\ntrue\n");
    assert_eq!(run_ok("fun f() {} print f == f; print f != f;"), "false\ntrue\n");
}

#[test]
fn test_callable_rendering() {
    assert_eq!(
        run_ok("fun f() {} print f; print clock;"),
        "<fn f>\n<native fn clock>\n"
    );
}

#[test]
fn test_clock() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

#[test]
fn test_global_variables() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
    assert_eq!(run_ok("var a = 1; var a = 2; print a;"), "2\n");
    assert_eq!(run_ok("var a = 1; a = a + 1; print a = 5; print a;"), "5\n5\n");
}

#[test]
fn test_shadowing() {
    assert_eq!(
        run_ok("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
    assert_eq!(
        run_ok("var a = 1; { var b = a + 1; { var a = b * 10; print a; } print a; }"),
        "20\n1\n"
    );
}

#[test]
fn test_assignment_reaches_enclosing_scope() {
    assert_eq!(
        run_ok("var a = 1; { var b = 1; { b = 2; a = 3; } print b; } print a;"),
        "2\n3\n"
    );
}

#[test]
fn test_control_flow() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
    assert_eq!(
        run_ok("var i = 3; while (i > 0) { print i; i = i - 1; }"),
        "3\n2\n1\n"
    );
    assert_eq!(
        run_ok("if (1 > 2) print \"then\"; else if (2 > 1) print \"else if\";"),
        "else if\n"
    );
}

#[test]
fn test_functions() {
    assert_eq!(
        run_ok("fun add(a, b) { return a + b; } print add(1, 2);"),
        "3\n"
    );
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
    assert_eq!(run_ok("fun f() { return; print 1; } print f();"), "nil\n");
    assert_eq!(
        run_ok("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"),
        "55\n"
    );
}

#[test]
fn test_return_unwinds_loops_and_blocks() {
    assert_eq!(
        run_ok(
            "fun first() {
                var i = 0;
                while (true) {
                    i = i + 1;
                    { if (i > 3) return i; }
                }
            }
            print first();
            var i = \"global\";
            print i;"
        ),
        "4\nglobal\n"
    );
}

#[test]
fn test_counter_closure() {
    assert_eq!(
        run_ok(
            "fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print i;
                }
                return count;
            }
            var counter = makeCounter();
            counter(); counter(); counter(); counter(); counter();"
        ),
        "1\n2\n3\n4\n5\n"
    );
}

#[test]
fn test_independent_closures() {
    assert_eq!(
        run_ok(
            "fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var a = makeCounter();
            var b = makeCounter();
            a(); a();
            print a();
            print b();"
        ),
        "3\n1\n"
    );
}

#[test]
fn test_closure_binding_is_static() {
    assert_eq!(
        run_ok(
            "var a = 1;
            {
                fun show() { print a; }
                show();
                var a = 2;
                show();
            }"
        ),
        "1\n1\n"
    );
}

#[test]
fn test_static_errors() {
    assert_static_error(
        "fun f() { var a = 1; var a = 1; }",
        "[line 1] Error : Already a variable with name 'a' in this scope.",
    );
    assert_static_error(
        "{ var a = 1;\n var a = 2; }",
        "[line 2] Error : Already a variable with name 'a' in this scope.",
    );
    assert_static_error(
        "fun f(a, a) {}",
        "[line 1] Error : Already a variable with name 'a' in this scope.",
    );
    assert_static_error(
        "var a = 1; { var a = a; }",
        "[line 1] Error : Can't read local variable in its own initializer.",
    );
    assert_static_error(
        "return 1;",
        "[line 1] Error : Can't return from top level code.",
    );
}

#[test]
fn test_static_errors_are_all_reported() {
    let diag = BufferEmitter::new();
    let result = run_source("print 1;\nreturn;\n{ var b = 1; var b = 2; }", &diag, &diag);
    assert_eq!(result, Err(Error::Resolve(2)));
    assert_eq!(
        diag.diagnostics(),
        vec![
            "[line 2] Error : Can't return from top level code.",
            "[line 3] Error : Already a variable with name 'b' in this scope.",
        ]
    );
    // Nothing runs once resolution fails.
    assert_eq!(diag.output(), "");
}

#[test]
fn test_runtime_errors() {
    assert_runtime_error("\"hello\" + 5;", 1, "Operands' type mismatch.");
    assert_runtime_error("true + false;", 1, "Operands with unsupported type.");
    assert_runtime_error("nil + nil;", 1, "Operands with unsupported type.");
    assert_runtime_error("-\"a\";", 1, "Operand must evaluate to a number.");
    assert_runtime_error("1 < \"a\";", 1, "Operand must evaluate to a number.");
    assert_runtime_error("\"a\" * 2;", 1, "Operand must evaluate to a number.");
    assert_runtime_error("print missing;", 1, "Undefined variable: 'missing'.");
    assert_runtime_error("missing = 1;", 1, "Undefined variable: 'missing'.");
    assert_runtime_error("fun f(a) {}\nf();", 2, "Expected 1 arguments but got 0.");
    assert_runtime_error("\"not a function\"();", 1, "Can only call functions and classes.");
    assert_runtime_error("var a = 1;\n\nprint a + nil;", 3, "Operands' type mismatch.");
}

#[test]
fn test_arity_is_checked_before_arguments() {
    let diag = BufferEmitter::new();
    let result = run_source("fun f(a) {} fun g() { print \"g\"; } f(g(), g());", &diag, &diag);
    assert!(result.is_err());
    assert_eq!(diag.output(), "");
}

#[test]
fn test_runtime_error_aborts_unit() {
    let diag = BufferEmitter::new();
    let result = run_source("print 1; print -nil; print 2;", &diag, &diag);
    assert!(matches!(result, Err(Error::Runtime { line: 1, .. })));
    assert_eq!(diag.output(), "1\n");
    assert_eq!(diag.diagnostics().len(), 1);
}

#[test]
fn test_runtime_error_resets_scope() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert!(session.run("fun f() { { print nil + 1; } } f();").is_err());
    assert_eq!(session.run("var x = 3; print x;"), Ok(()));
    assert_eq!(diag.output(), "3\n");
    assert_eq!(session.interpreter().global("x").map(|v| v.to_string()), Some("3".to_string()));
}

fn session_output(options: Options, source: &str) -> String {
    let diag = BufferEmitter::new();
    let mut session = Session::new(options, &diag, &diag);
    assert_eq!(session.run(source), Ok(()));
    assert_eq!(diag.diagnostics(), Vec::<String>::new());
    diag.output()
}

fn eager_collection() -> Options {
    Options {
        collect_threshold: 1,
        ..Options::default()
    }
}

#[test]
fn test_collection_keeps_captured_environments() {
    let source = "
        fun makeAdder(n) {
            fun add(x) { return x + n; }
            return add;
        }
        var add5 = makeAdder(5);
        fun noise(i) { var tmp = i * 2; return tmp; }
        for (var i = 0; i < 100; i = i + 1) noise(i);
        print add5(1);
        var add7 = makeAdder(7);
        for (var i = 0; i < 100; i = i + 1) noise(i);
        print add5(2) + add7(1);
    ";
    assert_eq!(session_output(eager_collection(), source), "6\n15\n");
}

#[test]
fn test_collection_keeps_pending_arguments() {
    let source = "
        fun make() {
            var v = 7;
            fun get() { return v; }
            return get;
        }
        fun noise(n) {
            var i = 0;
            while (i < n) { i = i + 1; }
            return i;
        }
        fun first(a, b) { return a; }
        print first(make(), noise(20))();
        print make()() + noise(20);
    ";
    assert_eq!(session_output(eager_collection(), source), "7\n27\n");
}

#[test]
fn test_collection_keeps_counter_state() {
    let source = "
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; return i; }
            return count;
        }
        var counter = makeCounter();
        for (var j = 0; j < 50; j = j + 1) counter();
        print counter();
    ";
    assert_eq!(session_output(eager_collection(), source), "51\n");
}

#[test]
fn test_collect_garbage_frees_unreachable_environments() {
    let diag = BufferEmitter::new();
    let options = Options {
        collect_threshold: usize::MAX,
        ..Options::default()
    };
    let mut session = Session::new(options, &diag, &diag);
    assert_eq!(
        session.run("fun f() { var a = 1; } for (var i = 0; i < 10; i = i + 1) f();"),
        Ok(())
    );
    assert!(session.interpreter().live_environments() > 20);

    let swept = session.interpreter_mut().collect_garbage();
    assert!(swept > 20);
    assert_eq!(session.interpreter().live_environments(), 1);
}

#[test]
fn test_collect_garbage_keeps_closures() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(
        session.run("fun make() { var kept = 1; fun get() { return kept; } return get; } var g = make();"),
        Ok(())
    );
    session.interpreter_mut().collect_garbage();
    assert_eq!(session.interpreter().live_environments(), 2);

    assert_eq!(session.run("g = nil;"), Ok(()));
    session.interpreter_mut().collect_garbage();
    assert_eq!(session.interpreter().live_environments(), 1);
}

#[test]
fn test_periodic_collection_bounds_environments() {
    let diag = BufferEmitter::new();
    let options = Options {
        collect_threshold: 2,
        ..Options::default()
    };
    let mut session = Session::new(options, &diag, &diag);
    assert_eq!(
        session.run("fun f() { var a = 1; } for (var i = 0; i < 100; i = i + 1) f();"),
        Ok(())
    );
    assert!(session.interpreter().live_environments() < 10);
}

#[test]
fn test_collection_without_calls_bounds_environments() {
    let diag = BufferEmitter::new();
    let mut session = Session::new(Options::default(), &diag, &diag);
    assert_eq!(
        session.run("for (var i = 0; i < 1000; i = i + 1) { var t = i; }"),
        Ok(())
    );
    assert_eq!(diag.diagnostics(), Vec::<String>::new());
    assert!(session.interpreter().live_environments() < 40);
}

#[test]
fn test_deep_recursion() {
    let source = "
        fun f(n) { if (n == 0) return 0; return f(n - 1) + 1; }
        print f(10000);
    ";
    assert_eq!(run_ok(source), "10000\n");
}

#[test]
fn test_deeply_nested_source() {
    let depth = 3000;
    let parens = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(run_ok(&parens), "1\n");

    let blocks = format!("{}print 2;{}", "{".repeat(depth), "}".repeat(depth));
    assert_eq!(run_ok(&blocks), "2\n");

    let negations = format!("print {}1;", "-".repeat(depth + 1));
    assert_eq!(run_ok(&negations), "-1\n");
}

#[test]
fn test_number_rendering() {
    assert_eq!(run_ok("print 1000000 * 1000000 * 1000000 * 1000;"), "1e+21\n");
    assert_eq!(run_ok("print 0 / 0; print 1 / 0; print -1 / 0;"), "nan\ninf\n-inf\n");
    assert_eq!(run_ok("print 0.0001; print 0.00001;"), "0.0001\n1e-05\n");
    assert_eq!(run_ok("print 123456789; print 2.5; print -0.5;"), "123456789\n2.5\n-0.5\n");
}
