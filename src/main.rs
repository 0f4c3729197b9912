use std::process::ExitCode;
use std::sync::Once;

use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as ReplResult};

use lox::{Options, Session, StreamEmitter};

const USAGE: &str = "Usage: lox [--dump-ast] [script]";

const PROMPT: &str = "> ";
const PROMPT_CONT: &str = "..";
const INDENT: &str = "  ";

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}

fn main() -> ExitCode {
    init_tracing();

    let mut options = Options::from_env();
    let mut scripts = vec![];
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dump-ast" => options.dump_ast = true,
            _ => scripts.push(arg),
        }
    }

    match scripts.as_slice() {
        [] => match run_repl(options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err:?}");
                ExitCode::FAILURE
            }
        },
        [script] => run_script(script, options),
        _ => {
            eprintln!("{USAGE}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(filename: &str, options: Options) -> ExitCode {
    let source = match std::fs::read_to_string(filename) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read {filename}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let emitter = StreamEmitter;
    let mut session = Session::new(options, &emitter, &emitter);
    match session.run(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(%err, "script failed");
            ExitCode::FAILURE
        }
    }
}

fn prompt(depth: isize) -> String {
    if depth <= 0 {
        return PROMPT.to_string();
    }
    let mut text = PROMPT_CONT.to_string();
    for _ in 0..depth {
        text.push_str(INDENT);
    }
    text
}

fn run_repl(options: Options) -> ReplResult<()> {
    let mut rl = DefaultEditor::new()?;
    let emitter = StreamEmitter;
    let mut session = Session::new(options, &emitter, &emitter);
    let mut depth = 0;

    loop {
        match rl.readline(&prompt(depth)) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                depth = match session.add_source(&line) {
                    Ok(depth) => depth,
                    Err(_) => {
                        session.discard_pending();
                        0
                    }
                };
                // Wait for the rest of an unbalanced declaration.
                if depth > 0 {
                    continue;
                }
                // Errors are already reported; the next line starts fresh.
                let _ = session.run_pending();
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}
