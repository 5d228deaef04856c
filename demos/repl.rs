use lambdaxp::builtinops::BUILTIN_NAMES;
use lambdaxp::session::Session;
use lambdaxp::{DEFAULT_DEPTH_LIMIT, DEFINITION_DEPTH_LIMIT};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;
use std::thread;

/// Stack size of the REPL thread, so that shallow evaluations never need to move to
/// a new stack segment
const EVAL_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Command-line settings
struct Options {
    load_files: Vec<String>,
    depth_limit: usize,
    trace: bool,
}

fn main() {
    let options = parse_args();

    let handle = thread::Builder::new()
        .name("lambdaxp-repl".into())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || run_repl(options));

    let result = match handle {
        Ok(handle) => handle.join(),
        Err(e) => {
            eprintln!("Could not start the REPL thread: {e}");
            process::exit(1);
        }
    };

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();

    let mut options = Options {
        load_files: Vec::new(),
        depth_limit: DEFAULT_DEPTH_LIMIT,
        // Enable tracing for debugging (set via env var LAMBDA_TRACE=1)
        trace: std::env::var("LAMBDA_TRACE")
            .map(|v| v == "1")
            .unwrap_or(false),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--load" => {
                if i + 1 < args.len() {
                    options.load_files.push(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("--load requires a file path");
                    process::exit(1);
                }
            }
            "--depth" => match args.get(i + 1).map(|n| n.parse::<usize>()) {
                Some(Ok(limit)) => {
                    options.depth_limit = limit;
                    i += 2;
                }
                _ => {
                    eprintln!("--depth requires a non-negative integer");
                    process::exit(1);
                }
            },
            "--help" | "-h" => {
                println!("Usage: repl [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  --load <file>    Run the `let` lines of a file before starting the REPL"
                );
                println!("  --depth <n>      Evaluation budget (default: {DEFAULT_DEPTH_LIMIT})");
                println!("  --help, -h       Show this help message");
                println!();
                println!("Environment variables:");
                println!("  LAMBDA_TRACE=1   Print every reduction step to stderr");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Try 'repl --help' for usage information.");
                process::exit(1);
            }
        }
    }

    options
}

fn run_repl(options: Options) {
    println!("LambdaXP Untyped Lambda Calculus Interpreter");
    println!("Enter terms like: (\\x,y.x) a b");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut session = Session::new()
        .with_depth_limit(options.depth_limit)
        .with_trace(options.trace);

    for path in &options.load_files {
        match session.load(path) {
            Ok(output) if !output.is_empty() => println!("{output}"),
            Ok(_) => {}
            Err(e) => println!("Error: {e}"),
        }
    }

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize REPL: {e}");
            process::exit(1);
        }
    };

    loop {
        match rl.readline("λ> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match session.execute(line) {
                    Ok(output) if !output.is_empty() => println!("{output}"),
                    Ok(_) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Untyped lambda calculus with normal-order reduction:");
    println!("  :help          - Show this help message");
    println!("  :names         - List all definitions");
    println!("  :name NAME     - Show one definition");
    println!("  :undef NAME    - Remove a definition");
    println!("  :load FILE     - Run the `let` lines of FILE");
    println!("  :quit, :exit   - Exit the interpreter");
    println!("  Ctrl+C         - Exit the interpreter");
    println!();
    println!("Definitions:");
    println!("  let NAME = EXPR    - store EXPR as written");
    println!("  let NAME := EXPR   - store EXPR with defined names expanded");
    println!(
        "  let NAME ::= EXPR  - store the normal form of EXPR (budget {DEFINITION_DEPTH_LIMIT})"
    );
    println!();
    println!("Syntax:");
    println!("  \\x.BODY            abstraction; \\x,y.BODY is \\x.\\y.BODY");
    println!("  f a b              application, left-associative");
    println!("  %                  result of the last evaluation");
    println!();
    println!("Builtins:");
    println!("  {}", BUILTIN_NAMES.join(" "));
    println!();
    println!("Examples:");
    println!("  let zero = \\f,x.x");
    println!("  let succ = \\n,f,x.f (n f x)");
    println!("  succ (succ zero)");
    println!("  _Successor (_Successor _Zero)");
    println!();
}
