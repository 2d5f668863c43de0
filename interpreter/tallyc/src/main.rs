//! Tally interpreter CLI.
//!
//! With no script arguments and a terminal on stdin this runs the
//! interactive shell; otherwise it evaluates `-e` expressions and
//! script files in order and exits with the error category's code on
//! the first failure.

use std::io::{self, BufRead, IsTerminal, Write};

use tally_diagnostic::LineIndex;
use tally_eval::{Displayer, ModeSetting, Session, StdHost, Value};
use tracing_subscriber::EnvFilter;

struct Options {
    expressions: Vec<String>,
    files: Vec<String>,
    positionals: Vec<String>,
    quiet: bool,
    rational: bool,
    results_only: bool,
    precision: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    std::process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            print_usage();
            return 1;
        }
    };

    let mut session = Session::new(Displayer::console(), Box::new(StdHost));
    session.set_positionals(
        options
            .positionals
            .iter()
            .map(|s| Value::string(s.clone()))
            .collect(),
    );
    let settings = session.settings_mut();
    if options.quiet {
        settings.seed_mode(ModeSetting::Quiet, true);
    }
    if options.results_only {
        settings.seed_mode(ModeSetting::ResultsOnly, true);
    }
    if options.rational {
        settings.seed_mode(ModeSetting::Rational, true);
    }
    if let Some(digits) = options.precision {
        settings.seed_precision(digits);
    }

    let batch = !options.expressions.is_empty() || !options.files.is_empty();
    if batch {
        run_batch(&mut session, &options)
    } else if io::stdin().is_terminal() {
        run_repl(&mut session)
    } else {
        // Piped input is a script too.
        let mut source = String::new();
        if let Err(e) = io::Read::read_to_string(&mut io::stdin().lock(), &mut source) {
            eprintln!("error reading stdin: {e}");
            return tally_diagnostic::Category::Io.exit_code();
        }
        run_source(&mut session, &source, "<stdin>")
    }
}

fn run_batch(session: &mut Session, options: &Options) -> i32 {
    for expr in &options.expressions {
        let code = run_source(session, expr, "<expression>");
        if code != 0 || session.quit_requested() {
            return code;
        }
    }
    for path in &options.files {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error reading {path}: {e}");
                return tally_diagnostic::Category::Io.exit_code();
            }
        };
        let code = run_source(session, &source, path);
        if code != 0 || session.quit_requested() {
            return code;
        }
    }
    0
}

fn run_source(session: &mut Session, source: &str, origin: &str) -> i32 {
    match session.process(source) {
        Ok(_) => 0,
        Err(diagnostic) => {
            let index = LineIndex::new(source);
            eprintln!("{origin}: {}", diagnostic.render(Some(&index)));
            diagnostic.category.exit_code()
        }
    }
}

fn run_repl(session: &mut Session) -> i32 {
    println!("Tally {}", tally_eval::VERSION);
    println!("Type expressions, or :quit to exit.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return 0;
        }
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                eprintln!("error reading input: {e}");
                return tally_diagnostic::Category::Io.exit_code();
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        // Errors are shown and the shell keeps going.
        if let Err(diagnostic) = session.process(&line) {
            let index = LineIndex::new(&line);
            eprintln!("{}", diagnostic.render_with_caret(&line, &index));
        }
        if session.quit_requested() {
            return 0;
        }
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        expressions: Vec::new(),
        files: Vec::new(),
        positionals: Vec::new(),
        quiet: false,
        rational: false,
        results_only: false,
        precision: None,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                options.positionals.extend(args[i + 1..].iter().cloned());
                break;
            }
            "-e" | "--expr" => {
                i += 1;
                let expr = args
                    .get(i)
                    .ok_or_else(|| format!("{arg} needs an expression"))?;
                options.expressions.push(expr.clone());
            }
            "-q" | "--quiet" => options.quiet = true,
            "-r" | "--rational" => options.rational = true,
            "--resultsonly" => options.results_only = true,
            "-p" | "--precision" => {
                i += 1;
                let digits = args
                    .get(i)
                    .ok_or_else(|| format!("{arg} needs a digit count"))?;
                options.precision =
                    Some(digits.parse().map_err(|_| {
                        format!("bad precision \"{digits}\"")
                    })?);
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("Tally {}", tally_eval::VERSION);
                std::process::exit(0);
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("unknown option \"{arg}\""));
            }
            _ => options.files.push(arg.clone()),
        }
        i += 1;
    }
    Ok(options)
}

fn print_usage() {
    println!("Tally {}", tally_eval::VERSION);
    println!();
    println!("Usage: tally [options] [files...] [-- args...]");
    println!();
    println!("With no files and a terminal, starts the interactive shell.");
    println!("Arguments after -- become the script's $1, $2, ... values.");
    println!();
    println!("Options:");
    println!("  -e, --expr <text>      Evaluate an expression before any files");
    println!("  -p, --precision <n>    Decimal digits for inexact arithmetic");
    println!("  -r, --rational         Start in rational (exact fraction) mode");
    println!("  -q, --quiet            Suppress result echoing");
    println!("      --resultsonly      Print bare results without the source");
    println!("  -h, --help             Show this help message");
    println!("  -v, --version          Show version information");
    println!();
    println!("Examples:");
    println!("  tally");
    println!("  tally -e '2 + 3 * 4'");
    println!("  tally budget.tally -- 2026 Q3");
    println!("  tally -r -e '1/3 + 1/6'");
}
