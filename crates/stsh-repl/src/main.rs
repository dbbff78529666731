//! stream-shell CLI entry point.
//!
//! Usage:
//!   stsh                      # Interactive REPL
//!   stsh -c <line>            # Evaluate one line and exit
//!   stsh script.st            # Run a script

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stsh_repl::config::ReplConfig;
use stsh_repl::printer::PrintOutcome;
use stsh_repl::Repl;

fn main() -> ExitCode {
    // Logs go to stderr; stdout belongs to the printer. Off unless RUST_LOG is set.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            let code = stsh_repl::run()?;
            Ok(code.map_or(ExitCode::SUCCESS, exit_code))
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!(
                "stsh {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("STSH_GIT_HASH"),
                env!("STSH_BUILD_DATE")
            );
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let line = args.get(2).context("-c requires a line to evaluate")?;
            let outcome = batch_repl().run_line(line)?;
            Ok(outcome_code(outcome))
        }

        Some(path) if !path.starts_with('-') => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script: {path}"))?;
            let outcome = batch_repl().run_script(&source)?;
            Ok(outcome_code(outcome))
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'stsh --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn batch_repl() -> Repl {
    Repl::new(&ReplConfig::load()).without_paging()
}

fn outcome_code(outcome: PrintOutcome) -> ExitCode {
    match outcome {
        PrintOutcome::Done => ExitCode::SUCCESS,
        PrintOutcome::Failed => ExitCode::FAILURE,
        PrintOutcome::Exit(code) => exit_code(code),
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_help() {
    println!(
        r#"stream-shell v{}

Usage:
  stsh                         Interactive REPL
  stsh -c <line>               Evaluate one line and exit
  stsh <script>                Run a script file, one line at a time

Options:
  -c <line>                    Evaluate a line and exit
  -h, --help                   Show this help
  -V, --version                Show version

Printing:
  expr                         Show one value, Enter for the next
  expr :                       Show every value
  expr : N                     Keep the last N lines on screen
  expr > file                  Write raw values to a file

Examples:
  stsh -c '1..3 | {{ x -> x * x }}'
  stsh -c 'ls -la | {{ add "!" }}'
  stsh -c 'now : 1'
"#,
        env!("CARGO_PKG_VERSION")
    );
}
