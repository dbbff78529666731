//! stream-shell REPL: an interactive loop around the stream kernel.
//!
//! It handles:
//! - Line editing and persisted history via rustyline
//! - Printing each line's stream in the mode the line asked for
//! - Ctrl-C during evaluation, which stops sleeping sources and processes
//! - The startup script run before the first prompt

pub mod config;
pub mod env;
pub mod printer;

use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

use stsh_kernel::{Environment, ExecContext, StreamParser};

use crate::config::ReplConfig;
use crate::env::ProdEnv;
use crate::printer::{PrintOutcome, Printer, Prompt};

/// A parser over the production environment plus a printer on stdio.
pub struct Repl {
    parser: StreamParser,
    env: Rc<ProdEnv>,
    paging: bool,
}

impl Repl {
    pub fn new(config: &ReplConfig) -> Self {
        let env = Rc::new(ProdEnv::new());
        let ctx = ExecContext::new(env.clone()).with_config(config.kernel_config());
        Self {
            parser: StreamParser::with_context(ctx),
            env,
            paging: true,
        }
    }

    /// Print every element without asking, as scripts and `-c` do.
    pub fn without_paging(mut self) -> Self {
        self.paging = false;
        self
    }

    pub fn env(&self) -> &ProdEnv {
        &self.env
    }

    /// Evaluate one line, printing to stdout and stderr.
    pub fn process_line(&self, line: &str, prompt: &mut dyn Prompt) -> Result<PrintOutcome> {
        self.env.interrupt().reset();
        let printable = self.parser.parse_line(line);
        let mut printer = Printer::new(io::stdout().lock(), io::stderr().lock()).with_paging(self.paging);
        printer.print(printable, prompt)
    }

    /// Evaluate a line for its side effects only.
    pub fn drain_line(&self, line: &str) {
        stsh_types::stream::drain(self.parser.parse_line(line).stream);
    }

    /// Evaluate one line without a prompt to page with.
    pub fn run_line(&self, line: &str) -> Result<PrintOutcome> {
        self.process_line(line, &mut NoPrompt)
    }

    /// Run each line of a script in order. Stops at the first failing line.
    pub fn run_script(&self, source: &str) -> Result<PrintOutcome> {
        for line in config::script_lines(source) {
            match self.run_line(line)? {
                PrintOutcome::Done => {}
                other => return Ok(other),
            }
        }
        Ok(PrintOutcome::Done)
    }

    /// Evaluate the startup script, if there is one.
    pub fn load_startup(&self, path: &Path) {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", path.display());
                return;
            }
        };
        for line in config::script_lines(&source) {
            self.drain_line(line);
        }
        tracing::debug!(path = %path.display(), "startup script loaded");
    }
}

/// Non-interactive runs never page.
struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask(&mut self, _message: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

impl Prompt for Editor<(), DefaultHistory> {
    fn ask(&mut self, message: &str) -> Result<Option<String>> {
        match self.readline(message) {
            Ok(answer) => Ok(Some(answer)),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to read answer: {e}")),
        }
    }
}

/// Route SIGINT to the interrupt while a line runs. At the prompt the
/// editor reads Ctrl-C as a key instead.
fn forward_interrupts(env: &ProdEnv) -> Result<()> {
    let interrupt = env.interrupt();
    let mut signals = Signals::new([SIGINT]).context("Failed to register SIGINT handler")?;
    std::thread::Builder::new()
        .name("stsh-sigint".to_string())
        .spawn(move || {
            for _ in signals.forever() {
                tracing::debug!("interrupt received");
                interrupt.trigger();
            }
        })
        .context("Failed to start signal thread")?;
    Ok(())
}

/// Lines typed in earlier sessions. A first run has none.
fn restore_history(rl: &mut Editor<(), DefaultHistory>, path: &Path) {
    match rl.load_history(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "history restored"),
        Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "history not restored: {e}"),
    }
}

fn persist_history(rl: &mut Editor<(), DefaultHistory>, path: &Path) {
    let saved = match path.parent() {
        Some(dir) => std::fs::create_dir_all(dir).map_err(anyhow::Error::from),
        None => Ok(()),
    }
    .and_then(|()| rl.save_history(path).map_err(anyhow::Error::from));
    if let Err(e) = saved {
        tracing::warn!(path = %path.display(), "history not saved: {e}");
    }
}

/// Run the interactive REPL. Returns the code passed to `exit`, if any.
pub fn run() -> Result<Option<i32>> {
    let config = ReplConfig::load();
    let repl = Repl::new(&config);
    if let Some(path) = config::startup_script_path() {
        repl.load_startup(&path);
    }
    forward_interrupts(repl.env())?;

    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;

    let history_path = config.history.then(config::history_path).flatten();
    if let Some(path) = &history_path {
        restore_history(&mut rl, path);
    }

    let mut exit_code = None;
    loop {
        match rl.readline(&config.prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }
                match repl.process_line(&line, &mut rl) {
                    Ok(PrintOutcome::Exit(code)) => {
                        exit_code = Some(code);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => eprintln!("error: {e:#}"),
                }
            }
            // Ctrl-C at the prompt discards the line
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        persist_history(&mut rl, path);
    }
    io::stdout().flush().ok();
    Ok(exit_code)
}
