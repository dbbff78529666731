//! Printing parsed lines.
//!
//! A [`PrintableStream`] carries the mode the line asked for. Strings print
//! raw, everything else as compact JSON, one element per line. The first
//! error ends printing with a single `error: <kind>: <detail>` line on the
//! error writer.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use stsh_types::{Error, PrintMode, PrintableStream, Stream, Value};

/// Asks the user whether to keep pulling.
pub trait Prompt {
    /// Show `message` and read an answer. `None` means the user closed input.
    fn ask(&mut self, message: &str) -> Result<Option<String>>;
}

/// How a printed line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    /// The stream ended, or the user stopped pulling.
    Done,
    /// An error was printed.
    Failed,
    /// `exit` was evaluated.
    Exit(i32),
}

const NEXT_PROMPT: &str = "Next [Enter] ";
const CURSOR_UP_ERASE: &str = "\x1b[A\x1b[K";

/// Writes streams to an output and an error writer.
pub struct Printer<W, E> {
    out: W,
    err: E,
    paging: bool,
}

impl<W: Write, E: Write> Printer<W, E> {
    pub fn new(out: W, err: E) -> Self {
        Self {
            out,
            err,
            paging: true,
        }
    }

    /// Without paging, the default pull mode prints everything unasked.
    pub fn with_paging(mut self, paging: bool) -> Self {
        self.paging = paging;
        self
    }

    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }

    pub fn print(&mut self, printable: PrintableStream, prompt: &mut dyn Prompt) -> Result<PrintOutcome> {
        let PrintableStream { stream, mode } = printable;
        let outcome = match mode {
            PrintMode::Pull { full } if full || !self.paging => self.print_all(stream)?,
            PrintMode::Pull { .. } => self.print_paged(stream, prompt)?,
            PrintMode::Slice { window } => self.print_window(stream, window)?,
            PrintMode::WriteFile { name } => self.write_file(stream, &name)?,
        };
        self.out.flush().context("Failed to flush output")?;
        Ok(outcome)
    }

    fn print_all(&mut self, stream: Stream) -> Result<PrintOutcome> {
        for item in stream {
            match item {
                Ok(value) => self.line(&value)?,
                Err(e) => return self.fail(e),
            }
        }
        Ok(PrintOutcome::Done)
    }

    /// One element, then one more per empty answer. `:` prints the rest.
    fn print_paged(&mut self, mut stream: Stream, prompt: &mut dyn Prompt) -> Result<PrintOutcome> {
        let mut first = true;
        loop {
            if !first {
                self.out.flush().context("Failed to flush output")?;
                match prompt.ask(NEXT_PROMPT)?.as_deref().map(str::trim) {
                    Some("") => {}
                    Some(":") => return self.print_all(stream),
                    _ => return Ok(PrintOutcome::Done),
                }
            }
            first = false;
            match stream.next() {
                None => return Ok(PrintOutcome::Done),
                Some(Ok(value)) => self.line(&value)?,
                Some(Err(e)) => return self.fail(e),
            }
        }
    }

    /// Keep the last `window` lines on screen, redrawing them in place.
    fn print_window(&mut self, stream: Stream, window: usize) -> Result<PrintOutcome> {
        let window = window.clamp(1, PrintMode::MAX_WINDOW);
        let mut shown: VecDeque<String> = VecDeque::new();
        let mut drawn = 0usize;
        for item in stream {
            let value = match item {
                Ok(value) => value,
                Err(e) => return self.fail(e),
            };
            for line in value.render().lines() {
                if shown.len() == window {
                    shown.pop_front();
                }
                shown.push_back(line.to_string());
            }
            for _ in 0..drawn {
                write!(self.out, "{CURSOR_UP_ERASE}")?;
            }
            for line in &shown {
                writeln!(self.out, "{line}")?;
            }
            drawn = shown.len();
            self.out.flush()?;
        }
        Ok(PrintOutcome::Done)
    }

    /// Raw element bytes, no separators.
    fn write_file(&mut self, stream: Stream, name: &str) -> Result<PrintOutcome> {
        let mut file = File::create(name).with_context(|| format!("Failed to create {name}"))?;
        for item in stream {
            match item {
                Ok(value) => file
                    .write_all(&value.to_bytes())
                    .with_context(|| format!("Failed to write {name}"))?,
                Err(e) => return self.fail(e),
            }
        }
        file.flush().with_context(|| format!("Failed to write {name}"))?;
        Ok(PrintOutcome::Done)
    }

    fn line(&mut self, value: &Value) -> Result<()> {
        writeln!(self.out, "{}", value.render()).context("Failed to write output")
    }

    fn fail(&mut self, error: Error) -> Result<PrintOutcome> {
        if let Error::Exit(code) = error {
            return Ok(PrintOutcome::Exit(code));
        }
        self.out.flush().context("Failed to flush output")?;
        writeln!(self.err, "error: {}: {error}", error.kind()).context("Failed to write error")?;
        Ok(PrintOutcome::Failed)
    }
}
