//! How a finished stream should be consumed.

use std::fmt;

use crate::stream::{self, Stream};
use crate::Error;

/// Printing strategy chosen by the line itself (`:`, `: N`, `> file`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintMode {
    /// Interactive pull. With `full` set, print everything without asking.
    Pull { full: bool },
    /// Keep only the last `window` lines on screen, redrawing in place.
    Slice { window: usize },
    /// Write each element's raw form to the named file.
    WriteFile { name: String },
}

impl PrintMode {
    /// Largest `: N` window; wider requests are clamped to it.
    pub const MAX_WINDOW: usize = 1024;
}

impl Default for PrintMode {
    fn default() -> Self {
        PrintMode::Pull { full: false }
    }
}

/// The result of parsing one line: a stream plus how to print it.
pub struct PrintableStream {
    pub stream: Stream,
    pub mode: PrintMode,
}

impl PrintableStream {
    pub fn new(stream: Stream, mode: PrintMode) -> Self {
        Self { stream, mode }
    }

    /// A stream holding a single error, printed the default way.
    pub fn failed(error: Error) -> Self {
        Self::new(stream::fail(error), PrintMode::default())
    }
}

impl fmt::Debug for PrintableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintableStream")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
