//! Kernel configuration.

use std::ffi::OsString;

/// Default size of a single read from a child process.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Settings that shape how stages are executed.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Run processes on a pseudo-terminal, combining stdout and stderr.
    pub pty: bool,

    /// Bytes requested per read from a child process.
    pub read_chunk_size: usize,

    /// Directories searched for executables. `None` uses `$PATH`.
    pub search_path: Option<OsString>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pty: false,
            read_chunk_size: DEFAULT_READ_CHUNK,
            search_path: None,
        }
    }
}

impl KernelConfig {
    /// Interactive use: processes see a terminal.
    pub fn repl() -> Self {
        Self {
            pty: true,
            ..Self::default()
        }
    }

    /// No executable is ever found, so words never start processes.
    pub fn isolated() -> Self {
        Self {
            search_path: Some(OsString::new()),
            ..Self::default()
        }
    }

    pub fn with_pty(mut self, pty: bool) -> Self {
        self.pty = pty;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }
}
