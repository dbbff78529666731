//! REPL configuration.
//!
//! Settings are read from `$XDG_CONFIG_HOME/stream-shell/config.toml`. The
//! startup script `config.st` in the same directory is evaluated before the
//! first prompt.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use stsh_kernel::KernelConfig;
use stsh_kernel::config::DEFAULT_READ_CHUNK;

const APP_DIR: &str = "stream-shell";

/// Settings for an interactive session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Prompt shown before each line.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Run processes on a pseudo-terminal, merging stderr into the stream.
    #[serde(default)]
    pub pty: bool,

    /// Bytes per process read, and so the largest chunk a process emits.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Persist line history between sessions.
    #[serde(default = "default_history")]
    pub history: bool,
}

fn default_prompt() -> String {
    format!("stream-shell v{} 🚀> ", env!("CARGO_PKG_VERSION"))
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK
}

fn default_history() -> bool {
    true
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            pty: false,
            read_chunk_size: default_read_chunk_size(),
            history: default_history(),
        }
    }
}

impl ReplConfig {
    /// Load from the default path. A missing file gives the defaults, and
    /// so does a malformed one, after a warning.
    pub fn load() -> Self {
        let Some(path) = config_dir().map(|dir| dir.join("config.toml")) else {
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("{e:#}; using default settings");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// The kernel settings these options select.
    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig::default()
            .with_pty(self.pty)
            .with_read_chunk_size(self.read_chunk_size)
    }
}

/// `$XDG_CONFIG_HOME/stream-shell`
pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|d| d.config_dir().join(APP_DIR))
}

/// `$XDG_DATA_HOME/stream-shell`
pub fn data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|d| d.data_dir().join(APP_DIR))
}

pub fn history_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("history.txt"))
}

pub fn startup_script_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.st"))
}

/// Lines of a script worth evaluating: blank lines, comments and a leading
/// shebang are dropped.
pub fn script_lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ReplConfig::default();
        assert!(config.prompt.starts_with("stream-shell v"));
        assert!(!config.pty);
        assert_eq!(config.read_chunk_size, 4096);
        assert!(config.history);
    }

    #[test]
    fn partial_files_keep_other_defaults() {
        let config: ReplConfig = toml::from_str("pty = true\nprompt = '> '").unwrap();
        assert_eq!(config.prompt, "> ");
        assert!(config.pty);
        assert_eq!(config.read_chunk_size, 4096);
        assert!(config.history);
    }

    #[test]
    fn load_from_reports_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pty = 'maybe'").unwrap();
        let err = ReplConfig::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn kernel_config_follows_settings() {
        let config = ReplConfig {
            pty: true,
            read_chunk_size: 16,
            ..ReplConfig::default()
        };
        let kernel = config.kernel_config();
        assert!(kernel.pty);
        assert_eq!(kernel.read_chunk_size, 16);
        assert!(kernel.search_path.is_none());
    }

    #[test]
    fn script_lines_skip_noise() {
        let source = "#!/usr/bin/env stsh\n\n$x = 1..3\n  # comment\n$x | add 1\n";
        assert_eq!(script_lines(source).collect::<Vec<_>>(), vec!["$x = 1..3", "$x | add 1"]);
    }
}
