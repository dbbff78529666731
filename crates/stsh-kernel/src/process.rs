//! External programs as stream sources.
//!
//! A child's output is read in fixed-size chunks, each surfaced as one string
//! value. Chunk boundaries are not line boundaries, but a multi-byte UTF-8
//! character split across two reads is held back until it is complete.
//!
//! In pipe mode stdout is captured and stderr goes straight to the
//! terminal. In pty mode both are attached to a pseudo-terminal so programs
//! behave as they would interactively; the kernel reads the master side.
//!
//! Once output ends the child is waited for. A non-zero exit becomes a final
//! `ExecNonZeroStatus` element. Dropping the stream early kills and reaps
//! the child.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use stsh_types::{stream, Error, Stream, Value};

use crate::config::KernelConfig;
use crate::interrupt::Interrupt;

/// Find the executable a command word refers to.
///
/// Words containing a `/` are taken as paths. Anything else is searched in
/// `search_path`, falling back to `$PATH`.
pub fn resolve_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }

    let dirs = search_path
        .map(OsString::from)
        .or_else(|| std::env::var_os("PATH"))?;
    std::env::split_paths(&dirs)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Start `program` and stream its output.
///
/// Spawn failures are reported as the stream's only element.
pub fn spawn(program: &Path, args: &[String], config: &KernelConfig, interrupt: Interrupt) -> Stream {
    match ChildStream::start(program, args, config, interrupt) {
        Ok(child) => Box::new(child),
        Err(e) => stream::fail(e),
    }
}

/// Output of a running child process.
struct ChildStream {
    child: Option<Child>,
    /// `None` once the output has ended.
    reader: Option<Box<dyn Read>>,
    pty: bool,
    chunk_size: usize,
    carry: Vec<u8>,
    interrupt: Interrupt,
}

impl ChildStream {
    fn start(
        program: &Path,
        args: &[String],
        config: &KernelConfig,
        interrupt: Interrupt,
    ) -> Result<Self, Error> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());

        let (child, reader): (Child, Box<dyn Read>) = if config.pty {
            let pty = nix::pty::openpty(None, None).map_err(|e| Error::ExecPipe(e.to_string()))?;
            let stderr = pty
                .slave
                .try_clone()
                .map_err(|e| Error::ExecPipe(e.to_string()))?;
            command
                .stdout(Stdio::from(pty.slave))
                .stderr(Stdio::from(stderr));
            let child = command.spawn().map_err(|e| spawn_error(program, e))?;
            // Our copies of the slave must close, or reading the master never
            // reports the end of output.
            drop(command);
            (child, Box::new(File::from(pty.master)))
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::inherit());
            let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::ExecPipe("stdout was not captured".to_string()))?;
            (child, Box::new(stdout))
        };

        tracing::debug!(program = %program.display(), ?args, pid = child.id(), pty = config.pty, "spawned process");
        Ok(Self {
            child: Some(child),
            reader: Some(reader),
            pty: config.pty,
            chunk_size: config.read_chunk_size.max(1),
            carry: Vec::new(),
            interrupt,
        })
    }

    /// Wait for the child once its output has ended.
    fn reap(&mut self) -> Option<Result<Value, Error>> {
        let mut child = self.child.take()?;
        match child.wait() {
            Ok(status) if status.success() => {
                tracing::debug!(pid = child.id(), "process exited");
                None
            }
            Ok(status) => {
                let code = status
                    .code()
                    .or_else(|| status.signal().map(|signal| 128 + signal))
                    .unwrap_or(1);
                tracing::debug!(pid = child.id(), code, "process failed");
                Some(Err(Error::ExecNonZeroStatus(code)))
            }
            Err(e) => Some(Err(Error::ExecRead(e.to_string()))),
        }
    }

    fn kill(&mut self) {
        self.reader = None;
        self.carry.clear();
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
            tracing::debug!(pid = child.id(), "process killed");
        }
    }

    /// Whether a read error just means the pty's other side closed.
    fn is_pty_hangup(&self, e: &io::Error) -> bool {
        self.pty && e.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
    }
}

impl Iterator for ChildStream {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.interrupt.is_triggered() {
                self.kill();
                return None;
            }

            let Some(reader) = self.reader.as_mut() else {
                if !self.carry.is_empty() {
                    let rest = std::mem::take(&mut self.carry);
                    return Some(Ok(Value::string(String::from_utf8_lossy(&rest).into_owned())));
                }
                return self.reap();
            };

            let mut buf = vec![0; self.chunk_size];
            match reader.read(&mut buf) {
                Ok(0) => self.reader = None,
                Ok(n) => {
                    let text = decode_chunk(&mut self.carry, &buf[..n]);
                    if !text.is_empty() {
                        return Some(Ok(Value::string(text)));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if self.is_pty_hangup(&e) => self.reader = None,
                Err(e) => {
                    self.kill();
                    return Some(Err(Error::ExecRead(e.to_string())));
                }
            }
        }
    }
}

impl Drop for ChildStream {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_error(program: &Path, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            Error::Exec(format!("{}: {e}", program.display()))
        }
        _ => Error::ExecFork(e.to_string()),
    }
}

/// Append `chunk` to `carry` and return the longest decodable prefix.
///
/// An incomplete character at the end stays in `carry`; invalid bytes are
/// replaced.
fn decode_chunk(carry: &mut Vec<u8>, chunk: &[u8]) -> String {
    carry.extend_from_slice(chunk);
    let mut text = String::new();
    let mut done = 0;
    while done < carry.len() {
        match std::str::from_utf8(&carry[done..]) {
            Ok(valid) => {
                text.push_str(valid);
                done = carry.len();
            }
            Err(e) => {
                let valid_end = done + e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&carry[done..valid_end]));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        done = valid_end + len;
                    }
                    None => {
                        done = valid_end;
                        break;
                    }
                }
            }
        }
    }
    carry.drain(..done);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_holds_back_split_characters() {
        let mut carry = Vec::new();
        let snowman = "☃".as_bytes();
        assert_eq!(decode_chunk(&mut carry, &[b'a', snowman[0]]), "a");
        assert_eq!(carry, vec![snowman[0]]);
        assert_eq!(decode_chunk(&mut carry, &snowman[1..]), "☃");
        assert!(carry.is_empty());
    }

    #[test]
    fn decode_replaces_invalid_bytes() {
        let mut carry = Vec::new();
        assert_eq!(decode_chunk(&mut carry, &[0xff, b'a']), "\u{fffd}a");
        assert!(carry.is_empty());
    }

    #[test]
    fn decode_keeps_split_characters_after_invalid_bytes() {
        let mut carry = Vec::new();
        let snowman = "☃".as_bytes();
        assert_eq!(decode_chunk(&mut carry, &[0xff, b'a', snowman[0], snowman[1]]), "\u{fffd}a");
        assert_eq!(carry, snowman[..2].to_vec());
        assert_eq!(decode_chunk(&mut carry, &snowman[2..]), "☃");
        assert!(carry.is_empty());
    }

    #[test]
    fn resolve_searches_the_given_path() {
        assert_eq!(
            resolve_executable("sh", Some(OsStr::new("/nonexistent:/bin"))),
            Some(PathBuf::from("/bin/sh"))
        );
        assert_eq!(resolve_executable("sh", Some(OsStr::new(""))), None);
        assert_eq!(resolve_executable("definitely-not-a-program", None), None);
    }

    #[test]
    fn resolve_takes_paths_literally() {
        assert_eq!(resolve_executable("/bin/sh", Some(OsStr::new(""))), Some(PathBuf::from("/bin/sh")));
        assert_eq!(resolve_executable("./no/such/thing", None), None);
        assert_eq!(resolve_executable("/etc", None), None);
    }

    #[test]
    fn spawn_failures_are_elements() {
        let config = KernelConfig::default();
        let mut out = spawn(Path::new("/no/such/program"), &[], &config, Interrupt::new());
        assert!(matches!(out.next(), Some(Err(Error::Exec(_)))));
        assert!(out.next().is_none());
    }
}
