//! stsh-kernel: the core of stream-shell.
//!
//! This crate provides:
//!
//! - **Lexer**: splits a line into tokens with a small state machine
//! - **Parser**: a shunting-yard pass that builds lazy streams directly
//! - **Ops**: the precedence table and per-kind operator semantics
//! - **Eval**: applying operators to operands, streams and deferred values
//! - **Scope**: closure variables in a generation-stamped slot arena
//! - **Process**: external programs as stream sources, over pipes or a pty
//! - **Builtins**: `add`, `get`, `echo`, `args`, `now`, `prepend`, `exit`
//!
//! ```ignore
//! let parser = StreamParser::new(Rc::new(MemoryEnv::new()));
//! let out = parser.parse_line("1..3 | { i -> i * 2 }");
//! ```

pub mod builtins;
pub mod closure;
pub mod config;
pub mod context;
pub mod env;
pub mod eval;
pub mod flags;
pub mod interrupt;
pub mod lexer;
pub mod operand;
pub mod ops;
pub mod parser;
pub mod process;
pub mod record;
pub mod scope;

pub use builtins::{Builtin, BuiltinCall, BuiltinRegistry};
pub use config::KernelConfig;
pub use context::ExecContext;
pub use env::{Environment, MemoryEnv};
pub use interrupt::Interrupt;
pub use lexer::{tokenize, Spanned, Tokenizer};
pub use operand::Operand;
pub use parser::StreamParser;
pub use scope::Scope;
