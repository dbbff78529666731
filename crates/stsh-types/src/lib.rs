//! Pure data types for stream-shell: values, errors, streams and print modes.
//!
//! This crate is a leaf dependency with no parser and no I/O. The kernel
//! produces these types and the REPL consumes them, so embedders can print or
//! inspect streams without depending on the evaluator.

pub mod error;
pub mod print;
pub mod stream;
pub mod value;

pub use error::Error;
pub use print::{PrintMode, PrintableStream};
pub use stream::{Stream, StreamFactory};
pub use value::{TypedValue, Value, ValueKind};
