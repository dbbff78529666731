//! exit: End the session.
//!
//! The exit request travels as an error element so it stops whatever is
//! consuming the stream; the REPL turns it into a process exit code.

use stsh_types::{stream, Error, Stream};

use super::{Builtin, BuiltinCall};

pub struct Exit;

impl Builtin for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn run(&self, call: &BuiltinCall, _input: Stream) -> Stream {
        let code = match call.values() {
            Ok(values) => values
                .first()
                .and_then(|v| v.as_f64())
                .map(|n| n as i32)
                .unwrap_or(0),
            Err(e) => return stream::fail(e),
        };
        stream::fail(Error::Exit(code))
    }
}
