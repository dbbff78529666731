//! args: Render the arguments as a command line.

use stsh_types::{stream, Stream, Value};

use super::{Builtin, BuiltinCall};
use crate::flags;

pub struct Args;

impl Builtin for Args {
    fn name(&self) -> &'static str {
        "args"
    }

    fn run(&self, call: &BuiltinCall, _input: Stream) -> Stream {
        match call.config() {
            Ok(config) => stream::once(Value::string(flags::to_args(&config).join(" "))),
            Err(e) => stream::fail(e),
        }
    }
}
