//! prepend: Emit the arguments, then pass the input through.

use stsh_types::Stream;

use super::{Builtin, BuiltinCall};

pub struct Prepend;

impl Builtin for Prepend {
    fn name(&self) -> &'static str {
        "prepend"
    }

    fn run(&self, call: &BuiltinCall, input: Stream) -> Stream {
        Box::new(call.arg_stream().chain(input))
    }
}
