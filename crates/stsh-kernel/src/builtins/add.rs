//! add: Add a number (or string) to every input value.

use stsh_types::{stream, Error, Stream, Value};

use super::{Builtin, BuiltinCall};
use crate::ops::{self, Op, Outcome};

pub struct Add;

impl Builtin for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn run(&self, call: &BuiltinCall, input: Stream) -> Stream {
        let amount = match call.values() {
            Ok(values) => match values.into_iter().next() {
                Some(amount) => amount,
                None => return stream::fail(Error::MissingOperand),
            },
            Err(e) => return stream::fail(e),
        };
        Box::new(input.map(move |item| {
            let value = item?;
            match ops::binary(Op::Add, &value, &amount)? {
                Outcome::Value(sum) => Ok(sum),
                Outcome::Stream(_) => Err(Error::InvalidOp),
            }
        }))
    }
}
