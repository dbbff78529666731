//! echo: Emit the arguments as one config struct.

use serde_json::Value as Json;
use stsh_types::{stream, Stream, Value};

use super::{Builtin, BuiltinCall};

/// Ignores its input.
pub struct Echo;

impl Builtin for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(&self, call: &BuiltinCall, _input: Stream) -> Stream {
        match call.config() {
            Ok(config) => stream::once(Value::Json(Json::Object(config))),
            Err(e) => stream::fail(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecContext;
    use crate::env::MemoryEnv;
    use crate::operand::Operand;
    use crate::scope::Scope;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn builds_a_struct() {
        let ctx = ExecContext::new(Rc::new(MemoryEnv::new()));
        let args = vec![
            Operand::Word("hello".into()),
            Operand::Value(Value::Json(json!({"loud": true}))),
        ];
        let call = BuiltinCall::new(ctx, Scope::default(), args);
        let out = stream::collect(Echo.run(&call, stream::empty())).unwrap();
        assert_eq!(out, vec![Value::Json(json!({"@": ["hello"], "loud": true}))]);
    }
}
