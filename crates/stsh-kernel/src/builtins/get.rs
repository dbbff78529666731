//! get: Project a dotted field path out of each input value.

use stsh_types::{stream, Error, Stream, Value};

use super::{Builtin, BuiltinCall};
use crate::eval;

pub struct Get;

impl Builtin for Get {
    fn name(&self) -> &'static str {
        "get"
    }

    fn run(&self, call: &BuiltinCall, input: Stream) -> Stream {
        let path = match call.values() {
            Ok(values) => match values.first() {
                Some(path) => path.render(),
                None => return stream::fail(Error::MissingOperand),
            },
            Err(e) => return stream::fail(e),
        };
        Box::new(input.flat_map(move |item| match item {
            Ok(value) => match value.lookup(path.split('.')) {
                Some(found) => eval::value_stream(found),
                None => stream::empty(),
            },
            Err(e) => stream::fail(e),
        }))
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

    fn get(path: &str, input: Vec<Value>) -> Vec<Value> {
        let ctx = ExecContext::new(Rc::new(MemoryEnv::new()));
        let call = BuiltinCall::new(ctx, Scope::default(), vec![Operand::Word(path.into())]);
        stream::collect(Get.run(&call, stream::from_values(input))).unwrap()
    }

    #[test]
    fn projects_and_skips_missing() {
        let people = vec![
            Value::Json(json!({"name": "Ada", "address": {"city": "London"}})),
            Value::Json(json!({"name": "Grace"})),
        ];
        assert_eq!(get("address.city", people), vec![Value::string("London")]);
    }

    #[test]
    fn lists_expand() {
        let input = vec![Value::Json(json!({"tags": ["a", "b"]}))];
        assert_eq!(get("tags", input), vec![Value::string("a"), Value::string("b")]);
    }

    #[test]
    fn numeric_segments_index_lists() {
        let input = vec![Value::Json(json!({"tags": ["a", "b"]}))];
        assert_eq!(get("tags.1", input), vec![Value::string("b")]);
    }
}
