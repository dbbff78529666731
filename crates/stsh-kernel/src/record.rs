//! Record literals: `{ name: 'Ada', langs: ['en', 'fr'] }`.
//!
//! The operands collected between the braces are rendered back into JSON
//! text and parsed as one value. Bare words become JSON strings, so keys and
//! simple string values need no quotes. Punctuation words pass through as-is.
//! A record that mentions a variable or a stream is rebuilt on every
//! evaluation.

use stsh_types::{Error, Value};

use crate::context::ExecContext;
use crate::eval;
use crate::operand::{Deferred, Operand};
use crate::scope::Scope;

/// Words copied verbatim into the JSON text.
const PUNCTUATION: [&str; 7] = [":", ",", "[", "]", "{", "}", "-"];

/// Whether an operand is a punctuation word inside a record.
pub fn is_punctuation(operand: &Operand) -> bool {
    operand
        .word()
        .is_some_and(|w| PUNCTUATION.contains(&w))
}

/// Build the record value, or a deferred rebuild if it depends on a scope.
pub fn build(ctx: &ExecContext, scope: &Scope, operands: Vec<Operand>) -> Result<Operand, Error> {
    let fixed = operands.iter().all(|operand| match operand {
        Operand::Value(_) => true,
        Operand::Word(w) => !scope.is_var_path(w),
        _ => false,
    });
    if fixed {
        return Ok(Operand::Value(parse(ctx, scope, &operands)?));
    }

    let ctx = ctx.clone();
    Ok(Operand::Deferred(Deferred::new(move |scope| {
        Ok(Operand::Value(parse(&ctx, scope, &operands)?))
    })))
}

fn parse(ctx: &ExecContext, scope: &Scope, operands: &[Operand]) -> Result<Value, Error> {
    let text = render(ctx, scope, operands)?;
    Value::from_json_str(&text)
}

/// Render record contents as JSON object text.
fn render(ctx: &ExecContext, scope: &Scope, operands: &[Operand]) -> Result<String, Error> {
    let mut text = String::from("{");
    for (i, operand) in operands.iter().enumerate() {
        let is_key = operands.get(i + 1).and_then(Operand::word) == Some(":");
        match operand {
            Operand::Word(w) if PUNCTUATION.contains(&w.as_str()) => text.push_str(w),
            Operand::Word(w) if is_key => text.push_str(&serde_json::Value::from(w.as_str()).to_string()),
            Operand::Value(v) => text.push_str(&v.to_json_string()),
            other => {
                let mut values = eval::to_values(ctx, scope, other.clone())?;
                let json = if values.len() == 1 {
                    values.remove(0).to_json()
                } else {
                    serde_json::Value::Array(values.iter().map(Value::to_json).collect())
                };
                text.push_str(&json.to_string());
            }
        }
    }
    text.push('}');
    Ok(text)
}
