//! Turning operands into streams, strings and operator results.
//!
//! Operators are applied to operands, not values. Depending on what each
//! side is, the result is computed right away, mapped element-wise through
//! a stream, or deferred until the variables it reads are bound:
//!
//! - value op value: computed now
//! - stream op value, value op stream: mapped over the stream
//! - stream op stream: zipped pairwise
//! - anything reading a closure variable: deferred

use stsh_types::stream::{self, Stream, StreamFactory};
use stsh_types::{Error, Value};

use crate::context::ExecContext;
use crate::operand::{Deferred, Operand};
use crate::ops::{self, Op, Outcome};
use crate::scope::Scope;

/// An operand whose shape no longer depends on a scope.
enum Source {
    Known(Value),
    Lazy(StreamFactory),
}

/// Classify an operand for operator application. `None` means it reads a
/// variable and has to wait for a scope.
fn source(ctx: &ExecContext, scope: &Scope, operand: &Operand) -> Option<Source> {
    match operand {
        Operand::Value(v) => Some(Source::Known(v.clone())),
        Operand::Word(w) if scope.is_var_path(w) => None,
        Operand::Word(w) => Some(Source::Known(Value::string(w.as_str()))),
        Operand::Stream(f) => Some(Source::Lazy(f.clone())),
        Operand::StreamRef(name) => Some(Source::Lazy(ref_factory(ctx, scope, name))),
        Operand::Deferred(_) => None,
    }
}

/// Evaluate deferred operands and variable words until the operand no
/// longer needs a scope.
pub fn force(scope: &Scope, mut operand: Operand) -> Result<Operand, Error> {
    loop {
        operand = match operand {
            Operand::Deferred(d) => d.eval(scope)?,
            Operand::Word(w) => {
                return Ok(match scope.resolve_path(&w) {
                    Some(v) => Operand::Value(v),
                    None => Operand::Word(w),
                });
            }
            other => return Ok(other),
        };
    }
}

/// The stream an operand stands for. JSON lists expand into their elements.
pub fn to_stream(ctx: &ExecContext, scope: &Scope, operand: Operand) -> Stream {
    match operand {
        Operand::Value(v) => value_stream(v),
        Operand::Stream(f) => f(stream::empty()),
        Operand::StreamRef(name) => resolve_ref(ctx, scope, &name, stream::empty()),
        Operand::Word(w) => match scope.resolve_path(&w) {
            Some(v) => value_stream(v),
            None => stream::once(Value::string(w)),
        },
        Operand::Deferred(d) => match d.eval(scope) {
            Ok(resolved) => to_stream(ctx, scope, resolved),
            Err(e) => stream::fail(e),
        },
    }
}

/// A single value as a stream, expanding lists.
pub fn value_stream(value: Value) -> Stream {
    match value {
        Value::Json(serde_json::Value::Array(items)) => {
            stream::from_values(items.into_iter().map(Value::Json))
        }
        other => stream::once(other),
    }
}

/// Lazily concatenate the streams of several operands.
pub fn concat(ctx: &ExecContext, scope: &Scope, operands: Vec<Operand>) -> Stream {
    let ctx = ctx.clone();
    let scope = scope.clone();
    Box::new(
        operands
            .into_iter()
            .flat_map(move |operand| to_stream(&ctx, &scope, operand)),
    )
}

/// A factory that ignores its input and yields the operands' streams.
pub fn sequence(ctx: &ExecContext, scope: &Scope, operands: Vec<Operand>) -> StreamFactory {
    let ctx = ctx.clone();
    let scope = scope.clone();
    stream::factory(move |_input| concat(&ctx, &scope, operands.clone()))
}

/// Resolve `$name` and feed `input` to whatever it names.
///
/// Local overrides win over variables, which win over the environment.
pub fn resolve_ref(ctx: &ExecContext, scope: &Scope, name: &str, input: Stream) -> Stream {
    if let Some(factory) = scope.env_override(name) {
        return factory(input);
    }
    if let Some(value) = scope.resolve_path(name) {
        return value_stream(value);
    }
    if let Some(factory) = ctx.env.get(name) {
        return factory(input);
    }
    stream::fail(Error::InvalidStreamRef(name.to_string()))
}

/// A factory resolving `$name` each time it is invoked.
pub fn ref_factory(ctx: &ExecContext, scope: &Scope, name: &str) -> StreamFactory {
    let ctx = ctx.clone();
    let scope = scope.clone();
    let name = name.to_string();
    stream::factory(move |input| resolve_ref(&ctx, &scope, &name, input))
}

/// All values of an operand, stopping at the first error.
pub fn to_values(ctx: &ExecContext, scope: &Scope, operand: Operand) -> Result<Vec<Value>, Error> {
    stream::collect(to_stream(ctx, scope, operand))
}

/// The first value of an operand; an empty stream reads as null.
pub fn first_value(ctx: &ExecContext, scope: &Scope, operand: Operand) -> Result<Value, Error> {
    to_stream(ctx, scope, operand)
        .next()
        .unwrap_or_else(|| Ok(Value::null()))
}

/// String form of an operand, as passed to processes. Streams are
/// collected and joined with spaces.
pub fn to_string(ctx: &ExecContext, scope: &Scope, operand: Operand) -> Result<String, Error> {
    match operand {
        Operand::Value(v) => Ok(v.render()),
        Operand::Word(w) => Ok(scope.resolve_path(&w).map(|v| v.render()).unwrap_or(w)),
        other => {
            let values = to_values(ctx, scope, other)?;
            Ok(values.iter().map(Value::render).collect::<Vec<_>>().join(" "))
        }
    }
}

/// A backtick template. `$name` pieces (up to the next space) are replaced
/// by the string form of the stream they name.
pub fn interpolate(ctx: &ExecContext, template: &str) -> Operand {
    if !template.contains('$') {
        return Operand::value(template);
    }
    let ctx = ctx.clone();
    let template = template.to_string();
    Operand::Deferred(Deferred::new(move |scope| {
        let mut out = String::with_capacity(template.len());
        for (i, piece) in template.split(' ').enumerate() {
            if i > 0 {
                out.push(' ');
            }
            match piece.strip_prefix('$') {
                Some(name) if !name.is_empty() => {
                    let reference = Operand::StreamRef(name.to_string());
                    out.push_str(&to_string(&ctx, scope, reference)?);
                }
                _ => out.push_str(piece),
            }
        }
        Ok(Operand::value(out))
    }))
}

fn outcome_stream(outcome: Result<Outcome, Error>) -> Stream {
    match outcome {
        Ok(Outcome::Value(v)) => stream::once(v),
        Ok(Outcome::Stream(s)) => s,
        Err(e) => stream::fail(e),
    }
}

/// Map each value through `f`, flattening, and pass errors through.
fn flat_map_values<F>(input: Stream, mut f: F) -> Stream
where
    F: FnMut(Value) -> Stream + 'static,
{
    Box::new(input.flat_map(move |item| match item {
        Ok(v) => f(v),
        Err(e) => stream::fail(e),
    }))
}

fn failing(error: Error) -> Operand {
    Operand::Stream(stream::factory(move |_| stream::fail(error.clone())))
}

/// Apply a prefix or postfix operator to an operand.
pub fn apply_unary(ctx: &ExecContext, scope: &Scope, op: Op, operand: Operand) -> Operand {
    match source(ctx, scope, &operand) {
        Some(Source::Known(v)) => match ops::unary(op, &v) {
            Ok(Outcome::Value(result)) => Operand::Value(result),
            Ok(Outcome::Stream(_)) => Operand::Stream(stream::factory(move |_| {
                outcome_stream(ops::unary(op, &v))
            })),
            Err(e) => failing(e),
        },
        Some(Source::Lazy(f)) => Operand::Stream(stream::factory(move |_| {
            flat_map_values(f(stream::empty()), move |x| outcome_stream(ops::unary(op, &x)))
        })),
        None => {
            let ctx = ctx.clone();
            Operand::Deferred(Deferred::new(move |scope| {
                let operand = force(scope, operand.clone())?;
                Ok(apply_unary(&ctx, scope, op, operand))
            }))
        }
    }
}

/// Apply a binary value operator to two operands.
pub fn apply_binary(
    ctx: &ExecContext,
    scope: &Scope,
    op: Op,
    lhs: Operand,
    rhs: Operand,
) -> Operand {
    let (left, right) = match (source(ctx, scope, &lhs), source(ctx, scope, &rhs)) {
        (Some(left), Some(right)) => (left, right),
        _ => {
            let ctx = ctx.clone();
            return Operand::Deferred(Deferred::new(move |scope| {
                let lhs = force(scope, lhs.clone())?;
                let rhs = force(scope, rhs.clone())?;
                Ok(apply_binary(&ctx, scope, op, lhs, rhs))
            }));
        }
    };

    match (left, right) {
        (Source::Known(a), Source::Known(b)) => match ops::binary(op, &a, &b) {
            Ok(Outcome::Value(v)) => Operand::Value(v),
            Ok(Outcome::Stream(_)) => Operand::Stream(stream::factory(move |_| {
                outcome_stream(ops::binary(op, &a, &b))
            })),
            Err(e) => failing(e),
        },
        (Source::Lazy(f), Source::Known(b)) => Operand::Stream(stream::factory(move |_| {
            let b = b.clone();
            flat_map_values(f(stream::empty()), move |a| outcome_stream(ops::binary(op, &a, &b)))
        })),
        (Source::Known(a), Source::Lazy(g)) => Operand::Stream(stream::factory(move |_| {
            let a = a.clone();
            flat_map_values(g(stream::empty()), move |b| outcome_stream(ops::binary(op, &a, &b)))
        })),
        (Source::Lazy(f), Source::Lazy(g)) => Operand::Stream(stream::factory(move |_| {
            let pairs = f(stream::empty()).zip(g(stream::empty()));
            Box::new(pairs.flat_map(move |pair| match pair {
                (Ok(a), Ok(b)) => outcome_stream(ops::binary(op, &a, &b)),
                (Err(e), _) | (_, Err(e)) => stream::fail(e),
            })) as Stream
        })),
    }
}

/// `cond ? then : else`. A known condition picks a branch now; anything
/// else is decided per evaluation from the condition's first value.
///
/// An empty `then` branch makes this the coalescing `cond ?: else`: the
/// condition itself when it is truthy and error-free, otherwise `else`.
pub fn ternary(
    ctx: &ExecContext,
    scope: &Scope,
    cond: Operand,
    then_branch: Vec<Operand>,
    else_branch: Vec<Operand>,
) -> Vec<Operand> {
    let coalesce = then_branch.is_empty();
    if let Some(Source::Known(v)) = source(ctx, scope, &cond) {
        return match (v.is_truthy(), coalesce) {
            (true, true) => vec![Operand::Value(v)],
            (true, false) => then_branch,
            (false, _) => else_branch,
        };
    }

    let ctx = ctx.clone();
    vec![Operand::Deferred(Deferred::new(move |scope| {
        let chosen = match (first_value(&ctx, scope, cond.clone()), coalesce) {
            (Ok(v), true) if v.is_truthy() => return Ok(Operand::Value(v)),
            (Ok(v), false) if v.is_truthy() => then_branch.clone(),
            (Err(e), false) => return Err(e),
            _ => else_branch.clone(),
        };
        Ok(Operand::Stream(sequence(&ctx, scope, chosen)))
    }))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, MemoryEnv};
    use std::rc::Rc;

    fn ctx() -> ExecContext {
        ExecContext::new(Rc::new(MemoryEnv::new()))
    }

    fn collect(ctx: &ExecContext, scope: &Scope, operand: Operand) -> Vec<Value> {
        to_values(ctx, scope, operand).unwrap()
    }

    fn n(x: f64) -> Value {
        Value::number(x)
    }

    #[test]
    fn known_operands_compute_immediately() {
        let ctx = ctx();
        let scope = Scope::default();
        let result = apply_binary(&ctx, &scope, Op::Add, Operand::value(1.0), Operand::value(2.0));
        assert_eq!(result.as_value(), Some(&n(3.0)));
    }

    #[test]
    fn operators_map_through_streams() {
        let ctx = ctx();
        let scope = Scope::default();
        let range = Operand::Stream(stream::constant(vec![n(1.0), n(2.0)]));
        let doubled = apply_binary(&ctx, &scope, Op::Mul, range, Operand::value(2.0));
        assert_eq!(collect(&ctx, &scope, doubled), vec![n(2.0), n(4.0)]);
    }

    #[test]
    fn two_streams_zip() {
        let ctx = ctx();
        let scope = Scope::default();
        let a = Operand::Stream(stream::constant(vec![n(1.0), n(2.0), n(3.0)]));
        let b = Operand::Stream(stream::constant(vec![n(10.0), n(20.0)]));
        let sum = apply_binary(&ctx, &scope, Op::Add, a, b);
        assert_eq!(collect(&ctx, &scope, sum), vec![n(11.0), n(22.0)]);
    }

    #[test]
    fn variables_defer_until_read() {
        let ctx = ctx();
        let mut scope = Scope::default();
        let slot = scope.bind("i");
        let expr = apply_binary(&ctx, &scope, Op::Mul, Operand::Word("i".into()), Operand::value(2.0));
        assert!(matches!(expr, Operand::Deferred(_)));

        scope.slots().set(slot, n(3.0));
        assert_eq!(collect(&ctx, &scope, expr.clone()), vec![n(6.0)]);
        scope.slots().set(slot, n(5.0));
        assert_eq!(collect(&ctx, &scope, expr), vec![n(10.0)]);
    }

    #[test]
    fn errors_travel_in_the_stream() {
        let ctx = ctx();
        let scope = Scope::default();
        let bad = apply_unary(&ctx, &scope, Op::Neg, Operand::value("a"));
        assert_eq!(to_values(&ctx, &scope, bad), Err(Error::InvalidStringOp));
    }

    #[test]
    fn refs_resolve_overrides_then_vars_then_env() {
        let ctx = ctx();
        ctx.env.set("x", stream::constant(vec![Value::string("global")]));
        let mut scope = Scope::default();
        let r = || Operand::StreamRef("x".into());
        assert_eq!(collect(&ctx, &scope, r()), vec![Value::string("global")]);

        let slot = scope.bind("x");
        scope.slots().set(slot, Value::string("var"));
        assert_eq!(collect(&ctx, &scope, r()), vec![Value::string("var")]);

        scope.set_override("x", stream::constant(vec![Value::string("local")]));
        assert_eq!(collect(&ctx, &scope, r()), vec![Value::string("local")]);

        assert_eq!(
            to_values(&ctx, &scope, Operand::StreamRef("missing".into())),
            Err(Error::InvalidStreamRef("missing".into()))
        );
    }

    #[test]
    fn list_values_expand() {
        let ctx = ctx();
        let scope = Scope::default();
        let list = Operand::Value(Value::from_json_str("[1, 2]").unwrap());
        assert_eq!(collect(&ctx, &scope, list), vec![n(1.0), n(2.0)]);
    }

    #[test]
    fn strings_join_stream_values() {
        let ctx = ctx();
        let scope = Scope::default();
        let s = Operand::Stream(stream::constant(vec![n(1.0), Value::string("a")]));
        assert_eq!(to_string(&ctx, &scope, s), Ok("1 a".to_string()));
        assert_eq!(to_string(&ctx, &scope, Operand::Word("-l".into())), Ok("-l".to_string()));
    }

    #[test]
    fn interpolation_reads_refs() {
        let ctx = ctx();
        ctx.env.set("name", stream::constant(vec![Value::string("World")]));
        let scope = Scope::default();
        let greeting = interpolate(&ctx, "hello $name !");
        assert_eq!(
            collect(&ctx, &scope, greeting),
            vec![Value::string("hello World !")]
        );
        assert_eq!(
            interpolate(&ctx, "plain").as_value(),
            Some(&Value::string("plain"))
        );
    }

    #[test]
    fn ternary_with_known_condition_splices_a_branch() {
        let ctx = ctx();
        let scope = Scope::default();
        let picked = ternary(
            &ctx,
            &scope,
            Operand::value(0.0),
            vec![Operand::value("yes")],
            vec![Operand::value("no"), Operand::value("!")],
        );
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].as_value(), Some(&Value::string("no")));
    }

    #[test]
    fn coalesce_falls_back_on_error() {
        let ctx = ctx();
        let scope = Scope::default();
        let picked = ternary(
            &ctx,
            &scope,
            Operand::StreamRef("missing".into()),
            vec![],
            vec![Operand::value(5.0)],
        );
        let values: Vec<_> = picked
            .into_iter()
            .flat_map(|op| collect(&ctx, &scope, op))
            .collect();
        assert_eq!(values, vec![n(5.0)]);
    }
}
