//! now: An endless stream of UTC timestamps.
//!
//! Emits one ISO-8601 timestamp immediately and then one per tick (one
//! second unless an interval in seconds is given). Waiting happens on the
//! environment's interrupt, so Ctrl-C ends the stream cleanly.

use std::time::{Duration, Instant};

use chrono::Utc;
use stsh_types::{stream, Error, Stream, Value};

use super::{Builtin, BuiltinCall};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct Now;

impl Builtin for Now {
    fn name(&self) -> &'static str {
        "now"
    }

    fn run(&self, call: &BuiltinCall, _input: Stream) -> Stream {
        let tick = match call.values() {
            Ok(values) => match values.first().map(|v| v.as_f64()) {
                None => Duration::from_secs(1),
                Some(Some(secs)) if secs > 0.0 && secs.is_finite() => Duration::from_secs_f64(secs),
                Some(_) => return stream::fail(Error::InvalidNumberOp),
            },
            Err(e) => return stream::fail(e),
        };

        let interrupt = call.ctx.env.interrupt();
        let mut next_tick: Option<Instant> = None;
        Box::new(std::iter::from_fn(move || {
            let awake = match next_tick {
                Some(deadline) => interrupt.sleep_until(deadline),
                None => !interrupt.is_triggered(),
            };
            if !awake {
                return None;
            }
            next_tick = Some(next_tick.unwrap_or_else(Instant::now) + tick);
            Some(Ok(Value::string(Utc::now().format(FORMAT).to_string())))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecContext;
    use crate::env::{Environment, MemoryEnv};
    use crate::operand::Operand;
    use crate::scope::Scope;
    use std::rc::Rc;

    fn call(args: Vec<Operand>) -> BuiltinCall {
        let ctx = ExecContext::new(Rc::new(MemoryEnv::new()));
        BuiltinCall::new(ctx, Scope::default(), args)
    }

    #[test]
    fn ticks_timestamps() {
        let call = call(vec![Operand::value(0.01)]);
        let stamps: Vec<_> = Now.run(&call, stream::empty()).take(2).collect();
        assert_eq!(stamps.len(), 2);
        for stamp in stamps {
            let stamp = stamp.unwrap();
            let text = stamp.as_str().unwrap();
            assert_eq!(text.len(), 20);
            assert!(text.ends_with('Z'));
        }
    }

    #[test]
    fn interrupt_stops_the_stream() {
        let call = call(vec![]);
        let mut stamps = Now.run(&call, stream::empty());
        assert!(stamps.next().is_some());
        call.ctx.env.interrupt().trigger();
        assert!(stamps.next().is_none());
    }

    #[test]
    fn rejects_bad_intervals() {
        let call = call(vec![Operand::value(-1.0)]);
        let mut stamps = Now.run(&call, stream::empty());
        assert_eq!(stamps.next(), Some(Err(Error::InvalidNumberOp)));
    }
}
