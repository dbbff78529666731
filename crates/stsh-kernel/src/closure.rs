//! Closure stages: `{ i -> body }` and `{ body }` after a pipe.
//!
//! A closure is a factory over its input stream. With a parameter, each
//! upstream value is written into the parameter's slot and the body is
//! evaluated once with an empty input. Without one, the body receives each
//! upstream value as its own single-element input.

use stsh_types::Stream;
use stsh_types::stream::{self, StreamFactory};

use crate::scope::{Slots, VarSlot};

/// Bind each upstream value to `slot`, then run `body` for it.
///
/// The body reads the slot lazily and every use of a stored closure shares
/// it, so the bound value is written again before each pull.
pub fn bind(slots: Slots, slot: VarSlot, body: StreamFactory) -> StreamFactory {
    stream::factory(move |input| {
        let slots = slots.clone();
        let body = body.clone();
        Box::new(input.flat_map(move |item| -> Stream {
            match item {
                Ok(value) => {
                    slots.set(slot, value.clone());
                    let mut inner = body(stream::empty());
                    let slots = slots.clone();
                    Box::new(std::iter::from_fn(move || {
                        slots.set(slot, value.clone());
                        inner.next()
                    }))
                }
                Err(e) => stream::fail(e),
            }
        }))
    })
}

/// Run `body` once per upstream value, feeding that value as its input.
pub fn per_element(body: StreamFactory) -> StreamFactory {
    stream::factory(move |input| {
        let body = body.clone();
        Box::new(input.flat_map(move |item| match item {
            Ok(value) => body(stream::once(value)),
            Err(e) => stream::fail(e),
        }))
    })
}
