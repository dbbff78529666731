//! Lazy streams and the factories that produce them.
//!
//! A [`Stream`] is pulled one element at a time and consumed once. A
//! [`StreamFactory`] can be invoked any number of times; every invocation
//! yields an independent stream.

use std::rc::Rc;

use crate::{Error, Value};

/// A lazily produced, single-pass sequence of values. Errors travel inside
/// the stream as elements.
pub type Stream = Box<dyn Iterator<Item = Result<Value, Error>>>;

/// A reusable function from an input stream to an output stream.
pub type StreamFactory = Rc<dyn Fn(Stream) -> Stream>;

pub fn empty() -> Stream {
    Box::new(std::iter::empty())
}

pub fn once(value: Value) -> Stream {
    Box::new(std::iter::once(Ok(value)))
}

/// A stream whose only element is `error`.
pub fn fail(error: Error) -> Stream {
    Box::new(std::iter::once(Err(error)))
}

pub fn from_values<I>(values: I) -> Stream
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: 'static,
{
    Box::new(values.into_iter().map(Ok))
}

/// Wrap a closure as a factory.
pub fn factory<F>(f: F) -> StreamFactory
where
    F: Fn(Stream) -> Stream + 'static,
{
    Rc::new(f)
}

/// A factory that ignores its input and yields `values` on every invocation.
pub fn constant(values: Vec<Value>) -> StreamFactory {
    factory(move |_input| from_values(values.clone()))
}

/// Pull a stream to the end, stopping at the first error.
pub fn collect(stream: Stream) -> Result<Vec<Value>, Error> {
    stream.collect()
}

/// Pull a stream to the end for its side effects, ignoring every element.
pub fn drain(stream: Stream) {
    stream.for_each(drop);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_factories_are_independent() {
        let f = constant(vec![Value::number(1.0), Value::number(2.0)]);
        let mut a = f(empty());
        let b = f(empty());
        assert_eq!(a.next(), Some(Ok(Value::number(1.0))));
        assert_eq!(collect(b).unwrap().len(), 2);
        assert_eq!(a.next(), Some(Ok(Value::number(2.0))));
        assert_eq!(a.next(), None);
    }

    #[test]
    fn collect_stops_at_first_error() {
        let stream: Stream = Box::new(
            vec![Ok(Value::number(1.0)), Err(Error::InvalidOp), Ok(Value::number(2.0))].into_iter(),
        );
        assert_eq!(collect(stream), Err(Error::InvalidOp));
    }
}
