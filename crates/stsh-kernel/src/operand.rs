//! Operands: the fragments the parser accumulates between operators.

use std::fmt;
use std::rc::Rc;

use stsh_types::{Error, StreamFactory, Value};

use crate::scope::Scope;

/// A pending piece of an expression.
#[derive(Clone)]
pub enum Operand {
    /// A value known at parse time.
    Value(Value),
    /// Values produced lazily; the factory is invoked with an empty input.
    Stream(StreamFactory),
    /// `$name`, resolved against local overrides, variables, then the
    /// environment.
    StreamRef(String),
    /// A bare word: a command name, a literal string, or a variable with an
    /// optional dotted path, depending on where it ends up.
    Word(String),
    /// A computation that needs the values bound in a scope.
    Deferred(Deferred),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }

    pub fn word(&self) -> Option<&str> {
        match self {
            Operand::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Operand::Stream(_) => f.write_str("Stream(..)"),
            Operand::StreamRef(name) => write!(f, "StreamRef(${name})"),
            Operand::Word(w) => f.debug_tuple("Word").field(w).finish(),
            Operand::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A computation postponed until a scope is available, e.g. `i * 2` inside a
/// closure body. Evaluating it again re-reads the variables.
#[derive(Clone)]
pub struct Deferred(Rc<dyn Fn(&Scope) -> Result<Operand, Error>>);

impl Deferred {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Scope) -> Result<Operand, Error> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn eval(&self, scope: &Scope) -> Result<Operand, Error> {
        (self.0)(scope)
    }
}
