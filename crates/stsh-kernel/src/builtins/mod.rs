//! Builtin commands.
//!
//! A builtin is a stream transform looked up by name before the process
//! runner is consulted. It receives the stage's input stream and its raw
//! argument operands, and decides itself how and when to evaluate them.

mod add;
mod args;
mod echo;
mod exit;
mod get;
mod now;
mod prepend;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value as Json};
use stsh_types::{Error, Stream, Value};

use crate::context::ExecContext;
use crate::eval;
use crate::flags;
use crate::operand::Operand;
use crate::scope::Scope;

/// Everything a builtin invocation can see besides its input.
#[derive(Clone)]
pub struct BuiltinCall {
    pub ctx: ExecContext,
    pub scope: Scope,
    pub args: Vec<Operand>,
}

impl BuiltinCall {
    pub fn new(ctx: ExecContext, scope: Scope, args: Vec<Operand>) -> Self {
        Self { ctx, scope, args }
    }

    /// All argument values in order, streams expanded.
    pub fn values(&self) -> Result<Vec<Value>, Error> {
        let mut values = Vec::new();
        for arg in &self.args {
            values.extend(eval::to_values(&self.ctx, &self.scope, arg.clone())?);
        }
        Ok(values)
    }

    /// The arguments projected into a config object.
    pub fn config(&self) -> Result<Map<String, Json>, Error> {
        flags::to_config(&self.ctx, &self.scope, self.args.clone())
    }

    /// Lazily concatenated argument streams.
    pub fn arg_stream(&self) -> Stream {
        eval::concat(&self.ctx, &self.scope, self.args.clone())
    }
}

/// A named stream transform.
pub trait Builtin {
    /// The name used for lookup.
    fn name(&self) -> &'static str;

    /// Produce the output stream for one invocation.
    fn run(&self, call: &BuiltinCall, input: Stream) -> Stream;
}

/// Registry of builtins by name.
#[derive(Default)]
pub struct BuiltinRegistry {
    builtins: BTreeMap<String, Rc<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every standard builtin.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(add::Add);
        registry.register(args::Args);
        registry.register(echo::Echo);
        registry.register(exit::Exit);
        registry.register(get::Get);
        registry.register(now::Now);
        registry.register(prepend::Prepend);
        registry
    }

    /// Register a builtin, replacing any with the same name.
    pub fn register<B: Builtin + 'static>(&mut self, builtin: B) {
        self.builtins
            .insert(builtin.name().to_string(), Rc::new(builtin));
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.builtins.keys().map(String::as_str).collect()
    }
}
