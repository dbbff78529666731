//! Command builders: the operand accumulators on the parser's stack, and
//! how a finished one becomes a stream factory.

use std::path::PathBuf;
use std::rc::Rc;

use stsh_types::stream::{self, StreamFactory};
use stsh_types::{Error, PrintMode, Value};

use crate::builtins::{Builtin, BuiltinCall};
use crate::context::ExecContext;
use crate::eval;
use crate::operand::Operand;
use crate::process;
use crate::scope::Scope;

/// One pipeline stage under construction.
pub(crate) struct CommandBuilder {
    pub scope: Scope,
    /// The stage feeding this one, set by `|` and `;`.
    pub upstream: Option<StreamFactory>,
    pub operands: Vec<Operand>,
    /// Depth of record braces this builder sits in. Zero outside records.
    pub record_level: usize,
    /// A closure stage. Once set, no further operands are accepted.
    pub closure_fn: Option<StreamFactory>,
    pub print_mode: Option<PrintMode>,
}

impl CommandBuilder {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            upstream: None,
            operands: Vec::new(),
            record_level: 0,
            closure_fn: None,
            print_mode: None,
        }
    }

    /// A fresh builder for the right side of an operator.
    pub fn child(&self) -> Self {
        Self {
            record_level: self.record_level,
            ..Self::new(self.scope.clone())
        }
    }

    pub fn push(&mut self, operand: Operand) -> Result<(), Error> {
        if self.closure_fn.is_some() {
            return Err(Error::ClosureNotFinal);
        }
        self.operands.push(operand);
        Ok(())
    }

    pub fn extend(&mut self, operands: impl IntoIterator<Item = Operand>) -> Result<(), Error> {
        operands.into_iter().try_for_each(|operand| self.push(operand))
    }

    /// Take the last operand, for the left side of a binary operator.
    pub fn pop(&mut self) -> Result<Operand, Error> {
        self.operands.pop().ok_or(Error::MissingOperand)
    }

    /// Take the first operand, for the right side of an operator.
    pub fn take_first(&mut self) -> Result<Operand, Error> {
        if self.operands.is_empty() {
            return Err(Error::MissingOperand);
        }
        Ok(self.operands.remove(0))
    }

    /// Values only, nothing to run: a parenthesized group like `(1 2)`.
    pub fn is_constant(&self) -> bool {
        self.upstream.is_none()
            && self.closure_fn.is_none()
            && self.operands.iter().all(|o| matches!(o, Operand::Value(_)))
    }

    /// Fold into a single operand for the enclosing builder.
    ///
    /// A constant group with one value stays a value so it can take part in
    /// further operators; anything else becomes a stream.
    pub fn into_operand(self, ctx: &ExecContext) -> Operand {
        if !self.is_constant() {
            return Operand::Stream(self.realize(ctx));
        }
        let mut values: Vec<Value> = self
            .operands
            .into_iter()
            .filter_map(|o| match o {
                Operand::Value(v) => Some(v),
                _ => None,
            })
            .collect();
        if values.len() == 1 {
            Operand::Value(values.remove(0))
        } else {
            Operand::Stream(stream::constant(values))
        }
    }

    /// The factory for this stage, wired after its upstream.
    pub fn realize(self, ctx: &ExecContext) -> StreamFactory {
        let stage = match self.closure_fn {
            Some(closure) => closure,
            None => Invocation::classify(ctx, &self.scope, self.operands).into_factory(ctx, &self.scope),
        };
        match self.upstream {
            Some(upstream) => compose(upstream, stage),
            None => stage,
        }
    }
}

/// `first`'s output becomes `second`'s input.
pub(crate) fn compose(first: StreamFactory, second: StreamFactory) -> StreamFactory {
    stream::factory(move |input| second(first(input)))
}

/// What a stage's operands ask for, decided once per stage.
pub(crate) enum Invocation {
    Builtin {
        builtin: Rc<dyn Builtin>,
        args: Vec<Operand>,
    },
    Process {
        program: PathBuf,
        args: Vec<Operand>,
    },
    Expression(Vec<Operand>),
}

impl Invocation {
    /// A leading word that is not a variable names a builtin or, failing
    /// that, an executable. Everything else is an expression.
    pub fn classify(ctx: &ExecContext, scope: &Scope, mut operands: Vec<Operand>) -> Self {
        let name = match operands.first() {
            Some(Operand::Word(w)) if !scope.is_var_path(w) => w.clone(),
            _ => return Invocation::Expression(operands),
        };

        if let Some(builtin) = ctx.builtins.lookup(&name) {
            tracing::debug!(command = %name, "builtin stage");
            operands.remove(0);
            return Invocation::Builtin {
                builtin,
                args: operands,
            };
        }

        let search_path = ctx.config.search_path.as_deref();
        if let Some(program) = process::resolve_executable(&name, search_path) {
            tracing::debug!(command = %name, program = %program.display(), "process stage");
            operands.remove(0);
            return Invocation::Process {
                program,
                args: operands,
            };
        }

        tracing::debug!(word = %name, "expression stage");
        Invocation::Expression(operands)
    }

    pub fn into_factory(self, ctx: &ExecContext, scope: &Scope) -> StreamFactory {
        let ctx = ctx.clone();
        let scope = scope.clone();
        match self {
            Invocation::Builtin { builtin, args } => {
                let call = BuiltinCall::new(ctx, scope, args);
                stream::factory(move |input| builtin.run(&call, input))
            }
            Invocation::Process { program, args } => stream::factory(move |_input| {
                let argv: Result<Vec<String>, Error> = args
                    .iter()
                    .map(|arg| eval::to_string(&ctx, &scope, arg.clone()))
                    .collect();
                match argv {
                    Ok(argv) => process::spawn(&program, &argv, &ctx.config, ctx.env.interrupt()),
                    Err(e) => stream::fail(e),
                }
            }),
            Invocation::Expression(operands) => match operands.as_slice() {
                [Operand::StreamRef(name)] => eval::ref_factory(&ctx, &scope, name),
                _ => eval::sequence(&ctx, &scope, operands),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::env::MemoryEnv;

    fn ctx() -> ExecContext {
        ExecContext::new(Rc::new(MemoryEnv::new())).with_config(KernelConfig::isolated())
    }

    fn word(w: &str) -> Operand {
        Operand::Word(w.to_string())
    }

    #[test]
    fn classification() {
        let ctx = ctx();
        let mut scope = Scope::default();
        scope.bind("x");

        let builtin = Invocation::classify(&ctx, &scope, vec![word("add"), Operand::value(1.0)]);
        assert!(matches!(builtin, Invocation::Builtin { ref args, .. } if args.len() == 1));

        let var = Invocation::classify(&ctx, &scope, vec![word("x")]);
        assert!(matches!(var, Invocation::Expression(_)));

        // The isolated config finds no executables.
        let unknown = Invocation::classify(&ctx, &scope, vec![word("sh")]);
        assert!(matches!(unknown, Invocation::Expression(_)));

        let with_path = ExecContext::new(Rc::new(MemoryEnv::new()))
            .with_config(KernelConfig::default().with_search_path("/bin:/usr/bin"));
        let process = Invocation::classify(&with_path, &scope, vec![word("sh")]);
        assert!(matches!(process, Invocation::Process { .. }));
    }

    #[test]
    fn closures_reject_more_operands() {
        let mut builder = CommandBuilder::new(Scope::default());
        builder.closure_fn = Some(stream::constant(vec![]));
        assert_eq!(builder.push(Operand::value(1.0)), Err(Error::ClosureNotFinal));
    }

    #[test]
    fn constant_groups_fold_to_values() {
        let ctx = ctx();
        let mut single = CommandBuilder::new(Scope::default());
        single.push(Operand::value(2.0)).unwrap();
        assert_eq!(single.into_operand(&ctx).as_value(), Some(&Value::number(2.0)));

        let mut several = CommandBuilder::new(Scope::default());
        several
            .extend([Operand::value(1.0), Operand::value(2.0)])
            .unwrap();
        let Operand::Stream(factory) = several.into_operand(&ctx) else {
            panic!("expected a stream");
        };
        assert_eq!(
            stream::collect(factory(stream::empty())),
            Ok(vec![Value::number(1.0), Value::number(2.0)])
        );
    }

    #[test]
    fn upstream_feeds_the_stage() {
        let ctx = ctx();
        let mut builder = CommandBuilder::new(Scope::default());
        builder.upstream = Some(stream::constant(vec![Value::number(1.0)]));
        builder.extend([word("add"), Operand::value(1.0)]).unwrap();
        let factory = builder.realize(&ctx);
        assert_eq!(
            stream::collect(factory(stream::empty())),
            Ok(vec![Value::number(2.0)])
        );
    }
}
