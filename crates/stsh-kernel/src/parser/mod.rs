//! The shunting-yard parser.
//!
//! Parsing and building the result are the same pass: tokens are folded
//! into two stacks, a stack of [`CommandBuilder`]s accumulating operands
//! and a stack of pending operators. Pushing an operator first reduces every
//! pending operator that binds at least as tightly, then opens a child
//! builder for its right side. Brackets push markers that stop reductions.
//!
//! What comes out is a [`PrintableStream`]: a lazy stream plus how the line
//! asked for it to be printed. Structural errors abort the whole line and
//! come back as a stream holding only that error; evaluation errors show up
//! later as stream elements.
//!
//! # Disambiguation
//!
//! - `+ -` are prefix when the current builder has no operands yet
//! - `..` is postfix when followed by nothing, a closing bracket, or an
//!   operator
//! - `:` closes a pending `?`, otherwise it sets the print window
//! - `{` opens a closure right after `|` (or after `=` when followed by
//!   `name ->`), otherwise a record literal
//! - `> word` redirects output to a file when `word` is not a variable
//! - inside a record only binary value operators are operators; everything
//!   else is record text

mod builder;

use std::rc::Rc;

use stsh_types::stream;
use stsh_types::{Error, PrintMode, PrintableStream, TypedValue, Value};

use crate::closure;
use crate::context::ExecContext;
use crate::env::Environment;
use crate::eval;
use crate::lexer;
use crate::operand::{Deferred, Operand};
use crate::ops::{Fixity, Op, TERNARY_PRECEDENCE};
use crate::record;
use crate::scope::{Scope, Slots, VarSlot};

use builder::CommandBuilder;

/// Entry on the operator stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Op(Op),
    /// `name ->`, with the slot bound for `name`.
    Bind(VarSlot),
    Ternary,
    TernaryElse,
    Paren,
    Brace(BraceKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceKind {
    Closure,
    Record,
}

impl Pending {
    /// Brackets have no precedence; reductions stop at them.
    fn precedence(self) -> Option<u8> {
        match self {
            Pending::Op(op) => Some(op.precedence()),
            Pending::Bind(_) => Some(Op::Bind.precedence()),
            Pending::Ternary | Pending::TernaryElse => Some(TERNARY_PRECEDENCE),
            Pending::Paren | Pending::Brace(_) => None,
        }
    }
}

/// Parses lines against an environment.
///
/// Closure variables live in a slot arena owned by the parser, so closures
/// stored in the environment by one line still work in the next.
pub struct StreamParser {
    ctx: ExecContext,
    slots: Slots,
}

impl StreamParser {
    /// A parser with the standard builtins and default configuration.
    pub fn new(env: Rc<dyn Environment>) -> Self {
        Self::with_context(ExecContext::new(env))
    }

    pub fn with_context(ctx: ExecContext) -> Self {
        Self {
            ctx,
            slots: Slots::new(),
        }
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    /// Tokenize and parse one line.
    pub fn parse_line(&self, line: &str) -> PrintableStream {
        self.parse(lexer::tokenize(line))
    }

    /// Parse a token sequence. Structural errors become a one-element
    /// error stream.
    pub fn parse<'a, I>(&self, tokens: I) -> PrintableStream
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.try_parse(tokens).unwrap_or_else(PrintableStream::failed)
    }

    /// Parse a token sequence, reporting structural errors directly.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn try_parse<'a, I>(&self, tokens: I) -> Result<PrintableStream, Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parse = Parse::new(&self.ctx, &self.slots, tokens.into_iter().collect());
        let result = parse.run();
        if let Err(e) = &result {
            tracing::debug!(error = %e, "parse failed");
            parse.release_slots();
        }
        result
    }
}

/// State for parsing one line.
struct Parse<'p, 'a> {
    ctx: &'p ExecContext,
    slots: &'p Slots,
    tokens: Vec<&'a str>,
    pos: usize,
    cmds: Vec<CommandBuilder>,
    ops: Vec<Pending>,
    /// Slots bound by this line, released if it fails.
    bound: Vec<VarSlot>,
}

impl<'p, 'a> Parse<'p, 'a> {
    fn new(ctx: &'p ExecContext, slots: &'p Slots, tokens: Vec<&'a str>) -> Self {
        Self {
            ctx,
            slots,
            tokens,
            pos: 0,
            cmds: vec![CommandBuilder::new(Scope::new(slots.clone()))],
            ops: Vec::new(),
            bound: Vec::new(),
        }
    }

    fn release_slots(&mut self) {
        for slot in self.bound.drain(..) {
            self.slots.release(slot);
        }
    }

    fn run(&mut self) -> Result<PrintableStream, Error> {
        while let Some(&token) = self.tokens.get(self.pos) {
            self.pos += 1;
            self.token(token)?;
        }
        self.finish()
    }

    fn peek(&self, offset: usize) -> Option<&'a str> {
        self.tokens.get(self.pos + offset).copied()
    }

    fn top(&self) -> Result<&CommandBuilder, Error> {
        self.cmds.last().ok_or(Error::MissingOperand)
    }

    fn top_mut(&mut self) -> Result<&mut CommandBuilder, Error> {
        self.cmds.last_mut().ok_or(Error::MissingOperand)
    }

    fn pop_cmd(&mut self) -> Result<CommandBuilder, Error> {
        self.cmds.pop().ok_or(Error::MissingOperand)
    }

    fn token(&mut self, token: &'a str) -> Result<(), Error> {
        match token {
            "(" => self.open_paren(),
            ")" => self.close_paren(),
            "{" => self.open_brace(),
            "}" => self.close_brace(),
            _ if self.top()?.record_level > 0 => self.record_token(token),
            "->" => self.bind(),
            "?" => self.infix(Pending::Ternary),
            ":" if self.has_open_ternary() => self.ternary_else(),
            ".." if self.range_is_postfix() => self.postfix(Op::RangeFrom),
            "&" => self.postfix(Op::Background),
            "!" => self.prefix(Op::Not),
            "+" | "-" if self.top()?.operands.is_empty() => match Op::prefix(token) {
                Some(op) => self.prefix(op),
                None => Err(Error::MissingOperand),
            },
            _ => match Op::infix(token) {
                Some(op) => self.infix(Pending::Op(op)),
                None => self.leaf(token),
            },
        }
    }

    /// Inside a record, binary value operators after a value still compute;
    /// every other token is record text.
    fn record_token(&mut self, token: &'a str) -> Result<(), Error> {
        let top = self.top()?;
        let follows_value = top
            .operands
            .last()
            .is_some_and(|last| !record::is_punctuation(last));
        match Op::infix(token) {
            Some(op) if op.is_value_op() && follows_value => self.infix(Pending::Op(op)),
            _ if is_operator(token) => self.top_mut()?.push(Operand::Word(token.to_string())),
            _ => self.leaf(token),
        }
    }

    fn leaf(&mut self, token: &str) -> Result<(), Error> {
        let operand = classify_leaf(self.ctx, token)?;
        self.top_mut()?.push(operand)
    }

    /// Reduce pending operators while `keep_going` accepts the top one.
    fn reduce_while(&mut self, keep_going: impl Fn(Pending, u8) -> bool) -> Result<(), Error> {
        while let Some(&top) = self.ops.last() {
            match top.precedence() {
                Some(prec) if keep_going(top, prec) => self.reduce()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Push an infix operator (or `?`) and open its right-hand builder.
    fn infix(&mut self, pending: Pending) -> Result<(), Error> {
        let prec = pending.precedence().unwrap_or(0);
        let right_assoc = match pending {
            Pending::Op(op) => op.is_right_assoc(),
            _ => true,
        };
        self.reduce_while(|_, top| if right_assoc { top > prec } else { top >= prec })?;
        let child = self.top()?.child();
        self.ops.push(pending);
        self.cmds.push(child);
        Ok(())
    }

    fn prefix(&mut self, op: Op) -> Result<(), Error> {
        debug_assert_eq!(op.fixity(), Fixity::Prefix);
        let child = self.top()?.child();
        self.ops.push(Pending::Op(op));
        self.cmds.push(child);
        Ok(())
    }

    /// Postfix operators apply in place to the last operand, after any
    /// pending prefix operators.
    fn postfix(&mut self, op: Op) -> Result<(), Error> {
        self.reduce_while(|_, top| top >= op.precedence())?;
        let ctx = self.ctx;
        let top = self.top_mut()?;
        let operand = top.pop()?;
        let result = match op {
            Op::Background => {
                tracing::warn!("background execution is not supported; running in the foreground");
                operand
            }
            _ => eval::apply_unary(ctx, &top.scope, op, operand),
        };
        top.push(result)
    }

    /// `..` is postfix when nothing that could be its right side follows.
    fn range_is_postfix(&self) -> bool {
        match self.peek(0) {
            None => true,
            Some(")" | "}" | "]") => true,
            Some(next) => is_operator(next),
        }
    }

    /// Whether a `?` above the nearest bracket still waits for its `:`.
    fn has_open_ternary(&self) -> bool {
        let mut closed = 0usize;
        for pending in self.ops.iter().rev() {
            match pending {
                Pending::TernaryElse => closed += 1,
                Pending::Ternary if closed == 0 => return true,
                Pending::Ternary => closed -= 1,
                Pending::Paren | Pending::Brace(_) => return false,
                _ => {}
            }
        }
        false
    }

    fn ternary_else(&mut self) -> Result<(), Error> {
        self.reduce_while(|top, prec| prec > TERNARY_PRECEDENCE || top == Pending::TernaryElse)?;
        let child = self.top()?.child();
        self.ops.push(Pending::TernaryElse);
        self.cmds.push(child);
        Ok(())
    }

    /// `name ->`: bind a fresh variable visible to everything on the right.
    fn bind(&mut self) -> Result<(), Error> {
        let prec = Op::Bind.precedence();
        self.reduce_while(|_, top| top > prec)?;
        let top = self.top()?;
        let name = match top.operands.as_slice() {
            [Operand::Word(name)] if !name.contains('.') => name.clone(),
            other => {
                return Err(Error::InvalidClosureSignature(format!(
                    "expected one name before ->, found {other:?}"
                )));
            }
        };
        let mut child = top.child();
        let slot = child.scope.bind(name);
        self.bound.push(slot);
        self.ops.push(Pending::Bind(slot));
        self.cmds.push(child);
        Ok(())
    }

    fn open_paren(&mut self) -> Result<(), Error> {
        let mut child = self.top()?.child();
        child.record_level = 0;
        self.ops.push(Pending::Paren);
        self.cmds.push(child);
        Ok(())
    }

    fn close_paren(&mut self) -> Result<(), Error> {
        loop {
            match self.ops.last() {
                Some(Pending::Paren) => break,
                None | Some(Pending::Brace(_)) => return Err(Error::MismatchedBracket(')')),
                Some(_) => self.reduce()?,
            }
        }
        self.ops.pop();
        let group = self.pop_cmd()?;
        let mode = group.print_mode.clone();
        let operand = group.into_operand(self.ctx);
        let parent = self.top_mut()?;
        parent.print_mode = parent.print_mode.take().or(mode);
        parent.push(operand)
    }

    fn open_brace(&mut self) -> Result<(), Error> {
        let top = self.top()?;
        let starts_closure = top.record_level == 0
            && top.operands.is_empty()
            && top.closure_fn.is_none()
            && match self.ops.last() {
                Some(Pending::Op(Op::Pipe)) => true,
                Some(Pending::Op(Op::Assign)) => self.param_follows(),
                _ => false,
            };

        let mut child = top.child();
        let kind = if starts_closure {
            child.record_level = 0;
            BraceKind::Closure
        } else {
            child.record_level = top.record_level + 1;
            BraceKind::Record
        };
        self.ops.push(Pending::Brace(kind));
        self.cmds.push(child);
        Ok(())
    }

    /// Whether the next tokens read `name ->`.
    fn param_follows(&self) -> bool {
        matches!(
            (self.peek(0), self.peek(1)),
            (Some(name), Some("->")) if !is_operator(name) && !is_bracket(name)
        )
    }

    fn close_brace(&mut self) -> Result<(), Error> {
        let kind = loop {
            match self.ops.last() {
                Some(&Pending::Brace(kind)) => break kind,
                None | Some(Pending::Paren) => return Err(Error::MismatchedBracket('}')),
                Some(_) => self.reduce()?,
            }
        };
        self.ops.pop();
        let body = self.pop_cmd()?;

        match kind {
            BraceKind::Record => {
                let record = record::build(self.ctx, &body.scope, body.operands)?;
                let parent = self.top_mut()?;
                let record = match parent.operands.last() {
                    Some(Operand::Word(w)) if is_type_name(&parent.scope, w) => {
                        let type_name = w.clone();
                        parent.operands.pop();
                        typed(type_name, record)
                    }
                    _ => record,
                };
                parent.push(record)
            }
            BraceKind::Closure => {
                let mode = body.print_mode.clone();
                let stage = if body.closure_fn.is_some() || body.upstream.is_some() {
                    body.realize(self.ctx)
                } else {
                    closure::per_element(body.realize(self.ctx))
                };
                let parent = self.top_mut()?;
                if parent.closure_fn.is_some() || !parent.operands.is_empty() {
                    return Err(Error::ClosureNotFinal);
                }
                parent.closure_fn = Some(stage);
                parent.print_mode = parent.print_mode.take().or(mode);
                Ok(())
            }
        }
    }

    /// Pop the top operator and fold the builders it applies to.
    fn reduce(&mut self) -> Result<(), Error> {
        let Some(pending) = self.ops.pop() else {
            return Err(Error::MissingOperator);
        };
        match pending {
            Pending::Op(op) if op.fixity() == Fixity::Prefix => self.reduce_prefix(op),
            Pending::Op(Op::Gt) => self.reduce_redirect_or_compare(),
            Pending::Op(op) if op.is_value_op() || op == Op::Range => self.reduce_value_op(op),
            Pending::Op(Op::Assign) => self.reduce_assign(),
            Pending::Op(Op::Pipe) => self.reduce_pipe(),
            Pending::Op(Op::Seq) => self.reduce_seq(),
            Pending::Op(Op::Window) => self.reduce_window(),
            Pending::Op(op) => Err(Error::Parse(format!("unexpected operator {}", op.symbol()))),
            Pending::Bind(slot) => self.reduce_bind(slot),
            Pending::Ternary => Err(Error::MissingTernary),
            Pending::TernaryElse => self.reduce_ternary(),
            Pending::Paren => Err(Error::MismatchedBracket('(')),
            Pending::Brace(_) => Err(Error::MismatchedBracket('{')),
        }
    }

    fn reduce_prefix(&mut self, op: Op) -> Result<(), Error> {
        let mut rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        let operand = rhs.take_first()?;
        let result = eval::apply_unary(self.ctx, &rhs.scope, op, operand);
        lhs.push(result)?;
        lhs.extend(rhs.operands)?;
        lhs.print_mode = lhs.print_mode.or(rhs.print_mode);
        self.cmds.push(lhs);
        Ok(())
    }

    fn reduce_value_op(&mut self, op: Op) -> Result<(), Error> {
        let mut rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        let left = lhs.pop()?;
        let right = rhs.take_first()?;
        let result = eval::apply_binary(self.ctx, &rhs.scope, op, left, right);
        lhs.push(result)?;
        lhs.extend(rhs.operands)?;
        lhs.print_mode = lhs.print_mode.or(rhs.print_mode);
        self.cmds.push(lhs);
        Ok(())
    }

    /// `> name` writes to a file unless `name` is a variable; any other
    /// right side is a comparison.
    fn reduce_redirect_or_compare(&mut self) -> Result<(), Error> {
        let target = self.cmds.last().and_then(|rhs| match rhs.operands.first() {
            Some(Operand::Word(w)) if !rhs.scope.is_var_path(w) => Some(w.clone()),
            _ => None,
        });
        let Some(name) = target else {
            return self.reduce_value_op(Op::Gt);
        };

        let mut rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        rhs.take_first()?;
        lhs.extend(rhs.operands)?;
        lhs.print_mode = Some(PrintMode::WriteFile { name });
        self.cmds.push(lhs);
        Ok(())
    }

    fn reduce_assign(&mut self) -> Result<(), Error> {
        let rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        let target = lhs.pop()?;
        let value = rhs.realize(self.ctx);
        match target {
            Operand::StreamRef(name) => self.ctx.env.set(&name, value),
            Operand::Word(name) => lhs.scope.set_override(name, value),
            other => return Err(Error::Parse(format!("cannot assign to {other:?}"))),
        }
        self.cmds.push(lhs);
        Ok(())
    }

    fn reduce_pipe(&mut self) -> Result<(), Error> {
        let mut rhs = self.pop_cmd()?;
        let lhs = self.pop_cmd()?;
        let mode = lhs.print_mode.clone();
        let source = lhs.realize(self.ctx);
        rhs.upstream = Some(match rhs.upstream.take() {
            Some(existing) => builder::compose(source, existing),
            None => source,
        });
        rhs.print_mode = rhs.print_mode.or(mode);
        self.cmds.push(rhs);
        Ok(())
    }

    /// `a; b`: running `b` first drains `a` for its side effects.
    fn reduce_seq(&mut self) -> Result<(), Error> {
        let mut rhs = self.pop_cmd()?;
        let lhs = self.pop_cmd()?;
        let mode = lhs.print_mode.clone();
        let first = lhs.realize(self.ctx);
        let then = rhs.upstream.take();
        rhs.upstream = Some(stream::factory(move |input| {
            stream::drain(first(input));
            match &then {
                Some(then) => then(stream::empty()),
                None => stream::empty(),
            }
        }));
        rhs.print_mode = rhs.print_mode.or(mode);
        self.cmds.push(rhs);
        Ok(())
    }

    /// `:` alone prints everything; `: N` keeps a window of N lines.
    fn reduce_window(&mut self) -> Result<(), Error> {
        let rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        let window = rhs
            .operands
            .first()
            .and_then(Operand::as_value)
            .and_then(Value::as_f64)
            .filter(|n| *n >= 1.0);
        lhs.print_mode = Some(match window {
            Some(n) => PrintMode::Slice {
                window: n.min(PrintMode::MAX_WINDOW as f64) as usize,
            },
            None => PrintMode::Pull { full: true },
        });
        self.cmds.push(lhs);
        Ok(())
    }

    fn reduce_bind(&mut self, slot: VarSlot) -> Result<(), Error> {
        let rhs = self.pop_cmd()?;
        let mut lhs = self.pop_cmd()?;
        if lhs.closure_fn.is_some() {
            return Err(Error::ClosureNotFinal);
        }
        lhs.operands.clear();
        let mode = rhs.print_mode.clone();
        let body = rhs.realize(self.ctx);
        lhs.closure_fn = Some(closure::bind(self.slots.clone(), slot, body));
        lhs.print_mode = lhs.print_mode.or(mode);
        self.cmds.push(lhs);
        Ok(())
    }

    /// `cond ? then : else`, with `then` possibly empty for `cond ?: else`.
    fn reduce_ternary(&mut self) -> Result<(), Error> {
        let else_branch = self.pop_cmd()?;
        let then_branch = self.pop_cmd()?;
        if self.ops.pop() != Some(Pending::Ternary) {
            return Err(Error::MissingTernary);
        }
        let mut cond_builder = self.pop_cmd()?;
        let cond = cond_builder.pop()?;
        let chosen = eval::ternary(
            self.ctx,
            &else_branch.scope,
            cond,
            then_branch.operands,
            else_branch.operands,
        );
        cond_builder.extend(chosen)?;
        self.cmds.push(cond_builder);
        Ok(())
    }

    fn finish(&mut self) -> Result<PrintableStream, Error> {
        while let Some(&pending) = self.ops.last() {
            match pending {
                Pending::Paren => return Err(Error::MismatchedBracket('(')),
                Pending::Brace(_) => return Err(Error::MismatchedBracket('{')),
                _ => self.reduce()?,
            }
        }
        let root = self.pop_cmd()?;
        if !self.cmds.is_empty() {
            return Err(Error::MissingOperator);
        }
        let mode = root.print_mode.clone().unwrap_or_default();
        let factory = root.realize(self.ctx);
        Ok(PrintableStream::new(factory(stream::empty()), mode))
    }
}

/// Tokens the parser treats as operators outside records.
fn is_operator(token: &str) -> bool {
    Op::infix(token).is_some() || matches!(token, "!" | "&" | "?")
}

fn is_bracket(token: &str) -> bool {
    matches!(token, "(" | ")" | "{" | "}" | "[" | "]")
}

/// A dotted word placed before a record literal names its type.
fn is_type_name(scope: &Scope, word: &str) -> bool {
    word.contains('.') && !word.starts_with('.') && !word.ends_with('.') && !scope.is_var_path(word)
}

/// Wrap a record as a typed value carrying its JSON text.
fn typed(type_name: String, record: Operand) -> Operand {
    match record {
        Operand::Value(value) => {
            let payload = value.to_json_string().into_bytes();
            Operand::Value(Value::Typed(TypedValue::new(type_name, payload)))
        }
        Operand::Deferred(inner) => Operand::Deferred(Deferred::new(move |scope| {
            Ok(typed(type_name.clone(), inner.eval(scope)?))
        })),
        other => other,
    }
}

/// Turn a non-operator token into an operand.
fn classify_leaf(ctx: &ExecContext, token: &str) -> Result<Operand, Error> {
    if let Some(name) = token.strip_prefix('$').filter(|name| !name.is_empty()) {
        return Ok(Operand::StreamRef(name.to_string()));
    }
    if let Some(rest) = token.strip_prefix('`') {
        return Ok(eval::interpolate(ctx, rest.strip_suffix('`').unwrap_or(rest)));
    }
    if let Some(rest) = token.strip_prefix('\'') {
        return Ok(Operand::value(rest.strip_suffix('\'').unwrap_or(rest)));
    }
    if token.starts_with('"') {
        return Ok(Operand::Value(Value::from_json_str(token)?));
    }
    if let Some(digits) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        let n = i64::from_str_radix(digits, 16)
            .map_err(|e| Error::Parse(format!("invalid hex literal {token}: {e}")))?;
        return Ok(Operand::value(n as f64));
    }
    match Value::from_json_str(token) {
        Ok(value) => Ok(Operand::Value(value)),
        Err(_) => Ok(Operand::Word(token.to_string())),
    }
}
