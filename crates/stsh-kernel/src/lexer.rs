//! Tokenizer for stream-shell lines.
//!
//! A small per-character state machine splits a line into chunks: words,
//! operators, numbers and quoted strings. Chunks are trimmed, empty ones are
//! dropped, and `..` is always split out into its own token so `1..3` reads
//! as a range.
//!
//! Tokens are slices of the input, never copies. Quoted strings keep their
//! quotes; the parser decides what they mean.
//!
//! # States
//!
//! - **Init**: between tokens, after whitespace or a structural character
//! - **Word**: identifiers, paths, flags, `$refs`
//! - **Operator**: one of `!&%+-*/<=>|`, possibly merged with a second char
//! - **Number**: decimal, or hex after a leading `0x`
//! - **Quoted**: runs until the matching `"`, `'` or backtick

use std::collections::VecDeque;
use std::ops::Range;
use std::str::CharIndices;

/// Byte range of a token within its line.
pub type Span = Range<usize>;

/// A token together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

const OPERATOR_CHARS: &str = "!&%+-*/<=>|";
const STRUCTURAL_CHARS: &str = "(){}[]\"'`;:<>,";
const QUOTES: &str = "\"'`";
const OPERATOR_PAIRS: [&str; 7] = ["<=", "==", ">=", "!=", "&&", "||", "->"];
const RANGE: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Unknown,
    Decimal,
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Word,
    /// `pending` holds the first char of a possible two-char operator and is
    /// cleared once a pair has been merged.
    Operator { pending: Option<char> },
    Number(Base),
    /// `close` is cleared once the closing quote has been consumed.
    Quoted { close: Option<char> },
}

impl State {
    /// Feed one character. Returns true when it extends the current chunk,
    /// false when it starts a new one.
    fn step(&mut self, c: char) -> bool {
        match *self {
            State::Init => self.start(c),
            State::Word if is_terminator(c) => self.start(c),
            State::Word => true,
            State::Operator { pending: Some(first) } if is_operator_pair(first, c) => {
                *self = State::Operator { pending: None };
                true
            }
            // `-flag`, `--long`, `/usr/bin`: a dash or slash glued to word
            // characters is a word, not an operator.
            State::Operator { pending: Some('-' | '/') }
                if !c.is_ascii_digit() && !is_terminator(c) =>
            {
                *self = State::Word;
                true
            }
            State::Operator { .. } => self.start(c),
            State::Number(Base::Unknown) if c == 'x' => {
                *self = State::Number(Base::Hex);
                true
            }
            State::Number(Base::Unknown | Base::Decimal) if c.is_ascii_digit() || c == '.' => {
                *self = State::Number(Base::Decimal);
                true
            }
            State::Number(Base::Hex) if c.is_ascii_hexdigit() => true,
            State::Number(_) => self.start(c),
            State::Quoted { close: Some(quote) } => {
                if c == quote {
                    *self = State::Quoted { close: None };
                }
                true
            }
            State::Quoted { close: None } => self.start(c),
        }
    }

    /// Enter the state for a character that begins a chunk.
    fn start(&mut self, c: char) -> bool {
        *self = if QUOTES.contains(c) {
            State::Quoted { close: Some(c) }
        } else if OPERATOR_CHARS.contains(c) {
            State::Operator { pending: Some(c) }
        } else if c.is_ascii_digit() {
            State::Number(if c == '0' { Base::Unknown } else { Base::Decimal })
        } else if is_terminator(c) {
            State::Init
        } else {
            State::Word
        };
        false
    }
}

fn is_terminator(c: char) -> bool {
    c.is_whitespace() || STRUCTURAL_CHARS.contains(c)
}

fn is_operator_pair(first: char, second: char) -> bool {
    OPERATOR_PAIRS.iter().any(|pair| {
        let mut chars = pair.chars();
        chars.next() == Some(first) && chars.next() == Some(second)
    })
}

/// Lazy tokenizer over one line. Cloning restarts nothing; it forks the
/// current position.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    chars: CharIndices<'a>,
    state: State,
    chunk_start: usize,
    ready: VecDeque<Spanned<&'a str>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.char_indices();
        let mut state = State::Init;
        if let Some((_, first)) = chars.next() {
            state.start(first);
        }
        Self {
            input,
            chars,
            state,
            chunk_start: 0,
            ready: VecDeque::new(),
        }
    }

    fn next_chunk(&mut self) -> Option<Span> {
        if self.chunk_start >= self.input.len() {
            return None;
        }
        for (i, c) in self.chars.by_ref() {
            if !self.state.step(c) {
                let span = self.chunk_start..i;
                self.chunk_start = i;
                return Some(span);
            }
        }
        let span = self.chunk_start..self.input.len();
        self.chunk_start = self.input.len();
        Some(span)
    }

    /// Trim a chunk and split `..` out of it, queueing the resulting tokens.
    fn queue_chunk(&mut self, span: Span) {
        let raw = &self.input[span.clone()];
        if raw.starts_with(|c: char| QUOTES.contains(c)) {
            self.ready.push_back(Spanned::new(raw, span));
            return;
        }

        let mut rest = raw.trim();
        if rest.is_empty() {
            return;
        }
        let mut pos = span.start + (raw.len() - raw.trim_start().len());
        while let Some(idx) = rest.find(RANGE) {
            if idx > 0 {
                self.ready.push_back(Spanned::new(&rest[..idx], pos..pos + idx));
            }
            let op_end = idx + RANGE.len();
            self.ready
                .push_back(Spanned::new(&rest[idx..op_end], pos + idx..pos + op_end));
            rest = &rest[op_end..];
            pos += op_end;
        }
        if !rest.is_empty() {
            self.ready.push_back(Spanned::new(rest, pos..pos + rest.len()));
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Spanned<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.ready.pop_front() {
                tracing::trace!(token = token.token, span = ?token.span, "token");
                return Some(token);
            }
            let span = self.next_chunk()?;
            self.queue_chunk(span);
        }
    }
}

/// Tokenize a line into string slices.
pub fn tokenize(input: &str) -> impl Iterator<Item = &str> + Clone + '_ {
    Tokenizer::new(input).map(|spanned| spanned.token)
}
