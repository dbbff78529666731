//! Operators: the precedence table and what each operator does to values.
//!
//! Dispatch is an explicit match over (operator, operand domain). Operands are
//! first reduced to the widest domain they share: number, boolean or string.
//! Logical operators always work on truthiness, and comparisons between a
//! boolean and a string or number coerce both sides to truthiness too.
//! Anything left over only supports `==` and `!=`.
//!
//! | tier | operators                          | assoc  |
//! |------|------------------------------------|--------|
//! | 10   | prefix `+ - !`                     | right  |
//! | 9    | postfix `..` `&`                   | -      |
//! | 8    | `* / %`                            | left   |
//! | 7    | `+ - < <= > >= ..`                 | left   |
//! | 6    | `== !=`                            | left   |
//! | 5    | `&& \|\|`                          | left   |
//! | 4    | `? :`                              | right  |
//! | 3    | `= \|`                             | left   |
//! | 2    | `;`                                | left   |
//! | 1    | `:` (print window), `->` (bind)    | left / right |

use stsh_types::{Error, Stream, Value, ValueKind};

/// Precedence of the ternary `?` and its matching `:`.
pub const TERNARY_PRECEDENCE: u8 = 4;

/// Every operator the parser knows, already disambiguated by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Prefix
    Neg,
    Pos,
    Not,
    // Postfix
    RangeFrom,
    Background,
    // Binary value operators
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Range,
    Eq,
    Ne,
    And,
    Or,
    // Structural
    Assign,
    Pipe,
    Seq,
    Window,
    Bind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
    Infix,
}

impl Op {
    pub fn precedence(self) -> u8 {
        match self {
            Op::Neg | Op::Pos | Op::Not => 10,
            Op::RangeFrom | Op::Background => 9,
            Op::Mul | Op::Div | Op::Rem => 8,
            Op::Add | Op::Sub | Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Range => 7,
            Op::Eq | Op::Ne => 6,
            Op::And | Op::Or => 5,
            Op::Assign | Op::Pipe => 3,
            Op::Seq => 2,
            Op::Window | Op::Bind => 1,
        }
    }

    /// Right-associative operators only reduce strictly tighter operators
    /// when they arrive.
    pub fn is_right_assoc(self) -> bool {
        matches!(self.fixity(), Fixity::Prefix) || self == Op::Bind
    }

    pub fn fixity(self) -> Fixity {
        match self {
            Op::Neg | Op::Pos | Op::Not => Fixity::Prefix,
            Op::RangeFrom | Op::Background => Fixity::Postfix,
            _ => Fixity::Infix,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Neg | Op::Sub => "-",
            Op::Pos | Op::Add => "+",
            Op::Not => "!",
            Op::RangeFrom | Op::Range => "..",
            Op::Background => "&",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Assign => "=",
            Op::Pipe => "|",
            Op::Seq => ";",
            Op::Window => ":",
            Op::Bind => "->",
        }
    }

    pub fn prefix(symbol: &str) -> Option<Op> {
        match symbol {
            "-" => Some(Op::Neg),
            "+" => Some(Op::Pos),
            "!" => Some(Op::Not),
            _ => None,
        }
    }

    /// Binary operators by symbol. `..` is returned as the closed range;
    /// the parser decides whether it is used postfix.
    pub fn infix(symbol: &str) -> Option<Op> {
        let op = match symbol {
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Rem,
            "+" => Op::Add,
            "-" => Op::Sub,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            ".." => Op::Range,
            "==" => Op::Eq,
            "!=" => Op::Ne,
            "&&" => Op::And,
            "||" => Op::Or,
            "=" => Op::Assign,
            "|" => Op::Pipe,
            ";" => Op::Seq,
            ":" => Op::Window,
            "->" => Op::Bind,
            _ => return None,
        };
        Some(op)
    }

    /// Binary operators that compute a value from two values. These are the
    /// only operators recognized inside a record literal.
    pub fn is_value_op(self) -> bool {
        self.fixity() == Fixity::Infix && self.precedence() >= 5 && self != Op::Range
    }

    fn is_logical(self) -> bool {
        matches!(self, Op::And | Op::Or)
    }

    fn is_comparison(self) -> bool {
        matches!(self, Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne)
    }
}

/// What applying an operator produced: a single value, or a stream for
/// ranges.
pub enum Outcome {
    Value(Value),
    Stream(Stream),
}

impl Outcome {
    fn bool(b: bool) -> Result<Self, Error> {
        Ok(Outcome::Value(Value::bool(b)))
    }
}

/// The widest domain two operands share for a given operator.
enum Domain<'a> {
    Number(f64, f64),
    Bool(bool, bool),
    String(&'a str, &'a str),
    Other,
}

fn domain<'a>(op: Op, lhs: &'a Value, rhs: &'a Value) -> Domain<'a> {
    use ValueKind::*;

    let (lk, rk) = (lhs.kind(), rhs.kind());
    if lk == Typed || rk == Typed {
        return Domain::Other;
    }
    if op.is_logical() {
        return Domain::Bool(lhs.is_truthy(), rhs.is_truthy());
    }
    match (lk, rk) {
        (Number, Number) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Domain::Number(a, b),
            _ => Domain::Other,
        },
        (Bool, Bool) => Domain::Bool(lhs.is_truthy(), rhs.is_truthy()),
        (String, String) => match (lhs.as_str(), rhs.as_str()) {
            (Some(a), Some(b)) => Domain::String(a, b),
            _ => Domain::Other,
        },
        (Bool, String | Number) | (String | Number, Bool) if op.is_comparison() => {
            Domain::Bool(lhs.is_truthy(), rhs.is_truthy())
        }
        _ => Domain::Other,
    }
}

/// The error for an operator that `kind` does not support.
fn unsupported(kind: ValueKind) -> Error {
    match kind {
        ValueKind::Number => Error::InvalidNumberOp,
        ValueKind::Bool => Error::InvalidBoolOp,
        ValueKind::String => Error::InvalidStringOp,
        _ => Error::InvalidOp,
    }
}

/// Apply a prefix or postfix operator.
pub fn unary(op: Op, operand: &Value) -> Result<Outcome, Error> {
    match op {
        Op::Not => match operand.kind() {
            ValueKind::Typed => Err(Error::InvalidOp),
            _ => Outcome::bool(!operand.is_truthy()),
        },
        Op::Neg | Op::Pos | Op::RangeFrom => {
            let n = operand.as_f64().ok_or_else(|| unsupported(operand.kind()))?;
            Ok(match op {
                Op::Neg => Outcome::Value(Value::number(-n)),
                Op::Pos => Outcome::Value(Value::number(n)),
                _ => Outcome::Stream(open_range(n)),
            })
        }
        Op::Background => Ok(Outcome::Value(operand.clone())),
        _ => Err(Error::InvalidOp),
    }
}

/// Apply a binary value operator.
pub fn binary(op: Op, lhs: &Value, rhs: &Value) -> Result<Outcome, Error> {
    match domain(op, lhs, rhs) {
        Domain::Number(a, b) => number_op(op, a, b),
        Domain::Bool(a, b) => bool_op(op, a, b),
        Domain::String(a, b) => string_op(op, a, b),
        Domain::Other => match op {
            Op::Eq => Outcome::bool(lhs == rhs),
            Op::Ne => Outcome::bool(lhs != rhs),
            _ => Err(Error::InvalidOp),
        },
    }
}

fn number_op(op: Op, a: f64, b: f64) -> Result<Outcome, Error> {
    let n = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => a / b,
        Op::Rem => a % b,
        Op::Lt => return Outcome::bool(a < b),
        Op::Le => return Outcome::bool(a <= b),
        Op::Gt => return Outcome::bool(a > b),
        Op::Ge => return Outcome::bool(a >= b),
        Op::Eq => return Outcome::bool(a == b),
        Op::Ne => return Outcome::bool(a != b),
        Op::Range => return Ok(Outcome::Stream(closed_range(a, b))),
        _ => return Err(Error::InvalidNumberOp),
    };
    // Infinity and NaN have no JSON representation.
    if !n.is_finite() {
        return Err(Error::InvalidNumberOp);
    }
    Ok(Outcome::Value(Value::number(n)))
}

fn bool_op(op: Op, a: bool, b: bool) -> Result<Outcome, Error> {
    match op {
        Op::And => Outcome::bool(a && b),
        Op::Or => Outcome::bool(a || b),
        Op::Eq => Outcome::bool(a == b),
        Op::Ne => Outcome::bool(a != b),
        Op::Lt => Outcome::bool(!a & b),
        Op::Le => Outcome::bool(a <= b),
        Op::Gt => Outcome::bool(a & !b),
        Op::Ge => Outcome::bool(a >= b),
        _ => Err(Error::InvalidBoolOp),
    }
}

fn string_op(op: Op, a: &str, b: &str) -> Result<Outcome, Error> {
    match op {
        Op::Add => Ok(Outcome::Value(Value::string(format!("{a}{b}")))),
        Op::Eq => Outcome::bool(a == b),
        Op::Ne => Outcome::bool(a != b),
        Op::Lt => Outcome::bool(a < b),
        Op::Le => Outcome::bool(a <= b),
        Op::Gt => Outcome::bool(a > b),
        Op::Ge => Outcome::bool(a >= b),
        _ => Err(Error::InvalidStringOp),
    }
}

/// Inclusive integer range. Bounds are truncated toward zero; an inverted
/// range is empty.
pub fn closed_range(from: f64, to: f64) -> Stream {
    let (from, to) = (from.trunc() as i64, to.trunc() as i64);
    Box::new((from..=to).map(|i| Ok(Value::from(i))))
}

/// Ascending integer range, ending at `i64::MAX`.
pub fn open_range(from: f64) -> Stream {
    let from = from.trunc() as i64;
    Box::new((from..=i64::MAX).map(|i| Ok(Value::from(i))))
}
