//! The error type carried through parsing and inside streams.
//!
//! Errors are plain data: they are cloned into stream elements, compared in
//! tests and rendered by the printer as a single line.

use thiserror::Error;

/// Everything that can go wrong while parsing a line or producing a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Json(String),

    #[error("expected an operator")]
    MissingOperator,

    #[error("operator is missing an operand")]
    MissingOperand,

    #[error("'?' without a matching ':'")]
    MissingTernary,

    #[error("unbalanced '{0}'")]
    MismatchedBracket(char),

    #[error("{0}")]
    InvalidClosureSignature(String),

    #[error("a closure must be the last element of its stage")]
    ClosureNotFinal,

    #[error("${0} is not defined")]
    InvalidStreamRef(String),

    #[error("operator is not defined for numbers")]
    InvalidNumberOp,

    #[error("operator is not defined for booleans")]
    InvalidBoolOp,

    #[error("operator is not defined for strings")]
    InvalidStringOp,

    #[error("operator is not defined for these operands")]
    InvalidOp,

    #[error("{0}")]
    Exec(String),

    #[error("{0}")]
    ExecPipe(String),

    #[error("{0}")]
    ExecFork(String),

    #[error("{0}")]
    ExecRead(String),

    #[error("process exited with status {0}")]
    ExecNonZeroStatus(i32),

    #[error("{0}")]
    Config(String),

    #[error("exit with status {0}")]
    Exit(i32),
}

impl Error {
    /// Stable name of the error kind, shown before the message by printers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "ParseError",
            Error::Json(_) => "JsonError",
            Error::MissingOperator => "MissingOperator",
            Error::MissingOperand => "MissingOperand",
            Error::MissingTernary => "MissingTernary",
            Error::MismatchedBracket(_) => "MismatchedBracket",
            Error::InvalidClosureSignature(_) => "InvalidClosureSignature",
            Error::ClosureNotFinal => "ClosureNotFinal",
            Error::InvalidStreamRef(_) => "InvalidStreamRef",
            Error::InvalidNumberOp => "InvalidNumberOp",
            Error::InvalidBoolOp => "InvalidBoolOp",
            Error::InvalidStringOp => "InvalidStringOp",
            Error::InvalidOp => "InvalidOp",
            Error::Exec(_) => "ExecError",
            Error::ExecPipe(_) => "ExecPipeError",
            Error::ExecFork(_) => "ExecForkError",
            Error::ExecRead(_) => "ExecReadError",
            Error::ExecNonZeroStatus(_) => "ExecNonZeroStatus",
            Error::Config(_) => "ConfigError",
            Error::Exit(_) => "Exit",
        }
    }

    /// True for errors produced while building the pipeline rather than
    /// while pulling values through it.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Parse(_)
                | Error::MissingOperator
                | Error::MissingOperand
                | Error::MissingTernary
                | Error::MismatchedBracket(_)
                | Error::InvalidClosureSignature(_)
                | Error::ClosureNotFinal
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}
