use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning one argument string into tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),
    #[error("'$' must be followed by a variable name")]
    EmptyVariableName,
}

/// Errors raised while assembling tokens into an expression tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("( expected")]
    ExpectedOpen,
    #[error(") expected")]
    ExpectedClose,
    #[error("operator '{0}' is missing an operand")]
    MissingOperand(String),
    #[error("unexpected '{0}' after a complete expression")]
    TrailingInput(String),
    #[error("empty expression")]
    Empty,
    #[error("expression nests deeper than {0} operators")]
    TooDeep(usize),
}

/// Errors in the block structure of a program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("`{command}` block is never closed with `end`")]
    Unclosed { command: String },
    #[error("`end` without an open block")]
    UnexpectedEnd,
    #[error("`{command}` without a preceding `if` or `elif`")]
    DanglingBranch { command: String },
}

/// Errors raised while evaluating an expression tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("cannot apply '{op}' to {left} and {right}")]
    Type {
        op: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    Overflow(String),
    #[error("number literal {0} does not fit in a 64-bit integer")]
    LiteralOutOfRange(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
}

/// Errors raised when registering a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command name {0:?} must be non-empty lowercase ASCII without whitespace")]
    InvalidName(String),
    #[error("`{0}` is reserved as the block terminator")]
    Reserved(String),
    #[error("command `{0}` is already registered")]
    Duplicate(String),
}

/// Every fatal failure of a run. Each variant names the source line it came from.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}, argument {}: {source}", .arg + 1)]
    Lex {
        line: usize,
        arg: usize,
        source: LexError,
    },
    #[error("line {line}, argument {}: {source}", .arg + 1)]
    Parse {
        line: usize,
        arg: usize,
        source: ParseError,
    },
    #[error("line {line}: {source}")]
    Block { line: usize, source: BlockError },
    #[error("line {line}: command `{command}` expects {expected}, got {found}")]
    Arity {
        line: usize,
        command: String,
        expected: &'static str,
        found: usize,
    },
    #[error("line {line}: {message}")]
    Type { line: usize, message: String },
    #[error("line {line}, argument {}: {source}", .arg + 1)]
    Eval {
        line: usize,
        arg: usize,
        source: EvalError,
    },
    #[error("line {line}: command `{command}` not found")]
    Lookup { line: usize, command: String },
    #[error("line {line}: function `{name}` is not defined")]
    UndefinedFunction { line: usize, name: String },
    #[error("line {line}, argument {}: argument is not a variable reference", .arg + 1)]
    Reference { line: usize, arg: usize },
    #[error("line {line}: can't read {}", .path.display())]
    Io {
        line: usize,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: invalid pattern")]
    Pattern { line: usize, source: regex::Error },
    #[error("line {line}: call depth exceeds {limit}")]
    Recursion { line: usize, limit: usize },
    #[error("line {line}: failed to write output")]
    Write {
        line: usize,
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ScriptError {
    /// Source line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ScriptError::Lex { line, .. }
            | ScriptError::Parse { line, .. }
            | ScriptError::Block { line, .. }
            | ScriptError::Arity { line, .. }
            | ScriptError::Type { line, .. }
            | ScriptError::Eval { line, .. }
            | ScriptError::Lookup { line, .. }
            | ScriptError::UndefinedFunction { line, .. }
            | ScriptError::Reference { line, .. }
            | ScriptError::Io { line, .. }
            | ScriptError::Pattern { line, .. }
            | ScriptError::Recursion { line, .. }
            | ScriptError::Write { line, .. } => Some(*line),
            ScriptError::Registry(_) => None,
        }
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;
