use thiserror::Error;

/// What went wrong on a source line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Too many byte values: general RAM is full")]
    TooManyValues,

    #[error("Too many bools: bit-addressable RAM is full")]
    TooManyBools,

    #[error("Too many registers in use at once")]
    TooManyRegisters,

    #[error("Invalid name: '{0}'")]
    InvalidName(String),

    #[error("Variable '{0}' already exists")]
    VariableExists(String),

    #[error("Else cannot stand alone")]
    ElseWithoutIf,

    #[error("Invalid parameter: {0}")]
    Parameter(String),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid value: '{0}'")]
    InvalidValue(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Error at line {}: {kind}\n    {text}", .line + 1)]
    Source {
        line: usize,
        text: String,
        kind: ErrorKind,
    },

    #[error("Interrupt handler '{name}' is not a declared method")]
    UnknownHandler { name: String },

    #[error("Interrupt handler '{name}' must not take parameters")]
    HandlerParameters { name: String },

    #[error("Backend compiling error: {message}")]
    BackendError { message: String },
}

impl CompileError {
    /// 0-based index of the offending source line, if the error has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Source { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Source { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
