use calcsheet_core::{AddressError, WorkbookError};
use thiserror::Error;

/// Malformed formula syntax. The engine turns any of these into `#PARSE!`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("Unexpected token {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Unmatched parenthesis at position {0}")]
    UnmatchedParen(usize),

    #[error("Invalid cell reference '{0}'")]
    InvalidReference(String),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Formula nested too deeply at position {0}")]
    TooDeep(usize),
}

/// Failure that aborts a whole evaluation; reported as `#ERROR: <message>`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("maximum evaluation depth exceeded")]
    DepthExceeded,
}

/// Errors returned to the host for bad addresses or sheet names.
///
/// Formula-level problems never surface here; they become sentinel values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

/// Errors loading an engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
