use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Represents possible cell errors (Excel-compatible sentinels)
///
/// Every variant renders to a string beginning with `#`. Errors travel through
/// evaluation as ordinary values, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellError {
    /// #DIV/0! - Division by zero
    DivisionByZero,
    /// #VALUE! - Invalid value type or argument count
    InvalidValue,
    /// #REF! - Invalid cell reference or missing sheet
    InvalidReference,
    /// #NAME? (FN) - Unregistered function name
    InvalidName(String),
    /// #NUM! - Invalid numeric value
    NumError,
    /// #N/A - Value not available
    NotAvailable,
    /// #CIRCULAR! - Circular reference detected
    CircularReference,
    /// #PARSE! - Formula text could not be parsed
    Parse,
    /// #ERROR: message - Evaluation aborted
    Internal(String),
}

impl CellError {
    /// Recognize a sentinel string produced by [`CellError`]'s `Display`
    pub fn from_sentinel(text: &str) -> Option<Self> {
        let error = match text {
            "#DIV/0!" => CellError::DivisionByZero,
            "#VALUE!" => CellError::InvalidValue,
            "#REF!" => CellError::InvalidReference,
            "#NUM!" => CellError::NumError,
            "#N/A" => CellError::NotAvailable,
            "#CIRCULAR!" => CellError::CircularReference,
            "#PARSE!" => CellError::Parse,
            _ => {
                if let Some(rest) = text.strip_prefix("#NAME? (") {
                    return rest
                        .strip_suffix(')')
                        .map(|name| CellError::InvalidName(name.to_string()));
                }
                if let Some(message) = text.strip_prefix("#ERROR: ") {
                    return Some(CellError::Internal(message.to_string()));
                }
                return None;
            }
        };
        Some(error)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::DivisionByZero => write!(f, "#DIV/0!"),
            CellError::InvalidValue => write!(f, "#VALUE!"),
            CellError::InvalidReference => write!(f, "#REF!"),
            CellError::InvalidName(name) => write!(f, "#NAME? ({})", name),
            CellError::NumError => write!(f, "#NUM!"),
            CellError::NotAvailable => write!(f, "#N/A"),
            CellError::CircularReference => write!(f, "#CIRCULAR!"),
            CellError::Parse => write!(f, "#PARSE!"),
            CellError::Internal(message) => write!(f, "#ERROR: {}", message),
        }
    }
}

/// Errors raised when a host passes malformed addresses or sheet names
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid cell address: {0}")]
    InvalidCell(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// Errors raised by sheet-level operations on a [`crate::Workbook`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkbookError {
    #[error("Sheet already exists: {0}")]
    DuplicateSheet(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_display() {
        assert_eq!(CellError::DivisionByZero.to_string(), "#DIV/0!");
        assert_eq!(CellError::InvalidName("FOO".into()).to_string(), "#NAME? (FOO)");
        assert_eq!(
            CellError::Internal("boom".into()).to_string(),
            "#ERROR: boom"
        );
    }

    #[test]
    fn test_from_sentinel() {
        assert_eq!(CellError::from_sentinel("#N/A"), Some(CellError::NotAvailable));
        assert_eq!(
            CellError::from_sentinel("#NAME? (BAR)"),
            Some(CellError::InvalidName("BAR".into()))
        );
        assert_eq!(CellError::from_sentinel("#hashtag"), None);
        assert_eq!(CellError::from_sentinel("plain"), None);
    }
}
