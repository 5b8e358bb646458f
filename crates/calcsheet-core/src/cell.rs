use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::CellError;
use crate::range::QualifiedAddress;

/// A resolved value: the result of evaluating a formula or a raw cell input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Row-major 2-D array, produced by range references and array literals
    Array(Vec<Vec<Value>>),
    Error(CellError),
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl Value {
    /// Build a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Empty cells and empty strings are both blank
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// An error is either an error sentinel or any text starting with `#`
    pub fn is_error(&self) -> bool {
        match self {
            Value::Error(_) => true,
            Value::Text(s) => s.starts_with('#'),
            _ => false,
        }
    }

    /// Numeric coercion shared by operators and functions.
    ///
    /// Numbers pass through, booleans become 1/0, text is parsed as a leading
    /// float (0 when unparseable), and everything else is 0. Error sentinels
    /// therefore coerce to 0 rather than propagating.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(s) => parse_float_prefix(s).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Like [`Value::to_number`] but distinguishes text that holds no number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => parse_float_prefix(s),
            _ => None,
        }
    }

    /// String coercion used by `&` and the text functions
    pub fn to_text(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Array(rows) => rows
                .iter()
                .flatten()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Error(e) => e.to_string(),
        }
    }

    /// Truthiness used by IF, AND, OR and NOT
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Array(_) | Value::Error(_) => true,
        }
    }

    /// Type-sensitive equality used by the `=` and `<>` operators
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Array(_), _) | (_, Value::Array(_)) => false,
            (Value::Number(_), _) | (_, Value::Number(_)) => false,
            (Value::Boolean(_), _) | (_, Value::Boolean(_)) => false,
            // Remaining combinations are all string-like
            (a, b) => a.to_text() == b.to_text(),
        }
    }

    /// View this value as a 2-D table; scalars become a 1x1 table
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        match self {
            Value::Array(rows) => rows.clone(),
            other => vec![vec![other.clone()]],
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Render a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse the longest leading float in `s`, ignoring leading whitespace.
///
/// `"12abc"` parses as 12; text with no leading number yields `None`.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// A single cell record: raw input, resolved value and dependency edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Resolved value (the cached result for formula cells)
    pub value: Value,
    /// Raw formula text including the leading `=`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Stored error, set when the formula failed to parse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CellError>,
    /// Cells this cell's formula reads
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<QualifiedAddress>,
    /// Cells whose formulas read this cell
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependents: BTreeSet<QualifiedAddress>,
}

impl Cell {
    /// Create a cell holding a raw value
    pub fn with_value(value: impl Into<Value>) -> Self {
        Cell {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Check if this cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Check if the cell is an untouched stub (no value, no formula, no error)
    pub fn is_empty(&self) -> bool {
        self.value.is_blank() && self.formula.is_none() && self.error.is_none()
    }
}
