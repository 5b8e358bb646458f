use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

static CELL_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("cell label pattern is valid")
});

/// Check whether `label` has the shape of an A1-style cell reference
pub fn is_cell_label(label: &str) -> bool {
    CELL_LABEL.is_match(label)
}

/// Convert column letters to a 1-based number (A=1, Z=26, AA=27, ...)
///
/// Letters are case-insensitive. Returns `None` for empty input, non-letters,
/// or columns that overflow `u32`.
pub fn column_to_number(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }

    Some(col)
}

/// Convert a 1-based column number to letters (1=A, 26=Z, 27=AA, ...)
///
/// Exact inverse of [`column_to_number`] for every positive integer; 0 maps
/// to the empty string.
pub fn number_to_column(col: u32) -> String {
    let mut label = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        label.insert(0, char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }

    label
}

/// Cell address within a sheet, 1-based on both axes (A1 = row 1, col 1)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(row: u32, col: u32) -> Self {
        CellAddress { row, col }
    }

    /// Parse A1 notation (case-insensitive, surrounding whitespace ignored)
    pub fn from_a1(notation: &str) -> Result<Self, AddressError> {
        let notation = notation.trim();
        let invalid = || AddressError::InvalidCell(notation.to_string());

        let caps = CELL_LABEL.captures(notation).ok_or_else(invalid)?;
        let col = column_to_number(&caps[1]).ok_or_else(invalid)?;
        let row: u32 = caps[2].parse().map_err(|_| invalid())?;

        if row == 0 {
            return Err(invalid());
        }

        Ok(CellAddress { row, col })
    }

    /// Convert to A1 notation (e.g., row 1, col 1 -> "A1")
    pub fn to_a1(&self) -> String {
        format!("{}{}", number_to_column(self.col), self.row)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

impl FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellAddress::from_a1(s)
    }
}

impl From<CellAddress> for String {
    fn from(addr: CellAddress) -> Self {
        addr.to_a1()
    }
}

impl TryFrom<String> for CellAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CellAddress::from_a1(&s)
    }
}

/// A sheet-qualified cell address, rendered as `Sheet!A1`.
///
/// These are the keys of the dependency graph.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QualifiedAddress {
    pub sheet: String,
    pub cell: CellAddress,
}

impl QualifiedAddress {
    pub fn new(sheet: impl Into<String>, cell: CellAddress) -> Self {
        QualifiedAddress {
            sheet: sheet.into(),
            cell,
        }
    }
}

impl fmt::Display for QualifiedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.cell)
    }
}

impl FromStr for QualifiedAddress {
    type Err = AddressError;

    /// Parse `Sheet!A1`; the sheet part is everything before the last `!`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sheet, cell) = s
            .rsplit_once('!')
            .ok_or_else(|| AddressError::InvalidCell(s.to_string()))?;
        if sheet.is_empty() {
            return Err(AddressError::InvalidCell(s.to_string()));
        }
        Ok(QualifiedAddress::new(sheet, CellAddress::from_a1(cell)?))
    }
}

impl From<QualifiedAddress> for String {
    fn from(addr: QualifiedAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for QualifiedAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A rectangular block of cells (e.g., A1:B10), normalized top-left first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        CellRange {
            start: CellAddress::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellAddress::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Create from A1:B1 notation; a single address is a 1x1 range
    pub fn from_a1(notation: &str) -> Result<Self, AddressError> {
        match notation.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::from_a1(start)
                    .map_err(|_| AddressError::InvalidRange(notation.to_string()))?;
                let end = CellAddress::from_a1(end)
                    .map_err(|_| AddressError::InvalidRange(notation.to_string()))?;
                Ok(CellRange::new(start, end))
            }
            None => {
                let cell = CellAddress::from_a1(notation)?;
                Ok(CellRange::new(cell, cell))
            }
        }
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Iterate every enclosed address in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellAddress::new(row, col))
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_to_number() {
        assert_eq!(column_to_number("A"), Some(1));
        assert_eq!(column_to_number("Z"), Some(26));
        assert_eq!(column_to_number("AA"), Some(27));
        assert_eq!(column_to_number("az"), Some(52));
        assert_eq!(column_to_number(""), None);
        assert_eq!(column_to_number("A1"), None);
    }

    #[test]
    fn test_number_to_column() {
        assert_eq!(number_to_column(1), "A");
        assert_eq!(number_to_column(26), "Z");
        assert_eq!(number_to_column(27), "AA");
        assert_eq!(number_to_column(702), "ZZ");
        assert_eq!(number_to_column(703), "AAA");
    }

    #[test]
    fn test_column_round_trip() {
        for label in ["A", "Z", "AA", "AZ", "ZZ"] {
            let n = column_to_number(label).unwrap();
            assert_eq!(number_to_column(n), label);
        }
        for n in 1..=2000 {
            assert_eq!(column_to_number(&number_to_column(n)), Some(n));
        }
    }

    #[test]
    fn test_cell_address_a1() {
        assert_eq!(CellAddress::from_a1("A1").unwrap(), CellAddress::new(1, 1));
        assert_eq!(CellAddress::from_a1("ab12").unwrap(), CellAddress::new(12, 28));
        assert_eq!(CellAddress::new(12, 28).to_a1(), "AB12");
        assert!(CellAddress::from_a1("A0").is_err());
        assert!(CellAddress::from_a1("1A").is_err());
        assert!(CellAddress::from_a1("A1B").is_err());
    }

    #[test]
    fn test_qualified_address() {
        let qa: QualifiedAddress = "Sheet1!B3".parse().unwrap();
        assert_eq!(qa, QualifiedAddress::new("Sheet1", CellAddress::new(3, 2)));
        assert_eq!(qa.to_string(), "Sheet1!B3");
        assert!("B3".parse::<QualifiedAddress>().is_err());
    }

    #[test]
    fn test_range_cells() {
        let range = CellRange::from_a1("B2:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(1, 1));
        assert_eq!(range.row_count(), 2);
        assert_eq!(range.col_count(), 2);
        let cells: Vec<String> = range.cells().map(|c| c.to_a1()).collect();
        assert_eq!(cells, vec!["A1", "B1", "A2", "B2"]);
    }
}
