use std::cmp::Ordering;

use calcsheet_core::{CellError, Value};

use super::{flatten, number_arg, Category, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Lookup;

    registry.add("VLOOKUP", Lookup, 3, Some(4), vlookup);
    registry.add("HLOOKUP", Lookup, 3, Some(4), hlookup);
    registry.add("INDEX", Lookup, 2, Some(3), index);
    registry.add("MATCH", Lookup, 2, Some(3), match_fn);
}

/// VLOOKUP - Find a value in the first column and return a cell from the same row
/// Args: lookup_value, table, col_index, [range_lookup = TRUE]
pub fn vlookup(values: &[Value]) -> Value {
    let (Some(target), Some(table)) = (values.first(), values.get(1)) else {
        return Value::Error(CellError::InvalidValue);
    };
    let table = table.to_rows();
    let col = number_arg(values, 2, 1.0).trunc();
    if col < 1.0 || col.is_nan() {
        return Value::Error(CellError::InvalidValue);
    }
    let col = col as usize - 1;

    let keys: Vec<&Value> = table.iter().filter_map(|row| row.first()).collect();
    let Some(row) = find_key(target, &keys, approximate(values)) else {
        return Value::Error(CellError::NotAvailable);
    };

    match table[row].get(col) {
        Some(v) => v.clone(),
        None => Value::Error(CellError::InvalidReference),
    }
}

/// HLOOKUP - Find a value in the first row and return a cell from the same column
/// Args: lookup_value, table, row_index, [range_lookup = TRUE]
pub fn hlookup(values: &[Value]) -> Value {
    let (Some(target), Some(table)) = (values.first(), values.get(1)) else {
        return Value::Error(CellError::InvalidValue);
    };
    let table = table.to_rows();
    let row = number_arg(values, 2, 1.0).trunc();
    if row < 1.0 || row.is_nan() {
        return Value::Error(CellError::InvalidValue);
    }
    let row = row as usize - 1;

    let keys: Vec<&Value> = table.first().map(|r| r.iter().collect()).unwrap_or_default();
    let Some(col) = find_key(target, &keys, approximate(values)) else {
        return Value::Error(CellError::NotAvailable);
    };

    match table.get(row).and_then(|r| r.get(col)) {
        Some(v) => v.clone(),
        None => Value::Error(CellError::InvalidReference),
    }
}

/// The optional fourth argument; absent means approximate match
fn approximate(values: &[Value]) -> bool {
    values.get(3).map_or(true, Value::is_truthy)
}

/// 0-based position of `target` among `keys`.
///
/// Exact mode scans for equality. Approximate mode assumes ascending keys and
/// keeps the last key <= target, stopping at the first key above it.
fn find_key(target: &Value, keys: &[&Value], approximate: bool) -> Option<usize> {
    if !approximate {
        return keys.iter().position(|key| values_equal(target, key));
    }

    let mut best = None;
    for (i, key) in keys.iter().enumerate() {
        match compare_values(key, target) {
            Some(Ordering::Greater) => break,
            Some(_) => best = Some(i),
            None => {}
        }
    }
    best
}

/// INDEX - Value at a 1-based row/column of an array.
///
/// A row or column of 0 selects the whole column or row. With a single-row
/// array and no column argument, the row argument indexes the columns.
pub fn index(values: &[Value]) -> Value {
    let Some(table) = values.first() else {
        return Value::Error(CellError::InvalidValue);
    };
    let table = table.to_rows();
    let mut row = number_arg(values, 1, 0.0).trunc();
    let mut col = number_arg(values, 2, 0.0).trunc();

    if values.len() < 3 && table.len() == 1 {
        col = row;
        row = 1.0;
    } else if values.len() < 3 {
        col = 1.0;
    }

    if row < 0.0 || col < 0.0 || row.is_nan() || col.is_nan() {
        return Value::Error(CellError::InvalidValue);
    }

    let height = table.len();
    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    let (row, col) = (row as usize, col as usize);
    if row > height || col > width {
        return Value::Error(CellError::InvalidReference);
    }

    match (row, col) {
        (0, 0) => Value::Array(table),
        (0, c) => Value::Array(
            table
                .iter()
                .map(|r| vec![r.get(c - 1).cloned().unwrap_or_default()])
                .collect(),
        ),
        (r, 0) => Value::Array(vec![table[r - 1].clone()]),
        (r, c) => match table[r - 1].get(c - 1) {
            Some(v) => v.clone(),
            None => Value::Error(CellError::InvalidReference),
        },
    }
}

/// MATCH - 1-based position of a value in a flattened array
/// Args: lookup_value, lookup_array, [match_type = 1]
pub fn match_fn(values: &[Value]) -> Value {
    let (Some(target), Some(array)) = (values.first(), values.get(1)) else {
        return Value::Error(CellError::InvalidValue);
    };
    let array = flatten(std::slice::from_ref(array));

    let position = match number_arg(values, 2, 1.0).trunc() as i64 {
        0 => array.iter().position(|v| values_equal(target, v)),
        1 => {
            // ascending: largest value <= target
            let mut best = None;
            for (i, v) in array.iter().enumerate() {
                match compare_values(v, target) {
                    Some(Ordering::Greater) => break,
                    Some(_) => best = Some(i),
                    None => {}
                }
            }
            best
        }
        -1 => {
            // descending: smallest value >= target
            let mut best = None;
            for (i, v) in array.iter().enumerate() {
                match compare_values(v, target) {
                    Some(Ordering::Less) => break,
                    Some(_) => best = Some(i),
                    None => {}
                }
            }
            best
        }
        _ => return Value::Error(CellError::InvalidValue),
    };

    match position {
        Some(i) => Value::Number((i + 1) as f64),
        None => Value::Error(CellError::NotAvailable),
    }
}

/// Lookup equality: numbers by value, text case-insensitively
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => (n1 - n2).abs() < 1e-10,
        (Value::Text(s1), Value::Text(s2)) => s1.to_lowercase() == s2.to_lowercase(),
        (Value::Boolean(b1), Value::Boolean(b2)) => b1 == b2,
        _ => false,
    }
}

/// Ordering of two values of the same kind; mixed kinds are incomparable
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => n1.partial_cmp(n2),
        (Value::Text(s1), Value::Text(s2)) => Some(s1.to_lowercase().cmp(&s2.to_lowercase())),
        (Value::Boolean(b1), Value::Boolean(b2)) => Some(b1.cmp(b2)),
        _ => None,
    }
}
