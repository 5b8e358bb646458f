use calcsheet_core::{CellError, Value};

use super::{flatten, Category, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Logical;

    registry.add("IF", Logical, 2, Some(3), if_fn);
    registry.add("AND", Logical, 1, None, and);
    registry.add("OR", Logical, 1, None, or);
    registry.add("NOT", Logical, 1, Some(1), not);
    registry.add("TRUE", Logical, 0, Some(0), true_fn);
    registry.add("FALSE", Logical, 0, Some(0), false_fn);
    registry.add("IFERROR", Logical, 2, Some(2), iferror);
    registry.add("ISBLANK", Logical, 1, Some(1), isblank);
    registry.add("ISERROR", Logical, 1, Some(1), iserror);
    registry.add("ISTEXT", Logical, 1, Some(1), istext);
    registry.add("ISNUMBER", Logical, 1, Some(1), isnumber);
}

/// IF - Conditional selection; both branches are already evaluated
pub fn if_fn(values: &[Value]) -> Value {
    let (Some(condition), Some(when_true)) = (values.first(), values.get(1)) else {
        return Value::Error(CellError::InvalidValue);
    };
    if condition.is_truthy() {
        when_true.clone()
    } else {
        values.get(2).cloned().unwrap_or(Value::Boolean(false))
    }
}

/// Non-blank flattened arguments; `#VALUE!` when there are none
fn conditions(values: &[Value]) -> Result<Vec<Value>, Value> {
    let conditions: Vec<Value> = flatten(values).into_iter().filter(|v| !v.is_blank()).collect();
    if conditions.is_empty() {
        return Err(Value::Error(CellError::InvalidValue));
    }
    Ok(conditions)
}

/// AND - True when every non-blank value is truthy
pub fn and(values: &[Value]) -> Value {
    match conditions(values) {
        Ok(conditions) => Value::Boolean(conditions.iter().all(Value::is_truthy)),
        Err(e) => e,
    }
}

/// OR - True when any non-blank value is truthy
pub fn or(values: &[Value]) -> Value {
    match conditions(values) {
        Ok(conditions) => Value::Boolean(conditions.iter().any(Value::is_truthy)),
        Err(e) => e,
    }
}

/// Boolean test of the single argument; `#VALUE!` when it is missing
fn check_first(values: &[Value], test: fn(&Value) -> bool) -> Value {
    values
        .first()
        .map_or(Value::Error(CellError::InvalidValue), |v| Value::Boolean(test(v)))
}

/// NOT - Logical NOT
pub fn not(values: &[Value]) -> Value {
    check_first(values, |v| !v.is_truthy())
}

pub fn true_fn(_values: &[Value]) -> Value {
    Value::Boolean(true)
}

pub fn false_fn(_values: &[Value]) -> Value {
    Value::Boolean(false)
}

/// IFERROR - The fallback when the first value is an error sentinel
pub fn iferror(values: &[Value]) -> Value {
    match (values.first(), values.get(1)) {
        (Some(value), Some(fallback)) if value.is_error() => fallback.clone(),
        (Some(value), Some(_)) => value.clone(),
        _ => Value::Error(CellError::InvalidValue),
    }
}

pub fn isblank(values: &[Value]) -> Value {
    check_first(values, Value::is_blank)
}

/// ISERROR - Error variant or any text starting with `#`
pub fn iserror(values: &[Value]) -> Value {
    check_first(values, Value::is_error)
}

pub fn istext(values: &[Value]) -> Value {
    check_first(values, |v| matches!(v, Value::Text(s) if !s.is_empty()))
}

pub fn isnumber(values: &[Value]) -> Value {
    check_first(values, |v| matches!(v, Value::Number(_)))
}
