use calcsheet_core::{CellError, Value};

use super::{flatten, number_arg, text_arg, Category, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Text;

    registry.add("CONCATENATE", Text, 1, None, concatenate);
    registry.add("LEFT", Text, 1, Some(2), left);
    registry.add("RIGHT", Text, 1, Some(2), right);
    registry.add("MID", Text, 3, Some(3), mid);
    registry.add("LEN", Text, 1, Some(1), len);
    registry.add("LOWER", Text, 1, Some(1), lower);
    registry.add("UPPER", Text, 1, Some(1), upper);
    registry.add("PROPER", Text, 1, Some(1), proper);
    registry.add("TRIM", Text, 1, Some(1), trim);
    registry.add("SUBSTITUTE", Text, 3, Some(4), substitute);
    registry.add("FIND", Text, 2, Some(3), find);
    registry.add("SEARCH", Text, 2, Some(3), search);
}

/// Character count argument; negative counts are `#VALUE!`
fn count_arg(values: &[Value], index: usize, default: f64) -> Result<usize, Value> {
    let n = number_arg(values, index, default);
    if n < 0.0 || n.is_nan() {
        return Err(Value::Error(CellError::InvalidValue));
    }
    Ok(n.trunc() as usize)
}

/// CONCATENATE - Join the text of every argument
pub fn concatenate(values: &[Value]) -> Value {
    Value::Text(flatten(values).iter().map(Value::to_text).collect())
}

/// LEFT - Leftmost characters (default 1)
pub fn left(values: &[Value]) -> Value {
    let text = text_arg(values, 0);
    match count_arg(values, 1, 1.0) {
        Ok(n) => Value::Text(text.chars().take(n).collect()),
        Err(e) => e,
    }
}

/// RIGHT - Rightmost characters (default 1)
pub fn right(values: &[Value]) -> Value {
    let text = text_arg(values, 0);
    match count_arg(values, 1, 1.0) {
        Ok(n) => {
            let skip = text.chars().count().saturating_sub(n);
            Value::Text(text.chars().skip(skip).collect())
        }
        Err(e) => e,
    }
}

/// MID - Characters from a 1-based start position
pub fn mid(values: &[Value]) -> Value {
    let text = text_arg(values, 0);
    let start = number_arg(values, 1, 1.0);
    if start < 1.0 || start.is_nan() {
        return Value::Error(CellError::InvalidValue);
    }
    match count_arg(values, 2, 0.0) {
        Ok(n) => Value::Text(text.chars().skip(start as usize - 1).take(n).collect()),
        Err(e) => e,
    }
}

/// LEN - Length of text in characters
pub fn len(values: &[Value]) -> Value {
    Value::Number(text_arg(values, 0).chars().count() as f64)
}

/// LOWER - Convert to lowercase
pub fn lower(values: &[Value]) -> Value {
    Value::Text(text_arg(values, 0).to_lowercase())
}

/// UPPER - Convert to uppercase
pub fn upper(values: &[Value]) -> Value {
    Value::Text(text_arg(values, 0).to_uppercase())
}

/// PROPER - Capitalize the first letter of every word, lowercase the rest
pub fn proper(values: &[Value]) -> Value {
    let mut result = String::new();
    let mut start_of_word = true;

    for c in text_arg(values, 0).chars() {
        if c.is_alphabetic() {
            if start_of_word {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            result.push(c);
            start_of_word = !c.is_ascii_digit();
        }
    }

    Value::Text(result)
}

/// TRIM - Strip leading/trailing spaces and collapse inner runs to one space
pub fn trim(values: &[Value]) -> Value {
    let text = text_arg(values, 0);
    Value::Text(text.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
}

/// SUBSTITUTE - Replace every occurrence, or only the Nth when an instance is given
pub fn substitute(values: &[Value]) -> Value {
    let text = text_arg(values, 0);
    let old = text_arg(values, 1);
    let new = text_arg(values, 2);

    if old.is_empty() {
        return Value::Text(text);
    }

    if values.len() < 4 {
        return Value::Text(text.replace(&old, &new));
    }

    let instance = number_arg(values, 3, 1.0);
    if instance < 1.0 || instance.is_nan() {
        return Value::Error(CellError::InvalidValue);
    }

    match text.match_indices(&old).nth(instance as usize - 1) {
        Some((index, _)) => {
            let mut result = String::with_capacity(text.len());
            result.push_str(&text[..index]);
            result.push_str(&new);
            result.push_str(&text[index + old.len()..]);
            Value::Text(result)
        }
        None => Value::Text(text),
    }
}

/// Shared body of FIND and SEARCH: 1-based character position or `#VALUE!`
fn locate(needle: &str, haystack: &str, start: f64) -> Value {
    let char_len = haystack.chars().count();
    if start < 1.0 || start.is_nan() || start as usize > char_len + 1 {
        return Value::Error(CellError::InvalidValue);
    }

    let skip = start as usize - 1;
    let byte_offset = haystack
        .char_indices()
        .nth(skip)
        .map_or(haystack.len(), |(i, _)| i);

    match haystack[byte_offset..].find(needle) {
        Some(found) => {
            let chars_before = haystack[..byte_offset + found].chars().count();
            Value::Number((chars_before + 1) as f64)
        }
        None => Value::Error(CellError::InvalidValue),
    }
}

/// FIND - Case-sensitive position of one text within another
pub fn find(values: &[Value]) -> Value {
    locate(
        &text_arg(values, 0),
        &text_arg(values, 1),
        number_arg(values, 2, 1.0),
    )
}

/// SEARCH - Case-insensitive position of one text within another
pub fn search(values: &[Value]) -> Value {
    locate(
        &text_arg(values, 0).to_lowercase(),
        &text_arg(values, 1).to_lowercase(),
        number_arg(values, 2, 1.0),
    )
}
