use calcsheet_core::{CellError, Value};

use super::{number_result, numbers, Category, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Statistical;

    registry.add("MEDIAN", Statistical, 1, None, median);
    registry.add("MODE", Statistical, 1, None, mode);
    registry.add("STDEV", Statistical, 1, None, stdev);
    registry.add("VAR", Statistical, 1, None, var);
}

/// MEDIAN - Middle value (mean of the two middle values for even counts)
pub fn median(values: &[Value]) -> Value {
    let mut nums = numbers(values);
    if nums.is_empty() {
        return Value::Error(CellError::NumError);
    }

    nums.sort_by(|a, b| a.total_cmp(b));
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        Value::Number((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Value::Number(nums[mid])
    }
}

/// MODE - Most frequent value; ties go to the value seen first
///
/// `#N/A` when no value repeats.
pub fn mode(values: &[Value]) -> Value {
    let nums = numbers(values);
    let mut best: Option<(f64, usize)> = None;

    for (i, n) in nums.iter().enumerate() {
        // Only count from the first occurrence so ties keep the earliest value
        if nums[..i].contains(n) {
            continue;
        }
        let occurrences = nums[i..].iter().filter(|m| *m == n).count();
        if occurrences > 1 && best.map_or(true, |(_, count)| occurrences > count) {
            best = Some((*n, occurrences));
        }
    }

    match best {
        Some((n, _)) => Value::Number(n),
        None => Value::Error(CellError::NotAvailable),
    }
}

/// Population variance (divides by n, not n - 1)
fn population_variance(nums: &[f64]) -> Option<f64> {
    if nums.is_empty() {
        return None;
    }
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    Some(nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n)
}

/// VAR - Population variance
pub fn var(values: &[Value]) -> Value {
    match population_variance(&numbers(values)) {
        Some(v) => number_result(v),
        None => Value::Error(CellError::DivisionByZero),
    }
}

/// STDEV - Population standard deviation
pub fn stdev(values: &[Value]) -> Value {
    match population_variance(&numbers(values)) {
        Some(v) => number_result(v.sqrt()),
        None => Value::Error(CellError::DivisionByZero),
    }
}
