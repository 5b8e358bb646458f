use calcsheet_core::{CellError, Value};
use rand::Rng;

use super::{flatten, number_arg, number_result, numbers, Category, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Math;

    registry.add("SUM", Math, 0, None, sum);
    registry.add("AVERAGE", Math, 1, None, average);
    registry.add("MIN", Math, 0, None, min);
    registry.add("MAX", Math, 0, None, max);
    registry.add("COUNT", Math, 0, None, count);
    registry.add("COUNTA", Math, 0, None, counta);
    registry.add("COUNTBLANK", Math, 1, None, countblank);
    registry.add("ROUND", Math, 1, Some(2), round);
    registry.add("ROUNDUP", Math, 1, Some(2), roundup);
    registry.add("ROUNDDOWN", Math, 1, Some(2), rounddown);
    registry.add("ABS", Math, 1, Some(1), abs);
    registry.add("POWER", Math, 2, Some(2), power);
    registry.add("SQRT", Math, 1, Some(1), sqrt);
    registry.add("EXP", Math, 1, Some(1), exp);
    registry.add("LN", Math, 1, Some(1), ln);
    registry.add("LOG", Math, 1, Some(2), log);
    registry.add("LOG10", Math, 1, Some(1), log10);
    registry.add("MOD", Math, 2, Some(2), modulo);
    registry.add("PI", Math, 0, Some(0), pi);

    registry.add("RAND", Math, 0, Some(0), rand_fn);
    registry.add("RANDBETWEEN", Math, 2, Some(2), randbetween);
}

/// SUM - Every flattened argument coerced to a number and added
///
/// Error sentinels coerce to 0, so `SUM("#DIV/0!", 5)` is 5.
pub fn sum(values: &[Value]) -> Value {
    number_result(flatten(values).iter().map(Value::to_number).sum())
}

/// AVERAGE - Mean of the numeric values
pub fn average(values: &[Value]) -> Value {
    let nums = numbers(values);
    if nums.is_empty() {
        return Value::Error(CellError::DivisionByZero);
    }
    number_result(nums.iter().sum::<f64>() / nums.len() as f64)
}

/// MIN - Smallest numeric value (0 when there are none)
pub fn min(values: &[Value]) -> Value {
    Value::Number(numbers(values).into_iter().reduce(f64::min).unwrap_or(0.0))
}

/// MAX - Largest numeric value (0 when there are none)
pub fn max(values: &[Value]) -> Value {
    Value::Number(numbers(values).into_iter().reduce(f64::max).unwrap_or(0.0))
}

/// COUNT - Count number values
pub fn count(values: &[Value]) -> Value {
    let count = flatten(values)
        .iter()
        .filter(|v| matches!(v, Value::Number(_)))
        .count();

    Value::Number(count as f64)
}

/// COUNTA - Count non-blank values
pub fn counta(values: &[Value]) -> Value {
    let count = flatten(values).iter().filter(|v| !v.is_blank()).count();
    Value::Number(count as f64)
}

/// COUNTBLANK - Count blank values
pub fn countblank(values: &[Value]) -> Value {
    let count = flatten(values).iter().filter(|v| v.is_blank()).count();
    Value::Number(count as f64)
}

/// Apply a rounding operation at `values[1]` decimal digits (negative digits round left of the point)
fn round_with(values: &[Value], op: fn(f64) -> f64) -> Value {
    let num = number_arg(values, 0, 0.0);
    let digits = number_arg(values, 1, 0.0).trunc().clamp(-308.0, 308.0) as i32;

    let result = if digits >= 0 {
        let factor = 10_f64.powi(digits);
        let scaled = num * factor;
        if !scaled.is_finite() {
            // more digits than an f64 carries
            return Value::Number(num);
        }
        op(scaled) / factor
    } else {
        let factor = 10_f64.powi(-digits);
        op(num / factor) * factor
    };
    number_result(result)
}

/// ROUND - Round half away from zero to the given number of digits
pub fn round(values: &[Value]) -> Value {
    round_with(values, f64::round)
}

/// ROUNDUP - Round away from zero
pub fn roundup(values: &[Value]) -> Value {
    round_with(values, |x| x.signum() * x.abs().ceil())
}

/// ROUNDDOWN - Round toward zero
pub fn rounddown(values: &[Value]) -> Value {
    round_with(values, f64::trunc)
}

/// ABS - Absolute value
pub fn abs(values: &[Value]) -> Value {
    Value::Number(number_arg(values, 0, 0.0).abs())
}

/// POWER - Raise to power
pub fn power(values: &[Value]) -> Value {
    number_result(number_arg(values, 0, 0.0).powf(number_arg(values, 1, 0.0)))
}

/// SQRT - Square root; negative input is `#NUM!`
pub fn sqrt(values: &[Value]) -> Value {
    let n = number_arg(values, 0, 0.0);
    if n < 0.0 {
        return Value::Error(CellError::NumError);
    }
    Value::Number(n.sqrt())
}

/// EXP - e raised to a power
pub fn exp(values: &[Value]) -> Value {
    number_result(number_arg(values, 0, 0.0).exp())
}

/// LN - Natural logarithm
pub fn ln(values: &[Value]) -> Value {
    let n = number_arg(values, 0, 0.0);
    if n <= 0.0 {
        return Value::Error(CellError::NumError);
    }
    Value::Number(n.ln())
}

/// LOG - Logarithm in the given base (default 10)
pub fn log(values: &[Value]) -> Value {
    let n = number_arg(values, 0, 0.0);
    let base = number_arg(values, 1, 10.0);
    if n <= 0.0 || base <= 0.0 {
        return Value::Error(CellError::NumError);
    }
    if base == 1.0 {
        return Value::Error(CellError::DivisionByZero);
    }
    number_result(n.log(base))
}

/// LOG10 - Base-10 logarithm
pub fn log10(values: &[Value]) -> Value {
    let n = number_arg(values, 0, 0.0);
    if n <= 0.0 {
        return Value::Error(CellError::NumError);
    }
    Value::Number(n.log10())
}

/// MOD - Remainder carrying the sign of the divisor
pub fn modulo(values: &[Value]) -> Value {
    let n = number_arg(values, 0, 0.0);
    let d = number_arg(values, 1, 0.0);
    if d == 0.0 {
        return Value::Error(CellError::DivisionByZero);
    }
    number_result(n - d * (n / d).floor())
}

/// PI - The constant π
pub fn pi(_values: &[Value]) -> Value {
    Value::Number(std::f64::consts::PI)
}

/// RAND - Uniform random number in [0, 1)
pub fn rand_fn(_values: &[Value]) -> Value {
    let mut rng = rand::thread_rng();
    Value::Number(rng.gen::<f64>())
}

/// RANDBETWEEN - Random integer between bottom and top (inclusive)
pub fn randbetween(values: &[Value]) -> Value {
    let bottom = number_arg(values, 0, 0.0).ceil();
    let top = number_arg(values, 1, 0.0).floor();

    if !bottom.is_finite() || !top.is_finite() || bottom > top {
        return Value::Error(CellError::NumError);
    }

    let mut rng = rand::thread_rng();
    Value::Number(rng.gen_range(bottom as i64..=top as i64) as f64)
}
