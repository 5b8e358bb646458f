//! Financial functions: PMT, FV, PV, NPV, IRR
//!
//! Sign convention follows the usual cash-flow rule: money paid out is
//! negative, money received is positive.

use calcsheet_core::{CellError, Value};

use super::{number_arg, number_result, numbers, Category, FunctionRegistry};

const IRR_MAX_ITERATIONS: usize = 100;
const IRR_TOLERANCE: f64 = 1e-8;
const IRR_DEFAULT_GUESS: f64 = 0.1;

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::Financial;

    registry.add("PMT", Financial, 3, Some(5), pmt);
    registry.add("FV", Financial, 3, Some(5), fv);
    registry.add("PV", Financial, 3, Some(5), pv);
    registry.add("NPV", Financial, 2, None, npv);
    registry.add("IRR", Financial, 1, Some(2), irr);
}

/// Optional payment-timing argument: non-zero means payments at period start
fn payment_type(values: &[Value], index: usize) -> bool {
    number_arg(values, index, 0.0) != 0.0
}

/// PMT - Payment per period for a loan
/// Args: rate, nper, pv, [fv = 0], [type = 0]
pub fn pmt(values: &[Value]) -> Value {
    let rate = number_arg(values, 0, 0.0);
    let nper = number_arg(values, 1, 0.0);
    let pv = number_arg(values, 2, 0.0);
    let fv = number_arg(values, 3, 0.0);

    if nper == 0.0 {
        return Value::Error(CellError::NumError);
    }

    if rate == 0.0 {
        return number_result(-(pv + fv) / nper);
    }

    let pow = (1.0 + rate).powf(nper);
    let payment = rate * (pv * pow + fv) / (pow - 1.0);
    if payment_type(values, 4) {
        number_result(-payment / (1.0 + rate))
    } else {
        number_result(-payment)
    }
}

/// FV - Future value of an investment
/// Args: rate, nper, pmt, [pv = 0], [type = 0]
pub fn fv(values: &[Value]) -> Value {
    let rate = number_arg(values, 0, 0.0);
    let nper = number_arg(values, 1, 0.0);
    let pmt = number_arg(values, 2, 0.0);
    let pv = number_arg(values, 3, 0.0);

    if rate == 0.0 {
        return number_result(-pv - pmt * nper);
    }

    let pow = (1.0 + rate).powf(nper);
    let mut annuity = pmt * (pow - 1.0) / rate;
    if payment_type(values, 4) {
        annuity *= 1.0 + rate;
    }
    number_result(-pv * pow - annuity)
}

/// PV - Present value of an investment
/// Args: rate, nper, pmt, [fv = 0], [type = 0]
pub fn pv(values: &[Value]) -> Value {
    let rate = number_arg(values, 0, 0.0);
    let nper = number_arg(values, 1, 0.0);
    let pmt = number_arg(values, 2, 0.0);
    let fv = number_arg(values, 3, 0.0);

    if rate == 0.0 {
        return number_result(-fv - pmt * nper);
    }

    let pow = (1.0 + rate).powf(nper);
    let mut annuity = pmt * (pow - 1.0) / rate;
    if payment_type(values, 4) {
        annuity *= 1.0 + rate;
    }
    number_result((-fv - annuity) / pow)
}

/// NPV - Net present value of cash flows at the end of periods 1, 2, ...
/// Args: rate, value1, [value2], ...
pub fn npv(values: &[Value]) -> Value {
    let rate = number_arg(values, 0, 0.0);
    if rate == -1.0 {
        return Value::Error(CellError::DivisionByZero);
    }

    let total = numbers(values.get(1..).unwrap_or(&[]))
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + rate).powi(i as i32 + 1))
        .sum();
    number_result(total)
}

/// IRR - Internal rate of return by Newton-Raphson
/// Args: values, [guess = 0.1]
///
/// `#NUM!` when the cash flows lack a sign change or the iteration fails to
/// converge.
pub fn irr(values: &[Value]) -> Value {
    let flows = numbers(values.get(..1).unwrap_or(&[]));
    let has_positive = flows.iter().any(|cf| *cf > 0.0);
    let has_negative = flows.iter().any(|cf| *cf < 0.0);
    if !has_positive || !has_negative {
        return Value::Error(CellError::NumError);
    }

    let mut rate = number_arg(values, 1, IRR_DEFAULT_GUESS);
    for _ in 0..IRR_MAX_ITERATIONS {
        let base = 1.0 + rate;
        let mut value = 0.0;
        let mut derivative = 0.0;
        for (t, cf) in flows.iter().enumerate() {
            let t = t as f64;
            value += cf / base.powf(t);
            derivative -= t * cf / base.powf(t + 1.0);
        }

        if derivative == 0.0 || !derivative.is_finite() {
            break;
        }

        let next = rate - value / derivative;
        if !next.is_finite() || next <= -1.0 {
            break;
        }
        if (next - rate).abs() < IRR_TOLERANCE {
            return Value::Number(next);
        }
        rate = next;
    }

    Value::Error(CellError::NumError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(ns: &[f64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Number(*n)).collect()
    }

    fn assert_close(value: Value, expected: f64) {
        let actual = value.to_number();
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {value:?}"
        );
    }

    #[test]
    fn test_pmt() {
        assert_close(pmt(&nums(&[0.0, 10.0, 1000.0])), -100.0);
        assert_close(pmt(&nums(&[0.05, 10.0, 1000.0])), -129.504_574_5);
        // paid at the start of each period
        assert_close(
            pmt(&nums(&[0.05, 10.0, 1000.0, 0.0, 1.0])),
            -129.504_574_5 / 1.05,
        );
        assert_eq!(pmt(&nums(&[0.05, 0.0, 1000.0])), Value::Error(CellError::NumError));
    }

    #[test]
    fn test_fv_and_pv() {
        assert_close(fv(&nums(&[0.0, 10.0, -100.0])), 1000.0);
        // 1000 deposited for 2 years at 10%
        assert_close(fv(&nums(&[0.1, 2.0, 0.0, -1000.0])), 1210.0);
        assert_close(pv(&nums(&[0.1, 2.0, 0.0, 1210.0])), -1000.0);
        assert_close(pv(&nums(&[0.0, 10.0, -100.0])), 1000.0);
    }

    #[test]
    fn test_pmt_pv_agree() {
        let payment = pmt(&nums(&[0.01, 36.0, 5000.0])).to_number();
        assert_close(pv(&nums(&[0.01, 36.0, payment])), 5000.0);
    }

    #[test]
    fn test_npv() {
        let values = vec![
            Value::Number(0.1),
            Value::Array(vec![vec![Value::Number(110.0)], vec![Value::Number(121.0)]]),
        ];
        assert_close(npv(&values), 200.0);
        assert_eq!(
            npv(&nums(&[-1.0, 100.0])),
            Value::Error(CellError::DivisionByZero)
        );
    }

    #[test]
    fn test_irr() {
        let flows = Value::Array(vec![vec![Value::Number(-100.0), Value::Number(110.0)]]);
        assert_close(irr(&[flows]), 0.1);

        let flows = Value::Array(vec![vec![
            Value::Number(-1000.0),
            Value::Number(500.0),
            Value::Number(400.0),
            Value::Number(300.0),
        ]]);
        let rate = irr(&[flows.clone()]).to_number();
        // discounting every flow at the computed rate leaves nothing
        let at_rate = npv(&[Value::Number(rate), flows]).to_number();
        assert!(at_rate.abs() < 1e-3, "residual {at_rate}");
    }

    #[test]
    fn test_irr_without_sign_change() {
        let flows = Value::Array(vec![vec![Value::Number(100.0), Value::Number(110.0)]]);
        assert_eq!(irr(&[flows]), Value::Error(CellError::NumError));
    }

    #[test]
    fn test_empty_arguments() {
        assert_eq!(npv(&[]), Value::Number(0.0));
        assert_eq!(irr(&[]), Value::Error(CellError::NumError));
    }
}
