use std::collections::HashMap;

use calcsheet_core::{CellAddress, CellError, CellRange, QualifiedAddress, Value, Workbook};

use crate::ast::{BinaryOp, CellRef, Expr, UnaryOp};
use crate::dependency::has_cycle_from;
use crate::error::EvalError;
use crate::functions::{number_result, FunctionRegistry};
use crate::parser::parse_formula;

/// Parsed formulas keyed by the cell that holds them
pub type FormulaCache = HashMap<QualifiedAddress, Expr>;

/// Tree-walking evaluator over a borrowed workbook.
///
/// Cell references are resolved by re-evaluating the referenced cell's
/// formula, so values are always computed from current inputs. Nesting of
/// those re-evaluations is capped at `max_depth`.
pub struct Evaluator<'a> {
    workbook: &'a Workbook,
    formulas: &'a FormulaCache,
    registry: &'static FunctionRegistry,
    max_depth: usize,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(workbook: &'a Workbook, formulas: &'a FormulaCache, max_depth: usize) -> Self {
        Self {
            workbook,
            formulas,
            registry: FunctionRegistry::global(),
            max_depth,
            depth: 0,
        }
    }

    /// Evaluate an expression in the context of `sheet`
    pub fn evaluate(&mut self, expr: &Expr, sheet: &str) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::Text(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),

            Expr::CellRef(cell) => {
                let target = qualify(cell, sheet);
                self.evaluate_cell(&target)
            }

            Expr::Range { start, end } => self.evaluate_range(start, end, sheet),

            Expr::FunctionCall { name, args } => {
                // Arguments are evaluated eagerly, IF and friends included
                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg, sheet))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!("calling {} with {} argument(s)", name, values.len());
                Ok(self.registry.call(name, &values))
            }

            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left, sheet)?;
                let right = self.evaluate(right, sheet)?;
                Ok(binary(*op, &left, &right))
            }

            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, sheet)?;
                Ok(match op {
                    UnaryOp::Neg => number_result(-value.to_number()),
                    UnaryOp::Pos => number_result(value.to_number()),
                })
            }

            Expr::Array(rows) => {
                let rows = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|item| self.evaluate(item, sheet))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(rows))
            }
        }
    }

    /// Current value of a single cell.
    ///
    /// Missing sheets are `#REF!` and a reachable cycle is `#CIRCULAR!`.
    /// Otherwise the stored error wins, then the formula, then the raw value;
    /// cells that were never written are empty.
    pub fn evaluate_cell(&mut self, addr: &QualifiedAddress) -> Result<Value, EvalError> {
        let (workbook, formulas) = (self.workbook, self.formulas);
        if workbook.sheet(&addr.sheet).is_none() {
            return Ok(Value::Error(CellError::InvalidReference));
        }

        if has_cycle_from(workbook, addr) {
            tracing::warn!("circular reference through {}", addr);
            return Ok(Value::Error(CellError::CircularReference));
        }

        let Some(cell) = workbook.cell(addr) else {
            return Ok(Value::Empty);
        };

        if let Some(error) = &cell.error {
            return Ok(Value::Error(error.clone()));
        }

        let Some(text) = &cell.formula else {
            return Ok(cell.value.clone());
        };

        let parsed;
        let expr = match formulas.get(addr) {
            Some(expr) => expr,
            None => match parse_formula(text) {
                Ok(Some(expr)) => {
                    parsed = expr;
                    &parsed
                }
                Ok(None) => return Ok(Value::Text(text.clone())),
                Err(_) => return Ok(Value::Error(CellError::Parse)),
            },
        };

        self.descend(|ev| ev.evaluate(expr, &addr.sheet))
    }

    fn evaluate_range(
        &mut self,
        start: &CellRef,
        end: &CellRef,
        sheet: &str,
    ) -> Result<Value, EvalError> {
        let target = start.sheet.as_deref().unwrap_or(sheet);
        if self.workbook.sheet(target).is_none() {
            return Ok(Value::Error(CellError::InvalidReference));
        }

        let range = CellRange::new(start.address(), end.address());

        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.start.row..=range.end.row {
            let mut values = Vec::with_capacity(range.col_count() as usize);
            for col in range.start.col..=range.end.col {
                let addr = QualifiedAddress::new(target, CellAddress::new(row, col));
                values.push(self.evaluate_cell(&addr)?);
            }
            rows.push(values);
        }
        Ok(Value::Array(rows))
    }

    /// Run `f` one level deeper into the cell-reference chain
    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= self.max_depth {
            tracing::warn!("evaluation depth limit of {} reached", self.max_depth);
            return Err(EvalError::DepthExceeded);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// Resolve a formula reference against the evaluating sheet
fn qualify(cell: &CellRef, sheet: &str) -> QualifiedAddress {
    QualifiedAddress::new(cell.sheet.as_deref().unwrap_or(sheet), cell.address())
}

/// Apply a binary operator to two evaluated operands.
///
/// Arithmetic and ordering coerce both sides to numbers, so error sentinels
/// count as 0 here rather than propagating.
fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => number_result(left.to_number() + right.to_number()),
        BinaryOp::Sub => number_result(left.to_number() - right.to_number()),
        BinaryOp::Mul => number_result(left.to_number() * right.to_number()),
        BinaryOp::Div => {
            let divisor = right.to_number();
            if divisor == 0.0 {
                Value::Error(CellError::DivisionByZero)
            } else {
                number_result(left.to_number() / divisor)
            }
        }
        BinaryOp::Pow => number_result(left.to_number().powf(right.to_number())),

        BinaryOp::Concat => Value::Text(left.to_text() + &right.to_text()),

        BinaryOp::Eq => Value::Boolean(left.strict_eq(right)),
        BinaryOp::Ne => Value::Boolean(!left.strict_eq(right)),
        BinaryOp::Lt => Value::Boolean(left.to_number() < right.to_number()),
        BinaryOp::Gt => Value::Boolean(left.to_number() > right.to_number()),
        BinaryOp::Le => Value::Boolean(left.to_number() <= right.to_number()),
        BinaryOp::Ge => Value::Boolean(left.to_number() >= right.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use calcsheet_core::Cell;

    fn addr(sheet: &str, a1: &str) -> QualifiedAddress {
        QualifiedAddress::new(sheet, CellAddress::from_a1(a1).unwrap())
    }

    fn put(wb: &mut Workbook, a1: &str, value: impl Into<Value>) {
        *wb.cell_entry(&addr("Sheet1", a1)).unwrap() = Cell::with_value(value);
    }

    fn put_formula(wb: &mut Workbook, a1: &str, formula: &str, deps: &[&str]) {
        let target = addr("Sheet1", a1);
        wb.cell_entry(&target).unwrap().formula = Some(formula.to_string());
        wb.set_dependencies(&target, deps.iter().map(|d| addr("Sheet1", d)).collect());
    }

    fn eval_in(wb: &Workbook, input: &str) -> Value {
        let formulas = FormulaCache::new();
        let expr = parse_expression(input).unwrap();
        Evaluator::new(wb, &formulas, 256)
            .evaluate(&expr, "Sheet1")
            .unwrap()
    }

    fn eval(input: &str) -> Value {
        eval_in(&Workbook::default(), input)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2"), Value::Number(3.0));
        assert_eq!(eval("10 - 4 * 2"), Value::Number(2.0));
        assert_eq!(eval("(10 - 4) * 2"), Value::Number(12.0));
        assert_eq!(eval("2^3^2"), Value::Number(64.0));
        assert_eq!(eval("-2^2"), Value::Number(4.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1/0"), Value::Error(CellError::DivisionByZero));
        assert_eq!(eval("1/\"abc\""), Value::Error(CellError::DivisionByZero));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(eval("1 < 2"), Value::Boolean(true));
        assert_eq!(eval("\"10\" > 9"), Value::Boolean(true));
        assert_eq!(eval("1 = 1"), Value::Boolean(true));
        // equality is type-sensitive
        assert_eq!(eval("1 = \"1\""), Value::Boolean(false));
        assert_eq!(eval("\"a\" <> \"b\""), Value::Boolean(true));
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("\"Hello\" & \" \" & \"World\""), Value::text("Hello World"));
        assert_eq!(eval("1 & TRUE"), Value::text("1TRUE"));
    }

    #[test]
    fn test_sentinels_coerce_to_zero_in_arithmetic() {
        assert_eq!(eval("\"#DIV/0!\" + 5"), Value::Number(5.0));
        assert_eq!(eval("(1/0) + 5"), Value::Number(5.0));
    }

    #[test]
    fn test_cell_reference() {
        let mut wb = Workbook::default();
        put(&mut wb, "A1", 10.0);
        put(&mut wb, "B1", 20.0);

        assert_eq!(eval_in(&wb, "A1 + B1"), Value::Number(30.0));
        assert_eq!(eval_in(&wb, "C1"), Value::Empty);
    }

    #[test]
    fn test_formula_chain_is_reevaluated() {
        let mut wb = Workbook::default();
        put(&mut wb, "A1", 2.0);
        put_formula(&mut wb, "B1", "=A1*10", &["A1"]);

        assert_eq!(eval_in(&wb, "B1 + 1"), Value::Number(21.0));
    }

    #[test]
    fn test_range_expands_to_array() {
        let mut wb = Workbook::default();
        put(&mut wb, "A1", 1.0);
        put(&mut wb, "B1", 2.0);
        put(&mut wb, "A2", 3.0);

        assert_eq!(
            eval_in(&wb, "A1:B2"),
            Value::Array(vec![
                vec![Value::Number(1.0), Value::Number(2.0)],
                vec![Value::Number(3.0), Value::Empty],
            ])
        );
        assert_eq!(eval_in(&wb, "SUM(A1:B2, 4)"), Value::Number(10.0));
    }

    #[test]
    fn test_missing_sheet_is_ref_error() {
        assert_eq!(eval("Nowhere!A1"), Value::Error(CellError::InvalidReference));
        assert_eq!(
            eval("Nowhere!A1:A3"),
            Value::Error(CellError::InvalidReference)
        );
    }

    #[test]
    fn test_circular_reference() {
        let mut wb = Workbook::default();
        put_formula(&mut wb, "A1", "=B1", &["B1"]);
        put_formula(&mut wb, "B1", "=A1", &["A1"]);

        assert_eq!(eval_in(&wb, "A1"), Value::Error(CellError::CircularReference));
    }

    #[test]
    fn test_stored_error_wins() {
        let mut wb = Workbook::default();
        let a1 = addr("Sheet1", "A1");
        let cell = wb.cell_entry(&a1).unwrap();
        cell.formula = Some("=1+".to_string());
        cell.error = Some(CellError::Parse);

        assert_eq!(eval_in(&wb, "A1"), Value::Error(CellError::Parse));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("FOO(1)"),
            Value::Error(CellError::InvalidName("FOO".to_string()))
        );
    }

    #[test]
    fn test_function_arguments_are_eager() {
        // both branches evaluate; the untaken one is simply discarded
        assert_eq!(eval("IF(1 > 2, 1/0, \"ok\")"), Value::text("ok"));
        assert_eq!(eval("IFERROR(1/0, \"fallback\")"), Value::text("fallback"));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(eval("SUM({1,2;3,4})"), Value::Number(10.0));
        assert_eq!(
            eval("VLOOKUP(2, {1,\"a\";2,\"b\"}, 2, FALSE)"),
            Value::text("b")
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut wb = Workbook::default();
        put(&mut wb, "A1", 1.0);
        for row in 2..=10 {
            let prev = format!("A{}", row - 1);
            put_formula(&mut wb, &format!("A{row}"), &format!("={prev}+1"), &[prev.as_str()]);
        }

        let formulas = FormulaCache::new();
        let expr = parse_expression("A10").unwrap();
        assert_eq!(
            Evaluator::new(&wb, &formulas, 5).evaluate(&expr, "Sheet1"),
            Err(EvalError::DepthExceeded)
        );
        assert_eq!(
            Evaluator::new(&wb, &formulas, 64).evaluate(&expr, "Sheet1"),
            Ok(Value::Number(10.0))
        );
    }
}
