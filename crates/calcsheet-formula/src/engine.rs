use std::collections::{BTreeMap, BTreeSet};

use calcsheet_core::{
    Cell, CellAddress, CellError, QualifiedAddress, Value, Workbook, WorkbookError,
};

use crate::config::{EngineConfig, RecalcMode};
use crate::dependency::{collect_references, recalc_order, topological_order};
use crate::error::{EngineError, EvalError};
use crate::evaluator::{Evaluator, FormulaCache};
use crate::parser::parse_formula;

/// Calculation engine: cell storage, dependency bookkeeping and recalculation.
///
/// Each document gets its own engine; nothing is shared between instances
/// apart from the read-only function registry.
#[derive(Debug)]
pub struct Engine {
    workbook: Workbook,
    /// Parsed form of every formula cell, kept in step with `Cell::formula`
    formulas: FormulaCache,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default configuration and one active sheet
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            workbook: Workbook::new(config.default_sheet.clone()),
            formulas: FormulaCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of every sheet and cell
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Register an empty sheet
    pub fn add_sheet(&mut self, name: &str) -> Result<(), EngineError> {
        self.workbook.add_sheet(name)?;
        tracing::debug!("added sheet {}", name);
        self.link_new_sheet(name);
        Ok(())
    }

    /// Change the sheet unqualified addresses resolve against.
    ///
    /// Returns false, leaving the active sheet unchanged, if `name` doesn't exist.
    pub fn set_active_sheet(&mut self, name: &str) -> bool {
        self.workbook.set_active_sheet(name)
    }

    pub fn active_sheet(&self) -> &str {
        &self.workbook.active_sheet().name
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.workbook.sheet_names()
    }

    /// Write a raw value or, for text starting with `=`, a formula.
    ///
    /// The cell's dependency edges are replaced, its value recomputed, and
    /// its dependents recomputed according to the configured [`RecalcMode`].
    pub fn set_cell_value(
        &mut self,
        address: &str,
        value: impl Into<Value>,
        sheet: Option<&str>,
    ) -> Result<(), EngineError> {
        let target = self.resolve(address, sheet)?;
        let value = value.into();
        tracing::debug!("set {} = {}", target, value);

        match value {
            Value::Text(text) if text.starts_with('=') => self.store_formula(&target, text),
            other => self.store_value(&target, other),
        }

        self.refresh(&target);
        self.propagate(&target);
        Ok(())
    }

    /// Current value of a cell, evaluated fresh.
    ///
    /// Bad addresses and unknown sheets read as `#REF!`.
    pub fn get_cell_value(&self, address: &str, sheet: Option<&str>) -> Value {
        match self.resolve(address, sheet) {
            Ok(target) => self.compute(&target),
            Err(_) => Value::Error(CellError::InvalidReference),
        }
    }

    /// Parse and evaluate a formula without storing it.
    ///
    /// Text that doesn't start with `=` comes back unchanged; malformed
    /// formulas yield `#PARSE!`.
    pub fn evaluate_formula(&self, formula: &str, sheet: Option<&str>) -> Value {
        let sheet = sheet.unwrap_or_else(|| self.active_sheet());
        match parse_formula(formula) {
            Ok(Some(expr)) => {
                let mut evaluator = Evaluator::new(&self.workbook, &self.formulas, self.config.max_depth);
                evaluator.evaluate(&expr, sheet).unwrap_or_else(internal_error)
            }
            Ok(None) => Value::Text(formula.to_string()),
            Err(e) => {
                tracing::warn!("failed to parse {:?}: {}", formula, e);
                Value::Error(CellError::Parse)
            }
        }
    }

    /// Cell table of a sheet (the active one by default), stubs included
    pub fn get_all_cells(&self, sheet: Option<&str>) -> Option<&BTreeMap<CellAddress, Cell>> {
        let sheet = sheet.unwrap_or_else(|| self.active_sheet());
        self.workbook.sheet(sheet).map(|s| s.cells())
    }

    /// Stored record of a cell, if it has been written or referenced
    pub fn get_cell(&self, address: &str, sheet: Option<&str>) -> Option<&Cell> {
        let target = self.resolve(address, sheet).ok()?;
        self.workbook.cell(&target)
    }

    /// Reset a cell to empty, dropping its formula and outgoing dependency edges.
    ///
    /// Cells that read this one keep their edges and are recomputed.
    pub fn clear_cell(&mut self, address: &str, sheet: Option<&str>) -> Result<(), EngineError> {
        let target = self.resolve(address, sheet)?;
        tracing::debug!("clear {}", target);

        self.workbook.set_dependencies(&target, BTreeSet::new());
        self.formulas.remove(&target);
        if let Some(cell) = self.workbook.cell_entry(&target) {
            cell.value = Value::Empty;
            cell.formula = None;
            cell.error = None;
        }

        self.propagate(&target);
        Ok(())
    }

    /// Recompute the cached value of every formula cell, dependencies first
    pub fn recalculate_all(&mut self) {
        let cells: BTreeSet<QualifiedAddress> = self.workbook.formula_cells().collect();
        let order = topological_order(&self.workbook, &cells);
        tracing::debug!("recalculating {} formula cell(s)", order.len());
        for addr in &order {
            self.refresh(addr);
        }
    }

    fn resolve(&self, address: &str, sheet: Option<&str>) -> Result<QualifiedAddress, EngineError> {
        let cell = CellAddress::from_a1(address)?;
        let sheet = sheet.unwrap_or_else(|| self.active_sheet());
        if self.workbook.sheet(sheet).is_none() {
            return Err(WorkbookError::SheetNotFound(sheet.to_string()).into());
        }
        Ok(QualifiedAddress::new(sheet, cell))
    }

    /// Install the edges existing formulas have into a just-added sheet.
    ///
    /// Those references had no target when the formulas were written, so the
    /// workbook left them out; the affected cells are recomputed afterwards.
    fn link_new_sheet(&mut self, name: &str) {
        let relinked: BTreeMap<QualifiedAddress, BTreeSet<QualifiedAddress>> = self
            .formulas
            .iter()
            .filter_map(|(addr, expr)| {
                let refs = collect_references(expr, &addr.sheet);
                refs.iter()
                    .any(|r| r.sheet == name)
                    .then(|| (addr.clone(), refs))
            })
            .collect();
        if relinked.is_empty() {
            return;
        }

        tracing::debug!("linking {} formula cell(s) into sheet {}", relinked.len(), name);
        let cells: BTreeSet<QualifiedAddress> = relinked.keys().cloned().collect();
        for (addr, refs) in relinked {
            self.workbook.set_dependencies(&addr, refs);
        }
        for addr in topological_order(&self.workbook, &cells) {
            self.refresh(&addr);
        }
    }

    fn store_formula(&mut self, target: &QualifiedAddress, text: String) {
        match parse_formula(&text) {
            Ok(Some(expr)) => {
                let deps = collect_references(&expr, &target.sheet);
                self.workbook.set_dependencies(target, deps);
                self.formulas.insert(target.clone(), expr);
                if let Some(cell) = self.workbook.cell_entry(target) {
                    cell.formula = Some(text);
                    cell.error = None;
                }
            }
            Ok(None) => self.store_value(target, Value::Text(text)),
            Err(e) => {
                tracing::warn!("failed to parse formula in {}: {}", target, e);
                self.workbook.set_dependencies(target, BTreeSet::new());
                self.formulas.remove(target);
                if let Some(cell) = self.workbook.cell_entry(target) {
                    cell.formula = Some(text);
                    cell.error = Some(CellError::Parse);
                    cell.value = Value::Error(CellError::Parse);
                }
            }
        }
    }

    fn store_value(&mut self, target: &QualifiedAddress, value: Value) {
        self.workbook.set_dependencies(target, BTreeSet::new());
        self.formulas.remove(target);
        if let Some(cell) = self.workbook.cell_entry(target) {
            cell.value = value;
            cell.formula = None;
            cell.error = None;
        }
    }

    /// Evaluate one cell against the current workbook
    fn compute(&self, target: &QualifiedAddress) -> Value {
        Evaluator::new(&self.workbook, &self.formulas, self.config.max_depth)
            .evaluate_cell(target)
            .unwrap_or_else(internal_error)
    }

    /// Recompute and cache one cell's value
    fn refresh(&mut self, target: &QualifiedAddress) {
        let value = self.compute(target);
        tracing::trace!("{} -> {}", target, value);
        if let Some(cell) = self.workbook.cell_entry(target) {
            cell.value = value;
        }
    }

    /// Recompute the cells downstream of `changed`
    fn propagate(&mut self, changed: &QualifiedAddress) {
        let targets: Vec<QualifiedAddress> = match self.config.recalc_mode {
            RecalcMode::DirectDependents => self
                .workbook
                .cell(changed)
                .map(|cell| cell.dependents.iter().cloned().collect())
                .unwrap_or_default(),
            RecalcMode::Transitive => recalc_order(&self.workbook, changed),
        };

        if !targets.is_empty() {
            tracing::debug!("recalculating {} dependent(s) of {}", targets.len(), changed);
        }
        for target in &targets {
            self.refresh(target);
        }
    }
}

fn internal_error(e: EvalError) -> Value {
    Value::Error(CellError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transitive() -> Engine {
        Engine::with_config(EngineConfig {
            recalc_mode: RecalcMode::Transitive,
            ..EngineConfig::default()
        })
    }

    fn cached(engine: &Engine, address: &str) -> Value {
        engine.get_cell(address, None).unwrap().value.clone()
    }

    #[test]
    fn test_fresh_engine_has_active_sheet() {
        let engine = Engine::new();
        assert_eq!(engine.sheet_names(), vec!["Sheet1"]);
        assert_eq!(engine.active_sheet(), "Sheet1");
    }

    #[test]
    fn test_set_and_get() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", 42, None).unwrap();
        engine.set_cell_value("a2", "hello", None).unwrap();
        engine.set_cell_value("A3", true, None).unwrap();

        assert_eq!(engine.get_cell_value("A1", None), Value::Number(42.0));
        assert_eq!(engine.get_cell_value("A2", None), Value::text("hello"));
        assert_eq!(engine.get_cell_value("A3", None), Value::Boolean(true));
        assert_eq!(engine.get_cell_value("Z99", None), Value::Empty);
    }

    #[test]
    fn test_bad_addresses() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.set_cell_value("1A", 1, None),
            Err(EngineError::Address(_))
        ));
        assert_eq!(
            engine.set_cell_value("A1", 1, Some("Nowhere")),
            Err(EngineError::Workbook(WorkbookError::SheetNotFound(
                "Nowhere".into()
            )))
        );
        assert_eq!(
            engine.get_cell_value("A1", Some("Nowhere")),
            Value::Error(CellError::InvalidReference)
        );
        assert_eq!(
            engine.get_cell_value("??", None),
            Value::Error(CellError::InvalidReference)
        );
    }

    #[test]
    fn test_dependency_edges_are_symmetric() {
        let mut engine = Engine::new();
        engine.set_cell_value("C1", "=A1+B1", None).unwrap();

        let c1: QualifiedAddress = "Sheet1!C1".parse().unwrap();
        let a1 = engine.get_cell("A1", None).unwrap();
        assert!(a1.dependents.contains(&c1));
        assert_eq!(a1.value, Value::Empty);

        let deps: Vec<String> = engine
            .get_cell("C1", None)
            .unwrap()
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(deps, vec!["Sheet1!A1", "Sheet1!B1"]);

        // rewriting the formula detaches the old edges
        engine.set_cell_value("C1", "=B1*2", None).unwrap();
        assert!(!engine.get_cell("A1", None).unwrap().dependents.contains(&c1));
        assert!(engine.get_cell("B1", None).unwrap().dependents.contains(&c1));

        // a raw value drops them entirely
        engine.set_cell_value("C1", 5, None).unwrap();
        assert!(engine.get_cell("B1", None).unwrap().dependents.is_empty());
        assert!(engine.get_cell("C1", None).unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_one_hop_propagation_by_default() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", 1, None).unwrap();
        engine.set_cell_value("B1", "=A1+1", None).unwrap();
        engine.set_cell_value("C1", "=B1+1", None).unwrap();

        engine.set_cell_value("A1", 2, None).unwrap();
        assert_eq!(cached(&engine, "B1"), Value::Number(3.0));
        // C1 is two hops away and keeps its old cached value
        assert_eq!(cached(&engine, "C1"), Value::Number(3.0));
        // but reading it evaluates fresh
        assert_eq!(engine.get_cell_value("C1", None), Value::Number(4.0));
    }

    #[test]
    fn test_transitive_propagation() {
        let mut engine = transitive();
        engine.set_cell_value("A1", 1, None).unwrap();
        engine.set_cell_value("B1", "=A1+1", None).unwrap();
        engine.set_cell_value("C1", "=B1+1", None).unwrap();
        engine.set_cell_value("D1", "=C1+B1", None).unwrap();

        engine.set_cell_value("A1", 10, None).unwrap();
        assert_eq!(cached(&engine, "B1"), Value::Number(11.0));
        assert_eq!(cached(&engine, "C1"), Value::Number(12.0));
        assert_eq!(cached(&engine, "D1"), Value::Number(23.0));
    }

    #[test]
    fn test_recalculate_all_refreshes_stale_cells() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", 1, None).unwrap();
        engine.set_cell_value("B1", "=A1+1", None).unwrap();
        engine.set_cell_value("C1", "=B1+1", None).unwrap();
        engine.set_cell_value("A1", 5, None).unwrap();
        assert_eq!(cached(&engine, "C1"), Value::Number(3.0));

        engine.recalculate_all();
        assert_eq!(cached(&engine, "C1"), Value::Number(7.0));
    }

    #[test]
    fn test_parse_failure_is_stored() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", "=1+(2", None).unwrap();

        let cell = engine.get_cell("A1", None).unwrap();
        assert_eq!(cell.error, Some(CellError::Parse));
        assert_eq!(cell.formula.as_deref(), Some("=1+(2"));
        assert_eq!(engine.get_cell_value("A1", None), Value::Error(CellError::Parse));
        assert_eq!(engine.get_cell_value("A1", None).to_string(), "#PARSE!");
    }

    #[test]
    fn test_evaluate_formula() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", 4, None).unwrap();

        assert_eq!(engine.evaluate_formula("=A1*A1", None), Value::Number(16.0));
        assert_eq!(engine.evaluate_formula("plain", None), Value::text("plain"));
        assert_eq!(
            engine.evaluate_formula("=(", None),
            Value::Error(CellError::Parse)
        );
        // nothing was stored
        assert!(engine.get_cell("B1", None).is_none());
    }

    #[test]
    fn test_clear_cell() {
        let mut engine = Engine::new();
        engine.set_cell_value("A1", 3, None).unwrap();
        engine.set_cell_value("B1", "=A1*2", None).unwrap();
        engine.set_cell_value("C1", "=B1", None).unwrap();

        engine.clear_cell("A1", None).unwrap();
        assert_eq!(cached(&engine, "B1"), Value::Number(0.0));

        engine.clear_cell("B1", None).unwrap();
        let b1 = engine.get_cell("B1", None).unwrap();
        assert_eq!(b1.formula, None);
        assert!(b1.dependencies.is_empty());
        // C1 still reads B1
        assert_eq!(b1.dependents.len(), 1);
        assert!(engine.get_cell("A1", None).unwrap().dependents.is_empty());
        assert_eq!(engine.get_cell_value("C1", None), Value::Empty);
    }

    #[test]
    fn test_sheets() {
        let mut engine = Engine::new();
        engine.add_sheet("Data").unwrap();
        assert!(matches!(
            engine.add_sheet("Data"),
            Err(EngineError::Workbook(WorkbookError::DuplicateSheet(_)))
        ));

        assert!(!engine.set_active_sheet("Missing"));
        assert_eq!(engine.active_sheet(), "Sheet1");

        assert!(engine.set_active_sheet("Data"));
        engine.set_cell_value("A1", 7, None).unwrap();
        assert_eq!(engine.get_cell_value("A1", Some("Data")), Value::Number(7.0));
        assert_eq!(engine.get_cell_value("A1", Some("Sheet1")), Value::Empty);
        assert_eq!(engine.get_all_cells(None).map(|cells| cells.len()), Some(1));
        assert!(engine.get_all_cells(Some("Missing")).is_none());
    }

    #[test]
    fn test_adding_a_sheet_links_earlier_references() {
        let mut engine = Engine::new();
        engine.set_cell_value("B1", "=Data!A1*2", None).unwrap();
        engine.set_cell_value("C1", "=Data!A1", None).unwrap();
        assert_eq!(cached(&engine, "C1"), Value::Error(CellError::InvalidReference));
        assert!(engine.get_cell("B1", None).unwrap().dependencies.is_empty());

        engine.add_sheet("Data").unwrap();
        let deps: Vec<String> = engine
            .get_cell("B1", None)
            .unwrap()
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(deps, vec!["Data!A1"]);
        // recomputed against the new, empty sheet
        assert_eq!(cached(&engine, "C1"), Value::Empty);

        // the write on the new sheet reaches B1 one hop away
        engine.set_cell_value("A1", 5, Some("Data")).unwrap();
        assert_eq!(cached(&engine, "B1"), Value::Number(10.0));
    }

    #[test]
    fn test_cycle_through_a_later_sheet_is_circular() {
        let mut engine = Engine::new();
        engine.set_cell_value("B1", "=Data!A1", None).unwrap();
        engine.add_sheet("Data").unwrap();
        engine.set_cell_value("A1", "=Sheet1!B1", Some("Data")).unwrap();

        assert_eq!(
            engine.get_cell_value("B1", None),
            Value::Error(CellError::CircularReference)
        );
        assert_eq!(
            engine.get_cell_value("A1", Some("Data")),
            Value::Error(CellError::CircularReference)
        );
    }

    #[test]
    fn test_unqualified_references_use_target_sheet() {
        let mut engine = Engine::new();
        engine.add_sheet("Data").unwrap();
        engine.set_cell_value("A1", 100, Some("Data")).unwrap();
        engine.set_cell_value("A1", 1, None).unwrap();

        // active sheet is Sheet1, but B1 lives on Data
        engine.set_cell_value("B1", "=A1+1", Some("Data")).unwrap();
        assert_eq!(engine.get_cell_value("B1", Some("Data")), Value::Number(101.0));

        let deps: Vec<String> = engine
            .get_cell("B1", Some("Data"))
            .unwrap()
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(deps, vec!["Data!A1"]);
    }

    #[test]
    fn test_depth_limit_reports_error_sentinel() {
        let mut engine = Engine::with_config(EngineConfig {
            max_depth: 3,
            ..EngineConfig::default()
        });
        engine.set_cell_value("A1", 1, None).unwrap();
        for row in 2..=6 {
            engine
                .set_cell_value(&format!("A{row}"), format!("=A{}+1", row - 1), None)
                .unwrap();
        }

        assert_eq!(
            engine.get_cell_value("A6", None).to_string(),
            "#ERROR: maximum evaluation depth exceeded"
        );
    }
}
