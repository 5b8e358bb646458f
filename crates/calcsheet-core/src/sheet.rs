use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cell::{Cell, Value};
use crate::range::CellAddress;

/// A single spreadsheet sheet with sparse storage for cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    /// Sheet name (displayed in tab)
    pub name: String,
    /// Sparse storage, keyed row-major; only written or referenced cells exist
    #[serde(default)]
    cells: BTreeMap<CellAddress, Cell>,
}

impl Sheet {
    /// Create a new empty sheet with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Get a cell, if it has ever been written or referenced
    pub fn get_cell(&self, addr: CellAddress) -> Option<&Cell> {
        self.cells.get(&addr)
    }

    pub fn get_cell_mut(&mut self, addr: CellAddress) -> Option<&mut Cell> {
        self.cells.get_mut(&addr)
    }

    /// Get a cell for writing, creating an empty stub on first access
    pub fn cell_entry(&mut self, addr: CellAddress) -> &mut Cell {
        self.cells.entry(addr).or_default()
    }

    /// Get the raw value of a cell (empty for cells that don't exist)
    pub fn get_value(&self, addr: CellAddress) -> Value {
        self.cells
            .get(&addr)
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    /// All cells of this sheet, for read-only inspection
    pub fn cells(&self) -> &BTreeMap<CellAddress, Cell> {
        &self.cells
    }

    /// Iterate over all cells holding a formula
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.is_formula())
            .map(|(addr, cell)| (*addr, cell))
    }

    /// Get the number of stored cells, stubs included
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_entry_creates_stub() {
        let mut sheet = Sheet::new("Test");
        let a1 = CellAddress::new(1, 1);

        assert!(sheet.get_cell(a1).is_none());
        assert_eq!(sheet.get_value(a1), Value::Empty);

        sheet.cell_entry(a1);
        assert!(sheet.get_cell(a1).unwrap().is_empty());
        assert_eq!(sheet.cell_count(), 1);
    }

    #[test]
    fn test_formula_cells() {
        let mut sheet = Sheet::new("Test");
        sheet.cell_entry(CellAddress::new(1, 1)).value = Value::Number(1.0);
        sheet.cell_entry(CellAddress::new(1, 2)).formula = Some("=A1".to_string());

        let formulas: Vec<CellAddress> = sheet.formula_cells().map(|(addr, _)| addr).collect();
        assert_eq!(formulas, vec![CellAddress::new(1, 2)]);
    }
}
