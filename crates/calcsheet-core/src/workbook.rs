use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cell::Cell;
use crate::error::WorkbookError;
use crate::range::QualifiedAddress;
use crate::sheet::Sheet;

/// A workbook containing multiple sheets and the dependency edges between their cells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workbook {
    /// List of sheets in the workbook, in creation order
    pub sheets: Vec<Sheet>,
    /// Index of the currently active sheet
    #[serde(default)]
    pub active_sheet_index: usize,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new("Sheet1")
    }
}

impl Workbook {
    /// Create a new workbook with a single, active sheet
    pub fn new(first_sheet: impl Into<String>) -> Self {
        Self {
            sheets: vec![Sheet::new(first_sheet)],
            active_sheet_index: 0,
        }
    }

    /// Register a new empty sheet
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<usize, WorkbookError> {
        let name = name.into();
        if self.sheet_index(&name).is_some() {
            return Err(WorkbookError::DuplicateSheet(name));
        }
        self.sheets.push(Sheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    /// Get the index of a sheet by name
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    /// Get a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Get a mutable sheet by name
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Get a reference to the active sheet
    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active_sheet_index]
    }

    /// Change the active sheet; returns false (and changes nothing) if it doesn't exist
    pub fn set_active_sheet(&mut self, name: &str) -> bool {
        match self.sheet_index(name) {
            Some(index) => {
                self.active_sheet_index = index;
                true
            }
            None => false,
        }
    }

    /// Get sheet names in order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a cell by qualified address
    pub fn cell(&self, addr: &QualifiedAddress) -> Option<&Cell> {
        self.sheet(&addr.sheet)?.get_cell(addr.cell)
    }

    /// Get a cell for writing, creating a stub if needed; `None` if the sheet is missing
    pub fn cell_entry(&mut self, addr: &QualifiedAddress) -> Option<&mut Cell> {
        Some(self.sheet_mut(&addr.sheet)?.cell_entry(addr.cell))
    }

    /// Replace the dependency set of `cell`, keeping both sides of every edge in step.
    ///
    /// Old edges are detached from their targets' `dependents` before the new
    /// ones are installed. Every referenced address gets a stub cell. References
    /// into sheets that don't exist have no target and are not recorded; call
    /// again once the sheet is added to install them.
    pub fn set_dependencies(&mut self, cell: &QualifiedAddress, deps: BTreeSet<QualifiedAddress>) {
        // Remove old reverse dependencies
        let old_deps = self
            .cell(cell)
            .map(|c| c.dependencies.clone())
            .unwrap_or_default();
        for dep in &old_deps {
            if let Some(target) = self.sheet_mut(&dep.sheet).and_then(|s| s.get_cell_mut(dep.cell)) {
                target.dependents.remove(cell);
            }
        }

        // Add new reverse dependencies
        let mut installed = BTreeSet::new();
        for dep in deps {
            if let Some(target) = self.cell_entry(&dep) {
                target.dependents.insert(cell.clone());
                installed.insert(dep);
            }
        }

        // Store new dependencies
        if let Some(owner) = self.cell_entry(cell) {
            owner.dependencies = installed;
        }
    }

    /// Iterate over every formula cell in the workbook
    pub fn formula_cells(&self) -> impl Iterator<Item = QualifiedAddress> + '_ {
        self.sheets.iter().flat_map(|sheet| {
            sheet
                .formula_cells()
                .map(move |(addr, _)| QualifiedAddress::new(sheet.name.clone(), addr))
        })
    }
}
