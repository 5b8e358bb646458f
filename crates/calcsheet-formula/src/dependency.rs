//! Dependency extraction and graph walks over the workbook's edge sets
//!
//! The edges themselves live on the cells (`dependencies` / `dependents`);
//! this module only reads them.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use calcsheet_core::{CellRange, QualifiedAddress, Workbook};

use crate::ast::Expr;

/// Read access to dependency edges keyed by qualified address
pub trait DependencySource {
    /// Cells that `cell`'s formula reads
    fn dependencies_of(&self, cell: &QualifiedAddress) -> Option<&BTreeSet<QualifiedAddress>>;

    /// Cells whose formulas read `cell`
    fn dependents_of(&self, cell: &QualifiedAddress) -> Option<&BTreeSet<QualifiedAddress>>;
}

impl DependencySource for Workbook {
    fn dependencies_of(&self, cell: &QualifiedAddress) -> Option<&BTreeSet<QualifiedAddress>> {
        self.cell(cell).map(|c| &c.dependencies)
    }

    fn dependents_of(&self, cell: &QualifiedAddress) -> Option<&BTreeSet<QualifiedAddress>> {
        self.cell(cell).map(|c| &c.dependents)
    }
}

/// Every address an expression reads.
///
/// Ranges contribute every enclosed cell; references without a sheet are
/// qualified with `sheet`.
pub fn collect_references(expr: &Expr, sheet: &str) -> BTreeSet<QualifiedAddress> {
    let mut refs = BTreeSet::new();
    collect_into(expr, sheet, &mut refs);
    refs
}

fn collect_into(expr: &Expr, sheet: &str, refs: &mut BTreeSet<QualifiedAddress>) {
    match expr {
        Expr::CellRef(cell) => {
            let target = cell.sheet.as_deref().unwrap_or(sheet);
            refs.insert(QualifiedAddress::new(target, cell.address()));
        }
        Expr::Range { start, end } => {
            let target = start.sheet.as_deref().unwrap_or(sheet);
            let range = CellRange::new(start.address(), end.address());
            refs.extend(range.cells().map(|cell| QualifiedAddress::new(target, cell)));
        }
        Expr::Binary { left, right, .. } => {
            collect_into(left, sheet, refs);
            collect_into(right, sheet, refs);
        }
        Expr::Unary { operand, .. } => collect_into(operand, sheet, refs),
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_into(arg, sheet, refs);
            }
        }
        Expr::Array(rows) => {
            for item in rows.iter().flatten() {
                collect_into(item, sheet, refs);
            }
        }
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => {}
    }
}

/// Whether a dependency cycle is reachable from `start`.
///
/// Depth-first over `dependencies` with an on-stack set; the walk is
/// iterative so long reference chains don't exhaust the call stack.
pub fn has_cycle_from<G: DependencySource + ?Sized>(graph: &G, start: &QualifiedAddress) -> bool {
    let mut finished: HashSet<QualifiedAddress> = HashSet::new();
    let mut on_stack: HashSet<QualifiedAddress> = HashSet::new();
    // (cell, dependencies already pushed)
    let mut stack = vec![(start.clone(), false)];

    while let Some((cell, expanded)) = stack.pop() {
        if expanded {
            on_stack.remove(&cell);
            finished.insert(cell);
            continue;
        }
        if finished.contains(&cell) || on_stack.contains(&cell) {
            continue;
        }

        on_stack.insert(cell.clone());
        stack.push((cell.clone(), true));

        if let Some(deps) = graph.dependencies_of(&cell) {
            for dep in deps {
                if on_stack.contains(dep) {
                    return true;
                }
                if !finished.contains(dep) {
                    stack.push((dep.clone(), false));
                }
            }
        }
    }

    false
}

/// Every cell that transitively depends on `changed`, excluding `changed`
pub fn transitive_dependents<G: DependencySource + ?Sized>(
    graph: &G,
    changed: &QualifiedAddress,
) -> BTreeSet<QualifiedAddress> {
    let mut affected = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(changed.clone());

    while let Some(cell) = queue.pop_front() {
        if let Some(dependents) = graph.dependents_of(&cell) {
            for dependent in dependents {
                if dependent != changed && affected.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }

    affected
}

/// Order `cells` so every cell comes after the cells (within the set) it reads.
///
/// Kahn's algorithm; cells caught in a cycle never become ready and are
/// appended last in address order, where evaluation reports them as circular.
pub fn topological_order<G: DependencySource + ?Sized>(
    graph: &G,
    cells: &BTreeSet<QualifiedAddress>,
) -> Vec<QualifiedAddress> {
    let mut pending: BTreeMap<&QualifiedAddress, usize> = cells
        .iter()
        .map(|cell| {
            let inputs = graph
                .dependencies_of(cell)
                .map_or(0, |deps| deps.iter().filter(|d| cells.contains(*d) && *d != cell).count());
            (cell, inputs)
        })
        .collect();

    let mut ready: VecDeque<&QualifiedAddress> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(cell, _)| *cell)
        .collect();
    let mut order = Vec::with_capacity(cells.len());

    while let Some(cell) = ready.pop_front() {
        pending.remove(cell);
        order.push(cell.clone());

        if let Some(dependents) = graph.dependents_of(cell) {
            for dependent in dependents {
                let now_ready = match pending.get_mut(dependent) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        *count == 0
                    }
                    _ => false,
                };
                if now_ready {
                    if let Some((key, _)) = pending.get_key_value(dependent) {
                        ready.push_back(*key);
                    }
                }
            }
        }
    }

    order.extend(pending.into_keys().cloned());
    order
}

/// Cells to recompute after `changed`, dependencies before dependents
pub fn recalc_order<G: DependencySource + ?Sized>(
    graph: &G,
    changed: &QualifiedAddress,
) -> Vec<QualifiedAddress> {
    topological_order(graph, &transitive_dependents(graph, changed))
}
