//! Built-in spreadsheet functions
//!
//! Dispatch is by uppercase name through a registry built once on first use.
//! Categories are kept for documentation and introspection only.

pub mod datetime;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use calcsheet_core::{CellError, Value};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Function implementation signature: arguments arrive fully evaluated
pub type FunctionImpl = fn(&[Value]) -> Value;

/// Function category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Math,
    Statistical,
    Text,
    DateTime,
    Logical,
    Lookup,
    Financial,
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    pub category: Category,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Whether `count` arguments satisfy this function's arity
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Function registry keyed by uppercase name
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        math::register(&mut registry);
        statistical::register(&mut registry);
        text::register(&mut registry);
        datetime::register(&mut registry);
        logical::register(&mut registry);
        lookup::register(&mut registry);
        financial::register(&mut registry);

        registry
    }

    /// The shared, lazily built registry
    pub fn global() -> &'static FunctionRegistry {
        &REGISTRY
    }

    /// Look up a function by name (any case)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_uppercase().as_str())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Shorthand for building and registering a definition
    pub(crate) fn add(
        &mut self,
        name: &'static str,
        category: Category,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            category,
            min_args,
            max_args,
            implementation,
        });
    }

    /// Call a function by name.
    ///
    /// Unknown names yield `#NAME? (<NAME>)`; arity violations yield `#VALUE!`.
    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        let upper = name.to_uppercase();
        match self.functions.get(upper.as_str()) {
            Some(def) if def.accepts(args.len()) => (def.implementation)(args),
            Some(_) => Value::Error(CellError::InvalidValue),
            None => Value::Error(CellError::InvalidName(upper)),
        }
    }

    /// Names of every registered function in `category`, sorted
    pub fn names_in(&self, category: Category) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .functions
            .values()
            .filter(|def| def.category == category)
            .map(|def| def.name)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Shared argument helpers
// =============================================================================

/// Flatten 1-D and 2-D array arguments into one ordered sequence
pub(crate) fn flatten(args: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Array(rows) => out.extend(rows.iter().flatten().cloned()),
            other => out.push(other.clone()),
        }
    }
    out
}

/// Numeric values among the flattened arguments.
///
/// Blanks, errors and text without a leading number are skipped.
pub(crate) fn numbers(args: &[Value]) -> Vec<f64> {
    flatten(args)
        .iter()
        .filter(|v| !v.is_blank() && !matches!(v, Value::Error(_)))
        .filter_map(Value::as_number)
        .collect()
}

/// Coerce argument `index` to a number, or use `default` when it's absent
pub(crate) fn number_arg(args: &[Value], index: usize, default: f64) -> f64 {
    args.get(index).map_or(default, Value::to_number)
}

/// Coerce argument `index` to text (empty when absent)
pub(crate) fn text_arg(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_text).unwrap_or_default()
}

/// Wrap a numeric result, mapping NaN and infinities to `#NUM!`
pub(crate) fn number_result(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(CellError::NumError)
    }
}
