pub mod ast;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, CellRef, Expr, UnaryOp};
pub use config::{EngineConfig, RecalcMode};
pub use dependency::{collect_references, DependencySource};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, EvalError, ParseError};
pub use evaluator::{Evaluator, FormulaCache};
pub use functions::{Category, FunctionDef, FunctionRegistry};
pub use lexer::{Lexer, Token};
pub use parser::{parse_expression, parse_formula, Parser};

pub use calcsheet_core::{
    column_to_number, number_to_column, Cell, CellAddress, CellError, QualifiedAddress, Value,
};
