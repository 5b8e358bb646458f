pub mod cell;
pub mod error;
pub mod range;
pub mod sheet;
pub mod workbook;

pub use cell::{format_number, parse_float_prefix, Cell, Value};
pub use error::{AddressError, CellError, WorkbookError};
pub use range::{
    column_to_number, is_cell_label, number_to_column, CellAddress, CellRange, QualifiedAddress,
};
pub use sheet::Sheet;
pub use workbook::Workbook;
