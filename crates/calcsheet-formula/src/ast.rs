use calcsheet_core::{number_to_column, CellAddress};

/// A cell reference as written in a formula (e.g., A1, Sheet2!B3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    /// 1-based column (A = 1)
    pub col: u32,
    /// 1-based row
    pub row: u32,
    /// Explicit sheet qualifier; `None` resolves against the evaluating sheet
    pub sheet: Option<String>,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        CellRef {
            col,
            row,
            sheet: None,
        }
    }

    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// Abstract Syntax Tree for formula expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Cell reference (e.g., A1)
    CellRef(CellRef),

    // Range reference (e.g., A1:B10)
    Range { start: CellRef, end: CellRef },

    // Function call (e.g., SUM(A1:A10)); the name is kept as written
    FunctionCall { name: String, args: Vec<Expr> },

    // Binary operation
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    // Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    // Array literal (e.g., {1,2;3,4}), row-major
    Array(Vec<Vec<Expr>>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // String
    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    /// Get the precedence of this operator (higher = binds tighter)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow => 5,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // -
    Pos, // +
}

impl Expr {
    /// Create a string expression
    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    /// Create an unqualified cell reference expression
    pub fn cell_ref(col: u32, row: u32) -> Self {
        Expr::CellRef(CellRef::new(col, row))
    }

    /// Create a binary expression
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a function call expression
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a range expression
    pub fn range(start: CellRef, end: CellRef) -> Self {
        Expr::Range { start, end }
    }

    /// Binding strength used when re-rendering with minimal parentheses
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 6,
            _ => 7,
        }
    }
}

/// Whether a sheet name lexes as a bare identifier
fn is_bare_sheet_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_sheet_prefix(f: &mut std::fmt::Formatter<'_>, sheet: &Option<String>) -> std::fmt::Result {
    match sheet {
        Some(name) if is_bare_sheet_name(name) => write!(f, "{}!", name),
        Some(name) => write!(f, "'{}'!", name.replace('\'', "''")),
        None => Ok(()),
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_sheet_prefix(f, &self.sheet)?;
        write!(f, "{}{}", number_to_column(self.col), self.row)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => {
                // Format numbers without unnecessary decimals
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Expr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Expr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::CellRef(cell) => write!(f, "{}", cell),
            Expr::Range { start, end } => {
                write_sheet_prefix(f, &start.sheet)?;
                write!(
                    f,
                    "{}{}:{}{}",
                    number_to_column(start.col),
                    start.row,
                    number_to_column(end.col),
                    end.row
                )
            }
            Expr::Binary { left, op, right } => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, "{}", op)?;
                // Operators are left-associative, so an equal-precedence right side needs parens
                if right.precedence() <= prec {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            Expr::Unary { op, operand } => {
                let sign = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                };
                if operand.precedence() < 6 {
                    write!(f, "{}({})", sign, operand)
                } else {
                    write!(f, "{}{}", sign, operand)
                }
            }
            Expr::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Array(rows) => {
                write!(f, "{{")?;
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        write!(f, ";")?;
                    }
                    for (c, item) in row.iter().enumerate() {
                        if c > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", item)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Pow => write!(f, "^"),
            BinaryOp::Concat => write!(f, "&"),
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::Ne => write!(f, "<>"),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Ge => write!(f, ">="),
        }
    }
}
