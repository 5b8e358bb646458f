use crate::ast::{BinaryOp, CellRef, Expr, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Lexer, Spanned, Token};
use calcsheet_core::{column_to_number, is_cell_label};

/// Parse formula text into an expression tree.
///
/// Returns `Ok(None)` when `text` does not start with `=`.
pub fn parse_formula(text: &str) -> Result<Option<Expr>, ParseError> {
    match text.strip_prefix('=') {
        Some(body) => parse_expression(body).map(Some),
        None => Ok(None),
    }
}

/// Parse an expression body (no leading `=`)
pub fn parse_expression(body: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(body).tokenize()?;
    Parser::new(tokens).parse()
}

/// Deepest nesting of parentheses, braces, function calls and unary operators
pub const MAX_NESTING: usize = 128;

/// Deepest expression tree accepted, counting each link of an operator chain
pub const MAX_TREE_DEPTH: usize = 512;

/// Precedence-climbing recursive descent parser for formula expressions.
///
/// Nesting is bounded by [`MAX_NESTING`] and [`MAX_TREE_DEPTH`] so that
/// parsing, evaluation and dependency extraction never exhaust the stack.
pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    nesting: usize,
    links: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            position: 0,
            nesting: 0,
            links: 0,
        }
    }

    /// Parse the token stream into an AST
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;

        match self.peek() {
            Token::EOF => Ok(expr),
            Token::RightParen => Err(ParseError::UnmatchedParen(self.current_position())),
            _ => Err(self.unexpected()),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|s| &s.token)
            .unwrap_or(&Token::EOF)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|s| s.position)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token, Token::EOF) {
            self.position += 1;
        }
        token
    }

    /// Error for whatever token sits at the cursor
    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Token::EOF => ParseError::UnexpectedEnd,
            token => ParseError::UnexpectedToken {
                found: format!("{:?}", token),
                position: self.current_position(),
            },
        }
    }

    fn check_depth(&self) -> Result<(), ParseError> {
        if self.nesting > MAX_NESTING || self.nesting + self.links > MAX_TREE_DEPTH {
            return Err(ParseError::TooDeep(self.current_position()));
        }
        Ok(())
    }

    /// Run `f` one bracket or operator level deeper
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.nesting += 1;
        self.check_depth()?;
        let result = f(self)?;
        self.nesting -= 1;
        Ok(result)
    }

    /// `operand (op operand)*`, folded left
    fn fold_left(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        let mut chain = 0;

        while let Some(op) = operator(self.peek()) {
            self.advance();
            self.links += 1;
            chain += 1;
            self.check_depth()?;
            let right = operand(self)?;
            left = Expr::binary(left, op, right);
        }

        self.links -= chain;
        Ok(left)
    }

    /// Parse expression with operator precedence
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.fold_left(Self::parse_concat, |token| match token {
            Token::Equal => Some(BinaryOp::Eq),
            Token::NotEqual => Some(BinaryOp::Ne),
            Token::LessThan => Some(BinaryOp::Lt),
            Token::GreaterThan => Some(BinaryOp::Gt),
            Token::LessEqual => Some(BinaryOp::Le),
            Token::GreaterEqual => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn parse_concat(&mut self) -> Result<Expr, ParseError> {
        self.fold_left(Self::parse_additive, |token| {
            matches!(token, Token::Concat).then_some(BinaryOp::Concat)
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.fold_left(Self::parse_multiplicative, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.fold_left(Self::parse_power, |token| match token {
            Token::Multiply => Some(BinaryOp::Mul),
            Token::Divide => Some(BinaryOp::Div),
            _ => None,
        })
    }

    /// Power chains fold left, so 2^3^2 = (2^3)^2
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        self.fold_left(Self::parse_unary, |token| {
            matches!(token, Token::Power).then_some(BinaryOp::Pow)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::unary(op, operand))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();

        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.nested(Self::parse_expression)?;
                if matches!(self.peek(), Token::RightParen) {
                    self.advance();
                    Ok(expr)
                } else {
                    Err(ParseError::UnmatchedParen(start))
                }
            }
            Token::LeftBrace => {
                self.advance();
                self.nested(Self::parse_array)
            }
            Token::QuotedName(sheet) => {
                self.advance();
                self.parse_qualified(sheet)
            }
            Token::Identifier(name) => {
                self.advance();

                match self.peek() {
                    Token::LeftParen => self.nested(|p| p.parse_function_call(name)),
                    Token::Exclaim => self.parse_qualified(name),
                    _ => {
                        if name.eq_ignore_ascii_case("TRUE") {
                            Ok(Expr::Boolean(true))
                        } else if name.eq_ignore_ascii_case("FALSE") {
                            Ok(Expr::Boolean(false))
                        } else if is_cell_label(&name) {
                            let cell = parse_cell_reference(&name, None)?;
                            self.parse_range_tail(cell)
                        } else {
                            Err(ParseError::UnknownIdentifier(name))
                        }
                    }
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `Sheet!A1` or `Sheet!A1:B2`, with the sheet name already consumed
    fn parse_qualified(&mut self, sheet: String) -> Result<Expr, ParseError> {
        if !matches!(self.peek(), Token::Exclaim) {
            return Err(self.unexpected());
        }
        self.advance();

        match self.advance() {
            Token::Identifier(label) => {
                let cell = parse_cell_reference(&label, Some(sheet))?;
                self.parse_range_tail(cell)
            }
            Token::EOF => Err(ParseError::UnexpectedEnd),
            other => Err(ParseError::InvalidReference(format!("{}!{:?}", sheet, other))),
        }
    }

    /// Optional `:<cell>` after a cell reference; the end inherits the start's sheet
    fn parse_range_tail(&mut self, start: CellRef) -> Result<Expr, ParseError> {
        if !matches!(self.peek(), Token::Colon) {
            return Ok(Expr::CellRef(start));
        }
        self.advance();

        match self.advance() {
            Token::Identifier(label) => {
                let end = parse_cell_reference(&label, start.sheet.clone())?;
                Ok(Expr::range(start, end))
            }
            Token::EOF => Err(ParseError::UnexpectedEnd),
            other => Err(ParseError::InvalidReference(format!("{:?}", other))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        let open = self.current_position();
        self.advance(); // '('

        let mut args = Vec::new();

        if matches!(self.peek(), Token::RightParen) {
            self.advance();
            return Ok(Expr::function(name, args));
        }

        loop {
            args.push(self.parse_expression()?);

            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RightParen => {
                    self.advance();
                    break;
                }
                Token::EOF => return Err(ParseError::UnmatchedParen(open)),
                _ => return Err(self.unexpected()),
            }
        }

        Ok(Expr::function(name, args))
    }

    /// `{1,2;3,4}` with the opening brace consumed
    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();

        if matches!(self.peek(), Token::RightBrace) {
            self.advance();
            return Ok(Expr::Array(rows));
        }

        loop {
            row.push(self.parse_expression()?);

            match self.advance() {
                Token::Comma => {}
                Token::Semicolon => rows.push(std::mem::take(&mut row)),
                Token::RightBrace => {
                    rows.push(row);
                    break;
                }
                Token::EOF => return Err(ParseError::UnexpectedEnd),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        found: format!("{:?}", other),
                        position: self.current_position(),
                    })
                }
            }
        }

        Ok(Expr::Array(rows))
    }
}

/// Parse a cell label (e.g., "a12") into a [`CellRef`], uppercasing the column
fn parse_cell_reference(label: &str, sheet: Option<String>) -> Result<CellRef, ParseError> {
    if !is_cell_label(label) {
        return Err(ParseError::InvalidReference(label.to_string()));
    }

    let split = label
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| ParseError::InvalidReference(label.to_string()))?;
    let (letters, digits) = label.split_at(split);

    let col = column_to_number(letters)
        .ok_or_else(|| ParseError::InvalidReference(label.to_string()))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| ParseError::InvalidReference(label.to_string()))?;

    if row == 0 {
        return Err(ParseError::InvalidReference(label.to_string()));
    }

    Ok(CellRef { col, row, sheet })
}
