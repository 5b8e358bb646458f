use crate::error::ParseError;

/// Token types for formula parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),

    // Bare word: function name, cell reference, boolean or sheet name
    Identifier(String),
    // Single-quoted sheet name ('My Sheet')
    QuotedName(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,  // ^
    Concat, // &

    // Comparison
    Equal,        // =
    NotEqual,     // <>
    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Semicolon,
    Exclaim, // ! for sheet references

    // End of input
    EOF,
}

/// A token together with the character offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Lexer for tokenizing formula expressions (text after the leading `=`)
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let position = self.position;
            if position >= self.input.len() {
                break;
            }

            let token = self.next_token()?;
            tokens.push(Spanned { token, position });
        }

        tokens.push(Spanned {
            token: Token::EOF,
            position: self.position,
        });
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.input[self.position].is_whitespace() {
            self.position += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.position += 1;
        c
    }

    /// Consume one character and produce `token`
    fn single(&mut self, token: Token) -> Result<Token, ParseError> {
        self.advance();
        Ok(token)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::EOF),
        };

        match c {
            // Operators
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Multiply),
            '/' => self.single(Token::Divide),
            '^' => self.single(Token::Power),
            '&' => self.single(Token::Concat),

            // Comparison
            '=' => self.single(Token::Equal),
            '<' => {
                self.advance();
                match self.peek() {
                    Some('>') => self.single(Token::NotEqual),
                    Some('=') => self.single(Token::LessEqual),
                    _ => Ok(Token::LessThan),
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.single(Token::GreaterEqual)
                } else {
                    Ok(Token::GreaterThan)
                }
            }

            // Delimiters
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '{' => self.single(Token::LeftBrace),
            '}' => self.single(Token::RightBrace),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Colon),
            ';' => self.single(Token::Semicolon),
            '!' => self.single(Token::Exclaim),

            // String literal
            '"' => self.read_string(),

            // Quoted sheet name
            '\'' => self.read_quoted_name(),

            // Number
            '0'..='9' | '.' => self.read_number(),

            // Function name, cell reference, boolean or sheet name
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier()),

            _ => Err(ParseError::UnexpectedChar {
                ch: c,
                position: self.position,
            }),
        }
    }

    /// Read a delimited literal where a doubled delimiter escapes itself
    fn read_delimited(&mut self, delimiter: char) -> Option<String> {
        self.advance(); // Skip opening delimiter
        let mut s = String::new();

        while let Some(c) = self.peek() {
            if c == delimiter {
                // Check for escaped delimiter
                if self.peek_next() == Some(delimiter) {
                    s.push(delimiter);
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // Skip closing delimiter
                    return Some(s);
                }
            } else {
                s.push(c);
                self.advance();
            }
        }

        None
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.read_delimited('"')
            .map(Token::String)
            .ok_or(ParseError::UnterminatedString(start))
    }

    fn read_quoted_name(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.read_delimited('\'')
            .map(Token::QuotedName)
            .ok_or(ParseError::UnterminatedString(start))
    }

    /// Digits with at most one decimal point
    fn read_number(&mut self) -> Result<Token, ParseError> {
        let mut s = String::new();
        let mut has_dot = false;

        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    s.push(c);
                    self.advance();
                }
                '.' if !has_dot => {
                    has_dot = true;
                    s.push(c);
                    self.advance();
                }
                _ => break,
            }
        }

        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::InvalidNumber(s))
    }

    fn read_identifier(&mut self) -> Token {
        let mut s = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens("1 + 2 * 3"),
            vec![
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.0),
                Token::Multiply,
                Token::Number(3.0),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            tokens("SUM(A1:A10)"),
            vec![
                Token::Identifier("SUM".to_string()),
                Token::LeftParen,
                Token::Identifier("A1".to_string()),
                Token::Colon,
                Token::Identifier("A10".to_string()),
                Token::RightParen,
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_string_literal_with_escaped_quote() {
        assert_eq!(
            tokens("\"say \"\"hi\"\"\""),
            vec![Token::String("say \"hi\"".to_string()), Token::EOF]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("A1 <> B1 <= 2 >= 3"),
            vec![
                Token::Identifier("A1".to_string()),
                Token::NotEqual,
                Token::Identifier("B1".to_string()),
                Token::LessEqual,
                Token::Number(2.0),
                Token::GreaterEqual,
                Token::Number(3.0),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_quoted_sheet_name() {
        assert_eq!(
            tokens("'My Sheet'!A1"),
            vec![
                Token::QuotedName("My Sheet".to_string()),
                Token::Exclaim,
                Token::Identifier("A1".to_string()),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let spanned = Lexer::new("A1 + 10").tokenize().unwrap();
        let positions: Vec<usize> = spanned.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 3, 5, 7]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Lexer::new("\"open").tokenize(),
            Err(ParseError::UnterminatedString(0))
        );
        assert_eq!(
            Lexer::new("1 $ 2").tokenize(),
            Err(ParseError::UnexpectedChar { ch: '$', position: 2 })
        );
    }
}
