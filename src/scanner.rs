use log::debug;
use serde::Serialize;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[rustfmt::skip]
pub enum TokenType {
  // Single-character tokens.
  LeftParen, RightParen, LeftBrace, RightBrace,
  Comma, Dot, Minus, Plus, Semicolon, Slash, Star,

  // One or two character tokens.
  Bang, BangEqual,
  Equal, EqualEqual,
  Greater, GreaterEqual,
  Less, LessEqual,

  // Literals.
  Identifier, String, Number,

  // Keywords.
  And, Class, Else, False, Fun, For, If, Nil, Or,
  Print, Return, This, True, Var, While,

  Eof
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Identifier(String),
    Str(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub ty: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub col: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{what} at line={line},col={col}")]
pub struct Error {
    pub what: String,
    pub line: usize,
    pub col: i64,
}

/// Lexes the whole of `input`. The returned sequence always ends with an
/// `Eof` token; on error no tokens are returned at all.
pub fn scan_tokens(input: &str) -> Result<Vec<Token>, Error> {
    let mut scanner = Scanner {
        source: input.chars().collect(),
        ..Default::default()
    };

    scanner.scan_tokens()?;
    debug!("scanned {} tokens", scanner.tokens.len());

    Ok(scanner.tokens)
}

struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    line_start: usize,
    start_line: usize,
    start_col: i64,
}

impl Default for Scanner {
    fn default() -> Scanner {
        Scanner {
            source: Vec::new(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            line_start: 0,
            start_line: 1,
            start_col: 0,
        }
    }
}

impl Scanner {
    fn scan_tokens(&mut self) -> Result<(), Error> {
        while !self.done() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_col = (self.current - self.line_start) as i64;
            self.scan_token()?;
        }

        self.tokens.push(Token {
            ty: TokenType::Eof,
            lexeme: String::new(),
            literal: None,
            line: self.line,
            col: (self.current - self.line_start) as i64,
        });

        Ok(())
    }

    fn scan_token(&mut self) -> Result<(), Error> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => {
                let ty = if self.matches('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(ty)
            }
            '=' => {
                let ty = if self.matches('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(ty)
            }
            '<' => {
                let ty = if self.matches('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(ty)
            }
            '>' => {
                let ty = if self.matches('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(ty)
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.done() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash)
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.newline(),
            '"' => self.string()?,
            _ => {
                if c.is_ascii_digit() {
                    self.number(c)?
                } else if Scanner::is_alpha(c) {
                    self.identifier()
                } else {
                    return Err(self.error(format!("Unexpected character '{}'", c)));
                }
            }
        }

        Ok(())
    }

    fn string(&mut self) -> Result<(), Error> {
        while self.peek() != '"' && !self.done() {
            if self.advance() == '\n' {
                self.newline();
            }
        }

        if self.done() {
            return Err(self.error("Unterminated string".into()));
        }

        // closing quote
        self.advance();

        let value: String = self.source[self.start + 1..self.current - 1]
            .iter()
            .collect();
        self.add_token_literal(TokenType::String, Some(Literal::Str(value)));
        Ok(())
    }

    fn number(&mut self, first: char) -> Result<(), Error> {
        if first != '0' {
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = self.text();
        match text.parse::<f64>() {
            Ok(n) => {
                self.add_token_literal(TokenType::Number, Some(Literal::Number(n)));
                Ok(())
            }
            Err(err) => Err(self.error(format!("Invalid number literal {}: {}", text, err))),
        }
    }

    fn identifier(&mut self) {
        while Scanner::is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text = self.text();
        match Scanner::keyword(&text) {
            Some(ty) => self.add_token(ty),
            None => self.add_token_literal(TokenType::Identifier, Some(Literal::Identifier(text))),
        }
    }

    fn keyword(text: &str) -> Option<TokenType> {
        match text {
            "and" => Some(TokenType::And),
            "class" => Some(TokenType::Class),
            "else" => Some(TokenType::Else),
            "false" => Some(TokenType::False),
            "for" => Some(TokenType::For),
            "fun" => Some(TokenType::Fun),
            "if" => Some(TokenType::If),
            "nil" => Some(TokenType::Nil),
            "or" => Some(TokenType::Or),
            "print" => Some(TokenType::Print),
            "return" => Some(TokenType::Return),
            "this" => Some(TokenType::This),
            "true" => Some(TokenType::True),
            "var" => Some(TokenType::Var),
            "while" => Some(TokenType::While),
            _ => None,
        }
    }

    fn is_alpha(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_alphanumeric(c: char) -> bool {
        Scanner::is_alpha(c) || c.is_ascii_digit()
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_start = self.current;
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, c: char) -> bool {
        if self.done() || self.source[self.current] != c {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn text(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_literal(token_type, None)
    }

    fn add_token_literal(&mut self, token_type: TokenType, literal: Option<Literal>) {
        let lexeme = self.text();

        self.tokens.push(Token {
            ty: token_type,
            lexeme,
            literal,
            line: self.start_line,
            col: self.start_col,
        })
    }

    fn error(&self, what: String) -> Error {
        Error {
            what,
            line: self.start_line,
            col: self.start_col,
        }
    }

    fn done(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::scanner::{scan_tokens, Literal, TokenType};

    fn types(code: &str) -> Vec<TokenType> {
        scan_tokens(code)
            .unwrap()
            .into_iter()
            .map(|tok| tok.ty)
            .collect()
    }

    fn stripped(code: &str) -> Vec<(TokenType, String, Option<Literal>)> {
        scan_tokens(code)
            .unwrap()
            .into_iter()
            .map(|tok| (tok.ty, tok.lexeme, tok.literal))
            .collect()
    }

    #[test]
    fn comments_are_elided() {
        assert_eq!(stripped("// comment\n42;"), stripped("42;"));
    }

    #[test]
    fn longest_match_on_shared_prefix() {
        assert_eq!(
            types("= == ! != > >= < <="),
            vec![
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(
            types("var varx fun super this"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Fun,
                TokenType::Identifier,
                TokenType::This,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn number_literals() {
        let toks = scan_tokens("12.5 0 7").unwrap();
        assert_eq!(toks[0].literal, Some(Literal::Number(12.5)));
        assert_eq!(toks[1].literal, Some(Literal::Number(0.0)));
        assert_eq!(toks[2].literal, Some(Literal::Number(7.0)));
    }

    #[test]
    fn leading_zero_splits_literal() {
        assert_eq!(
            types("01"),
            vec![TokenType::Number, TokenType::Number, TokenType::Eof]
        );
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        assert_eq!(
            types("1."),
            vec![TokenType::Number, TokenType::Dot, TokenType::Eof]
        );
    }

    #[test]
    fn strings_have_no_escapes() {
        let toks = scan_tokens("\"a\\nb\"").unwrap();
        assert_eq!(toks[0].literal, Some(Literal::Str("a\\nb".to_string())));
    }

    #[test]
    fn token_positions() {
        let toks = scan_tokens("var x;\n  print x;").unwrap();
        assert_eq!((toks[0].line, toks[0].col), (1, 0));
        assert_eq!((toks[1].line, toks[1].col), (1, 4));
        assert_eq!((toks[3].line, toks[3].col), (2, 2));
    }

    #[test]
    fn unterminated_string() {
        let err = scan_tokens("print \"abc").unwrap_err();
        assert_eq!(err.what, "Unterminated string");
        assert_eq!((err.line, err.col), (1, 6));
    }

    #[test]
    fn unexpected_character() {
        let err = scan_tokens("var a = 1;\nvar b = @;").unwrap_err();
        assert_eq!(err.what, "Unexpected character '@'");
        assert_eq!((err.line, err.col), (2, 8));
    }
}
