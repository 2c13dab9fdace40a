//! Hand-rolled scanner producing the token stream consumed by the parser.

use crate::language::token::{Token, TokenKind};
use thiserror::Error;

/// Errors produced while scanning source text.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("line {line}:{column}: unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },
    #[error("line {line}:{column}: unterminated string literal")]
    UnterminatedString { line: usize, column: usize },
}

/// Scans `source` into a token stream terminated by an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, literal: impl Into<String>, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, literal, line, column));
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek() {
            let line = self.line;
            let column = self.column;

            match ch {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let word = self.scan_word();
                    match TokenKind::keyword(&word) {
                        Some(kind) => self.push(kind, word, line, column),
                        None => self.push(TokenKind::Identifier, word, line, column),
                    }
                }
                c if c.is_ascii_digit() => {
                    let number = self.scan_number();
                    self.push(TokenKind::Number, number, line, column);
                }
                '"' => {
                    let string = self.scan_string(line, column)?;
                    self.push(TokenKind::String, string, line, column);
                }
                _ => {
                    self.scan_punctuation(line, column)?;
                }
            }
        }

        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, "", line, column);
        Ok(self.tokens)
    }

    fn scan_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    fn scan_number(&mut self) -> String {
        let mut number = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                number.push(c);
                self.advance();
            } else if c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                number.push(c);
                self.advance();
            } else {
                break;
            }
        }
        number
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { line, column }),
                Some('"') => return Ok(out),
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => out.push(other),
                    None => return Err(LexError::UnterminatedString { line, column }),
                },
                Some(other) => out.push(other),
            }
        }
    }

    fn scan_punctuation(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        let ch = self.advance().expect("caller checked peek");

        // Two-character operators first.
        let two = |lexer: &mut Self, kind: TokenKind, literal: &str| {
            lexer.advance();
            lexer.push(kind, literal, line, column);
        };

        match (ch, self.peek()) {
            ('=', Some('=')) => two(self, TokenKind::Equals, "=="),
            ('!', Some('=')) => two(self, TokenKind::NotEquals, "!="),
            ('<', Some('=')) => two(self, TokenKind::LessEquals, "<="),
            ('>', Some('=')) => two(self, TokenKind::GreaterEquals, ">="),
            ('+', Some('+')) => two(self, TokenKind::PlusPlus, "++"),
            ('-', Some('-')) => two(self, TokenKind::MinusMinus, "--"),
            ('+', Some('=')) => two(self, TokenKind::PlusEquals, "+="),
            ('-', Some('=')) => two(self, TokenKind::MinusEquals, "-="),
            ('&', Some('&')) => two(self, TokenKind::And, "&&"),
            ('|', Some('|')) => two(self, TokenKind::Or, "||"),
            _ => {
                let kind = match ch {
                    '=' => TokenKind::Assignment,
                    '<' => TokenKind::Less,
                    '>' => TokenKind::Greater,
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Dash,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '%' => TokenKind::Percent,
                    '!' => TokenKind::Not,
                    '(' => TokenKind::OpenParen,
                    ')' => TokenKind::CloseParen,
                    '{' => TokenKind::OpenCurly,
                    '}' => TokenKind::CloseCurly,
                    '[' => TokenKind::OpenBracket,
                    ']' => TokenKind::CloseBracket,
                    ',' => TokenKind::Comma,
                    ';' => TokenKind::SemiColon,
                    ':' => TokenKind::Colon,
                    '.' => TokenKind::Dot,
                    other => {
                        return Err(LexError::UnexpectedCharacter {
                            ch: other,
                            line,
                            column,
                        });
                    }
                };
                self.push(kind, ch.to_string(), line, column);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            kinds("let balance = supply"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assignment,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_numbers_including_decimals() {
        let tokens = tokenize("10 2.5 0").unwrap();
        assert_eq!(tokens[0].literal, "10");
        assert_eq!(tokens[1].literal, "2.5");
        assert_eq!(tokens[2].literal, "0");
    }

    #[test]
    fn scans_strings_with_escapes() {
        let tokens = tokenize(r#""hello \"vm\"\n""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal, "hello \"vm\"\n");
    }

    #[test]
    fn scans_compound_operators() {
        assert_eq!(
            kinds("== != <= >= ++ -- += -= && ||"),
            vec![
                TokenKind::Equals,
                TokenKind::NotEquals,
                TokenKind::LessEquals,
                TokenKind::GreaterEquals,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEquals,
                TokenKind::MinusEquals,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("let x = 1 // trailing comment\nx"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assignment,
                TokenKind::Number,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(matches!(
            tokenize("\"oops"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn unexpected_character_errors_with_position() {
        let err = tokenize("let x = @").unwrap_err();
        assert!(matches!(
            err,
            LexError::UnexpectedCharacter {
                ch: '@',
                line: 1,
                column: 9,
            }
        ));
    }

    #[test]
    fn tracks_line_numbers() {
        let tokens = tokenize("let a = 1\nlet b = 2").unwrap();
        let second_let = tokens.iter().filter(|t| t.kind == TokenKind::Let).nth(1);
        assert_eq!(second_let.map(|t| t.line), Some(2));
    }
}
