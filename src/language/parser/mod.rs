//! Pratt parser for the contract language.
//!
//! Expressions are parsed with binding powers (see [`BindingPower`]);
//! statements dispatch on the leading keyword. The parser owns the token
//! stream and walks it left to right without backtracking.

mod expr;
mod stmt;
mod types;

use crate::language::ast::Stmt;
use crate::language::token::{Token, TokenKind};
use thiserror::Error;

/// Errors produced while parsing a token stream.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}:{column}: expected {expected} but found {found} '{literal}'")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("line {line}:{column}: no expression starts with {found} '{literal}'")]
    NoExpressionRule {
        found: TokenKind,
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("line {line}:{column}: invalid number literal '{literal}'")]
    InvalidNumber {
        literal: String,
        line: usize,
        column: usize,
    },
}

/// Operator binding powers, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum BindingPower {
    Default,
    Assignment,
    Logical,
    Relational,
    Additive,
    Multiplicative,
    Unary,
    Call,
    Member,
}

/// Returns the left binding power of `kind`, `Default` for non-operators.
pub(crate) fn binding_power(kind: TokenKind) -> BindingPower {
    match kind {
        TokenKind::Assignment
        | TokenKind::PlusEquals
        | TokenKind::MinusEquals
        | TokenKind::PlusPlus
        | TokenKind::MinusMinus => BindingPower::Assignment,
        TokenKind::And | TokenKind::Or => BindingPower::Logical,
        TokenKind::Less
        | TokenKind::LessEquals
        | TokenKind::Greater
        | TokenKind::GreaterEquals
        | TokenKind::Equals
        | TokenKind::NotEquals => BindingPower::Relational,
        TokenKind::Plus | TokenKind::Dash => BindingPower::Additive,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => BindingPower::Multiplicative,
        TokenKind::OpenParen => BindingPower::Call,
        TokenKind::Dot | TokenKind::OpenBracket => BindingPower::Member,
        _ => BindingPower::Default,
    }
}

/// Parses a token stream into the program's top-level statement list.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();

    while parser.has_tokens() {
        if parser.eat(TokenKind::SemiColon) {
            continue;
        }
        body.push(parser.parse_stmt()?);
    }

    Ok(body)
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, pos: 0 }
    }

    pub(crate) fn current(&self) -> &Token {
        // The stream always ends with Eof; clamp rather than panic.
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream is never empty"))
    }

    pub(crate) fn current_kind(&self) -> TokenKind {
        self.current().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn has_tokens(&self) -> bool {
        self.current_kind() != TokenKind::Eof
    }

    /// Consumes the current token if it matches `kind`.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.current_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes and returns the current token, failing if it is not `kind`.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.current_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{}", kind)))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind,
            literal: token.literal.clone(),
            line: token.line,
            column: token.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::{Expr, TypeExpr};
    use crate::language::lexer::tokenize;

    pub(crate) fn parse_source(source: &str) -> Vec<Stmt> {
        parse(tokenize(source).expect("lexing failed")).expect("parsing failed")
    }

    #[test]
    fn parses_variable_declaration() {
        let body = parse_source("let x = 10;");
        assert_eq!(
            body,
            vec![Stmt::VarDecl {
                name: "x".into(),
                constant: false,
                ty: None,
                value: Expr::Number(10.0),
            }]
        );
    }

    #[test]
    fn parses_const_with_annotation() {
        let body = parse_source("const supply: Int = 1000;");
        assert_eq!(
            body,
            vec![Stmt::VarDecl {
                name: "supply".into(),
                constant: true,
                ty: Some(TypeExpr::Symbol("Int".into())),
                value: Expr::Number(1000.0),
            }]
        );
    }

    #[test]
    fn binding_powers_are_ordered() {
        assert!(BindingPower::Assignment < BindingPower::Logical);
        assert!(BindingPower::Relational < BindingPower::Additive);
        assert!(BindingPower::Additive < BindingPower::Multiplicative);
        assert!(BindingPower::Call < BindingPower::Member);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let body = parse_source("1 + 2 * 3");
        let Stmt::Expression(Expr::Binary { operator, right, .. }) = &body[0] else {
            panic!("expected binary expression, got {:?}", body[0]);
        };
        assert_eq!(operator.literal, "+");
        assert!(matches!(**right, Expr::Binary { .. }));
    }

    #[test]
    fn comparison_binds_looser_than_arithmetic() {
        let body = parse_source("a + 1 < b * 2");
        let Stmt::Expression(Expr::Binary { operator, .. }) = &body[0] else {
            panic!("expected binary expression, got {:?}", body[0]);
        };
        assert_eq!(operator.literal, "<");
    }

    #[test]
    fn stray_semicolons_are_skipped() {
        let body = parse_source(";; let x = 1 ;;");
        assert_eq!(body.len(), 1);
    }
}
