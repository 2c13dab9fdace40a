//! Expression parsing: nud/led handlers driven by binding power.

use crate::language::ast::Expr;
use crate::language::parser::{BindingPower, ParseError, Parser, binding_power};
use crate::language::token::TokenKind;

impl Parser {
    /// Parses an expression with the given minimum binding power.
    pub(crate) fn parse_expr(&mut self, bp: BindingPower) -> Result<Expr, ParseError> {
        let mut left = self.parse_nud()?;

        while binding_power(self.current_kind()) > bp {
            left = self.parse_led(left)?;
        }

        Ok(left)
    }

    /// Null denotation: tokens that can begin an expression.
    fn parse_nud(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind() {
            TokenKind::Number => {
                let token = self.advance();
                let value = token
                    .literal
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber {
                        literal: token.literal.clone(),
                        line: token.line,
                        column: token.column,
                    })?;
                Ok(Expr::Number(value))
            }
            TokenKind::String => Ok(Expr::Str(self.advance().literal)),
            TokenKind::Identifier => Ok(Expr::Symbol(self.advance().literal)),
            TokenKind::This => {
                self.advance();
                Ok(Expr::This)
            }
            // `registry(Name)` in expression position resolves a declared
            // registry at runtime.
            TokenKind::Registry => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let argument = self.parse_expr(BindingPower::Default)?;
                self.expect(TokenKind::CloseParen)?;
                Ok(Expr::Call {
                    callee: Box::new(Expr::Symbol("registry".to_string())),
                    arguments: vec![argument],
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Dash | TokenKind::Not => {
                let operator = self.advance();
                let operand = self.parse_expr(BindingPower::Unary)?;
                Ok(Expr::Prefix {
                    operator,
                    operand: Box::new(operand),
                })
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr(BindingPower::Default)?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::OpenBracket => self.parse_array_literal(),
            TokenKind::OpenCurly => self.parse_object_literal(),
            _ => {
                let token = self.current();
                Err(ParseError::NoExpressionRule {
                    found: token.kind,
                    literal: token.literal.clone(),
                    line: token.line,
                    column: token.column,
                })
            }
        }
    }

    /// Left denotation: operators that extend an existing expression.
    fn parse_led(&mut self, left: Expr) -> Result<Expr, ParseError> {
        match self.current_kind() {
            TokenKind::Assignment | TokenKind::PlusEquals | TokenKind::MinusEquals => {
                let operator = self.advance();
                // Right-associative: the value may itself be an assignment.
                let value = self.parse_expr(BindingPower::Default)?;
                Ok(Expr::Assignment {
                    target: Box::new(left),
                    operator,
                    value: Box::new(value),
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = self.advance();
                Ok(Expr::IncDec {
                    target: Box::new(left),
                    operator,
                })
            }
            TokenKind::And
            | TokenKind::Or
            | TokenKind::Less
            | TokenKind::LessEquals
            | TokenKind::Greater
            | TokenKind::GreaterEquals
            | TokenKind::Equals
            | TokenKind::NotEquals
            | TokenKind::Plus
            | TokenKind::Dash
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent => {
                let operator = self.advance();
                let right = self.parse_expr(binding_power(operator.kind))?;
                Ok(Expr::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            }
            TokenKind::OpenParen => {
                self.advance();
                let mut arguments = Vec::new();
                while self.current_kind() != TokenKind::CloseParen {
                    arguments.push(self.parse_expr(BindingPower::Default)?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseParen)?;
                Ok(Expr::Call {
                    callee: Box::new(left),
                    arguments,
                })
            }
            TokenKind::Dot => {
                self.advance();
                let property = self.expect(TokenKind::Identifier)?.literal;
                Ok(Expr::Member {
                    object: Box::new(left),
                    property,
                })
            }
            TokenKind::OpenBracket => {
                self.advance();
                let index = self.parse_expr(BindingPower::Default)?;
                self.expect(TokenKind::CloseBracket)?;
                Ok(Expr::Index {
                    array: Box::new(left),
                    index: Box::new(index),
                })
            }
            _ => Err(self.unexpected("an operator")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::OpenBracket)?;
        let mut items = Vec::new();
        while self.current_kind() != TokenKind::CloseBracket {
            items.push(self.parse_expr(BindingPower::Default)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket)?;
        Ok(Expr::ArrayLiteral(items))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let fields = self.parse_property_list()?;
        Ok(Expr::ObjectLiteral(fields))
    }

    /// Parses `{ key: expr, ... }`, preserving declaration order. Keys may be
    /// identifiers, strings, or keywords used as plain names.
    pub(crate) fn parse_property_list(&mut self) -> Result<Vec<(String, Expr)>, ParseError> {
        self.expect(TokenKind::OpenCurly)?;
        let mut fields = Vec::new();
        while self.current_kind() != TokenKind::CloseCurly {
            let key = self.parse_property_key()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr(BindingPower::Default)?;
            fields.push((key, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseCurly)?;
        Ok(fields)
    }

    pub(crate) fn parse_property_key(&mut self) -> Result<String, ParseError> {
        match self.current_kind() {
            TokenKind::Identifier | TokenKind::String => Ok(self.advance().literal),
            // Keywords double as property names (`registry: ...` inside agents).
            kind if TokenKind::keyword(&self.current().literal) == Some(kind) => {
                Ok(self.advance().literal)
            }
            _ => Err(self.unexpected("a property name")),
        }
    }
}
