//! Statement parsing.

use crate::language::ast::{Param, Stmt, TypeExpr};
use crate::language::parser::{BindingPower, ParseError, Parser};
use crate::language::token::TokenKind;

impl Parser {
    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.current_kind() {
            TokenKind::Contract => self.parse_contract_decl()?,
            TokenKind::Let | TokenKind::Const => self.parse_var_decl()?,
            TokenKind::If => self.parse_if_stmt()?,
            TokenKind::While => self.parse_while_stmt()?,
            TokenKind::For => self.parse_for_stmt()?,
            TokenKind::Func => self.parse_func_decl()?,
            TokenKind::Return => self.parse_return_stmt()?,
            TokenKind::Require => self.parse_require_stmt()?,
            TokenKind::Registry => self.parse_registry_decl()?,
            TokenKind::Agent => self.parse_agent_decl()?,
            TokenKind::Policy => self.parse_policy_decl()?,
            TokenKind::Type => self.parse_type_decl()?,
            _ => Stmt::Expression(self.parse_expr(BindingPower::Default)?),
        };
        self.eat(TokenKind::SemiColon);
        Ok(stmt)
    }

    /// Parses `{ ...statements... }`, skipping stray semicolons.
    pub(crate) fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::OpenCurly)?;
        let mut body = Vec::new();
        while self.has_tokens() && self.current_kind() != TokenKind::CloseCurly {
            if self.eat(TokenKind::SemiColon) {
                continue;
            }
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::CloseCurly)?;
        Ok(body)
    }

    fn parse_contract_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Contract)?;
        let name = self.expect(TokenKind::Identifier)?.literal;
        let body = self.parse_block()?;
        Ok(Stmt::Contract { name, body })
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        let constant = self.advance().kind == TokenKind::Const;
        let name = self.expect(TokenKind::Identifier)?.literal;

        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(TokenKind::Assignment)?;
        let value = self.parse_expr(BindingPower::Assignment)?;

        Ok(Stmt::VarDecl {
            name,
            constant,
            ty,
            value,
        })
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expr(BindingPower::Default)?;
        self.expect(TokenKind::CloseParen)?;

        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expr(BindingPower::Default)?;
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;

        Ok(Stmt::While { condition, body })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::OpenParen)?;

        let init = self.parse_simple_stmt()?;
        self.expect(TokenKind::SemiColon)?;

        let condition = self.parse_expr(BindingPower::Default)?;
        self.expect(TokenKind::SemiColon)?;

        let post = self.parse_simple_stmt()?;
        self.expect(TokenKind::CloseParen)?;

        let body = self.parse_block()?;

        Ok(Stmt::For {
            init: Box::new(init),
            condition,
            post: Box::new(post),
            body,
        })
    }

    /// A statement allowed inside `for (...)` headers: a declaration or an
    /// expression, with no trailing semicolon consumed.
    fn parse_simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.current_kind() {
            TokenKind::Let | TokenKind::Const => self.parse_var_decl(),
            _ => Ok(Stmt::Expression(self.parse_expr(BindingPower::Default)?)),
        }
    }

    fn parse_func_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Func)?;
        let name = self.expect(TokenKind::Identifier)?.literal;

        self.expect(TokenKind::OpenParen)?;
        let mut params = Vec::new();
        while self.current_kind() != TokenKind::CloseParen {
            let param_name = self.expect(TokenKind::Identifier)?.literal;
            let ty = if self.eat(TokenKind::Colon) {
                self.parse_type()?
            } else {
                TypeExpr::Symbol("Unknown".to_string())
            };
            params.push(Param {
                name: param_name,
                ty,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        let return_type = if self.eat(TokenKind::Colon) {
            self.parse_type()?
        } else {
            TypeExpr::Symbol("void".to_string())
        };

        let body = self.parse_block()?;

        Ok(Stmt::Func {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Return)?;
        let value = self.parse_expr(BindingPower::Default)?;
        Ok(Stmt::Return(value))
    }

    /// `require(condition ; "message")` with `,` accepted as separator; the
    /// message may be omitted entirely.
    fn parse_require_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Require)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expr(BindingPower::Default)?;

        let message = if self.eat(TokenKind::SemiColon) || self.eat(TokenKind::Comma) {
            Some(self.expect(TokenKind::String)?.literal)
        } else {
            None
        };
        self.expect(TokenKind::CloseParen)?;

        Ok(Stmt::Require { condition, message })
    }

    fn parse_registry_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Registry)?;
        let name = self.expect(TokenKind::Identifier)?.literal;
        let fields = self.parse_property_list()?;
        Ok(Stmt::RegistryDecl { name, fields })
    }

    fn parse_agent_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Agent)?;
        let name = self.expect(TokenKind::Identifier)?.literal;
        let fields = self.parse_property_list()?;
        Ok(Stmt::AgentDecl { name, fields })
    }

    fn parse_policy_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Policy)?;
        let name = self.expect(TokenKind::Identifier)?.literal;
        let rules = self.parse_property_list()?;
        Ok(Stmt::PolicyDecl { name, rules })
    }

    fn parse_type_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Type)?;
        let name = self.expect(TokenKind::Identifier)?.literal;

        self.expect(TokenKind::OpenCurly)?;
        let mut fields = Vec::new();
        while self.current_kind() != TokenKind::CloseCurly {
            let field_name = self.parse_property_key()?;
            self.expect(TokenKind::Colon)?;
            let field_type = self.parse_type()?;
            fields.push((field_name, field_type));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseCurly)?;

        Ok(Stmt::TypeDecl { name, fields })
    }
}
