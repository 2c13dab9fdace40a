//! Statement lowering.

use crate::compiler::{CompileError, Compiler};
use crate::language::ast::{Expr, Param, Stmt, TypeExpr};
use crate::types::value::Value;
use crate::virtual_machine::artifact::{ArgMeta, FunctionMeta, TypeMeta};
use crate::virtual_machine::isa::Opcode;

impl Compiler {
    pub(crate) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Block(body) | Stmt::Contract { body, .. } => {
                for inner in body {
                    self.compile_stmt(inner)?;
                }
                Ok(())
            }
            Stmt::Expression(expr) => self.compile_expr(expr),
            Stmt::VarDecl { name, value, .. } => self.compile_var_decl(name, value),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.compile_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While { condition, body } => self.compile_while(condition, body),
            Stmt::For {
                init,
                condition,
                post,
                body,
            } => self.compile_for(init, condition, post, body),
            Stmt::Func {
                name,
                params,
                return_type,
                body,
            } => self.compile_func(name, params, return_type, body),
            Stmt::Return(value) => self.compile_return(value),
            Stmt::Require { condition, message } => {
                self.compile_require(condition, message.as_deref())
            }
            Stmt::RegistryDecl { name, fields } => self.compile_registry_decl(name, fields),
            Stmt::AgentDecl { name, fields } => self.compile_agent_decl(name, fields),
            Stmt::PolicyDecl { name, rules } => self.compile_policy_decl(name, rules),
            Stmt::TypeDecl { name, fields } => self.compile_type_decl(name, fields),
        }
    }

    fn compile_var_decl(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        if let Expr::ObjectLiteral(fields) = value {
            self.compile_object_construction(fields)?;
        } else {
            self.compile_expr(value)?;
        }
        let slot = self.get_slot(name)?;
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }

    /// `return E` lowers to RET inside a function body and to PRINT at top
    /// level, so a top-level return displays the program's result.
    fn compile_return(&mut self, value: &Expr) -> Result<(), CompileError> {
        self.compile_expr(value)?;
        if self.in_function {
            self.emit_op(Opcode::Ret);
        } else {
            self.emit_op(Opcode::Print);
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        self.compile_expr(condition)?;
        let skip_then = self.emit_jump(Opcode::JmpIf);

        for stmt in then_branch {
            self.compile_stmt(stmt)?;
        }

        match else_branch {
            Some(else_branch) => {
                let skip_else = self.emit_jump(Opcode::Jmp);

                let else_start = self.current_pos();
                for stmt in else_branch {
                    self.compile_stmt(stmt)?;
                }

                self.patch_jump(skip_then, else_start)?;
                let end = self.current_pos();
                self.patch_jump(skip_else, end)
            }
            None => {
                let end = self.current_pos();
                self.patch_jump(skip_then, end)
            }
        }
    }

    fn compile_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let cond_pos = self.current_pos();
        self.compile_expr(condition)?;
        let exit = self.emit_jump(Opcode::JmpIf);

        for stmt in body {
            self.compile_stmt(stmt)?;
        }

        self.emit_jump_to(Opcode::Jmp, cond_pos)?;
        let end = self.current_pos();
        self.patch_jump(exit, end)
    }

    fn compile_for(
        &mut self,
        init: &Stmt,
        condition: &Expr,
        post: &Stmt,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        self.compile_stmt(init)?;

        let cond_pos = self.current_pos();
        self.compile_expr(condition)?;
        let exit = self.emit_jump(Opcode::JmpIf);

        for stmt in body {
            self.compile_stmt(stmt)?;
        }

        self.compile_stmt(post)?;
        self.emit_jump_to(Opcode::Jmp, cond_pos)?;
        let end = self.current_pos();
        self.patch_jump(exit, end)
    }

    /// Lowers a function: a skip-jump over the body, parameter slots
    /// allocated in declaration order, the body, and a RET for void
    /// functions (non-void bodies emit their own through `return`).
    fn compile_func(
        &mut self,
        name: &str,
        params: &[Param],
        return_type: &TypeExpr,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        let was_in_function = self.in_function;
        self.in_function = true;

        let skip_body = self.emit_jump(Opcode::Jmp);
        let addr = self.current_pos();

        let mut args = Vec::with_capacity(params.len());
        let mut arg_meta = Vec::with_capacity(params.len());
        for param in params {
            let slot = self.get_slot(&param.name)?;
            args.push(slot);
            arg_meta.push(ArgMeta {
                name: param.name.clone(),
                slot,
                type_name: param.ty.name(),
            });
        }

        self.functions
            .insert(name.to_string(), FunctionMeta { addr, args, arg_meta });
        self.function_name.insert(addr, name.to_string());

        for stmt in body {
            self.compile_stmt(stmt)?;
        }

        if return_type.name() == "void" {
            self.emit_op(Opcode::Ret);
        }

        let after_body = self.current_pos();
        self.patch_jump(skip_body, after_body)?;
        self.in_function = was_in_function;
        Ok(())
    }

    /// `require(C ; M)`: the truthy path jumps over the error block, the
    /// falsy path lands on CONST(M) + ERR. Without a message the condition
    /// feeds the bare REQUIRE opcode.
    fn compile_require(
        &mut self,
        condition: &Expr,
        message: Option<&str>,
    ) -> Result<(), CompileError> {
        self.compile_expr(condition)?;

        let Some(message) = message else {
            self.emit_op(Opcode::Require);
            return Ok(());
        };

        let to_error = self.emit_jump(Opcode::JmpIf);
        let past_error = self.emit_jump(Opcode::Jmp);

        let error_start = self.current_pos();
        let message_idx = self.intern_const(Value::Str(message.to_string()))?;
        self.emit_op1(Opcode::Const, message_idx);
        self.emit_op(Opcode::Err);

        self.patch_jump(to_error, error_start)?;
        let end = self.current_pos();
        self.patch_jump(past_error, end)
    }

    /// Registry descriptors push kind, name, version, owner, purpose (so the
    /// VM pops purpose first) followed by REGISTRY_DECLARE carrying the five
    /// constant indices as reserved operands.
    fn compile_registry_decl(
        &mut self,
        name: &str,
        fields: &[(String, Expr)],
    ) -> Result<(), CompileError> {
        let field_const = |compiler: &mut Self, field: &'static str| {
            let value = fields
                .iter()
                .find(|(key, _)| key == field)
                .map(|(_, expr)| expr)
                .ok_or(CompileError::MissingDeclField {
                    declaration: name.to_string(),
                    field,
                })?;
            let literal = Self::literal_value(value, "registry declaration")?;
            compiler.intern_const(literal)
        };

        let kind_idx = field_const(self, "kind")?;
        let name_idx = self.intern_const(Value::Str(name.to_string()))?;
        let version_idx = field_const(self, "version")?;
        let owner_idx = field_const(self, "owner")?;
        let purpose_idx = field_const(self, "purpose")?;

        for idx in [kind_idx, name_idx, version_idx, owner_idx, purpose_idx] {
            self.emit_op1(Opcode::Const, idx);
        }
        self.emit_op(Opcode::RegistryDeclare);
        self.code
            .extend_from_slice(&[kind_idx, name_idx, version_idx, owner_idx, purpose_idx]);
        Ok(())
    }

    /// Agents resolve their registry by name, push hash, version, and owner,
    /// validate, and store the resulting descriptor (slot 0 when the agent
    /// is the first declaration, where the deploy response looks for it).
    fn compile_agent_decl(
        &mut self,
        name: &str,
        fields: &[(String, Expr)],
    ) -> Result<(), CompileError> {
        let field = |field: &'static str| {
            fields
                .iter()
                .find(|(key, _)| key == field)
                .map(|(_, expr)| expr)
                .ok_or(CompileError::MissingDeclField {
                    declaration: name.to_string(),
                    field,
                })
        };

        let registry_name = match field("registry")? {
            Expr::Symbol(symbol) => symbol.clone(),
            Expr::Str(literal) => literal.clone(),
            _ => {
                return Err(CompileError::ExpectedLiteral {
                    context: "agent registry reference",
                });
            }
        };
        let registry_idx = self.intern_const(Value::Str(registry_name))?;
        self.emit_op1(Opcode::Const, registry_idx);
        self.emit_op1(Opcode::RegistryGet, registry_idx);

        self.compile_expr(field("hash")?)?;
        self.compile_expr(field("version")?)?;
        self.compile_expr(field("owner")?)?;
        self.emit_op(Opcode::AgentValidate);

        let slot = self.get_slot(name)?;
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }

    fn compile_policy_decl(
        &mut self,
        name: &str,
        rules: &[(String, Expr)],
    ) -> Result<(), CompileError> {
        let ident_idx = self.intern_const(Value::Str(name.to_string()))?;
        self.emit_op1(Opcode::Const, ident_idx);

        self.emit_op(Opcode::PushObject);
        for (key, value) in rules {
            let key_idx = self.intern_const(Value::Str(key.clone()))?;
            self.emit_op1(Opcode::Const, key_idx);
            self.compile_expr(value)?;
            self.emit_op(Opcode::SetProperty);
        }
        self.emit_op1(Opcode::PolicyDeclare, ident_idx);

        let slot = self.get_slot(name)?;
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }

    /// Type declarations register compile-time metadata for structural
    /// checks and also materialize the shape as a stored object.
    fn compile_type_decl(
        &mut self,
        name: &str,
        fields: &[(String, TypeExpr)],
    ) -> Result<(), CompileError> {
        let meta_fields = fields
            .iter()
            .map(|(field, ty)| (field.clone(), ty.name()))
            .collect();
        self.types
            .insert(name.to_string(), TypeMeta { fields: meta_fields });

        let ident_idx = self.intern_const(Value::Str(name.to_string()))?;
        self.emit_op1(Opcode::Const, ident_idx);

        self.emit_op(Opcode::PushObject);
        for (field, ty) in fields {
            let key_idx = self.intern_const(Value::Str(field.clone()))?;
            self.emit_op1(Opcode::Const, key_idx);
            let ty_idx = self.intern_const(Value::Str(ty.name()))?;
            self.emit_op1(Opcode::Const, ty_idx);
            self.emit_op(Opcode::SetProperty);
        }
        self.emit_op1(Opcode::TypeDeclare, ident_idx);

        let slot = self.get_slot(name)?;
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }
}
