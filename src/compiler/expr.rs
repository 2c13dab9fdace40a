//! Expression lowering.

use crate::compiler::{CompileError, Compiler};
use crate::language::ast::Expr;
use crate::language::token::TokenKind;
use crate::types::value::Value;
use crate::virtual_machine::isa::Opcode;
use std::collections::BTreeMap;

/// Largest number literal emitted as a PUSH immediate; anything else goes
/// through the constant pool.
const MAX_PUSH_IMMEDIATE: f64 = 255.0;

impl Compiler {
    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => self.compile_number(*n),
            Expr::Str(s) => {
                let idx = self.intern_const(Value::Str(s.clone()))?;
                self.emit_op1(Opcode::Const, idx);
                Ok(())
            }
            Expr::Symbol(name) => {
                let slot = self.slot_of(name)?;
                self.emit_op1(Opcode::Sload, slot);
                Ok(())
            }
            Expr::ArrayLiteral(_) => {
                let value = Self::literal_value(expr, "array literal")?;
                let idx = self.intern_const(value)?;
                self.emit_op1(Opcode::Const, idx);
                Ok(())
            }
            Expr::ObjectLiteral(fields) => self.compile_object_construction(fields),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.compile_binary(left, operator.kind, &operator.literal, right),
            Expr::Prefix { operator, operand } => self.compile_prefix(operator.kind, operand),
            Expr::IncDec { target, operator } => self.compile_inc_dec(target, operator.kind),
            Expr::Assignment {
                target,
                operator,
                value,
            } => self.compile_assignment(target, operator.kind, value),
            Expr::Call { callee, arguments } => self.compile_call(callee, arguments),
            Expr::Member { object, property } => {
                self.compile_member_load(object)?;
                let idx = self.intern_const(Value::Str(property.clone()))?;
                self.emit_op1(Opcode::Const, idx);
                self.emit_op(Opcode::GetProperty);
                Ok(())
            }
            Expr::Index { array, index } => {
                self.compile_expr(array)?;
                self.compile_expr(index)?;
                self.emit_op(Opcode::Access);
                Ok(())
            }
            Expr::This => {
                self.emit_op1(Opcode::Sload, 0);
                Ok(())
            }
            Expr::Null => {
                self.emit_op(Opcode::Null);
                Ok(())
            }
        }
    }

    /// Integer-valued numbers up to one byte become PUSH immediates;
    /// everything else is interned.
    fn compile_number(&mut self, n: f64) -> Result<(), CompileError> {
        if n.fract() == 0.0 && (0.0..=MAX_PUSH_IMMEDIATE).contains(&n) {
            self.emit_op1(Opcode::Push, n as u8);
        } else {
            let idx = self.intern_const(Value::from_number(n))?;
            self.emit_op1(Opcode::Const, idx);
        }
        Ok(())
    }

    /// Reduces a literal expression to a pool value. Array and object
    /// literals recurse; anything computed is rejected.
    pub(crate) fn literal_value(expr: &Expr, context: &'static str) -> Result<Value, CompileError> {
        match expr {
            Expr::Number(n) => Ok(Value::from_number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Null => Ok(Value::Null),
            Expr::ArrayLiteral(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| Self::literal_value(item, context))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::ObjectLiteral(fields) => {
                let mut map = BTreeMap::new();
                for (key, value) in fields {
                    map.insert(key.clone(), Self::literal_value(value, context)?);
                }
                Ok(Value::Object(map))
            }
            _ => Err(CompileError::ExpectedLiteral { context }),
        }
    }

    /// Builds an object at runtime: PUSH_OBJECT, then per field CONST key,
    /// value, SET_PROPERTY, leaving the object on the stack.
    pub(crate) fn compile_object_construction(
        &mut self,
        fields: &[(String, Expr)],
    ) -> Result<(), CompileError> {
        self.emit_op(Opcode::PushObject);
        for (key, value) in fields {
            let key_idx = self.intern_const(Value::Str(key.clone()))?;
            self.emit_op1(Opcode::Const, key_idx);
            self.compile_expr(value)?;
            self.emit_op(Opcode::SetProperty);
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        left: &Expr,
        kind: TokenKind,
        literal: &str,
        right: &Expr,
    ) -> Result<(), CompileError> {
        // Logical operators short-circuit through jumps instead of opcodes.
        match kind {
            TokenKind::And => return self.compile_logical_and(left, right),
            TokenKind::Or => return self.compile_logical_or(left, right),
            _ => {}
        }

        self.compile_expr(left)?;
        self.compile_expr(right)?;

        let op = match kind {
            TokenKind::Plus => Opcode::Add,
            TokenKind::Dash => Opcode::Sub,
            TokenKind::Star => Opcode::Mul,
            TokenKind::Slash => Opcode::Div,
            TokenKind::Greater => Opcode::Gt,
            TokenKind::GreaterEquals => Opcode::GtEq,
            TokenKind::Less => Opcode::Lt,
            TokenKind::LessEquals => Opcode::LtEq,
            TokenKind::Equals => Opcode::Eq,
            TokenKind::NotEquals => Opcode::Diff,
            _ => {
                return Err(CompileError::UnsupportedOperator {
                    operator: literal.to_string(),
                });
            }
        };
        self.emit_op(op);
        Ok(())
    }

    /// `a && b`: when a is falsy jump to a pushed 0, otherwise the result is
    /// b's value.
    fn compile_logical_and(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        let to_false = self.emit_jump(Opcode::JmpIf);
        self.compile_expr(right)?;
        let to_end = self.emit_jump(Opcode::Jmp);

        let false_pos = self.current_pos();
        self.emit_op1(Opcode::Push, 0);
        self.patch_jump(to_false, false_pos)?;

        let end = self.current_pos();
        self.patch_jump(to_end, end)
    }

    /// `a || b`: keep a when truthy, otherwise evaluate b.
    fn compile_logical_or(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        self.emit_op(Opcode::Dup);
        let to_right = self.emit_jump(Opcode::JmpIf);
        let to_end = self.emit_jump(Opcode::Jmp);

        let right_pos = self.current_pos();
        self.emit_op(Opcode::Pop);
        self.compile_expr(right)?;
        self.patch_jump(to_right, right_pos)?;

        let end = self.current_pos();
        self.patch_jump(to_end, end)
    }

    fn compile_prefix(&mut self, kind: TokenKind, operand: &Expr) -> Result<(), CompileError> {
        self.compile_expr(operand)?;
        match kind {
            TokenKind::Dash => {
                // 0 - x
                self.emit_op1(Opcode::Push, 0);
                self.emit_op(Opcode::Swap);
                self.emit_op(Opcode::Sub);
                Ok(())
            }
            TokenKind::Not => {
                // x == 0
                self.emit_op1(Opcode::Push, 0);
                self.emit_op(Opcode::Eq);
                Ok(())
            }
            other => Err(CompileError::UnsupportedOperator {
                operator: format!("{}", other),
            }),
        }
    }

    fn compile_inc_dec(&mut self, target: &Expr, kind: TokenKind) -> Result<(), CompileError> {
        let Expr::Symbol(name) = target else {
            return Err(CompileError::CompoundAssignmentTarget);
        };
        let slot = self.slot_of(name)?;
        self.emit_op1(Opcode::Sload, slot);
        self.emit_op1(Opcode::Push, 1);
        self.emit_op(if kind == TokenKind::PlusPlus {
            Opcode::Add
        } else {
            Opcode::Sub
        });
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        target: &Expr,
        kind: TokenKind,
        value: &Expr,
    ) -> Result<(), CompileError> {
        match kind {
            TokenKind::Assignment => match target {
                Expr::Symbol(name) => self.compile_symbol_assignment(name, value),
                Expr::Member { object, property } => {
                    self.compile_member_assignment(object, property, value)
                }
                _ => Err(CompileError::InvalidAssignmentTarget),
            },
            // `x += e` and `x -= e` are sugar for load, op, store.
            TokenKind::PlusEquals | TokenKind::MinusEquals => {
                let Expr::Symbol(name) = target else {
                    return Err(CompileError::CompoundAssignmentTarget);
                };
                let slot = self.slot_of(name)?;
                self.emit_op1(Opcode::Sload, slot);
                self.compile_expr(value)?;
                self.emit_op(if kind == TokenKind::PlusEquals {
                    Opcode::Add
                } else {
                    Opcode::Sub
                });
                self.emit_op1(Opcode::Store, slot);
                Ok(())
            }
            _ => Err(CompileError::InvalidAssignmentTarget),
        }
    }

    fn compile_symbol_assignment(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        if let Expr::ObjectLiteral(fields) = value {
            self.compile_object_construction(fields)?;
        } else {
            self.compile_expr(value)?;
        }
        let slot = self.get_slot(name)?;
        self.emit_op1(Opcode::Store, slot);
        Ok(())
    }

    /// `obj.prop = v`: load the object, push the property name and value,
    /// SET_PROPERTY mutates in place; the re-pushed object is dropped.
    fn compile_member_assignment(
        &mut self,
        object: &Expr,
        property: &str,
        value: &Expr,
    ) -> Result<(), CompileError> {
        self.compile_member_load(object)?;
        let idx = self.intern_const(Value::Str(property.to_string()))?;
        self.emit_op1(Opcode::Const, idx);
        self.compile_expr(value)?;
        self.emit_op(Opcode::SetProperty);
        self.emit_op(Opcode::Pop);
        Ok(())
    }

    /// Loads the container of a member expression; `this` is slot 0.
    fn compile_member_load(&mut self, object: &Expr) -> Result<(), CompileError> {
        match object {
            Expr::This => {
                self.emit_op1(Opcode::Sload, 0);
                Ok(())
            }
            other => self.compile_expr(other),
        }
    }

    fn compile_call(&mut self, callee: &Expr, arguments: &[Expr]) -> Result<(), CompileError> {
        let Expr::Symbol(name) = callee else {
            return Err(CompileError::InvalidCallTarget);
        };

        self.validate_call(name, arguments)?;

        // `registry(N)` resolves a declared registry by name; a bare symbol
        // argument means its name, not a slot read.
        if name == "registry" {
            let idx = match arguments.first() {
                Some(Expr::Symbol(registry_name)) => {
                    let idx = self.intern_const(Value::Str(registry_name.clone()))?;
                    self.emit_op1(Opcode::Const, idx);
                    idx
                }
                Some(other) => {
                    self.compile_expr(other)?;
                    0
                }
                None => {
                    return Err(CompileError::ArgCountMismatch {
                        function: name.clone(),
                        expected: 1,
                        actual: 0,
                    });
                }
            };
            self.emit_op1(Opcode::RegistryGet, idx);
            return Ok(());
        }

        for argument in arguments {
            self.compile_expr(argument)?;
        }

        match name.as_str() {
            "print" => self.emit_op(Opcode::Print),
            "len" | "length" => self.emit_op(Opcode::Length),
            "_transfer" => self.emit_op(Opcode::Transfer),
            "balanceOf" => self.emit_op(Opcode::BalanceOf),
            "require" => self.emit_op(Opcode::Require),
            "emit" => self.emit_op(Opcode::Emit),
            _ => {
                let addr = self
                    .functions
                    .get(name)
                    .map(|meta| meta.addr)
                    .ok_or_else(|| CompileError::UnknownFunction { name: name.clone() })?;
                if addr > 0xFFFF {
                    return Err(CompileError::BytecodeTooLarge { target: addr });
                }
                self.emit_op(Opcode::Call);
                self.code.push((addr >> 8) as u8);
                self.code.push((addr & 0xFF) as u8);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::tests::{compile, compile_err};
    use crate::compiler::CompileError;
    use crate::types::value::Value;
    use crate::virtual_machine::isa::{instruction_boundaries, Opcode};

    fn opcodes_of(bytecode: &[u8]) -> Vec<Opcode> {
        instruction_boundaries(bytecode)
            .unwrap()
            .into_iter()
            .map(|pos| Opcode::try_from(bytecode[pos]).unwrap())
            .collect()
    }

    #[test]
    fn small_integers_become_push_immediates() {
        let artifact = compile("let a = 200;");
        assert!(opcodes_of(&artifact.bytecode).contains(&Opcode::Push));
        assert!(artifact.const_pool.is_empty());
    }

    #[test]
    fn large_integers_intern_as_integer_constants() {
        let artifact = compile("let a = 300;");
        assert_eq!(artifact.const_pool, vec![Value::Int(300)]);
    }

    #[test]
    fn fractional_numbers_intern_as_doubles() {
        let artifact = compile("let a = 2.5;");
        assert_eq!(artifact.const_pool, vec![Value::Double(2.5)]);
    }

    #[test]
    fn array_literals_intern_whole() {
        let artifact = compile(r#"let xs = [1, "two", [3]];"#);
        assert_eq!(
            artifact.const_pool,
            vec![Value::Array(vec![
                Value::Int(1),
                Value::from("two"),
                Value::Array(vec![Value::Int(3)]),
            ])]
        );
    }

    #[test]
    fn computed_array_items_are_rejected() {
        assert!(matches!(
            compile_err("let a = 1; let xs = [a + 1];"),
            CompileError::ExpectedLiteral { .. }
        ));
    }

    #[test]
    fn object_literal_assignment_builds_at_runtime() {
        let artifact = compile(r#"let u = {name: "a", age: 3};"#);
        let ops = opcodes_of(&artifact.bytecode);
        assert!(ops.contains(&Opcode::PushObject));
        assert_eq!(
            ops.iter().filter(|&&op| op == Opcode::SetProperty).count(),
            2
        );
        assert_eq!(ops.last(), Some(&Opcode::Halt));
    }

    #[test]
    fn member_read_uses_get_property() {
        let artifact = compile(r#"let u = {age: 3}; print(u.age);"#);
        assert!(opcodes_of(&artifact.bytecode).contains(&Opcode::GetProperty));
    }

    #[test]
    fn this_reads_slot_zero() {
        let artifact = compile("print(this.owner);");
        let bytecode = &artifact.bytecode;
        let boundaries = instruction_boundaries(bytecode).unwrap();
        let sload = boundaries
            .iter()
            .find(|&&pos| bytecode[pos] == Opcode::Sload as u8)
            .copied()
            .unwrap();
        assert_eq!(bytecode[sload + 1], 0);
    }

    #[test]
    fn builtin_calls_lower_to_single_opcodes() {
        let artifact = compile(r#"let xs = [1, 2]; print(len(xs)); require(1); _transfer(); balanceOf();"#);
        let ops = opcodes_of(&artifact.bytecode);
        for expected in [
            Opcode::Length,
            Opcode::Print,
            Opcode::Require,
            Opcode::Transfer,
            Opcode::BalanceOf,
        ] {
            assert!(ops.contains(&expected), "missing {:?}", expected);
        }
    }

    #[test]
    fn emit_builtin_compiles_kind_then_payload() {
        let artifact = compile(r#"emit("Transfer", 5);"#);
        let ops = opcodes_of(&artifact.bytecode);
        assert!(ops.contains(&Opcode::Emit));
    }

    #[test]
    fn user_call_emits_two_byte_address() {
        let artifact = compile("func f(a: Int): Int { return a; } print(f(1));");
        let meta = &artifact.functions["f"];
        let boundaries = instruction_boundaries(&artifact.bytecode).unwrap();
        let call = boundaries
            .iter()
            .find(|&&pos| artifact.bytecode[pos] == Opcode::Call as u8)
            .copied()
            .unwrap();
        let target = ((artifact.bytecode[call + 1] as usize) << 8)
            | artifact.bytecode[call + 2] as usize;
        assert_eq!(target, meta.addr);
    }

    #[test]
    fn call_to_undefined_function_fails() {
        assert!(matches!(
            compile_err("print(missing_fn(1));"),
            CompileError::UnknownFunction { name } if name == "missing_fn"
        ));
    }

    #[test]
    fn prefix_minus_lowers_to_zero_minus() {
        let artifact = compile("let a = 5; let b = -a;");
        let ops = opcodes_of(&artifact.bytecode);
        assert!(ops.contains(&Opcode::Swap));
        assert!(ops.contains(&Opcode::Sub));
    }

    #[test]
    fn compound_assignment_desugars_to_load_op_store() {
        let artifact = compile("let a = 1; a += 2; a -= 1;");
        let ops = opcodes_of(&artifact.bytecode);
        assert!(ops.contains(&Opcode::Add));
        assert!(ops.contains(&Opcode::Sub));
        // No dedicated opcode exists for compound assignment.
        assert_eq!(
            ops.iter().filter(|&&op| op == Opcode::Store).count(),
            3
        );
    }

    #[test]
    fn logical_operators_lower_to_branches() {
        let artifact = compile("let a = 1; let b = 0; let c = a && b; let d = a || b;");
        let ops = opcodes_of(&artifact.bytecode);
        assert!(ops.contains(&Opcode::JmpIf));
        assert!(!ops.contains(&Opcode::Mul));
    }

    #[test]
    fn modulo_is_rejected() {
        assert!(matches!(
            compile_err("let a = 5 % 2;"),
            CompileError::UnsupportedOperator { operator } if operator == "%"
        ));
    }
}
