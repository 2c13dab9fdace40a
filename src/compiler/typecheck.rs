//! Best-effort structural type checking at call sites and object-literal
//! sites.
//!
//! Inference covers what is statically knowable: literals, object literals,
//! and symbols naming declared types. Everything else is `Unknown` and passes
//! unchecked.

use crate::compiler::{CompileError, Compiler};
use crate::language::ast::Expr;

impl Compiler {
    /// Infers the static type name of an expression.
    pub(crate) fn actual_type(&self, expr: &Expr) -> String {
        match expr {
            Expr::Number(n) => {
                if n.fract() == 0.0 {
                    "Int".to_string()
                } else {
                    "Float".to_string()
                }
            }
            Expr::Str(_) => "String".to_string(),
            Expr::Symbol(name) => {
                if self.types.contains_key(name) {
                    name.clone()
                } else {
                    "Unknown".to_string()
                }
            }
            Expr::ObjectLiteral(_) => "Object".to_string(),
            _ => "Unknown".to_string(),
        }
    }

    /// Compatibility lattice: exact match, the `Unknown` wildcard, object
    /// literals against declared types (validated structurally by the
    /// caller), the numeric family, and the address/proof coercions. A
    /// declared custom type is never compatible with a primitive.
    pub(crate) fn types_compatible(&self, expected: &str, actual: &str) -> bool {
        if expected == actual || actual == "Unknown" {
            return true;
        }

        if actual == "Object" && self.types.contains_key(expected) {
            return true;
        }

        let aliases: &[&str] = match expected {
            "Int" => &["UInt", "Float", "Number"],
            "UInt" => &["Int", "Float", "Number"],
            "Float" => &["Int", "UInt", "Number"],
            "Number" => &["Int", "UInt", "Float"],
            // Addresses may arrive as hex numbers parsed as integers.
            "Address" => &["String", "Int", "UInt"],
            "Proof" => &["String"],
            _ => &[],
        };
        if aliases.contains(&actual) {
            return true;
        }

        if self.types.contains_key(expected) {
            return !matches!(actual, "Int" | "UInt" | "Float" | "Number" | "String");
        }

        false
    }

    /// Validates an object literal against a declared type: every declared
    /// field must be present with a compatible type.
    pub(crate) fn validate_object_against_type(
        &self,
        fields: &[(String, Expr)],
        type_name: &str,
    ) -> Result<(), CompileError> {
        let meta = self
            .types
            .get(type_name)
            .ok_or_else(|| CompileError::UnknownType {
                name: type_name.to_string(),
            })?;

        for (field, field_type) in &meta.fields {
            let provided = fields
                .iter()
                .find(|(key, _)| key == field)
                .map(|(_, value)| value)
                .ok_or_else(|| CompileError::MissingField {
                    field: field.clone(),
                    field_type: field_type.clone(),
                    type_name: type_name.to_string(),
                })?;

            let actual = self.actual_type(provided);
            if actual == "Object" && self.types.contains_key(field_type) {
                if let Expr::ObjectLiteral(nested) = provided {
                    self.validate_object_against_type(nested, field_type)?;
                    continue;
                }
            }
            if !self.types_compatible(field_type, &actual) {
                return Err(CompileError::FieldTypeMismatch {
                    field: field.clone(),
                    expected: field_type.clone(),
                    actual,
                    type_name: type_name.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validates argument count and types for a call to a declared function.
    /// Builtins and not-yet-declared functions are skipped.
    pub(crate) fn validate_call(&self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        let Some(meta) = self.functions.get(name) else {
            return Ok(());
        };

        if args.len() != meta.arg_meta.len() {
            return Err(CompileError::ArgCountMismatch {
                function: name.to_string(),
                expected: meta.arg_meta.len(),
                actual: args.len(),
            });
        }

        for (index, (arg, arg_meta)) in args.iter().zip(&meta.arg_meta).enumerate() {
            let expected = arg_meta.type_name.as_str();
            let actual = self.actual_type(arg);

            if actual == "Object" && self.types.contains_key(expected) {
                if let Expr::ObjectLiteral(fields) = arg {
                    self.validate_object_against_type(fields, expected)?;
                    continue;
                }
            }

            if !self.types_compatible(expected, &actual) {
                return Err(CompileError::TypeMismatch {
                    function: name.to_string(),
                    arg_index: index + 1,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(())
    }
}
