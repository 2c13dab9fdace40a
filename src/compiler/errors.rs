use thiserror::Error;

/// Errors that abort compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// An expression reads a name that was never written.
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },
    /// A call names a function that is neither built in nor declared.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    /// The constant pool exhausted its one-byte index space.
    #[error("constant pool overflow: more than {limit} entries")]
    ConstPoolOverflow { limit: usize },
    /// The slot namespace exhausted its one-byte address space.
    #[error("too many variables: more than {limit} slots")]
    TooManyVariables { limit: usize },
    /// A jump target does not fit the two-byte operand.
    #[error("bytecode too large: jump target {target} exceeds the addressable range")]
    BytecodeTooLarge { target: usize },
    /// Assignment to something that is not a symbol or member.
    #[error("unsupported assignment target")]
    InvalidAssignmentTarget,
    /// Compound assignment to a non-symbol target.
    #[error("compound assignment requires a plain variable target")]
    CompoundAssignmentTarget,
    /// A binary operator with no lowering.
    #[error("unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String },
    /// Call through a computed callee.
    #[error("calls must name a function directly")]
    InvalidCallTarget,
    /// A literal was required (array items, declaration fields).
    #[error("expected a literal value in {context}")]
    ExpectedLiteral { context: &'static str },
    /// A registry/agent declaration is missing a required field.
    #[error("declaration '{declaration}' is missing required field '{field}'")]
    MissingDeclField {
        declaration: String,
        field: &'static str,
    },
    /// Reference to an undeclared type.
    #[error("unknown type '{name}'")]
    UnknownType { name: String },
    /// Call-site argument count disagreement.
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    ArgCountMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
    /// Call-site argument type disagreement.
    #[error(
        "type mismatch in argument {arg_index} of function '{function}': expected '{expected}', got '{actual}'"
    )]
    TypeMismatch {
        function: String,
        arg_index: usize,
        expected: String,
        actual: String,
    },
    /// Object literal missing a field its declared type requires.
    #[error(
        "missing field '{field}' of type '{field_type}' in object literal for type '{type_name}'"
    )]
    MissingField {
        field: String,
        field_type: String,
        type_name: String,
    },
    /// Object literal field with an incompatible type.
    #[error(
        "field '{field}' has type '{actual}', expected '{expected}' for type '{type_name}'"
    )]
    FieldTypeMismatch {
        field: String,
        expected: String,
        actual: String,
        type_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_site_messages_identify_the_argument() {
        let err = CompileError::TypeMismatch {
            function: "transfer".into(),
            arg_index: 2,
            expected: "Int".into(),
            actual: "String".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch in argument 2 of function 'transfer': expected 'Int', got 'String'"
        );
    }

    #[test]
    fn missing_field_message_names_the_type() {
        let err = CompileError::MissingField {
            field: "age".into(),
            field_type: "Int".into(),
            type_name: "User".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing field 'age' of type 'Int' in object literal for type 'User'"
        );
    }
}
