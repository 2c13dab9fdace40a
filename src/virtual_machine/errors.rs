use thiserror::Error;

/// Errors that can occur during VM execution.
///
/// Every variant is converted into a failure [`ExecutionResult`] before the
/// dispatch loop returns; the VM never unwinds across it.
///
/// [`ExecutionResult`]: crate::virtual_machine::vm::ExecutionResult
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Unknown opcode encountered in bytecode.
    #[error("unknown opcode: 0x{opcode:02X} at offset {offset}")]
    InvalidInstruction { opcode: u8, offset: usize },
    /// Bytecode ended inside an instruction or without a HALT.
    #[error("unexpected end of bytecode at offset {ip}")]
    UnexpectedEndOfBytecode { ip: usize },
    /// An opcode popped more values than the stack holds.
    #[error("stack underflow while executing {context}")]
    StackUnderflow { context: &'static str },
    /// Operand type does not match what the opcode expects.
    #[error("{instruction} expected {expected}, got {actual}")]
    TypeMismatch {
        instruction: &'static str,
        expected: &'static str,
        actual: String,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Constant pool index out of range.
    #[error("constant index {index} out of range (pool has {len} entries)")]
    InvalidConstIndex { index: u8, len: usize },
    /// Array index out of range.
    #[error("Array index out of bounds: {index}")]
    IndexOutOfBounds { index: i64, len: usize },
    /// Object property lookup failed.
    #[error("Property '{property}' not found in object")]
    PropertyNotFound { property: String },
    /// Named function missing from the artifact.
    #[error("function '{name}' not found in contract")]
    FunctionNotFound { name: String },
    /// CALL target has no function metadata.
    #[error("no function registered at address {addr}")]
    UnknownCallTarget { addr: usize },
    /// Wrong number of arguments for a named-function invocation.
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
    /// REQUIRE popped a zero or non-integer condition.
    #[error("Require failed")]
    RequireFailed,
    /// ERR aborted execution with a contract-supplied message.
    #[error("Error raised: {message}")]
    ErrRaised { message: String },
    /// REGISTRY_GET found no registry with the requested name.
    #[error("Registry '{name}' not found")]
    RegistryNotFound { name: String },
    /// AGENT_VALIDATE found a field that disagrees with the registry.
    #[error(
        "Agent validation failed: {field} mismatch for '{agent}': expected {expected}, got {actual}"
    )]
    AgentMismatch {
        agent: String,
        field: &'static str,
        expected: String,
        actual: String,
    },
    /// Storage slot operand exceeds the slot namespace.
    #[error("storage slot {slot} out of range")]
    SlotOutOfRange { slot: usize },
}
