//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_opcode!`](crate::for_each_opcode)
//! macro holds the canonical opcode definitions and invokes a callback macro
//! for code generation, so every module that needs instruction-related code
//! (dispatch, patching, bytecode walking) derives it from the same table.
//!
//! This module generates:
//! - The [`Opcode`] enum with byte values
//! - `TryFrom<u8>` for decoding opcodes
//! - The total operand-arity table ([`Opcode::operand_bytes`])
//!
//! # Bytecode Format
//!
//! Instructions use variable-length encoding:
//! - Opcode: 1 byte
//! - Slot / immediate / constant-index operand: 1 byte
//! - Jump or call target: 2 bytes (big-endian absolute address)
//! - REGISTRY_DECLARE carries 5 reserved constant-index bytes

use crate::virtual_machine::errors::VmError;

/// Invokes a callback macro with the complete opcode definition list.
///
/// Each entry is `Name = byte, "MNEMONIC", operand_bytes`.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Halt / nop
            // =========================
            /// HALT ; terminates a successful execution
            Halt = 0x00, "HALT", 0,
            /// NOP ; does nothing
            Nop = 0x12, "NOP", 0,
            // =========================
            // Stack
            // =========================
            /// CONST idx ; push constant pool entry idx
            Const = 0x01, "CONST", 1,
            /// PUSH imm ; push small integer immediate
            Push = 0x02, "PUSH", 1,
            /// POP ; discard the top of the stack
            Pop = 0x0E, "POP", 0,
            /// DUP ; duplicate the top of the stack
            Dup = 0x0F, "DUP", 0,
            /// SWAP ; swap the top two stack values
            Swap = 0x10, "SWAP", 0,
            /// NULL ; push null
            Null = 0x18, "NULL", 0,
            /// PUSH_OBJECT ; push a fresh empty object
            PushObject = 0x60, "PUSH_OBJECT", 0,
            // =========================
            // Arithmetic
            // =========================
            /// ADD ; pop rhs, lhs; numeric sum or string concatenation
            Add = 0x03, "ADD", 0,
            /// SUB ; pop rhs, lhs; push lhs - rhs
            Sub = 0x04, "SUB", 0,
            /// MUL ; pop rhs, lhs; push lhs * rhs
            Mul = 0x05, "MUL", 0,
            /// DIV ; pop rhs, lhs; push lhs / rhs (fails on zero divisor)
            Div = 0x06, "DIV", 0,
            // =========================
            // Compare
            // =========================
            /// GT ; push 1 when lhs > rhs, else 0
            Gt = 0x07, "GT", 0,
            /// GT_EQ ; push 1 when lhs >= rhs, else 0
            GtEq = 0x08, "GT_EQ", 0,
            /// LT ; push 1 when lhs < rhs, else 0
            Lt = 0x09, "LT", 0,
            /// LT_EQ ; push 1 when lhs <= rhs, else 0
            LtEq = 0x0A, "LT_EQ", 0,
            /// EQ ; push 1 when equal (identity for arrays/objects)
            Eq = 0x0B, "EQ", 0,
            /// DIFF ; push 1 when not equal
            Diff = 0x0C, "DIFF", 0,
            // =========================
            // I/O
            // =========================
            /// PRINT ; pop and write one value to the host output
            Print = 0x11, "PRINT", 0,
            // =========================
            // Control flow
            // =========================
            /// JMP addr ; unconditional absolute jump
            Jmp = 0x13, "JMP", 2,
            /// JMP_IF addr ; pop condition, jump when condition == 0
            JmpIf = 0x14, "JMP_IF", 2,
            /// CALL addr ; call the function whose entry is addr
            Call = 0x15, "CALL", 2,
            /// RET ; pop a return address and jump (no-op on empty stack)
            Ret = 0x16, "RET", 0,
            // =========================
            // Indexing
            // =========================
            /// ACCESS ; pop index then container, push the element
            Access = 0x17, "ACCESS", 0,
            /// LENGTH ; pop a string or array, push its length
            Length = 0x19, "LENGTH", 0,
            // =========================
            // Objects
            // =========================
            /// GET_PROPERTY ; pop key then object, push the property value
            GetProperty = 0x62, "GET_PROPERTY", 0,
            /// SET_PROPERTY ; pop value, key, object; mutate and re-push the object
            SetProperty = 0x61, "SET_PROPERTY", 0,
            // =========================
            // Storage (persistent)
            // =========================
            /// STORE slot ; pop into persistent storage
            Store = 0x1A, "STORE", 1,
            /// SLOAD slot ; push from persistent storage (missing reads as 0)
            Sload = 0x1B, "SLOAD", 1,
            /// DELETE slot ; remove a persistent storage entry
            Delete = 0x1E, "DELETE", 1,
            // =========================
            // Memory (transient)
            // =========================
            /// MSTORE slot ; pop into transient memory
            Mstore = 0x1C, "MSTORE", 1,
            /// MLOAD slot ; push from transient memory (missing reads as 0)
            Mload = 0x1D, "MLOAD", 1,
            // =========================
            // Contract
            // =========================
            /// REQUIRE ; pop condition, abort the execution when it is 0
            Require = 0x54, "REQUIRE", 0,
            /// ERR ; pop a message and abort with it
            Err = 0x55, "ERR", 0,
            /// EMIT ; pop payload then kind, append a journal event
            Emit = 0x51, "EMIT", 0,
            /// TRANSFER ; host transfer effect
            Transfer = 0x52, "TRANSFER", 0,
            /// BALANCE_OF ; host balance query effect
            BalanceOf = 0x53, "BALANCE_OF", 0,
            /// REWARD ; host reward distribution effect
            Reward = 0x50, "REWARD", 0,
            // =========================
            // Declarative
            // =========================
            /// REGISTRY_DECLARE k n v o p ; pop five fields, store a registry descriptor
            RegistryDeclare = 0x70, "REGISTRY_DECLARE", 5,
            /// REGISTRY_GET idx ; pop an identifier, push the matching registry (operand reserved)
            RegistryGet = 0x71, "REGISTRY_GET", 1,
            /// AGENT_VALIDATE ; pop owner, version, hash, registry; push the agent descriptor
            AgentValidate = 0x72, "AGENT_VALIDATE", 0,
            /// POLICY_DECLARE idx ; reshape a prebuilt policy object (operand reserved)
            PolicyDeclare = 0x73, "POLICY_DECLARE", 1,
            /// TYPE_DECLARE idx ; reshape a prebuilt type object (operand reserved)
            TypeDeclare = 0x74, "TYPE_DECLARE", 1,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $byte:expr, $mnemonic:literal, $operands:expr
        ),* $(,)?
    ) => {
        /// VM opcode enum generated from the canonical definition list.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $byte,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                $(
                    if value == $byte {
                        return Ok(Opcode::$name);
                    }
                )*
                Err(VmError::InvalidInstruction {
                    opcode: value,
                    offset: 0,
                })
            }
        }

        impl Opcode {
            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the number of operand bytes following the opcode byte.
            ///
            /// This table is total: disassembly, patching, and the VM's
            /// operand fetches all consult it.
            pub const fn operand_bytes(&self) -> usize {
                match self {
                    $( Opcode::$name => $operands, )*
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

/// Walks `code` and returns the byte offset of every instruction boundary.
///
/// Fails when the stream ends inside an operand or contains an unknown
/// opcode.
pub fn instruction_boundaries(code: &[u8]) -> Result<Vec<usize>, VmError> {
    let mut boundaries = Vec::new();
    let mut ip = 0;
    while ip < code.len() {
        boundaries.push(ip);
        let opcode = Opcode::try_from(code[ip]).map_err(|_| VmError::InvalidInstruction {
            opcode: code[ip],
            offset: ip,
        })?;
        ip += 1 + opcode.operand_bytes();
        if ip > code.len() {
            return Err(VmError::UnexpectedEndOfBytecode { ip });
        }
    }
    Ok(boundaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(VmError::InvalidInstruction { opcode: 0xFF, .. })
        ));
    }

    #[test]
    fn opcode_roundtrips_through_byte() {
        for byte in 0u8..=0xFF {
            if let Ok(opcode) = Opcode::try_from(byte) {
                assert_eq!(opcode as u8, byte, "byte value mismatch for {:?}", opcode);
            }
        }
    }

    #[test]
    fn operand_table_matches_contract() {
        assert_eq!(Opcode::Halt.operand_bytes(), 0);
        assert_eq!(Opcode::Push.operand_bytes(), 1);
        assert_eq!(Opcode::Const.operand_bytes(), 1);
        assert_eq!(Opcode::Jmp.operand_bytes(), 2);
        assert_eq!(Opcode::JmpIf.operand_bytes(), 2);
        assert_eq!(Opcode::Call.operand_bytes(), 2);
        assert_eq!(Opcode::RegistryDeclare.operand_bytes(), 5);
        assert_eq!(Opcode::RegistryGet.operand_bytes(), 1);
        assert_eq!(Opcode::Emit.operand_bytes(), 0);
    }

    #[test]
    fn mnemonics_are_uppercase_contract_names() {
        assert_eq!(Opcode::Halt.mnemonic(), "HALT");
        assert_eq!(Opcode::JmpIf.mnemonic(), "JMP_IF");
        assert_eq!(Opcode::PushObject.mnemonic(), "PUSH_OBJECT");
        assert_eq!(Opcode::RegistryDeclare.mnemonic(), "REGISTRY_DECLARE");
    }

    #[test]
    fn boundaries_walk_variable_length_stream() {
        let code = vec![
            Opcode::Push as u8,
            7,
            Opcode::Jmp as u8,
            0,
            6,
            Opcode::Halt as u8,
            Opcode::Halt as u8,
        ];
        assert_eq!(instruction_boundaries(&code).unwrap(), vec![0, 2, 5, 6]);
    }

    #[test]
    fn boundaries_reject_truncated_operand() {
        let code = vec![Opcode::Jmp as u8, 0];
        assert!(matches!(
            instruction_boundaries(&code),
            Err(VmError::UnexpectedEndOfBytecode { .. })
        ));
    }
}
