//! Bytecode compiler: lowers the AST into a [`ContractArtifact`].
//!
//! The compiler walks the top-level statement list, assigning storage slots
//! to identifiers in first-write order, interning constants with equality
//! reuse, emitting forward jumps through patch sites, and recording function
//! entry addresses with typed argument metadata. Lightweight structural type
//! checking runs at call sites and object-literal sites.

mod errors;
mod expr;
mod stmt;
mod typecheck;

pub use errors::CompileError;

use crate::language::ast::Stmt;
use crate::language::lexer::{self, LexError};
use crate::language::parser::{self, ParseError};
use crate::types::value::Value;
use crate::virtual_machine::artifact::{ContractArtifact, FunctionMeta, TypeMeta};
use crate::virtual_machine::isa::Opcode;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// One-byte operand space; index 255 doubles as the reuse lookup's
/// not-found sentinel, so the pool keeps at most 255 entries.
const CONST_POOL_LIMIT: usize = 255;

/// One-byte slot operand space.
const SLOT_LIMIT: usize = 256;

/// Two-byte jump operand space.
const MAX_JUMP_TARGET: usize = 0xFFFF;

/// Any failure on the source-to-artifact path.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
}

/// Tokenizes, parses, and compiles `source` into an artifact with empty
/// initial storage.
pub fn compile_source(source: &str) -> Result<ContractArtifact, BuildError> {
    let tokens = lexer::tokenize(source)?;
    let body = parser::parse(tokens)?;
    Ok(Compiler::compile(&body)?)
}

/// A forward-jump patch site: the byte offset of a two-byte placeholder
/// operand to fill in once the target is known.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JumpSite(usize);

pub(crate) struct Compiler {
    pub(crate) code: Vec<u8>,
    pub(crate) symbols: HashMap<String, u8>,
    pub(crate) const_pool: Vec<Value>,
    pub(crate) functions: BTreeMap<String, FunctionMeta>,
    pub(crate) function_name: BTreeMap<usize, String>,
    pub(crate) types: BTreeMap<String, TypeMeta>,
    next_slot: usize,
    pub(crate) in_function: bool,
}

impl Compiler {
    pub(crate) fn new() -> Compiler {
        Compiler {
            code: Vec::new(),
            symbols: HashMap::new(),
            const_pool: Vec::new(),
            functions: BTreeMap::new(),
            function_name: BTreeMap::new(),
            types: BTreeMap::new(),
            next_slot: 0,
            in_function: false,
        }
    }

    /// Compiles a top-level statement list into an artifact.
    ///
    /// The emitted bytecode runs the top-level statements in order from
    /// address 0 and finishes with HALT. Initial storage is left empty; the
    /// runtime populates it by running the artifact once at deploy time.
    pub fn compile(body: &[Stmt]) -> Result<ContractArtifact, CompileError> {
        let mut compiler = Compiler::new();
        for stmt in body {
            compiler.compile_stmt(stmt)?;
        }
        compiler.emit_op(Opcode::Halt);
        Ok(compiler.into_artifact())
    }

    fn into_artifact(self) -> ContractArtifact {
        ContractArtifact {
            bytecode: self.code,
            const_pool: self.const_pool,
            functions: self.functions,
            function_name: self.function_name,
            types: self.types,
            init_storage: BTreeMap::new(),
        }
    }

    // ==================== Emission helpers ====================

    pub(crate) fn current_pos(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn emit_op(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    pub(crate) fn emit_op1(&mut self, op: Opcode, operand: u8) {
        self.code.push(op as u8);
        self.code.push(operand);
    }

    /// Emits a jump opcode with a placeholder target and returns its patch
    /// site.
    pub(crate) fn emit_jump(&mut self, op: Opcode) -> JumpSite {
        self.emit_op(op);
        let site = JumpSite(self.code.len());
        self.code.extend_from_slice(&[0, 0]);
        site
    }

    /// Emits a jump with a known (backward) absolute target.
    pub(crate) fn emit_jump_to(&mut self, op: Opcode, target: usize) -> Result<(), CompileError> {
        let site = self.emit_jump(op);
        self.patch_jump(site, target)
    }

    /// Writes `target` into a placeholder operand, big-endian.
    pub(crate) fn patch_jump(&mut self, site: JumpSite, target: usize) -> Result<(), CompileError> {
        if target > MAX_JUMP_TARGET {
            return Err(CompileError::BytecodeTooLarge { target });
        }
        self.code[site.0] = (target >> 8) as u8;
        self.code[site.0 + 1] = (target & 0xFF) as u8;
        Ok(())
    }

    // ==================== Constants and slots ====================

    /// Interns a constant: an equality lookup reuses an existing entry,
    /// otherwise the value is appended.
    pub(crate) fn intern_const(&mut self, value: Value) -> Result<u8, CompileError> {
        if let Some(index) = self.const_pool.iter().position(|v| v == &value) {
            return Ok(index as u8);
        }
        let index = self.const_pool.len();
        if index >= CONST_POOL_LIMIT {
            return Err(CompileError::ConstPoolOverflow {
                limit: CONST_POOL_LIMIT,
            });
        }
        self.const_pool.push(value);
        Ok(index as u8)
    }

    /// Returns `name`'s slot, allocating the next free one on first write.
    pub(crate) fn get_slot(&mut self, name: &str) -> Result<u8, CompileError> {
        if let Some(slot) = self.symbols.get(name) {
            return Ok(*slot);
        }
        if self.next_slot >= SLOT_LIMIT {
            return Err(CompileError::TooManyVariables { limit: SLOT_LIMIT });
        }
        let slot = self.next_slot as u8;
        self.symbols.insert(name.to_string(), slot);
        self.next_slot += 1;
        Ok(slot)
    }

    /// Resolves `name` for a read; unknown names fail rather than aliasing
    /// slot 0.
    pub(crate) fn slot_of(&self, name: &str) -> Result<u8, CompileError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownIdentifier {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::virtual_machine::isa::instruction_boundaries;

    pub(crate) fn compile(source: &str) -> ContractArtifact {
        compile_source(source).expect("compilation failed")
    }

    pub(crate) fn compile_err(source: &str) -> CompileError {
        match compile_source(source) {
            Err(BuildError::Compile(err)) => err,
            Ok(_) => panic!("expected a compile error"),
            Err(other) => panic!("expected a compile error, got {:?}", other),
        }
    }

    #[test]
    fn empty_program_is_a_single_halt() {
        let artifact = compile("");
        assert_eq!(artifact.bytecode, vec![Opcode::Halt as u8]);
    }

    #[test]
    fn constants_are_interned_with_equality_reuse() {
        let artifact = compile(r#"let a = "shared"; let b = "shared"; let c = "other";"#);
        let strings: Vec<_> = artifact
            .const_pool
            .iter()
            .filter(|v| matches!(v, Value::Str(_)))
            .collect();
        assert_eq!(strings.len(), 2, "pool: {:?}", artifact.const_pool);
    }

    #[test]
    fn shared_literals_compile_to_the_same_const_index() {
        let artifact = compile(r#"print("x"); print("x");"#);
        let const_indices: Vec<u8> = instruction_boundaries(&artifact.bytecode)
            .unwrap()
            .into_iter()
            .filter(|&pos| artifact.bytecode[pos] == Opcode::Const as u8)
            .map(|pos| artifact.bytecode[pos + 1])
            .collect();
        assert_eq!(const_indices.len(), 2);
        assert_eq!(const_indices[0], const_indices[1]);
    }

    #[test]
    fn slots_are_dense_in_first_write_order() {
        let artifact = compile("let a = 1; let b = 2; let c = 3;");
        // STORE operands are 0, 1, 2 in declaration order.
        let stores: Vec<u8> = instruction_boundaries(&artifact.bytecode)
            .unwrap()
            .into_iter()
            .filter(|&pos| artifact.bytecode[pos] == Opcode::Store as u8)
            .map(|pos| artifact.bytecode[pos + 1])
            .collect();
        assert_eq!(stores, vec![0, 1, 2]);
    }

    #[test]
    fn reassignment_reuses_the_slot() {
        let artifact = compile("let a = 1; a = 2;");
        let stores: Vec<u8> = instruction_boundaries(&artifact.bytecode)
            .unwrap()
            .into_iter()
            .filter(|&pos| artifact.bytecode[pos] == Opcode::Store as u8)
            .map(|pos| artifact.bytecode[pos + 1])
            .collect();
        assert_eq!(stores, vec![0, 0]);
    }

    #[test]
    fn every_jump_lands_on_an_instruction_boundary() {
        let source = r#"
            let total = 0;
            for (let i = 0; i < 10; i++) {
                if (i > 5) {
                    total = total + i;
                } else {
                    total = total + 1;
                }
            }
            while (total > 3) {
                total = total - 1;
            }
            require(total == 3 ; "unreachable");
            func weigh(x: Int): Int {
                if (x > 0) { return x; }
                return 0 - x;
            }
            print(weigh(total));
        "#;
        let artifact = compile(source);
        let boundaries = instruction_boundaries(&artifact.bytecode).unwrap();

        for &pos in &boundaries {
            let opcode = Opcode::try_from(artifact.bytecode[pos]).unwrap();
            if matches!(opcode, Opcode::Jmp | Opcode::JmpIf | Opcode::Call) {
                let target = ((artifact.bytecode[pos + 1] as usize) << 8)
                    | artifact.bytecode[pos + 2] as usize;
                assert!(
                    boundaries.contains(&target),
                    "{:?} at {} targets {} inside an operand",
                    opcode,
                    pos,
                    target
                );
            }
        }
    }

    #[test]
    fn bytecode_ends_with_halt() {
        let artifact = compile("let x = 1; print(x);");
        assert_eq!(artifact.bytecode.last(), Some(&(Opcode::Halt as u8)));
    }

    #[test]
    fn unknown_identifier_read_fails() {
        assert!(matches!(
            compile_err("print(ghost);"),
            CompileError::UnknownIdentifier { name } if name == "ghost"
        ));
    }
}
