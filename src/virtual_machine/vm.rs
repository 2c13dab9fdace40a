//! Core virtual machine implementation.
//!
//! The VM executes bytecode using a stack-based architecture: a value stack,
//! a call-return stack of instruction indices, slot-indexed persistent
//! storage, transient memory, and an append-only journal. Execution is a
//! single-threaded dispatch loop terminated by HALT; every failure is folded
//! into an [`ExecutionResult`] rather than unwinding.

use crate::info;
use crate::types::hash::Hash;
use crate::types::value::Value;
use crate::virtual_machine::artifact::{ContractArtifact, FunctionMeta};
use crate::virtual_machine::errors::VmError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::journal::JournalEvent;
use crate::virtual_machine::value::VmValue;
use std::collections::BTreeMap;

/// The outcome of one execution: success flag, the journal accumulated up to
/// completion or failure, the host output lines, and the error on failure.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub journal: Vec<JournalEvent>,
    pub output: Vec<String>,
    pub error: Option<VmError>,
}

/// A numeric operand pair after coercion.
enum NumPair {
    Ints(i64, i64),
    Doubles(f64, f64),
}

/// Bytecode virtual machine.
///
/// Constructed fresh for every execution from a [`ContractArtifact`]; the
/// artifact's initial storage is deep-copied so concurrent executions can
/// never observe each other's writes.
pub struct Vm {
    /// Bytecode to execute.
    code: Vec<u8>,
    /// Constant pool, converted to runtime form once at construction.
    const_pool: Vec<VmValue>,
    /// Function metadata by name.
    functions: BTreeMap<String, FunctionMeta>,
    /// Entry address to function name, for CALL lookups.
    function_name: BTreeMap<usize, String>,
    /// Value stack.
    stack: Vec<VmValue>,
    /// Return-address stack.
    call_stack: Vec<usize>,
    /// Persistent slot storage.
    storage: BTreeMap<u8, VmValue>,
    /// Transient slot memory, lost at VM teardown.
    memory: BTreeMap<u8, VmValue>,
    /// Instruction pointer.
    ip: usize,
    /// Observable effects, in emission order.
    journal: Vec<JournalEvent>,
    /// Host output produced by PRINT.
    output: Vec<String>,
}

impl Vm {
    /// Creates a VM seeded from an artifact.
    ///
    /// The initial storage is rebuilt value by value, so executions share no
    /// cells with the artifact or with each other.
    pub fn from_artifact(artifact: &ContractArtifact) -> Vm {
        let storage = artifact
            .init_storage
            .iter()
            .map(|(slot, value)| (*slot, VmValue::from_plain(value)))
            .collect();

        Vm {
            code: artifact.bytecode.clone(),
            const_pool: artifact.const_pool.iter().map(VmValue::from_plain).collect(),
            functions: artifact.functions.clone(),
            function_name: artifact.function_name.clone(),
            stack: Vec::new(),
            call_stack: Vec::new(),
            storage,
            memory: BTreeMap::new(),
            ip: 0,
            journal: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Runs the whole program from address 0 (deploy-time initialization).
    pub fn run(&mut self) -> ExecutionResult {
        self.ip = 0;
        self.execute()
    }

    /// Invokes a named function with ordered arguments.
    ///
    /// Arguments are written into the function's declared parameter slots,
    /// the instruction pointer jumps to its entry, and an ambient return
    /// address pointing at the trailing HALT is pushed so a function-level
    /// RET terminates the invocation cleanly.
    pub fn run_function(&mut self, name: &str, args: &[Value]) -> ExecutionResult {
        let meta = match self.functions.get(name) {
            Some(meta) => meta.clone(),
            None => {
                return self.failure(VmError::FunctionNotFound {
                    name: name.to_string(),
                });
            }
        };

        if args.len() != meta.args.len() {
            return self.failure(VmError::ArityMismatch {
                function: name.to_string(),
                expected: meta.args.len(),
                actual: args.len(),
            });
        }

        for (slot, arg) in meta.args.iter().zip(args) {
            self.storage.insert(*slot, VmValue::from_plain(arg));
        }

        if let Some(last) = self.code.len().checked_sub(1) {
            if self.code[last] == Opcode::Halt as u8 {
                self.call_stack.push(last);
            }
        }

        self.ip = meta.addr;
        self.execute()
    }

    /// Returns a deep snapshot of persistent storage in plain form.
    pub fn storage_snapshot(&self) -> BTreeMap<u8, Value> {
        self.storage
            .iter()
            .map(|(slot, value)| (*slot, value.to_plain()))
            .collect()
    }

    /// Host output lines produced so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    fn execute(&mut self) -> ExecutionResult {
        match self.dispatch() {
            Ok(()) => ExecutionResult {
                success: true,
                journal: self.journal.clone(),
                output: self.output.clone(),
                error: None,
            },
            Err(error) => self.failure(error),
        }
    }

    fn failure(&self, error: VmError) -> ExecutionResult {
        ExecutionResult {
            success: false,
            journal: self.journal.clone(),
            output: self.output.clone(),
            error: Some(error),
        }
    }

    /// The dispatch loop. Total over the ISA: every decodable opcode has a
    /// handler, and an unknown byte fails with the offending opcode.
    fn dispatch(&mut self) -> Result<(), VmError> {
        loop {
            let offset = self.ip;
            let byte = *self
                .code
                .get(self.ip)
                .ok_or(VmError::UnexpectedEndOfBytecode { ip: self.ip })?;
            self.ip += 1;

            let opcode = Opcode::try_from(byte).map_err(|_| VmError::InvalidInstruction {
                opcode: byte,
                offset,
            })?;

            match opcode {
                Opcode::Halt => return Ok(()),
                Opcode::Nop => {}
                Opcode::Const => self.op_const()?,
                Opcode::Push => self.op_push()?,
                Opcode::Pop => {
                    self.pop("POP")?;
                }
                Opcode::Dup => self.op_dup()?,
                Opcode::Swap => self.op_swap()?,
                Opcode::Null => self.push(VmValue::Null),
                Opcode::PushObject => self.push(VmValue::empty_object()),
                Opcode::Add => self.op_add()?,
                Opcode::Sub => self.op_sub()?,
                Opcode::Mul => self.op_mul()?,
                Opcode::Div => self.op_div()?,
                Opcode::Gt => self.op_compare("GT", |a, b| a > b)?,
                Opcode::GtEq => self.op_compare("GT_EQ", |a, b| a >= b)?,
                Opcode::Lt => self.op_compare("LT", |a, b| a < b)?,
                Opcode::LtEq => self.op_compare("LT_EQ", |a, b| a <= b)?,
                Opcode::Eq => self.op_equality(true)?,
                Opcode::Diff => self.op_equality(false)?,
                Opcode::Print => self.op_print()?,
                Opcode::Jmp => self.ip = self.fetch_addr()?,
                Opcode::JmpIf => self.op_jmp_if()?,
                Opcode::Call => self.op_call()?,
                Opcode::Ret => self.op_ret(),
                Opcode::Access => self.op_access()?,
                Opcode::Length => self.op_length()?,
                Opcode::GetProperty => self.op_get_property()?,
                Opcode::SetProperty => self.op_set_property()?,
                Opcode::Store => self.op_store()?,
                Opcode::Sload => self.op_sload()?,
                Opcode::Delete => self.op_delete()?,
                Opcode::Mstore => self.op_mstore()?,
                Opcode::Mload => self.op_mload()?,
                Opcode::Require => self.op_require()?,
                Opcode::Err => self.op_err()?,
                Opcode::Emit => self.op_emit()?,
                Opcode::Transfer => info!("transfer effect requested"),
                Opcode::BalanceOf => info!("balance query requested"),
                Opcode::Reward => info!("reward distribution requested"),
                Opcode::RegistryDeclare => self.op_registry_declare()?,
                Opcode::RegistryGet => self.op_registry_get()?,
                Opcode::AgentValidate => self.op_agent_validate()?,
                Opcode::PolicyDeclare => self.op_reshape_declared("POLICY_DECLARE")?,
                Opcode::TypeDeclare => self.op_reshape_declared("TYPE_DECLARE")?,
            }
        }
    }

    // ==================== Stack and operand helpers ====================

    fn push(&mut self, value: VmValue) {
        self.stack.push(value);
    }

    fn pop(&mut self, context: &'static str) -> Result<VmValue, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow { context })
    }

    fn fetch_u8(&mut self) -> Result<u8, VmError> {
        let byte = *self
            .code
            .get(self.ip)
            .ok_or(VmError::UnexpectedEndOfBytecode { ip: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    /// Reads a two-byte big-endian absolute address.
    fn fetch_addr(&mut self) -> Result<usize, VmError> {
        let high = self.fetch_u8()? as usize;
        let low = self.fetch_u8()? as usize;
        Ok((high << 8) | low)
    }

    fn as_number(&self, value: &VmValue, instr: &'static str) -> Result<f64, VmError> {
        match value {
            VmValue::Int(v) => Ok(*v as f64),
            VmValue::Double(v) => Ok(*v),
            other => Err(VmError::TypeMismatch {
                instruction: instr,
                expected: "a number",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Pops rhs then lhs and coerces: double when either side is a double,
    /// integers otherwise.
    fn pop_numeric_pair(&mut self, instr: &'static str) -> Result<NumPair, VmError> {
        let rhs = self.pop(instr)?;
        let lhs = self.pop(instr)?;
        match (&lhs, &rhs) {
            (VmValue::Int(a), VmValue::Int(b)) => Ok(NumPair::Ints(*a, *b)),
            _ => Ok(NumPair::Doubles(
                self.as_number(&lhs, instr)?,
                self.as_number(&rhs, instr)?,
            )),
        }
    }

    // ==================== Stack opcodes ====================

    fn op_const(&mut self) -> Result<(), VmError> {
        let index = self.fetch_u8()?;
        let value = self
            .const_pool
            .get(index as usize)
            .cloned()
            .ok_or(VmError::InvalidConstIndex {
                index,
                len: self.const_pool.len(),
            })?;
        self.push(value);
        Ok(())
    }

    fn op_push(&mut self) -> Result<(), VmError> {
        let imm = self.fetch_u8()?;
        self.push(VmValue::Int(imm as i64));
        Ok(())
    }

    fn op_dup(&mut self) -> Result<(), VmError> {
        let top = self
            .stack
            .last()
            .cloned()
            .ok_or(VmError::StackUnderflow { context: "DUP" })?;
        self.push(top);
        Ok(())
    }

    fn op_swap(&mut self) -> Result<(), VmError> {
        let len = self.stack.len();
        if len < 2 {
            return Err(VmError::StackUnderflow { context: "SWAP" });
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    // ==================== Arithmetic ====================

    fn op_add(&mut self) -> Result<(), VmError> {
        let rhs = self.pop("ADD")?;
        let lhs = self.pop("ADD")?;

        let result = match (&lhs, &rhs) {
            (VmValue::Int(a), VmValue::Int(b)) => VmValue::Int(a.wrapping_add(*b)),
            (VmValue::Int(a), VmValue::Str(b)) => VmValue::Str(format!("{}{}", a, b)),
            (VmValue::Str(a), VmValue::Int(b)) => VmValue::Str(format!("{}{}", a, b)),
            (VmValue::Str(a), VmValue::Str(b)) => VmValue::Str(format!("{}{}", a, b)),
            (VmValue::Str(a), VmValue::Double(b)) => VmValue::Str(format!("{}{}", a, b)),
            _ => {
                return Err(VmError::TypeMismatch {
                    instruction: "ADD",
                    expected: "numbers or strings",
                    actual: format!("{} + {}", lhs.type_name(), rhs.type_name()),
                });
            }
        };

        self.push(result);
        Ok(())
    }

    fn op_sub(&mut self) -> Result<(), VmError> {
        let result = match self.pop_numeric_pair("SUB")? {
            NumPair::Ints(a, b) => VmValue::Int(a.wrapping_sub(b)),
            NumPair::Doubles(a, b) => VmValue::Double(a - b),
        };
        self.push(result);
        Ok(())
    }

    fn op_mul(&mut self) -> Result<(), VmError> {
        let result = match self.pop_numeric_pair("MUL")? {
            NumPair::Ints(a, b) => VmValue::Int(a.wrapping_mul(b)),
            NumPair::Doubles(a, b) => VmValue::Double(a * b),
        };
        self.push(result);
        Ok(())
    }

    fn op_div(&mut self) -> Result<(), VmError> {
        let result = match self.pop_numeric_pair("DIV")? {
            NumPair::Ints(_, 0) => return Err(VmError::DivisionByZero),
            NumPair::Ints(a, b) => VmValue::Int(a.wrapping_div(b)),
            NumPair::Doubles(_, b) if b == 0.0 => return Err(VmError::DivisionByZero),
            NumPair::Doubles(a, b) => VmValue::Double(a / b),
        };
        self.push(result);
        Ok(())
    }

    // ==================== Comparison ====================

    fn op_compare(
        &mut self,
        instr: &'static str,
        cmp: fn(f64, f64) -> bool,
    ) -> Result<(), VmError> {
        let rhs = self.pop(instr)?;
        let lhs = self.pop(instr)?;
        let a = self.as_number(&lhs, instr)?;
        let b = self.as_number(&rhs, instr)?;
        self.push(VmValue::Int(if cmp(a, b) { 1 } else { 0 }));
        Ok(())
    }

    fn op_equality(&mut self, want_equal: bool) -> Result<(), VmError> {
        let instr = if want_equal { "EQ" } else { "DIFF" };
        let rhs = self.pop(instr)?;
        let lhs = self.pop(instr)?;
        let equal = lhs.vm_eq(&rhs);
        self.push(VmValue::Int(if equal == want_equal { 1 } else { 0 }));
        Ok(())
    }

    // ==================== I/O and control flow ====================

    fn op_print(&mut self) -> Result<(), VmError> {
        let value = self.pop("PRINT")?;
        self.output.push(value.to_string());
        Ok(())
    }

    fn op_jmp_if(&mut self) -> Result<(), VmError> {
        let target = self.fetch_addr()?;
        let condition = self.pop("JMP_IF")?;
        if matches!(condition, VmValue::Int(0)) {
            self.ip = target;
        }
        Ok(())
    }

    /// CALL protocol: pop one value per declared parameter (reverse order, so
    /// the first argument lands in the first slot), push the return address,
    /// and jump to the entry.
    fn op_call(&mut self) -> Result<(), VmError> {
        let target = self.fetch_addr()?;

        let name = self
            .function_name
            .get(&target)
            .ok_or(VmError::UnknownCallTarget { addr: target })?;
        let arg_slots = self
            .functions
            .get(name)
            .map(|meta| meta.args.clone())
            .ok_or(VmError::UnknownCallTarget { addr: target })?;

        for slot in arg_slots.iter().rev() {
            let value = self.pop("CALL")?;
            self.storage.insert(*slot, value);
        }

        self.call_stack.push(self.ip);
        self.ip = target;
        Ok(())
    }

    fn op_ret(&mut self) {
        if let Some(return_addr) = self.call_stack.pop() {
            self.ip = return_addr;
        }
    }

    // ==================== Indexing and objects ====================

    fn op_access(&mut self) -> Result<(), VmError> {
        let key = self.pop("ACCESS")?;
        let target = self.pop("ACCESS")?;

        match target {
            VmValue::Array(items) => {
                let index = match key {
                    VmValue::Int(i) => i,
                    other => {
                        return Err(VmError::TypeMismatch {
                            instruction: "ACCESS",
                            expected: "an integer index",
                            actual: other.type_name().to_string(),
                        });
                    }
                };
                let items = items.borrow();
                if index < 0 || index as usize >= items.len() {
                    return Err(VmError::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    });
                }
                let value = items[index as usize].clone();
                drop(items);
                self.push(value);
            }
            VmValue::Object(fields) => {
                let property = match key {
                    VmValue::Str(s) => s,
                    other => {
                        return Err(VmError::TypeMismatch {
                            instruction: "ACCESS",
                            expected: "a string key",
                            actual: other.type_name().to_string(),
                        });
                    }
                };
                let value = fields
                    .borrow()
                    .get(&property)
                    .cloned()
                    .ok_or(VmError::PropertyNotFound { property })?;
                self.push(value);
            }
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "ACCESS",
                    expected: "an array or object",
                    actual: other.type_name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn op_length(&mut self) -> Result<(), VmError> {
        let value = self.pop("LENGTH")?;
        let length = match &value {
            VmValue::Str(s) => s.len(),
            VmValue::Array(items) => items.borrow().len(),
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "LENGTH",
                    expected: "a string or array",
                    actual: other.type_name().to_string(),
                });
            }
        };
        self.push(VmValue::Int(length as i64));
        Ok(())
    }

    fn op_get_property(&mut self) -> Result<(), VmError> {
        let key = self.pop("GET_PROPERTY")?;
        let target = self.pop("GET_PROPERTY")?;

        let fields = match target {
            VmValue::Object(fields) => fields,
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "GET_PROPERTY",
                    expected: "an object",
                    actual: other.type_name().to_string(),
                });
            }
        };
        let property = match key {
            VmValue::Str(s) => s,
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "GET_PROPERTY",
                    expected: "a string key",
                    actual: other.type_name().to_string(),
                });
            }
        };

        let value = fields
            .borrow()
            .get(&property)
            .cloned()
            .ok_or(VmError::PropertyNotFound { property })?;
        self.push(value);
        Ok(())
    }

    /// Mutates the object in place and re-pushes it so assignment chains can
    /// continue on the same container.
    fn op_set_property(&mut self) -> Result<(), VmError> {
        let value = self.pop("SET_PROPERTY")?;
        let key = self.pop("SET_PROPERTY")?;
        let target = self.pop("SET_PROPERTY")?;

        let fields = match &target {
            VmValue::Object(fields) => fields.clone(),
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "SET_PROPERTY",
                    expected: "an object",
                    actual: other.type_name().to_string(),
                });
            }
        };
        let property = match key {
            VmValue::Str(s) => s,
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "SET_PROPERTY",
                    expected: "a string key",
                    actual: other.type_name().to_string(),
                });
            }
        };

        fields.borrow_mut().insert(property, value);
        self.push(target);
        Ok(())
    }

    // ==================== Storage and memory ====================

    fn op_store(&mut self) -> Result<(), VmError> {
        let slot = self.fetch_u8()?;
        let value = self.pop("STORE")?;
        self.storage.insert(slot, value);
        Ok(())
    }

    fn op_sload(&mut self) -> Result<(), VmError> {
        let slot = self.fetch_u8()?;
        let value = self
            .storage
            .get(&slot)
            .cloned()
            .unwrap_or(VmValue::Int(0));
        self.push(value);
        Ok(())
    }

    fn op_delete(&mut self) -> Result<(), VmError> {
        let slot = self.fetch_u8()?;
        self.storage.remove(&slot);
        Ok(())
    }

    fn op_mstore(&mut self) -> Result<(), VmError> {
        let slot = self.fetch_u8()?;
        let value = self.pop("MSTORE")?;
        self.memory.insert(slot, value);
        Ok(())
    }

    fn op_mload(&mut self) -> Result<(), VmError> {
        let slot = self.fetch_u8()?;
        let value = self.memory.get(&slot).cloned().unwrap_or(VmValue::Int(0));
        self.push(value);
        Ok(())
    }

    // ==================== Contract opcodes ====================

    fn op_require(&mut self) -> Result<(), VmError> {
        let condition = self.pop("REQUIRE")?;
        match condition {
            VmValue::Int(v) if v != 0 => Ok(()),
            _ => Err(VmError::RequireFailed),
        }
    }

    fn op_err(&mut self) -> Result<(), VmError> {
        let message = self.pop("ERR")?;
        Err(VmError::ErrRaised {
            message: message.to_string(),
        })
    }

    fn op_emit(&mut self) -> Result<(), VmError> {
        let payload = self.pop("EMIT")?;
        let kind = self.pop("EMIT")?;

        let mut payload_map = BTreeMap::new();
        payload_map.insert("data".to_string(), payload.to_plain());

        let event = JournalEvent::new(kind.to_string(), payload_map);
        info!("event emitted: kind={}, hash={}", event.kind, event.hash);
        self.journal.push(event);
        Ok(())
    }

    // ==================== Declarative opcodes ====================

    /// Finds the next free storage slot, keeping slot 0 for the agent
    /// descriptor.
    fn next_free_slot(&self) -> Result<u8, VmError> {
        match self.storage.keys().max() {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or(VmError::SlotOutOfRange { slot: 256 }),
        }
    }

    fn op_registry_declare(&mut self) -> Result<(), VmError> {
        // Five reserved constant-index operands.
        for _ in 0..Opcode::RegistryDeclare.operand_bytes() {
            self.fetch_u8()?;
        }

        let purpose = self.pop("REGISTRY_DECLARE")?;
        let owner = self.pop("REGISTRY_DECLARE")?;
        let version = self.pop("REGISTRY_DECLARE")?;
        let name = self.pop("REGISTRY_DECLARE")?;
        let kind = self.pop("REGISTRY_DECLARE")?;

        let hash_input = format!("{}:{}:{}:{}:{}", kind, name, version, owner, purpose);
        let hash = Hash::sha256()
            .chain(hash_input.as_bytes())
            .finalize()
            .to_hex_prefixed();

        info!("registry '{}' created with hash: {}", name, hash);

        let slot = self.next_free_slot()?;
        let descriptor = VmValue::empty_object();
        if let VmValue::Object(fields) = &descriptor {
            let mut fields = fields.borrow_mut();
            fields.insert("hash".to_string(), VmValue::Str(hash));
            fields.insert("kind".to_string(), kind);
            fields.insert("name".to_string(), name);
            fields.insert("version".to_string(), version);
            fields.insert("owner".to_string(), owner);
            fields.insert("purpose".to_string(), purpose);
        }
        self.storage.insert(slot, descriptor);
        Ok(())
    }

    /// Returns the display form of `key` in a registry/agent descriptor.
    fn descriptor_field(
        fields: &std::rc::Rc<std::cell::RefCell<BTreeMap<String, VmValue>>>,
        key: &str,
    ) -> Result<String, VmError> {
        fields
            .borrow()
            .get(key)
            .map(|value| value.to_string())
            .ok_or(VmError::PropertyNotFound {
                property: key.to_string(),
            })
    }

    fn op_registry_get(&mut self) -> Result<(), VmError> {
        // Reserved operand: the identifier's constant index.
        self.fetch_u8()?;

        let identifier = self.pop("REGISTRY_GET")?.to_string();

        let found = self.storage.values().find_map(|value| match value {
            VmValue::Object(fields) => {
                let matches = fields
                    .borrow()
                    .get("name")
                    .is_some_and(|name| name.to_string() == identifier);
                matches.then(|| value.clone())
            }
            _ => None,
        });

        match found {
            Some(registry) => {
                self.push(registry);
                Ok(())
            }
            None => Err(VmError::RegistryNotFound { name: identifier }),
        }
    }

    fn op_agent_validate(&mut self) -> Result<(), VmError> {
        let owner = self.pop("AGENT_VALIDATE")?.to_string();
        let version = self.pop("AGENT_VALIDATE")?.to_string();
        let hash = self.pop("AGENT_VALIDATE")?.to_string();
        let registry = self.pop("AGENT_VALIDATE")?;

        let fields = match &registry {
            VmValue::Object(fields) => fields,
            other => {
                return Err(VmError::TypeMismatch {
                    instruction: "AGENT_VALIDATE",
                    expected: "a registry object",
                    actual: other.type_name().to_string(),
                });
            }
        };

        let agent_name = Self::descriptor_field(fields, "name")?;

        let checks: [(&'static str, &str); 3] =
            [("hash", &hash), ("version", &version), ("owner", &owner)];
        for (field, actual) in checks {
            let expected = Self::descriptor_field(fields, field)?;
            if expected != *actual {
                return Err(VmError::AgentMismatch {
                    agent: agent_name,
                    field,
                    expected,
                    actual: actual.to_string(),
                });
            }
        }

        info!(
            "agent '{}' validated (owner: {}, version: {})",
            agent_name, owner, version
        );

        let agent = VmValue::empty_object();
        if let VmValue::Object(fields) = &agent {
            let mut fields = fields.borrow_mut();
            fields.insert("name".to_string(), VmValue::Str(agent_name));
            fields.insert("hash".to_string(), VmValue::Str(hash));
            fields.insert("version".to_string(), VmValue::Str(version));
            fields.insert("owner".to_string(), VmValue::Str(owner));
        }
        self.push(agent);
        Ok(())
    }

    /// POLICY_DECLARE / TYPE_DECLARE: the object was already assembled on the
    /// stack by SET_PROPERTY; drop the identifier constant beneath it and
    /// re-push the object for the following STORE.
    fn op_reshape_declared(&mut self, instr: &'static str) -> Result<(), VmError> {
        // Reserved operand: the identifier's constant index.
        self.fetch_u8()?;

        let declared = self.pop(instr)?;
        self.pop(instr)?;
        self.push(declared);
        Ok(())
    }
}
