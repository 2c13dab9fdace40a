//! Contract artifact representation and serialization.
//!
//! [`ContractArtifact`] bundles compiled bytecode with its constant pool,
//! function and type metadata, and the initial-storage snapshot produced by
//! the deploy-time top-level run. It is the unit transported across the
//! deploy/exec boundary and round-trips through a self-describing JSON form.

use crate::types::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for one declared function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgMeta {
    pub name: String,
    pub slot: u8,
    pub type_name: String,
}

/// Metadata for one declared function: entry address, parameter slots in
/// declaration order, and per-parameter name/type records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
    pub addr: usize,
    pub args: Vec<u8>,
    pub arg_meta: Vec<ArgMeta>,
}

/// Compile-time structure of a declared type: field name to field type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMeta {
    pub fields: BTreeMap<String, String>,
}

/// The serializable output of compilation.
///
/// `init_storage` is empty as produced by the compiler; the runtime fills it
/// by running the artifact's top-level code once at deploy time. Executions
/// never mutate it afterwards (the VM deep-copies it at construction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub bytecode: Vec<u8>,
    pub const_pool: Vec<Value>,
    pub functions: BTreeMap<String, FunctionMeta>,
    pub function_name: BTreeMap<usize, String>,
    pub types: BTreeMap<String, TypeMeta>,
    pub init_storage: BTreeMap<u8, Value>,
}

impl ContractArtifact {
    /// Serializes the artifact to its JSON text form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an artifact from its JSON text form.
    pub fn from_json(input: &str) -> Result<ContractArtifact, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Looks up a function's parameter slots by entry address.
    ///
    /// Used by the CALL opcode, which addresses functions by bytecode offset
    /// rather than name.
    pub fn args_for_addr(&self, addr: usize) -> Option<&[u8]> {
        let name = self.function_name.get(&addr)?;
        self.functions.get(name).map(|meta| meta.args.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artifact() -> ContractArtifact {
        let mut functions = BTreeMap::new();
        functions.insert(
            "add".to_string(),
            FunctionMeta {
                addr: 3,
                args: vec![0, 1],
                arg_meta: vec![
                    ArgMeta {
                        name: "a".to_string(),
                        slot: 0,
                        type_name: "Int".to_string(),
                    },
                    ArgMeta {
                        name: "b".to_string(),
                        slot: 1,
                        type_name: "Int".to_string(),
                    },
                ],
            },
        );

        let mut function_name = BTreeMap::new();
        function_name.insert(3usize, "add".to_string());

        let mut types = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), "String".to_string());
        types.insert("User".to_string(), TypeMeta { fields });

        let mut init_storage = BTreeMap::new();
        init_storage.insert(2u8, Value::Int(1000));

        ContractArtifact {
            bytecode: vec![0x13, 0x00, 0x08, 0x02, 0x05, 0x00],
            const_pool: vec![Value::from("hello"), Value::Int(300)],
            functions,
            function_name,
            types,
            init_storage,
        }
    }

    #[test]
    fn json_roundtrip() {
        let artifact = sample_artifact();
        let json = artifact.to_json().unwrap();
        let back = ContractArtifact::from_json(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn json_is_self_describing() {
        let json = sample_artifact().to_json().unwrap();
        for key in [
            "bytecode",
            "const_pool",
            "functions",
            "function_name",
            "types",
            "init_storage",
            "arg_meta",
            "type_name",
        ] {
            assert!(json.contains(key), "missing key {key} in {json}");
        }
    }

    #[test]
    fn args_for_addr_resolves_through_name_table() {
        let artifact = sample_artifact();
        assert_eq!(artifact.args_for_addr(3), Some(&[0u8, 1u8][..]));
        assert_eq!(artifact.args_for_addr(99), None);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(ContractArtifact::from_json("{not json").is_err());
        assert!(ContractArtifact::from_json("{}").is_err());
    }
}
