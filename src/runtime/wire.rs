//! Wire protocol messages.
//!
//! Frames are a 4-byte big-endian length followed by that many bytes of a
//! JSON message. Requests carry `{type, id, data}`; responses mirror the
//! framing with `{type, id, success, data?, error?}`.

use crate::types::value::Value;
use crate::virtual_machine::artifact::ContractArtifact;
use crate::virtual_machine::journal::JournalEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on a single frame's payload.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// An incoming request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// An outgoing response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireResponse {
    pub fn ok(kind: &str, id: impl Into<String>, data: Option<serde_json::Value>) -> WireResponse {
        WireResponse {
            kind: kind.to_string(),
            id: id.into(),
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(kind: &str, id: impl Into<String>, error: impl Into<String>) -> WireResponse {
        WireResponse {
            kind: kind.to_string(),
            id: id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Payload of a DEPLOY request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub hash: String,
    pub contract_name: String,
    pub version: String,
    pub owner: String,
    pub source: Vec<u8>,
}

/// Payload of an EXEC request: the target contract by id or inline
/// artifact, the function name, and named arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecRequest {
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub contract_artifact: Option<ContractArtifact>,
    pub function: String,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

/// Agent descriptor surfaced in the deploy response, extracted from
/// initial-storage slot 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub hash: String,
    pub name: String,
    pub version: String,
}

/// Data section of a successful DEPLOY response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponseData {
    pub contract_hash: String,
    pub contract_version: String,
    pub contract_name: String,
    pub contract_owner: String,
    pub contract_artifact: ContractArtifact,
    pub functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentInfo>,
}

/// Data section of a successful EXEC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResponseData {
    pub artifact_hash: String,
    pub function: String,
    pub journal: Vec<JournalEvent>,
    pub exec_price: u64,
}
