//! Contract runtime server.
//!
//! Owns the mapping from contract hash to artifact and serves deploy, exec,
//! and ping requests over length-prefixed JSON frames. Each accepted
//! connection is handled on its own task and may carry a sequence of frames;
//! each exec builds a fresh VM from a deep copy of the artifact's initial
//! storage, so connections share nothing but the contract map.

use crate::compiler::compile_source;
use crate::runtime::committer::Committer;
use crate::runtime::wire::{
    AgentInfo, DeployRequest, DeployResponseData, ExecRequest, ExecResponseData, WireMessage,
    WireResponse, MAX_FRAME_LEN,
};
use crate::types::value::Value;
use crate::virtual_machine::artifact::ContractArtifact;
use crate::virtual_machine::vm::Vm;
use crate::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// Contract runtime: the shared contract map plus the committer that
/// receives execution journals.
///
/// Deploys take the map's writer lock; exec lookups take the reader lock.
pub struct Runtime {
    contracts: RwLock<HashMap<String, Arc<ContractArtifact>>>,
    committer: Box<dyn Committer>,
}

impl Runtime {
    /// Creates a runtime that hands journals to `committer`.
    pub fn new(committer: Box<dyn Committer>) -> Arc<Runtime> {
        Arc::new(Runtime {
            contracts: RwLock::new(HashMap::new()),
            committer,
        })
    }

    /// Binds `addr` and serves connections until the listener fails.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("runtime listening on {}", addr);
        self.serve_listener(listener).await
    }

    /// Serves connections from an already-bound listener.
    pub async fn serve_listener(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let runtime = self.clone();
            tokio::task::spawn_local(async move {
                runtime.handle_connection(stream, peer).await;
            });
        }
    }

    /// Looks up a deployed artifact by contract hash.
    pub async fn contract(&self, contract_id: &str) -> Option<Arc<ContractArtifact>> {
        self.contracts.read().await.get(contract_id).cloned()
    }

    /// Serves one connection: a sequence of length-prefixed frames, each
    /// answered with a response frame. Oversized or unreadable frames
    /// terminate the connection.
    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream, peer: SocketAddr) {
        loop {
            let mut len_buf = [0u8; 4];
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return,
                Err(e) => {
                    warn!("frame read from {} failed: {}", peer, e);
                    return;
                }
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                warn!("dropping connection {}: invalid frame length {}", peer, len);
                return;
            }

            let mut payload = vec![0u8; len];
            if stream.read_exact(&mut payload).await.is_err() {
                return;
            }

            let response = match serde_json::from_slice::<WireMessage>(&payload) {
                Ok(message) => self.process_message(message).await,
                Err(err) => {
                    WireResponse::failure("ERROR", "", format!("unparseable message: {}", err))
                }
            };

            let bytes = match serde_json::to_vec(&response) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("response serialization failed: {}", err);
                    return;
                }
            };
            let frame_len = (bytes.len() as u32).to_be_bytes();
            if stream.write_all(&frame_len).await.is_err()
                || stream.write_all(&bytes).await.is_err()
                || stream.flush().await.is_err()
            {
                return;
            }
        }
    }

    /// Dispatches one request message to its handler.
    pub async fn process_message(&self, message: WireMessage) -> WireResponse {
        match message.kind.as_str() {
            "DEPLOY" => self.handle_deploy(message).await,
            "EXEC" => self.handle_exec(message).await,
            "PING" => WireResponse::ok("PONG", message.id, None),
            other => WireResponse::failure(
                "ERROR",
                message.id,
                format!("unknown message type: {}", other),
            ),
        }
    }

    /// DEPLOY: compile the source, run top-level code on a fresh VM,
    /// snapshot the resulting storage into the artifact, and register it.
    async fn handle_deploy(&self, message: WireMessage) -> WireResponse {
        let request: DeployRequest = match serde_json::from_value(message.data) {
            Ok(request) => request,
            Err(err) => {
                return WireResponse::failure(
                    "DEPLOY_RESPONSE",
                    message.id,
                    format!("invalid deploy request: {}", err),
                );
            }
        };

        let source = match String::from_utf8(request.source.clone()) {
            Ok(source) => source,
            Err(err) => {
                return WireResponse::failure(
                    "DEPLOY_RESPONSE",
                    message.id,
                    format!("source is not valid utf-8: {}", err),
                );
            }
        };

        let mut artifact = match compile_source(&source) {
            Ok(artifact) => artifact,
            Err(err) => {
                return WireResponse::failure(
                    "DEPLOY_RESPONSE",
                    message.id,
                    format!("compilation failed: {}", err),
                );
            }
        };

        let mut vm = Vm::from_artifact(&artifact);
        let init_result = vm.run();
        if !init_result.success {
            let reason = init_result
                .error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return WireResponse::failure(
                "DEPLOY_RESPONSE",
                message.id,
                format!("initialization failed: {}", reason),
            );
        }
        for line in vm.output() {
            info!("deploy output [{}]: {}", request.hash, line);
        }

        artifact.init_storage = vm.storage_snapshot();

        let functions: Vec<String> = artifact.functions.keys().cloned().collect();
        let agent = agent_info(&artifact);

        self.contracts
            .write()
            .await
            .insert(request.hash.clone(), Arc::new(artifact.clone()));

        info!("deployed contract {}", request.hash);

        let data = DeployResponseData {
            contract_hash: request.hash,
            contract_version: request.version,
            contract_name: request.contract_name,
            contract_owner: request.owner,
            contract_artifact: artifact,
            functions,
            agent,
        };
        match serde_json::to_value(&data) {
            Ok(data) => WireResponse::ok("DEPLOY_RESPONSE", message.id, Some(data)),
            Err(err) => WireResponse::failure(
                "DEPLOY_RESPONSE",
                message.id,
                format!("response serialization failed: {}", err),
            ),
        }
    }

    /// EXEC: resolve the artifact, reorder named arguments into declared
    /// positional order, run the function on a fresh VM, and commit the
    /// journal.
    async fn handle_exec(&self, message: WireMessage) -> WireResponse {
        let request: ExecRequest = match serde_json::from_value(message.data) {
            Ok(request) => request,
            Err(err) => {
                return WireResponse::failure(
                    "EXEC_RESPONSE",
                    message.id,
                    format!("invalid exec request: {}", err),
                );
            }
        };

        let artifact: Arc<ContractArtifact> = match (&request.contract_artifact, &request.contract_id)
        {
            (Some(inline), _) => Arc::new(inline.clone()),
            (None, Some(contract_id)) if !contract_id.is_empty() => {
                match self.contract(contract_id).await {
                    Some(artifact) => artifact,
                    None => {
                        return WireResponse::failure(
                            "EXEC_RESPONSE",
                            message.id,
                            format!("unknown contract '{}'", contract_id),
                        );
                    }
                }
            }
            _ => {
                return WireResponse::failure(
                    "EXEC_RESPONSE",
                    message.id,
                    "exec request names no contract",
                );
            }
        };

        if artifact.bytecode.is_empty() {
            return WireResponse::failure("EXEC_RESPONSE", message.id, "empty bytecode");
        }

        let meta = match artifact.functions.get(&request.function) {
            Some(meta) => meta,
            None => {
                return WireResponse::failure(
                    "EXEC_RESPONSE",
                    message.id,
                    format!("function '{}' not found in contract", request.function),
                );
            }
        };

        // Reorder named arguments into the declared positional order.
        let mut ordered_args: Vec<Value> = Vec::with_capacity(meta.arg_meta.len());
        for arg_meta in &meta.arg_meta {
            match request.args.get(&arg_meta.name) {
                Some(value) => ordered_args.push(value.clone()),
                None => {
                    return WireResponse::failure(
                        "EXEC_RESPONSE",
                        message.id,
                        format!(
                            "missing argument '{}' for function '{}'",
                            arg_meta.name, request.function
                        ),
                    );
                }
            }
        }

        let mut vm = Vm::from_artifact(&artifact);
        let result = vm.run_function(&request.function, &ordered_args);
        for line in vm.output() {
            info!("exec output [{}]: {}", request.function, line);
        }

        if !result.success {
            let reason = result
                .error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return WireResponse::failure("EXEC_RESPONSE", message.id, reason);
        }

        if let Err(err) = self.committer.commit(&result.journal) {
            return WireResponse::failure(
                "EXEC_RESPONSE",
                message.id,
                format!("commit failed: {}", err),
            );
        }

        let data = ExecResponseData {
            artifact_hash: request.contract_id.unwrap_or_default(),
            function: request.function,
            journal: result.journal,
            exec_price: 0,
        };
        match serde_json::to_value(&data) {
            Ok(data) => WireResponse::ok("EXEC_RESPONSE", message.id, Some(data)),
            Err(err) => WireResponse::failure(
                "EXEC_RESPONSE",
                message.id,
                format!("response serialization failed: {}", err),
            ),
        }
    }
}

/// Extracts the agent descriptor from initial-storage slot 0, if present.
fn agent_info(artifact: &ContractArtifact) -> Option<AgentInfo> {
    let Value::Object(fields) = artifact.init_storage.get(&0)? else {
        return None;
    };
    let field = |key: &str| match fields.get(key) {
        Some(Value::Str(value)) => Some(value.clone()),
        _ => None,
    };
    Some(AgentInfo {
        hash: field("hash")?,
        name: field("name")?,
        version: field("version")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::committer::tests::RejectingCommitter;
    use crate::runtime::committer::LogCommitter;
    use serde_json::json;

    fn deploy_message(id: &str, hash: &str, source: &str) -> WireMessage {
        WireMessage {
            kind: "DEPLOY".to_string(),
            id: id.to_string(),
            data: json!({
                "hash": hash,
                "contract_name": "Test",
                "version": "1.0.0",
                "owner": "alice",
                "source": source.as_bytes().to_vec(),
            }),
        }
    }

    fn exec_message(id: &str, contract_id: &str, function: &str, args: serde_json::Value) -> WireMessage {
        WireMessage {
            kind: "EXEC".to_string(),
            id: id.to_string(),
            data: json!({
                "contract_id": contract_id,
                "function": function,
                "args": args,
            }),
        }
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let response = runtime
            .process_message(WireMessage {
                kind: "PING".to_string(),
                id: "7".to_string(),
                data: serde_json::Value::Null,
            })
            .await;
        assert!(response.success);
        assert_eq!(response.kind, "PONG");
        assert_eq!(response.id, "7");
    }

    #[tokio::test]
    async fn unknown_message_type_is_rejected() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let response = runtime
            .process_message(WireMessage {
                kind: "REBOOT".to_string(),
                id: "1".to_string(),
                data: serde_json::Value::Null,
            })
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("unknown message type"));
    }

    #[tokio::test]
    async fn deploy_registers_contract_and_reports_functions() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let source = "func add(a: Int, b: Int): Int { return a + b; } let base = 10;";
        let response = runtime
            .process_message(deploy_message("1", "0xc0ffee", source))
            .await;
        assert!(response.success, "{:?}", response.error);

        let data: DeployResponseData =
            serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(data.contract_hash, "0xc0ffee");
        assert_eq!(data.functions, vec!["add".to_string()]);
        // Top-level init ran: `base` landed in initial storage.
        assert!(data
            .contract_artifact
            .init_storage
            .values()
            .any(|v| *v == Value::Int(10)));

        assert!(runtime.contract("0xc0ffee").await.is_some());
    }

    #[tokio::test]
    async fn deploy_with_bad_source_reports_compile_error() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let response = runtime
            .process_message(deploy_message("1", "0x1", "let = ;"))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("compilation failed"));
    }

    #[tokio::test]
    async fn exec_runs_function_with_named_args() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let source = "func add(a: Int, b: Int): Int { return a + b; }";
        let deploy = runtime
            .process_message(deploy_message("1", "0xadd", source))
            .await;
        assert!(deploy.success);

        let response = runtime
            .process_message(exec_message("2", "0xadd", "add", json!({"a": 2, "b": 3})))
            .await;
        assert!(response.success, "{:?}", response.error);

        let data: ExecResponseData = serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(data.function, "add");
        assert_eq!(data.exec_price, 0);
        assert!(data.journal.is_empty());
    }

    #[tokio::test]
    async fn exec_missing_argument_names_it() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let source = "func f(a: Int, b: Int): Int { return a + b; }";
        runtime
            .process_message(deploy_message("1", "0xf", source))
            .await;

        let response = runtime
            .process_message(exec_message("2", "0xf", "f", json!({"a": 1})))
            .await;
        assert!(!response.success);
        assert_eq!(
            response.error.unwrap(),
            "missing argument 'b' for function 'f'"
        );
    }

    #[tokio::test]
    async fn exec_unknown_function_is_reported() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        runtime
            .process_message(deploy_message("1", "0xf", "let x = 1;"))
            .await;

        let response = runtime
            .process_message(exec_message("2", "0xf", "ghost", json!({})))
            .await;
        assert!(!response.success);
        assert_eq!(
            response.error.unwrap(),
            "function 'ghost' not found in contract"
        );
    }

    #[tokio::test]
    async fn exec_unknown_contract_is_reported() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let response = runtime
            .process_message(exec_message("2", "0xmissing", "f", json!({})))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("unknown contract"));
    }

    #[tokio::test]
    async fn exec_accepts_inline_artifact() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let artifact =
            crate::compiler::compile_source("func one(): Int { return 1; }").unwrap();

        let message = WireMessage {
            kind: "EXEC".to_string(),
            id: "9".to_string(),
            data: json!({
                "contract_artifact": serde_json::to_value(&artifact).unwrap(),
                "function": "one",
                "args": {},
            }),
        };
        let response = runtime.process_message(message).await;
        assert!(response.success, "{:?}", response.error);
    }

    #[tokio::test]
    async fn exec_surfaces_vm_failures() {
        let runtime = Runtime::new(Box::new(LogCommitter));
        let source =
            r#"func always_fails(x: Int): void { require(x > 0 ; "positive"); }"#;
        runtime
            .process_message(deploy_message("1", "0xr", source))
            .await;

        let response = runtime
            .process_message(exec_message("2", "0xr", "always_fails", json!({"x": -1})))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("positive"));
    }

    #[tokio::test]
    async fn exec_commit_failure_is_surfaced() {
        let runtime = Runtime::new(Box::new(RejectingCommitter));
        let source = r#"func ping(): void { emit("Ping", 1); }"#;
        runtime
            .process_message(deploy_message("1", "0xe", source))
            .await;

        let response = runtime
            .process_message(exec_message("2", "0xe", "ping", json!({})))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("commit failed"));
    }
}
