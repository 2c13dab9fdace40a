//! Contract VM runtime node.
//!
//! Serves the deploy/exec protocol over TCP, or compiles and runs a single
//! source file locally.
//!
//! # Usage
//! ```text
//! contractvm serve <listen_addr>
//! contractvm run <source_file>
//! ```

use contractvm::compiler::compile_source;
use contractvm::runtime::committer::{Committer, LogCommitter};
use contractvm::runtime::Runtime;
use contractvm::virtual_machine::vm::Vm;
use contractvm::{error, info};
use std::env;
use std::net::SocketAddr;
use std::process;

const USAGE: &str = "\
Contract VM

USAGE:
    {program} serve <listen_addr>
    {program} run <source_file>

COMMANDS:
    serve    Start the deploy/exec runtime on the given TCP address
    run      Compile a contract source file and run its top-level code

EXAMPLES:
    # Serve the runtime
    {program} serve 127.0.0.1:7845

    # Compile and run a contract locally
    {program} run token.cvm
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 3 { 1 } else { 0 });
    }

    match args[1].as_str() {
        "serve" => {
            let addr: SocketAddr = match args[2].parse() {
                Ok(addr) => addr,
                Err(_) => {
                    eprintln!("Invalid listen address: {}", args[2]);
                    process::exit(1);
                }
            };

            let runtime = Runtime::new(Box::new(LogCommitter));
            let local = tokio::task::LocalSet::new();
            if let Err(err) = local.run_until(runtime.serve(addr)).await {
                error!("server failed: {}", err);
                process::exit(1);
            }
        }
        "run" => {
            let path = &args[2];
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("Failed to read {}: {}", path, err);
                    process::exit(1);
                }
            };

            let artifact = match compile_source(&source) {
                Ok(artifact) => artifact,
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(1);
                }
            };

            let mut vm = Vm::from_artifact(&artifact);
            let result = vm.run();

            for line in vm.output() {
                println!("{}", line);
            }

            if !result.success {
                let reason = result
                    .error
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                error!("execution failed: {}", reason);
                process::exit(1);
            }

            if !result.journal.is_empty() {
                if let Err(err) = LogCommitter.commit(&result.journal) {
                    error!("commit failed: {}", err);
                    process::exit(1);
                }
            }

            info!("execution finished with {} journal event(s)", result.journal.len());
        }
        other => {
            eprintln!("Unknown command: {}\n", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}
