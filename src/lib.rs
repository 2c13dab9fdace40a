//! Smart-contract virtual machine library.
//!
//! Provides the contract language front end, the bytecode compiler, the
//! stack-based virtual machine, and the networked deploy/exec runtime.

pub mod compiler;
pub mod language;
pub mod runtime;
pub mod types;
pub mod utils;
pub mod virtual_machine;
