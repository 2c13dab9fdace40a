//! Networked contract runtime: wire protocol, server, and committer.

pub mod committer;
pub mod server;
pub mod wire;

pub use committer::{CommitError, Committer, LogCommitter};
pub use server::Runtime;
