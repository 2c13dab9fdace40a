//! Committer interface for execution journals.
//!
//! The runtime hands each successful execution's journal to a committer,
//! which is free to persist, reject, or forward it. The VM makes no
//! assumption about commit atomicity; partial effects are the committer's
//! problem.

use crate::info;
use crate::virtual_machine::journal::JournalEvent;
use thiserror::Error;

/// Errors surfaced by a committer.
#[derive(Debug, Clone, Error)]
pub enum CommitError {
    #[error("journal rejected: {reason}")]
    Rejected { reason: String },
}

/// Consumes journals produced by contract executions.
pub trait Committer: Send + Sync {
    fn commit(&self, journal: &[JournalEvent]) -> Result<(), CommitError>;
}

/// Committer that logs every event and accepts the journal.
pub struct LogCommitter;

impl Committer for LogCommitter {
    fn commit(&self, journal: &[JournalEvent]) -> Result<(), CommitError> {
        info!("committing journal with {} event(s)", journal.len());
        for event in journal {
            info!(" - {} {}", event.kind, event.hash);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::value::Value;
    use std::collections::BTreeMap;

    /// Committer that rejects everything, for failure-path tests.
    pub(crate) struct RejectingCommitter;

    impl Committer for RejectingCommitter {
        fn commit(&self, _journal: &[JournalEvent]) -> Result<(), CommitError> {
            Err(CommitError::Rejected {
                reason: "test committer refuses all journals".to_string(),
            })
        }
    }

    #[test]
    fn log_committer_accepts_journals() {
        let mut payload = BTreeMap::new();
        payload.insert("data".to_string(), Value::Int(1));
        let journal = vec![JournalEvent::new("E", payload)];
        assert!(LogCommitter.commit(&journal).is_ok());
    }

    #[test]
    fn rejecting_committer_reports_reason() {
        let err = RejectingCommitter.commit(&[]).unwrap_err();
        assert!(err.to_string().contains("refuses"));
    }
}
