use agentverse_chain::{ChainError, RunId};
use thiserror::Error;

/// Why the on-chain history could not be reconciled with the view
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryMismatch {
    /// Content and role arrays differ in length
    #[error("{contents} contents but {roles} roles")]
    LengthMismatch { contents: usize, roles: usize },
    /// The cursor points past the end of the on-chain history
    #[error("cursor {cursor} is past history length {len}")]
    CursorBeyondEnd { cursor: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Run creation failed: {0}")]
    RunCreationFailed(String),

    #[error("Inconsistent message history for run {run_id}: {mismatch}")]
    InconsistentHistory {
        run_id: RunId,
        mismatch: HistoryMismatch,
    },

    #[error("Contract call failed: {0}")]
    ContractCallFailed(String),

    #[error("Run {0} is already finished")]
    RunFinished(RunId),

    #[error("Run {0} is already being polled")]
    AlreadyPolling(RunId),

    #[error("Run {0} session failed earlier and must be re-created")]
    SessionFailed(RunId),

    #[error("Batch starts at index {got} but the view cursor is {expected}")]
    StaleBatch { expected: usize, got: usize },
}

impl From<ChainError> for SyncError {
    fn from(err: ChainError) -> Self {
        SyncError::ContractCallFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_history_message() {
        let err = SyncError::InconsistentHistory {
            run_id: RunId(3),
            mismatch: HistoryMismatch::LengthMismatch {
                contents: 2,
                roles: 1,
            },
        };
        assert_eq!(
            err.to_string(),
            "Inconsistent message history for run 3: 2 contents but 1 roles"
        );
        assert_eq!(
            HistoryMismatch::CursorBeyondEnd { cursor: 4, len: 2 }.to_string(),
            "cursor 4 is past history length 2"
        );
    }
}
