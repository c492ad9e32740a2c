//! Local conversation view and history slicing

use agentverse_chain::RunId;

use crate::errors::{HistoryMismatch, SyncError};
use crate::message::{Message, MessageBatch, Role};

/// Builds the batch of entries at positions `>= since_index` from the two
/// index-aligned history arrays returned by the contract.
pub fn slice_history(
    run_id: RunId,
    contents: Vec<String>,
    roles: Vec<String>,
    since_index: usize,
) -> Result<MessageBatch, SyncError> {
    if contents.len() != roles.len() {
        return Err(SyncError::InconsistentHistory {
            run_id,
            mismatch: HistoryMismatch::LengthMismatch {
                contents: contents.len(),
                roles: roles.len(),
            },
        });
    }
    if since_index > contents.len() {
        return Err(SyncError::InconsistentHistory {
            run_id,
            mismatch: HistoryMismatch::CursorBeyondEnd {
                cursor: since_index,
                len: contents.len(),
            },
        });
    }

    let consumed = contents.len() - since_index;
    let messages = contents
        .into_iter()
        .zip(roles)
        .skip(since_index)
        .map(|(content, role)| Message::new(Role::parse(&role), content))
        .filter(|message| message.role.is_visible())
        .collect();

    Ok(MessageBatch {
        since_index,
        consumed,
        messages,
    })
}

/// Visible messages mirrored from the contract plus the count of raw
/// entries already merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationView {
    messages: Vec<Message>,
    cursor: usize,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Appends a batch fetched at the current cursor and returns how many
    /// visible messages were added. A batch taken at any other position
    /// would duplicate or skip entries and is rejected.
    pub fn merge(&mut self, batch: MessageBatch) -> Result<usize, SyncError> {
        if batch.since_index != self.cursor {
            return Err(SyncError::StaleBatch {
                expected: self.cursor,
                got: batch.since_index,
            });
        }
        let added = batch.messages.len();
        self.cursor = batch.next_cursor();
        self.messages.extend(batch.messages);
        Ok(added)
    }
}
