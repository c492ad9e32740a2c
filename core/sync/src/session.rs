use agentverse_chain::RunId;

use crate::errors::SyncError;
use crate::message::Message;
use crate::view::ConversationView;

/// Phase of a run as observed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Run id known, nothing fetched yet
    Created,
    Polling,
    /// Terminal: the contract reported the run finished
    Finished,
    /// Terminal: a contract call failed while syncing
    Failed,
}

/// Client-side state of one run: its id, the mirrored conversation and the
/// observed phase. Nothing here is persisted; re-attaching to an existing
/// run starts a fresh session from cursor 0.
#[derive(Debug, Clone)]
pub struct RunSession {
    run_id: RunId,
    view: ConversationView,
    phase: RunPhase,
}

impl RunSession {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            view: ConversationView::new(),
            phase: RunPhase::Created,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn messages(&self) -> &[Message] {
        self.view.messages()
    }

    pub fn cursor(&self) -> usize {
        self.view.cursor()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::Finished
    }

    pub(crate) fn view_mut(&mut self) -> &mut ConversationView {
        &mut self.view
    }

    pub(crate) fn ensure_not_failed(&self) -> Result<(), SyncError> {
        match self.phase {
            RunPhase::Failed => Err(SyncError::SessionFailed(self.run_id)),
            _ => Ok(()),
        }
    }

    pub(crate) fn mark_polling(&mut self) {
        if self.phase == RunPhase::Created {
            self.phase = RunPhase::Polling;
        }
    }

    pub(crate) fn mark_finished(&mut self) {
        if self.phase != RunPhase::Failed {
            self.phase = RunPhase::Finished;
        }
    }

    /// Only a session that has started polling can fail
    pub(crate) fn mark_failed(&mut self) {
        if self.phase == RunPhase::Polling {
            self.phase = RunPhase::Failed;
        }
    }
}
