//! Agent Run Synchronizer
//!
//! Drives one run from creation to completion: merges newly appended
//! on-chain messages into the session view and stops once the contract
//! reports the run finished.
//!
//! Each poll iteration fetches messages first and then reads the finished
//! flag. The two reads are separate calls against state that may change in
//! between, so after the flag is seen set one more fetch drains whatever was
//! appended in that window. That drain only picks up entries the contract
//! wrote before the finished flag was read. Convergence is best-effort, not
//! linearizable.

use agentverse_chain::{ContractGateway, RunId, RunInfo, Signer, TransactionReceipt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::errors::SyncError;
use crate::message::{Message, MessageBatch};
use crate::session::RunSession;
use crate::view::slice_history;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Finished,
    Cancelled,
}

/// Removes the run from the active set when the poll loop exits
struct ActivePoll {
    active: Arc<Mutex<HashSet<RunId>>>,
    run_id: RunId,
}

impl Drop for ActivePoll {
    fn drop(&mut self) {
        self.active.lock().remove(&self.run_id);
    }
}

pub struct RunSynchronizer<G: ContractGateway + ?Sized, C: Clock = TokioClock> {
    gateway: Arc<G>,
    clock: C,
    config: SyncConfig,
    active: Arc<Mutex<HashSet<RunId>>>,
}

impl<G: ContractGateway + ?Sized> RunSynchronizer<G, TokioClock> {
    pub fn new(gateway: Arc<G>, config: SyncConfig) -> Self {
        Self::with_clock(gateway, TokioClock, config)
    }
}

impl<G: ContractGateway + ?Sized, C: Clock> RunSynchronizer<G, C> {
    pub fn with_clock(gateway: Arc<G>, clock: C, config: SyncConfig) -> Self {
        Self {
            gateway,
            clock,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Submit a new run and recover its id from the `AgentRunCreated` event
    pub async fn create_run(
        &self,
        signer: &Signer,
        query: &str,
        max_iterations: u8,
    ) -> Result<RunId, SyncError> {
        let receipt = self
            .gateway
            .submit_run_creation(signer, query, max_iterations)
            .await?;

        let ids = self.gateway.run_created_ids(&receipt);
        if ids.len() > 1 {
            warn!(
                tx_hash = %receipt.transaction_hash,
                count = ids.len(),
                "multiple AgentRunCreated events, using the first"
            );
        }

        let run_id = ids.into_iter().next().ok_or_else(|| {
            SyncError::RunCreationFailed(format!(
                "no AgentRunCreated event in transaction {}",
                receipt.transaction_hash
            ))
        })?;

        info!(run_id = %run_id, tx_hash = %receipt.transaction_hash, "agent run created");
        Ok(run_id)
    }

    /// `create_run` followed by a fresh session for the new run
    pub async fn start_run(
        &self,
        signer: &Signer,
        query: &str,
        max_iterations: u8,
    ) -> Result<RunSession, SyncError> {
        let run_id = self.create_run(signer, query, max_iterations).await?;
        Ok(RunSession::new(run_id))
    }

    /// Entries at positions `>= since_index`, filtered to user/assistant.
    /// Does not touch any cursor.
    pub async fn fetch_incremental_messages(
        &self,
        run_id: RunId,
        since_index: usize,
    ) -> Result<MessageBatch, SyncError> {
        let (contents, roles) = tokio::try_join!(
            self.gateway.get_message_contents(run_id),
            self.gateway.get_message_roles(run_id),
        )?;

        let batch = slice_history(run_id, contents, roles, since_index)?;
        debug!(
            run_id = %run_id,
            since_index,
            consumed = batch.consumed,
            visible = batch.messages.len(),
            "fetched message history"
        );
        Ok(batch)
    }

    /// One fetch-and-merge step; returns the number of visible messages added
    pub async fn sync_once(&self, session: &mut RunSession) -> Result<usize, SyncError> {
        session.ensure_not_failed()?;
        if session.is_finished() {
            return Ok(0);
        }
        session.mark_polling();

        let batch = self
            .fetch_incremental_messages(session.run_id(), session.cursor())
            .await
            .inspect_err(|_| session.mark_failed())?;
        session.view_mut().merge(batch)
    }

    pub async fn poll_until_finished(
        &self,
        session: &mut RunSession,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, SyncError> {
        self.poll_with(session, cancel, |_| {}).await
    }

    /// Poll until the run finishes or `cancel` fires. `on_messages` sees each
    /// non-empty group of newly merged visible messages.
    ///
    /// Cancellation is checked at every iteration boundary and after every
    /// awaited call. Anything a call returns after cancellation is discarded,
    /// errors included, so a cancelled poll leaves the phase untouched.
    pub async fn poll_with<F>(
        &self,
        session: &mut RunSession,
        cancel: &CancellationToken,
        mut on_messages: F,
    ) -> Result<PollOutcome, SyncError>
    where
        F: FnMut(&[Message]),
    {
        session.ensure_not_failed()?;
        if session.is_finished() {
            return Ok(PollOutcome::Finished);
        }

        let run_id = session.run_id();
        let _active = self.acquire(run_id)?;
        session.mark_polling();
        info!(run_id = %run_id, cursor = session.cursor(), "polling run");

        let mut first = true;
        loop {
            if !first {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = self.clock.sleep(self.config.poll_interval) => {}
                }
            }
            first = false;

            if cancel.is_cancelled() {
                debug!(run_id = %run_id, "poll cancelled");
                return Ok(PollOutcome::Cancelled);
            }

            let fetched = self
                .fetch_incremental_messages(run_id, session.cursor())
                .await;
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }
            let batch = fetched.inspect_err(|_| session.mark_failed())?;
            self.merge(session, batch, &mut on_messages)?;

            let finished = self.gateway.is_run_finished(run_id).await;
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }
            let finished = finished
                .map_err(SyncError::from)
                .inspect_err(|_| session.mark_failed())?;

            if finished {
                let fetched = self
                    .fetch_incremental_messages(run_id, session.cursor())
                    .await;
                if cancel.is_cancelled() {
                    return Ok(PollOutcome::Cancelled);
                }
                let batch = fetched.inspect_err(|_| session.mark_failed())?;
                self.merge(session, batch, &mut on_messages)?;

                session.mark_finished();
                info!(
                    run_id = %run_id,
                    messages = session.messages().len(),
                    cursor = session.cursor(),
                    "run finished"
                );
                return Ok(PollOutcome::Finished);
            }
        }
    }

    /// Append a client message to a run that is still in progress
    pub async fn send_follow_up(
        &self,
        signer: &Signer,
        session: &mut RunSession,
        content: &str,
    ) -> Result<TransactionReceipt, SyncError> {
        session.ensure_not_failed()?;
        let run_id = session.run_id();
        if session.is_finished() {
            return Err(SyncError::RunFinished(run_id));
        }

        let finished = self
            .gateway
            .is_run_finished(run_id)
            .await
            .map_err(SyncError::from)
            .inspect_err(|_| session.mark_failed())?;
        if finished {
            return Err(SyncError::RunFinished(run_id));
        }

        let receipt = self
            .gateway
            .submit_follow_up(signer, run_id, content)
            .await
            .map_err(SyncError::from)
            .inspect_err(|_| session.mark_failed())?;

        info!(run_id = %run_id, tx_hash = %receipt.transaction_hash, "follow-up submitted");
        Ok(receipt)
    }

    pub async fn run_info(&self, run_id: RunId) -> Result<RunInfo, SyncError> {
        Ok(self.gateway.get_run(run_id).await?)
    }

    fn acquire(&self, run_id: RunId) -> Result<ActivePoll, SyncError> {
        if !self.active.lock().insert(run_id) {
            return Err(SyncError::AlreadyPolling(run_id));
        }
        Ok(ActivePoll {
            active: self.active.clone(),
            run_id,
        })
    }

    fn merge<F>(
        &self,
        session: &mut RunSession,
        batch: MessageBatch,
        on_messages: &mut F,
    ) -> Result<(), SyncError>
    where
        F: FnMut(&[Message]),
    {
        let before = session.messages().len();
        let added = session.view_mut().merge(batch)?;
        if added > 0 {
            on_messages(&session.messages()[before..]);
        }
        Ok(())
    }
}
