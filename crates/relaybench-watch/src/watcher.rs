//! Confirmation watcher.
//!
//! A single background task polls the relay contract's `RelayExecuted` logs
//! and hands each decoded record to the awaiter registered for its
//! identifier. Awaiters whose deadline block has been fully scanned without
//! a match fail with `ConfirmationTimeout`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relaybench_crypto::event;
use relaybench_types::{ConfirmationRecord, Deadline, Identifier, RelayError, Result};

use crate::{ChainReader, WatcherConfig};

type Outcome = Result<ConfirmationRecord>;

/// Every awaiter of one identifier; all of them get the same outcome.
struct Waiter {
    deadline: Deadline,
    senders: Vec<oneshot::Sender<Outcome>>,
}

#[derive(Default)]
struct WatchState {
    pending: HashMap<Identifier, Waiter>,
    /// Records already handed out, for identifiers registered again later.
    delivered: HashMap<Identifier, ConfirmationRecord>,
    unclaimed: VecDeque<ConfirmationRecord>,
    scanned_through: Option<u64>,
    stopped: bool,
}

impl WatchState {
    fn dispatch(&mut self, record: ConfirmationRecord, capacity: usize) {
        let identifier = record.identifier;
        if let Some(waiter) = self.pending.remove(&identifier) {
            info!(
                %identifier,
                success = record.success,
                block = record.block_number,
                awaiters = waiter.senders.len(),
                "relay transaction confirmed"
            );
            for sender in waiter.senders {
                let _ = sender.send(Ok(record.clone()));
            }
            self.delivered.insert(identifier, record);
            return;
        }

        // Trailing blocks are scanned more than once.
        if self.delivered.contains_key(&identifier)
            || self.unclaimed.iter().any(|r| r.identifier == identifier)
        {
            return;
        }
        if capacity == 0 {
            return;
        }
        if self.unclaimed.len() >= capacity {
            self.unclaimed.pop_front();
        }
        self.unclaimed.push_back(record);
    }

    /// Fail every awaiter whose deadline block lies `rescan_blocks` behind
    /// the scanned head, and forget awaiters whose handles were dropped.
    fn expire(&mut self, rescan_blocks: u64) {
        let settled = self.scanned_through.map(|s| s.saturating_sub(rescan_blocks));
        self.pending.retain(|identifier, waiter| {
            waiter.senders.retain(|sender| !sender.is_closed());
            if waiter.senders.is_empty() {
                debug!(%identifier, "awaiter dropped");
                return false;
            }
            if !settled.is_some_and(|s| waiter.deadline.is_reached(s)) {
                return true;
            }

            let deadline = waiter.deadline.block();
            warn!(%identifier, deadline, "confirmation deadline passed");
            for sender in waiter.senders.drain(..) {
                let _ = sender.send(Err(RelayError::ConfirmationTimeout {
                    identifier: *identifier,
                    deadline,
                }));
            }
            false
        });
    }

    fn release_all(&mut self) {
        self.stopped = true;
        for (_, waiter) in self.pending.drain() {
            for sender in waiter.senders {
                let _ = sender.send(Err(RelayError::Cancelled));
            }
        }
    }
}

fn lock(state: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle for one registered identifier.
///
/// Dropping it releases the watcher slot on the next poll.
#[derive(Debug)]
pub struct PendingConfirmation {
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingConfirmation {
    /// Wait until the record arrives, the deadline passes or the watcher stops.
    pub async fn wait(self) -> Outcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RelayError::Cancelled),
        }
    }
}

/// Shared `RelayExecuted` subscription multiplexed over many awaiters.
pub struct ConfirmationWatcher {
    state: Arc<Mutex<WatchState>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConfirmationWatcher {
    /// Start polling from `lookback_blocks` behind the current head.
    ///
    /// Cancelling `parent` stops the watcher and fails every awaiter with
    /// `Cancelled`.
    pub async fn start(
        reader: Arc<dyn ChainReader>,
        config: WatcherConfig,
        parent: &CancellationToken,
    ) -> Result<Self> {
        if config.poll_interval_ms == 0 || config.max_block_range == 0 {
            return Err(RelayError::Config(
                "watcher poll interval and block range must be non-zero".into(),
            ));
        }
        let head = reader.block_number().await?;
        let from_block = head.saturating_sub(config.lookback_blocks);

        let state = Arc::new(Mutex::new(WatchState::default()));
        let cancel = parent.child_token();
        info!(
            relay = %config.relay_contract,
            from_block,
            head,
            "starting confirmation watcher"
        );
        let task = tokio::spawn(run(reader, config, state.clone(), cancel.clone(), from_block));

        Ok(Self { state, cancel, task })
    }

    /// Register interest in `identifier` until `deadline`.
    ///
    /// The same identifier may be registered more than once (identical
    /// requests hash to one identifier); every handle resolves with the same
    /// record, and the latest of the deadlines applies.
    pub fn register(&self, identifier: Identifier, deadline: Deadline) -> Result<PendingConfirmation> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.stopped {
            return Err(RelayError::Cancelled);
        }

        let (sender, receiver) = oneshot::channel();
        if let Some(waiter) = state.pending.get_mut(&identifier) {
            debug!(%identifier, awaiters = waiter.senders.len() + 1, "joining existing awaiter");
            if deadline.block() > waiter.deadline.block() {
                waiter.deadline = deadline;
            }
            waiter.senders.push(sender);
            return Ok(PendingConfirmation { receiver });
        }

        if let Some(record) = state.delivered.get(&identifier) {
            debug!(%identifier, "confirmation already delivered");
            let _ = sender.send(Ok(record.clone()));
            return Ok(PendingConfirmation { receiver });
        }

        let seen = state.unclaimed.iter().position(|r| r.identifier == identifier);
        match seen.and_then(|pos| state.unclaimed.remove(pos)) {
            Some(record) => {
                debug!(%identifier, "confirmation already observed");
                state.delivered.insert(identifier, record.clone());
                let _ = sender.send(Ok(record));
            }
            None => {
                state.pending.insert(identifier, Waiter { deadline, senders: vec![sender] });
            }
        }

        Ok(PendingConfirmation { receiver })
    }

    /// Register and wait in one step.
    pub async fn await_confirmation(&self, identifier: Identifier, deadline: Deadline) -> Outcome {
        self.register(identifier, deadline)?.wait().await
    }

    /// Identifiers still waiting for a record.
    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Highest block whose logs have been fully scanned.
    pub fn scanned_through(&self) -> Option<u64> {
        lock(&self.state).scanned_through
    }

    /// Stop polling, fail outstanding awaiters and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "confirmation watcher task failed");
        }
        lock(&self.state).release_all();
    }
}

impl Drop for ConfirmationWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    reader: Arc<dyn ChainReader>,
    config: WatcherConfig,
    state: Arc<Mutex<WatchState>>,
    cancel: CancellationToken,
    mut cursor: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = poll_once(reader.as_ref(), &config, &state, &mut cursor) => {
                if let Err(e) = result {
                    warn!(error = %e, cursor, "confirmation poll failed");
                }
            }
        }
    }

    debug!("confirmation watcher stopped");
    lock(&state).release_all();
}

/// Scan from `rescan_blocks` before `cursor` up to the current head,
/// dispatch matches and expire deadlines. `cursor` is the first block never
/// scanned and only advances past fully scanned ranges.
async fn poll_once(
    reader: &dyn ChainReader,
    config: &WatcherConfig,
    state: &Mutex<WatchState>,
    cursor: &mut u64,
) -> Result<()> {
    let head = reader.block_number().await?;
    let topic = event::relay_executed_topic();
    let mut from_block = cursor.saturating_sub(config.rescan_blocks);

    while from_block <= head {
        let to_block = head.min(from_block.saturating_add(config.max_block_range - 1));
        let logs = reader
            .logs(config.relay_contract, topic, from_block, to_block)
            .await?;
        debug!(from = from_block, to = to_block, logs = logs.len(), "scanned relay logs");

        {
            let mut state = lock(state);
            for log in &logs {
                match event::decode_confirmation(log) {
                    Ok(record) => state.dispatch(record, config.unclaimed_capacity),
                    Err(e) => debug!(error = %e, "skipping undecodable log"),
                }
            }
            state.scanned_through = state.scanned_through.max(Some(to_block));
            state.expire(config.rescan_blocks);
        }

        from_block = to_block + 1;
        *cursor = (*cursor).max(from_block);
    }

    lock(state).expire(config.rescan_blocks);
    Ok(())
}
