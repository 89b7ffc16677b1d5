//! Virtual Actor Runtime
//!
//! Per-id activation, FIFO command serialization, replay-on-activation, and
//! idle deactivation. Commands for one aggregate id are processed strictly
//! one at a time in arrival order; distinct ids run fully in parallel.
//! Queries bypass the command queue and read the last-committed snapshot,
//! so they interleave with an in-flight command for the same id.

mod actor;

pub use actor::ExecuteOutcome;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::aggregate::Aggregate;
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::event_store::EventLog;
use crate::stream::EventStream;

use actor::{run_actor, ActorConfig, ActorHandle, ActorMessage, Registry};

/// Default idle period after which a worker deactivates.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on activation replay.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-actor command queue depth.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Attempts to re-dispatch when a handle turns out to belong to a worker
/// that deactivated between lookup and send.
const MAX_DISPATCH_ATTEMPTS: usize = 3;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub idle_timeout: Duration,
    pub activation_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Per-id actor registry for one aggregate type.
pub struct Runtime<A: Aggregate> {
    log: Arc<dyn EventLog>,
    stream: EventStream,
    actors: Registry<A>,
    config: RuntimeConfig,
}

impl<A: Aggregate> Runtime<A> {
    pub fn new(log: Arc<dyn EventLog>, stream: EventStream, config: RuntimeConfig) -> Self {
        Self {
            log,
            stream,
            actors: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Number of resident actors (inspection aid).
    pub async fn resident_count(&self) -> usize {
        self.actors.lock().await.len()
    }

    /// Get the handle for an id, spawning (and replaying) its actor if it
    /// is not resident. Evicts stale entries whose worker already exited.
    async fn handle_for(&self, key: &str) -> ActorHandle<A> {
        let mut actors = self.actors.lock().await;
        if let Some(handle) = actors.get(key) {
            if !handle.tx.is_closed() {
                return handle.clone();
            }
            actors.remove(key);
        }

        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let handle = ActorHandle {
            tx,
            snapshot: snapshot_rx,
        };
        actors.insert(key.to_string(), handle.clone());

        tokio::spawn(run_actor::<A>(
            key.to_string(),
            handle.tx.clone(),
            Arc::clone(&self.log),
            self.stream.clone(),
            rx,
            snapshot_tx,
            Arc::clone(&self.actors),
            ActorConfig {
                idle_timeout: self.config.idle_timeout,
                activation_timeout: self.config.activation_timeout,
            },
        ));

        handle
    }

    /// Dispatch a mutating command to the aggregate's worker and wait for
    /// the commit result.
    pub async fn execute(
        &self,
        id: &A::Id,
        command: A::Command,
        ctx: &OperationContext,
    ) -> Result<ExecuteOutcome<A>, AppError> {
        let key = id.to_string();
        for _ in 0..MAX_DISPATCH_ATTEMPTS {
            let handle = self.handle_for(&key).await;
            let (reply_tx, reply_rx) = oneshot::channel();
            let message = ActorMessage::Execute {
                command: command.clone(),
                ctx: ctx.clone(),
                reply: reply_tx,
            };
            if handle.tx.send(message).await.is_err() {
                // Worker deactivated between lookup and send; respawn.
                continue;
            }
            match reply_rx.await {
                Ok(result) => return result,
                // Worker died without replying; safe to retry because no
                // reply means no commit was reported either way.
                Err(_) => continue,
            }
        }
        Err(AppError::Internal(format!(
            "dispatch to {key} kept racing actor deactivation"
        )))
    }

    /// Read the last-committed snapshot without entering the command
    /// queue. Activates the actor (replaying the log) if necessary.
    ///
    /// Fails with `NotFound` if the aggregate has never been initialized.
    pub async fn query(&self, id: &A::Id) -> Result<A, AppError> {
        let state = self.snapshot(id).await?;
        if !state.is_initialized() {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(state)
    }

    /// Side-effect-free precondition check against the current snapshot.
    /// Returns false when the entity cannot even be activated.
    pub async fn can_execute(
        &self,
        id: &A::Id,
        command: A::Command,
        ctx: &OperationContext,
    ) -> bool {
        match self.snapshot(id).await {
            Ok(state) => state.can_handle(command, ctx),
            Err(_) => false,
        }
    }

    /// The raw snapshot, initialized or not. Waits for activation replay
    /// to finish when the actor is freshly spawned.
    async fn snapshot(&self, id: &A::Id) -> Result<A, AppError> {
        let key = id.to_string();
        let handle = self.handle_for(&key).await;
        let mut snapshot = handle.snapshot.clone();
        let result = match snapshot.wait_for(|s| s.is_some()).await {
            Ok(guard) => guard
                .clone()
                .ok_or_else(|| AppError::Internal("empty snapshot after wait".to_string())),
            // The sender dropped before publishing a snapshot: replay
            // failed and the actor never finished activating.
            Err(_) => Err(AppError::ActivationFailed {
                aggregate_id: key,
                detail: "replay failed during activation".to_string(),
            }),
        };
        result
    }
}
