//! Actor loop that owns one aggregate instance and processes its commands.
//!
//! The worker runs as a tokio task fed by an `mpsc` channel, which is what
//! serializes commands for one aggregate id. It owns the resident state
//! snapshot: replayed from the event log on activation, advanced only after
//! an event has durably committed, published to queries through a `watch`
//! channel so reads never enter the command queue.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::aggregate::Aggregate;
use crate::domain::{DomainEvent, OperationContext, Rejection};
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventLog, EventLogError, Version};
use crate::stream::{ErrorEvent, EventStream};

/// Configuration for the actor loop.
#[derive(Debug, Clone)]
pub(crate) struct ActorConfig {
    /// How long the worker waits for a message before deactivating.
    pub idle_timeout: Duration,
    /// Upper bound on activation replay; beyond it the pending messages
    /// fail with an activation error instead of waiting forever.
    pub activation_timeout: Duration,
}

/// Result of a successfully dispatched command.
#[derive(Debug)]
pub struct ExecuteOutcome<A: Aggregate> {
    /// Aggregate version after the command's events committed.
    pub version: Version,
    /// The committed events (empty for an accepted no-op).
    pub events: Vec<A::Event>,
}

/// Messages sent from the runtime to the actor loop.
pub(crate) enum ActorMessage<A: Aggregate> {
    /// Execute a command against the aggregate.
    Execute {
        command: A::Command,
        ctx: OperationContext,
        reply: oneshot::Sender<Result<ExecuteOutcome<A>, AppError>>,
    },
}

/// Cloneable handle to one actor: the command queue plus the snapshot feed.
pub(crate) struct ActorHandle<A: Aggregate> {
    pub tx: mpsc::Sender<ActorMessage<A>>,
    pub snapshot: watch::Receiver<Option<A>>,
}

impl<A: Aggregate> Clone for ActorHandle<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            snapshot: self.snapshot.clone(),
        }
    }
}

/// The shared actor registry for one aggregate type.
pub(crate) type Registry<A> = Arc<Mutex<HashMap<String, ActorHandle<A>>>>;

/// Fold the full event stream for `key` into a fresh zero-state instance.
async fn replay<A: Aggregate>(log: &dyn EventLog, key: &str) -> Result<A, EventLogError> {
    let events = log.read_all(A::aggregate_type(), key).await?;
    let mut state = A::default();
    for stored in events {
        let event: A::Event =
            serde_json::from_value(stored.payload).map_err(|e| EventLogError::Unreadable {
                aggregate_id: key.to_string(),
                detail: e.to_string(),
            })?;
        state = state.apply(event);
    }
    Ok(state)
}

/// Validate and commit one command. Returns the outcome for the caller plus
/// `true` when the worker must deactivate because the resident state could
/// not be recovered after a commit failure.
async fn execute<A: Aggregate>(
    state: &mut A,
    key: &str,
    log: &dyn EventLog,
    stream: &EventStream,
    command: A::Command,
    ctx: &OperationContext,
) -> (Result<ExecuteOutcome<A>, AppError>, bool) {
    let events = match state.handle(command, ctx) {
        Ok(events) => events,
        Err(reasons) => {
            stream.publish_rejection(ErrorEvent {
                aggregate_type: A::aggregate_type().to_string(),
                aggregate_id: key.to_string(),
                reasons: reasons.iter().map(Rejection::from).collect(),
                occurred_at: Utc::now(),
            });
            return (Err(AppError::Rejected(reasons)), false);
        }
    };

    let mut committed = Vec::with_capacity(events.len());
    for event in events {
        let request = match AppendRequest::new(
            A::aggregate_type(),
            key,
            state.version(),
            event.event_type(),
            &event,
            ctx,
        ) {
            Ok(request) => request,
            Err(e) => return (Err(AppError::EventLog(e)), false),
        };

        match log.append(request).await {
            Ok(stored) => {
                // The event is durable; only now does the resident state
                // advance.
                *state = state.clone().apply(event.clone());
                stream.publish_committed(stored);
                committed.push(event);
            }
            Err(e) => {
                tracing::error!(
                    aggregate_type = A::aggregate_type(),
                    aggregate_id = key,
                    error = %e,
                    "Commit failed; discarding candidate state"
                );
                // The candidate state is dead. Re-derive truth from the
                // log; if even that fails the actor must deactivate.
                match replay::<A>(log, key).await {
                    Ok(fresh) => {
                        *state = fresh;
                        return (Err(AppError::CommitFailed(e.to_string())), false);
                    }
                    Err(replay_err) => {
                        tracing::error!(
                            aggregate_id = key,
                            error = %replay_err,
                            "Replay after commit failure also failed; deactivating"
                        );
                        return (Err(AppError::CommitFailed(e.to_string())), true);
                    }
                }
            }
        }
    }

    (
        Ok(ExecuteOutcome {
            version: state.version(),
            events: committed,
        }),
        false,
    )
}

/// Runs the aggregate actor loop.
///
/// Replays on activation, then processes messages strictly one at a time
/// until the idle timeout elapses or every handle is dropped. On exit the
/// worker removes itself from the registry under the lock, then drains any
/// message that raced in before the removal.
pub(crate) async fn run_actor<A: Aggregate>(
    key: String,
    self_tx: mpsc::Sender<ActorMessage<A>>,
    log: Arc<dyn EventLog>,
    stream: EventStream,
    mut rx: mpsc::Receiver<ActorMessage<A>>,
    snapshot_tx: watch::Sender<Option<A>>,
    registry: Registry<A>,
    config: ActorConfig,
) {
    let replayed = tokio::time::timeout(config.activation_timeout, replay::<A>(&*log, &key))
        .await
        .unwrap_or_else(|_| {
            Err(EventLogError::Backend(format!(
                "activation replay exceeded {:?}",
                config.activation_timeout
            )))
        });
    let mut state = match replayed {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(
                aggregate_type = A::aggregate_type(),
                aggregate_id = %key,
                error = %e,
                "Activation failed"
            );
            deactivate_with_error(&key, &self_tx, &mut rx, &registry, &e.to_string()).await;
            return;
        }
    };
    snapshot_tx.send_replace(Some(state.clone()));

    tracing::debug!(
        aggregate_type = A::aggregate_type(),
        aggregate_id = %key,
        version = state.version(),
        "Actor activated"
    );

    loop {
        let message = match tokio::time::timeout(config.idle_timeout, rx.recv()).await {
            Ok(Some(message)) => message,
            // Every handle dropped, or idle long enough: deactivate.
            Ok(None) | Err(_) => break,
        };

        let ActorMessage::Execute {
            command,
            ctx,
            reply,
        } = message;
        let (result, fatal) = execute(&mut state, &key, &*log, &stream, command, &ctx).await;
        let _ = reply.send(result);

        if fatal {
            deactivate_with_error(&key, &self_tx, &mut rx, &registry, "resident state lost")
                .await;
            return;
        }

        snapshot_tx.send_replace(Some(state.clone()));
    }

    // Graceful deactivation: deregister first so no new sender finds this
    // actor, then serve whatever raced into the queue before removal.
    deregister(&key, &self_tx, &registry).await;
    rx.close();
    while let Some(message) = rx.recv().await {
        let ActorMessage::Execute {
            command,
            ctx,
            reply,
        } = message;
        let (result, fatal) = execute(&mut state, &key, &*log, &stream, command, &ctx).await;
        let _ = reply.send(result);
        if fatal {
            deactivate_with_error(&key, &self_tx, &mut rx, &registry, "resident state lost")
                .await;
            return;
        }
        snapshot_tx.send_replace(Some(state.clone()));
    }

    tracing::debug!(
        aggregate_type = A::aggregate_type(),
        aggregate_id = %key,
        "Actor deactivated"
    );
}

/// Remove this worker's registry entry, but never a successor's. A fresh
/// worker may already have been registered under the same key if a sender
/// raced this worker's shutdown.
async fn deregister<A: Aggregate>(
    key: &str,
    self_tx: &mpsc::Sender<ActorMessage<A>>,
    registry: &Registry<A>,
) {
    let mut actors = registry.lock().await;
    if actors
        .get(key)
        .is_some_and(|handle| handle.tx.same_channel(self_tx))
    {
        actors.remove(key);
    }
}

/// Fail every queued message with an activation error and deregister.
async fn deactivate_with_error<A: Aggregate>(
    key: &str,
    self_tx: &mpsc::Sender<ActorMessage<A>>,
    rx: &mut mpsc::Receiver<ActorMessage<A>>,
    registry: &Registry<A>,
    detail: &str,
) {
    deregister(key, self_tx, registry).await;
    rx.close();
    while let Some(message) = rx.recv().await {
        let ActorMessage::Execute { reply, .. } = message;
        let _ = reply.send(Err(AppError::ActivationFailed {
            aggregate_id: key.to_string(),
            detail: detail.to_string(),
        }));
    }
}
