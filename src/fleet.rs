//! SnackFleet facade
//!
//! Wires the event log, event stream, per-aggregate runtimes, projection
//! store, and synchronizer into the entry points external collaborators
//! consume: commands, precondition checks, queries, the event feed, and
//! the sync triggers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::watch;
use uuid::Uuid;

use crate::aggregate::{
    MachineCommand, Purchase, SaleMarker, Snack, SnackCommand, SnackMachine,
};
use crate::config::Config;
use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};
use crate::event_store::{EventLog, InMemoryEventLog, StoredEvent, Version};
use crate::handlers::{BuySnackCommand, SaleHandler, SaleReceipt};
use crate::projection::{ProjectionStore, ProjectionSynchronizer};
use crate::runtime::Runtime;
use crate::stream::{EventStream, StreamMessage};

/// The assembled fleet core.
pub struct SnackFleet {
    log: Arc<dyn EventLog>,
    stream: EventStream,
    machines: Arc<Runtime<SnackMachine>>,
    snacks: Arc<Runtime<Snack>>,
    purchases: Arc<Runtime<Purchase>>,
    sale_handler: SaleHandler,
    synchronizer: Arc<ProjectionSynchronizer>,
    sync_loop: (tokio::task::JoinHandle<()>, watch::Sender<bool>),
}

impl SnackFleet {
    /// Build a fleet over the in-memory event log.
    pub fn new(config: &Config) -> Self {
        Self::with_log(Arc::new(InMemoryEventLog::new()), config)
    }

    /// Build a fleet over a caller-provided event log backend.
    pub fn with_log(log: Arc<dyn EventLog>, config: &Config) -> Self {
        let stream = EventStream::new(config.stream_capacity);
        let machines = Arc::new(Runtime::new(
            Arc::clone(&log),
            stream.clone(),
            config.runtime(),
        ));
        let snacks = Arc::new(Runtime::new(
            Arc::clone(&log),
            stream.clone(),
            config.runtime(),
        ));
        let purchases = Arc::new(Runtime::new(
            Arc::clone(&log),
            stream.clone(),
            config.runtime(),
        ));
        let sales: Arc<Runtime<SaleMarker>> = Arc::new(Runtime::new(
            Arc::clone(&log),
            stream.clone(),
            config.runtime(),
        ));
        let sale_handler = SaleHandler::new(
            Arc::clone(&machines),
            sales,
            Arc::clone(&purchases),
        );

        let projections = Arc::new(ProjectionStore::new());
        let synchronizer = Arc::new(ProjectionSynchronizer::new(Arc::clone(&log), projections));
        let sync_loop = Arc::clone(&synchronizer).start(&stream);

        Self {
            log,
            stream,
            machines,
            snacks,
            purchases,
            sale_handler,
            synchronizer,
            sync_loop,
        }
    }

    // =========================================================================
    // Machine commands and queries
    // =========================================================================

    /// Dispatch a mutating machine command; returns the new Version.
    pub async fn machine_command(
        &self,
        machine_id: Uuid,
        command: MachineCommand,
        ctx: &OperationContext,
    ) -> AppResult<Version> {
        self.machines
            .execute(&machine_id, command, ctx)
            .await
            .map(|outcome| outcome.version)
    }

    /// Side-effect-free machine precondition check.
    pub async fn can_machine_command(
        &self,
        machine_id: Uuid,
        command: MachineCommand,
        ctx: &OperationContext,
    ) -> bool {
        self.machines.can_execute(&machine_id, command, ctx).await
    }

    /// Current machine snapshot; fails if never initialized.
    pub async fn machine(&self, machine_id: Uuid) -> AppResult<SnackMachine> {
        self.machines.query(&machine_id).await
    }

    // =========================================================================
    // Snack commands and queries
    // =========================================================================

    /// Dispatch a mutating snack command; returns the new Version.
    pub async fn snack_command(
        &self,
        snack_id: Uuid,
        command: SnackCommand,
        ctx: &OperationContext,
    ) -> AppResult<Version> {
        self.snacks
            .execute(&snack_id, command, ctx)
            .await
            .map(|outcome| outcome.version)
    }

    /// Side-effect-free snack precondition check.
    pub async fn can_snack_command(
        &self,
        snack_id: Uuid,
        command: SnackCommand,
        ctx: &OperationContext,
    ) -> bool {
        self.snacks.can_execute(&snack_id, command, ctx).await
    }

    /// Current snack snapshot; fails if never initialized.
    pub async fn snack(&self, snack_id: Uuid) -> AppResult<Snack> {
        self.snacks.query(&snack_id).await
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Buy one snack and record the purchase, idempotently per transaction.
    pub async fn buy_snack(
        &self,
        command: BuySnackCommand,
        ctx: &OperationContext,
    ) -> AppResult<SaleReceipt> {
        self.sale_handler.execute(command, ctx).await
    }

    /// Purchase record snapshot; fails if no such purchase was recorded.
    pub async fn purchase(&self, purchase_id: Uuid) -> AppResult<Purchase> {
        self.purchases.query(&purchase_id).await
    }

    // =========================================================================
    // Event feed
    // =========================================================================

    /// Subscribe to the live committed/error event feed of one namespace
    /// (e.g. `machine-events`).
    pub fn subscribe(&self, namespace: &str) -> broadcast::Receiver<StreamMessage> {
        self.stream.subscribe(namespace)
    }

    /// Catch-up read of every committed event for one aggregate type, in
    /// commit order. Combined with `subscribe`, this is the from-position
    /// form of the feed.
    pub async fn committed_events(&self, aggregate_type: &str) -> AppResult<Vec<StoredEvent>> {
        self.log
            .read_namespace(aggregate_type)
            .await
            .map_err(AppError::from)
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// The read-model rows.
    pub fn projections(&self) -> &Arc<ProjectionStore> {
        self.synchronizer.store()
    }

    /// The synchronizer, for wiring a scheduler.
    pub fn synchronizer(&self) -> &Arc<ProjectionSynchronizer> {
        &self.synchronizer
    }

    /// Create rows for aggregates missing a projection. Idempotent; safe
    /// to trigger redundantly.
    pub async fn sync_differences(&self) -> usize {
        self.synchronizer.sync_differences().await
    }

    /// Rebuild every projection row from the log. Idempotent; safe to
    /// trigger redundantly.
    pub async fn sync_all(&self) -> usize {
        self.synchronizer.sync_all().await
    }

    /// Stop the background synchronizer loop.
    pub async fn shutdown(self) {
        let (task, shutdown_tx) = self.sync_loop;
        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }
}
