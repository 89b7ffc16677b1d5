//! Projection Synchronizer
//!
//! Keeps the read-model rows eventually consistent with the event log.
//! Live updates come from the event stream; `sync_differences` and
//! `sync_all` are the periodic repair paths that tolerate missed,
//! duplicated, or reordered deliveries.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Purchase, Snack, SnackMachine};
use crate::domain::{MachineEvent, PurchaseEvent, SnackEvent};
use crate::event_store::{EventLog, EventLogError, StoredEvent};
use crate::stream::{namespace, EventStream, StreamMessage};

use super::store::{MachineInfo, ProjectionStore, PurchaseInfo, SlotInfo, SnackInfo};

/// Errors that can occur updating a projection row
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The stored aggregate id is not the uuid the row key needs
    #[error("Invalid aggregate id in event: {0}")]
    BadAggregateId(String),

    /// The event payload does not decode into the expected event type
    #[error("Invalid event payload: {0}")]
    BadPayload(#[from] serde_json::Error),

    /// Reading the log for a rebuild failed
    #[error(transparent)]
    Log(#[from] EventLogError),
}

/// The three projected aggregate types.
#[derive(Debug, Clone, Copy)]
enum RowKind {
    Machine,
    Snack,
    Purchase,
}

impl RowKind {
    const ALL: [RowKind; 3] = [RowKind::Machine, RowKind::Snack, RowKind::Purchase];

    fn aggregate_type(self) -> &'static str {
        match self {
            RowKind::Machine => SnackMachine::aggregate_type(),
            RowKind::Snack => Snack::aggregate_type(),
            RowKind::Purchase => Purchase::aggregate_type(),
        }
    }
}

/// Applies committed events to the projection store and runs the catch-up
/// passes.
pub struct ProjectionSynchronizer {
    log: Arc<dyn EventLog>,
    store: Arc<ProjectionStore>,
}

impl ProjectionSynchronizer {
    pub fn new(log: Arc<dyn EventLog>, store: Arc<ProjectionStore>) -> Self {
        Self { log, store }
    }

    pub fn store(&self) -> &Arc<ProjectionStore> {
        &self.store
    }

    // =========================================================================
    // Event-driven apply
    // =========================================================================

    /// Apply one committed event to its projection row.
    ///
    /// Stale or duplicate deliveries (row version >= event version) are
    /// dropped. A delivery exactly one ahead of the row updates it in
    /// place; anything else (missing row, gap from lost deliveries)
    /// rebuilds the row from the log.
    pub async fn apply(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        match event.aggregate_type.as_str() {
            "machine" => self.apply_machine(event).await,
            "snack" => self.apply_snack(event).await,
            "purchase" => self.apply_purchase(event).await,
            // Marker aggregates have no read model.
            _ => Ok(()),
        }
    }

    async fn apply_machine(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        let id = parse_id(&event.aggregate_id)?;
        match self.store.machine(id).map(|row| row.version) {
            Some(stored) if stored >= event.version => Ok(()),
            Some(stored) if event.version == stored + 1 => {
                let domain_event: MachineEvent = serde_json::from_value(event.payload.clone())?;
                self.store.update_machine(id, |info| {
                    apply_machine_event(info, &domain_event);
                    info.version = event.version;
                });
                Ok(())
            }
            Some(_) => self.rebuild_machine(id).await,
            None if event.version == 1 => {
                let domain_event: MachineEvent = serde_json::from_value(event.payload.clone())?;
                let machine = SnackMachine::default().apply(domain_event);
                self.store.put_machine(MachineInfo::from_aggregate(&machine));
                Ok(())
            }
            None => self.rebuild_machine(id).await,
        }
    }

    async fn apply_snack(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        let id = parse_id(&event.aggregate_id)?;
        match self.store.snack(id).map(|row| row.version) {
            Some(stored) if stored >= event.version => Ok(()),
            Some(stored) if event.version == stored + 1 => {
                let domain_event: SnackEvent = serde_json::from_value(event.payload.clone())?;
                self.store.update_snack(id, |info| {
                    apply_snack_event(info, &domain_event);
                    info.version = event.version;
                });
                Ok(())
            }
            Some(_) => self.rebuild_snack(id).await,
            None if event.version == 1 => {
                let domain_event: SnackEvent = serde_json::from_value(event.payload.clone())?;
                let snack = Snack::default().apply(domain_event);
                self.store.put_snack(SnackInfo::from_aggregate(&snack));
                Ok(())
            }
            None => self.rebuild_snack(id).await,
        }
    }

    async fn apply_purchase(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        let id = parse_id(&event.aggregate_id)?;
        // Purchases are write-once: any later delivery is a duplicate.
        if self.store.purchase(id).is_some() {
            return Ok(());
        }
        let domain_event: PurchaseEvent = serde_json::from_value(event.payload.clone())?;
        let purchase = Purchase::default().apply(domain_event);
        self.store
            .put_purchase(PurchaseInfo::from_aggregate(&purchase));
        Ok(())
    }

    // =========================================================================
    // Catch-up paths
    // =========================================================================

    /// Create rows for aggregates that have events but no projection.
    /// Returns how many rows were created. Idempotent.
    pub async fn sync_differences(&self) -> usize {
        let mut created = 0;
        for kind in RowKind::ALL {
            created += self.sync_kind(kind, true).await;
        }
        created
    }

    /// Rebuild every row from current aggregate state, overwriting stored
    /// versions. Returns how many rows were rebuilt.
    pub async fn sync_all(&self) -> usize {
        let mut rebuilt = 0;
        for kind in RowKind::ALL {
            rebuilt += self.sync_kind(kind, false).await;
        }
        rebuilt
    }

    /// Scan one aggregate type; with `missing_only` set, rebuild only ids
    /// without a row, otherwise rebuild every id.
    async fn sync_kind(&self, kind: RowKind, missing_only: bool) -> usize {
        let aggregate_type = kind.aggregate_type();
        let ids = match self.log.ids(aggregate_type).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(aggregate_type, error = %e, "Catch-up scan failed");
                return 0;
            }
        };
        let known = if missing_only {
            self.known_ids(kind)
        } else {
            Vec::new()
        };

        let mut touched = 0;
        for raw_id in ids {
            let id = match parse_id(&raw_id) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(aggregate_id = %raw_id, error = %e, "Skipping unparseable id");
                    continue;
                }
            };
            if missing_only && known.contains(&id) {
                continue;
            }
            match self.rebuild(kind, id).await {
                Ok(()) => touched += 1,
                // One bad row never blocks the rest of the scan.
                Err(e) => {
                    tracing::error!(aggregate_id = %id, error = %e, "Row rebuild failed");
                }
            }
        }
        touched
    }

    fn known_ids(&self, kind: RowKind) -> Vec<Uuid> {
        match kind {
            RowKind::Machine => self.store.machine_ids(),
            RowKind::Snack => self.store.snack_ids(),
            RowKind::Purchase => self.store.purchase_ids(),
        }
    }

    async fn rebuild(&self, kind: RowKind, id: Uuid) -> Result<(), ProjectionError> {
        match kind {
            RowKind::Machine => self.rebuild_machine(id).await,
            RowKind::Snack => self.rebuild_snack(id).await,
            RowKind::Purchase => self.rebuild_purchase(id).await,
        }
    }

    async fn rebuild_machine(&self, id: Uuid) -> Result<(), ProjectionError> {
        let events = self
            .log
            .read_all(SnackMachine::aggregate_type(), &id.to_string())
            .await?;
        if events.is_empty() {
            self.store.remove_machine(id);
            return Ok(());
        }
        let mut machine = SnackMachine::default();
        for stored in events {
            let event: MachineEvent = serde_json::from_value(stored.payload)?;
            machine = machine.apply(event);
        }
        self.store.put_machine(MachineInfo::from_aggregate(&machine));
        Ok(())
    }

    async fn rebuild_snack(&self, id: Uuid) -> Result<(), ProjectionError> {
        let events = self
            .log
            .read_all(Snack::aggregate_type(), &id.to_string())
            .await?;
        if events.is_empty() {
            self.store.remove_snack(id);
            return Ok(());
        }
        let mut snack = Snack::default();
        for stored in events {
            let event: SnackEvent = serde_json::from_value(stored.payload)?;
            snack = snack.apply(event);
        }
        self.store.put_snack(SnackInfo::from_aggregate(&snack));
        Ok(())
    }

    async fn rebuild_purchase(&self, id: Uuid) -> Result<(), ProjectionError> {
        let events = self
            .log
            .read_all(Purchase::aggregate_type(), &id.to_string())
            .await?;
        if events.is_empty() {
            self.store.remove_purchase(id);
            return Ok(());
        }
        let mut purchase = Purchase::default();
        for stored in events {
            let event: PurchaseEvent = serde_json::from_value(stored.payload)?;
            purchase = purchase.apply(event);
        }
        self.store
            .put_purchase(PurchaseInfo::from_aggregate(&purchase));
        Ok(())
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    /// Subscribe to the aggregate namespaces and apply committed events as
    /// they arrive. Returns the task handle and a shutdown sender; send
    /// `true` to stop gracefully.
    pub fn start(
        self: Arc<Self>,
        stream: &EventStream,
    ) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut machines = stream.subscribe(&namespace(SnackMachine::aggregate_type()));
        let mut snacks = stream.subscribe(&namespace(Snack::aggregate_type()));
        let mut purchases = stream.subscribe(&namespace(Purchase::aggregate_type()));

        let task = tokio::spawn(async move {
            tracing::debug!("Projection synchronizer started");
            loop {
                tokio::select! {
                    result = machines.recv() => {
                        if !self.consume(result).await { break; }
                    }
                    result = snacks.recv() => {
                        if !self.consume(result).await { break; }
                    }
                    result = purchases.recv() => {
                        if !self.consume(result).await { break; }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() { break; }
                    }
                }
            }
            tracing::debug!("Projection synchronizer stopped");
        });

        (task, shutdown_tx)
    }

    /// Handle one feed delivery; returns false when the feed is closed.
    async fn consume(&self, result: Result<StreamMessage, RecvError>) -> bool {
        match result {
            Ok(StreamMessage::Committed(event)) => {
                if let Err(e) = self.apply(&event).await {
                    tracing::error!(
                        aggregate_id = %event.aggregate_id,
                        version = event.version,
                        error = %e,
                        "Projection update failed; catch-up will repair"
                    );
                }
                true
            }
            // Rejections are observability-only; nothing to project.
            Ok(StreamMessage::Rejected(_)) => true,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Projection feed lagged; relying on catch-up");
                true
            }
            Err(RecvError::Closed) => false,
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ProjectionError> {
    Uuid::parse_str(raw).map_err(|_| ProjectionError::BadAggregateId(raw.to_string()))
}

/// Fold one machine event into the flattened row.
fn apply_machine_event(info: &mut MachineInfo, event: &MachineEvent) {
    match event {
        MachineEvent::MachineInitialized {
            machine_id,
            money_inside,
            slots,
            ..
        } => {
            info.id = *machine_id;
            info.money_inside = money_inside.amount();
            info.amount_in_transaction = rust_decimal::Decimal::ZERO;
            info.slots = slots
                .iter()
                .map(|slot| SlotInfo {
                    position: slot.position(),
                    snack_id: slot.pile().map(|p| p.snack_id()),
                    quantity: slot.pile().map_or(0, |p| p.quantity()),
                    price: slot.pile().map_or(rust_decimal::Decimal::ZERO, |p| p.price()),
                })
                .collect();
            info.removed = false;
        }

        MachineEvent::MachineRemoved { .. } => {
            info.removed = true;
        }

        MachineEvent::MoneyLoaded { money, .. } => {
            info.money_inside += money.amount();
        }

        MachineEvent::MoneyUnloaded { .. } => {
            info.money_inside = rust_decimal::Decimal::ZERO;
        }

        MachineEvent::MoneyInserted { money, .. } => {
            info.money_inside += money.amount();
            info.amount_in_transaction += money.amount();
        }

        MachineEvent::MoneyReturned { money, .. } => {
            info.money_inside -= money.amount();
            info.amount_in_transaction -= money.amount();
        }

        MachineEvent::SnacksLoaded { position, pile, .. } => {
            let slot = SlotInfo {
                position: *position,
                snack_id: Some(pile.snack_id()),
                quantity: pile.quantity(),
                price: pile.price(),
            };
            match info.slots.iter_mut().find(|s| s.position == *position) {
                Some(existing) => *existing = slot,
                None => {
                    info.slots.push(slot);
                    info.slots.sort_by_key(|s| s.position);
                }
            }
        }

        MachineEvent::SnackBought {
            position, price, ..
        } => {
            if let Some(slot) = info.slots.iter_mut().find(|s| s.position == *position) {
                slot.quantity = slot.quantity.saturating_sub(1);
            }
            info.amount_in_transaction -= *price;
        }
    }
}

/// Fold one snack event into the flattened row.
fn apply_snack_event(info: &mut SnackInfo, event: &SnackEvent) {
    match event {
        SnackEvent::SnackInitialized {
            snack_id,
            name,
            picture_url,
            ..
        } => {
            info.id = *snack_id;
            info.name = name.clone();
            info.picture_url = picture_url.clone();
            info.removed = false;
        }

        SnackEvent::SnackRenamed { name, .. } => {
            info.name = name.clone();
        }

        SnackEvent::SnackPictureChanged { picture_url, .. } => {
            info.picture_url = picture_url.clone();
        }

        SnackEvent::SnackRemoved { .. } => {
            info.removed = true;
        }
    }
}
