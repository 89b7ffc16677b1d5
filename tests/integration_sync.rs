//! Synchronizer semantics under duplicated and reordered delivery, driven
//! by feeding stored events to `apply` directly.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use uuid::Uuid;

use snack_fleet::event_store::{EventLog, InMemoryEventLog, StoredEvent};
use snack_fleet::projection::{ProjectionStore, ProjectionSynchronizer};
use snack_fleet::runtime::{Runtime, RuntimeConfig};
use snack_fleet::stream::EventStream;
use snack_fleet::{
    Denomination, MachineCommand, Money, OperationContext, Slot, SnackMachine, SnackPile,
};

mod common;

struct SyncFixture {
    log: Arc<InMemoryEventLog>,
    machines: Runtime<SnackMachine>,
    synchronizer: ProjectionSynchronizer,
    store: Arc<ProjectionStore>,
}

fn fixture() -> SyncFixture {
    let log = Arc::new(InMemoryEventLog::new());
    let machines = Runtime::new(
        log.clone() as Arc<dyn EventLog>,
        EventStream::default(),
        RuntimeConfig::default(),
    );
    let store = Arc::new(ProjectionStore::new());
    let synchronizer =
        ProjectionSynchronizer::new(log.clone() as Arc<dyn EventLog>, store.clone());
    SyncFixture {
        log,
        machines,
        synchronizer,
        store,
    }
}

/// Commit a small machine history and return its stored events in commit
/// order.
async fn committed_history(fixture: &SyncFixture) -> (Uuid, Vec<StoredEvent>) {
    let machine_id = Uuid::new_v4();
    let ctx = OperationContext::new();
    let commands = [
        MachineCommand::Initialize {
            machine_id,
            money_inside: Money::none(),
            slots: vec![Slot::empty(0)],
        },
        MachineCommand::LoadSnacks {
            position: 0,
            pile: SnackPile::new(Uuid::new_v4(), 5, dec!(2)).unwrap(),
        },
        MachineCommand::InsertMoney {
            money: Money::single(Denomination::Five),
        },
        MachineCommand::BuySnack { position: 0 },
    ];
    for command in commands {
        fixture
            .machines
            .execute(&machine_id, command, &ctx)
            .await
            .unwrap();
    }

    let events = fixture
        .log
        .read_all("machine", &machine_id.to_string())
        .await
        .unwrap();
    assert_eq!(events.len(), 4);
    (machine_id, events)
}

#[tokio::test]
async fn test_in_order_delivery_converges() {
    let fixture = fixture();
    let (machine_id, events) = committed_history(&fixture).await;

    for event in &events {
        fixture.synchronizer.apply(event).await.unwrap();
    }

    let row = fixture.store.machine(machine_id).unwrap();
    assert_eq!(row.version, 4);
    assert_eq!(row.money_inside, dec!(5));
    assert_eq!(row.amount_in_transaction, dec!(3));
    assert_eq!(row.slots[0].quantity, 4);
}

#[tokio::test]
async fn test_duplicate_delivery_applies_at_most_once() {
    let fixture = fixture();
    let (machine_id, events) = committed_history(&fixture).await;

    for event in &events {
        fixture.synchronizer.apply(event).await.unwrap();
        // Deliver each event twice; the second delivery is stale.
        fixture.synchronizer.apply(event).await.unwrap();
    }

    let row = fixture.store.machine(machine_id).unwrap();
    assert_eq!(row.version, 4);
    // Money inserted once, one snack bought once.
    assert_eq!(row.money_inside, dec!(5));
    assert_eq!(row.slots[0].quantity, 4);
}

#[tokio::test]
async fn test_version_is_monotonic_under_reordered_delivery() {
    let fixture = fixture();
    let (machine_id, events) = committed_history(&fixture).await;

    // Deliver out of order: v2, v1, v4, v3, then the whole history again.
    let order = [1, 0, 3, 2, 0, 1, 2, 3];
    let mut last_row_version = 0;
    for index in order {
        fixture.synchronizer.apply(&events[index]).await.unwrap();
        let row_version = fixture
            .store
            .machine(machine_id)
            .map_or(0, |row| row.version);
        assert!(
            row_version >= last_row_version,
            "row version regressed: {row_version} < {last_row_version}"
        );
        last_row_version = row_version;
    }

    // Whatever the delivery order, the row converges to the fold.
    let row = fixture.store.machine(machine_id).unwrap();
    assert_eq!(row.version, 4);
    assert_eq!(row.money_inside, dec!(5));
    assert_eq!(row.amount_in_transaction, dec!(3));
    assert_eq!(row.slots[0].quantity, 4);
}

#[tokio::test]
async fn test_gap_delivery_rebuilds_from_log() {
    let fixture = fixture();
    let (machine_id, events) = committed_history(&fixture).await;

    // First delivery is v4 with no row present: the synchronizer rebuilds
    // from the log rather than applying onto a missing base.
    fixture.synchronizer.apply(&events[3]).await.unwrap();

    let row = fixture.store.machine(machine_id).unwrap();
    assert_eq!(row.version, 4);
    assert_eq!(row.amount_in_transaction, dec!(3));
}

#[tokio::test]
async fn test_row_failure_is_isolated() {
    let fixture = fixture();
    let (machine_id, mut events) = committed_history(&fixture).await;

    // Corrupt one event's payload; applying it must error without
    // poisoning the synchronizer for other aggregates.
    events[0].payload = serde_json::json!({"type": "NoSuchEvent"});
    assert!(fixture.synchronizer.apply(&events[0]).await.is_err());

    let (other_id, other_events) = committed_history(&fixture).await;
    for event in &other_events {
        fixture.synchronizer.apply(event).await.unwrap();
    }
    assert!(fixture.store.machine(other_id).is_some());

    // The damaged row heals through catch-up, which folds the intact log.
    let created = fixture.synchronizer.sync_differences().await;
    assert_eq!(created, 1);
    assert_eq!(fixture.store.machine(machine_id).unwrap().version, 4);
}

#[tokio::test]
async fn test_periodic_scheduler_triggers_catch_up() {
    let (fleet, _log) = common::test_fleet();
    let (machine_id, _) = common::seed_machine(&fleet, 3, dec!(1)).await;

    let projections = fleet.projections().clone();
    let converged = common::wait_until(
        || {
            projections
                .machine(machine_id)
                .is_some_and(|row| row.version == 2)
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(converged);

    // Remove the row out-of-band; the scheduler's differences pass must
    // bring it back without any manual trigger.
    fleet.projections().remove_machine(machine_id);
    let scheduler = snack_fleet::jobs::SyncScheduler::with_config(
        fleet.synchronizer().clone(),
        snack_fleet::jobs::SyncSchedulerConfig {
            differences_interval: Duration::from_millis(25),
            full_resync_interval: Duration::from_secs(3600),
        },
    );
    let handle = scheduler.start();

    let healed = common::wait_until(
        || projections.machine(machine_id).is_some(),
        Duration::from_secs(2),
    )
    .await;
    assert!(healed, "scheduler never recreated the deleted row");

    handle.abort();
    fleet.shutdown().await;
}
