//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rust_decimal::Decimal;
use uuid::Uuid;

use snack_fleet::event_store::{
    AppendRequest, EventLog, EventLogError, InMemoryEventLog, StoredEvent,
};
use snack_fleet::{
    Config, MachineCommand, Money, OperationContext, Slot, SnackFleet, SnackPile,
};

/// Install a test subscriber once so `RUST_LOG=debug cargo test` shows the
/// runtime and synchronizer traces.
pub fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fast-cycling configuration for tests.
pub fn test_config() -> Config {
    Config {
        actor_idle_timeout: Duration::from_secs(60),
        activation_timeout: Duration::from_secs(5),
        mailbox_capacity: 16,
        stream_capacity: 256,
        sync_differences_interval: Duration::from_millis(50),
        full_resync_interval: Duration::from_secs(3600),
        environment: "test".to_string(),
    }
}

/// Build a fleet over a shared in-memory log so tests can inspect streams.
pub fn test_fleet() -> (SnackFleet, Arc<InMemoryEventLog>) {
    init_tracing();
    let log = Arc::new(InMemoryEventLog::new());
    let fleet = SnackFleet::with_log(log.clone(), &test_config());
    (fleet, log)
}

/// Initialize a machine with three empty slots and stock slot 0.
pub async fn seed_machine(
    fleet: &SnackFleet,
    quantity: u32,
    price: Decimal,
) -> (Uuid, Uuid) {
    let machine_id = Uuid::new_v4();
    let snack_id = Uuid::new_v4();
    let ctx = OperationContext::new();

    fleet
        .machine_command(
            machine_id,
            MachineCommand::Initialize {
                machine_id,
                money_inside: Money::none(),
                slots: vec![Slot::empty(0), Slot::empty(1), Slot::empty(2)],
            },
            &ctx,
        )
        .await
        .expect("machine initialize failed");
    fleet
        .machine_command(
            machine_id,
            MachineCommand::LoadSnacks {
                position: 0,
                pile: SnackPile::new(snack_id, quantity, price).expect("invalid test pile"),
            },
            &ctx,
        )
        .await
        .expect("load snacks failed");

    (machine_id, snack_id)
}

/// Event log wrapper with switchable failure injection, for exercising
/// activation and commit failure paths.
pub struct FlakyLog {
    inner: InMemoryEventLog,
    fail_appends: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakyLog {
    pub fn new() -> Self {
        Self {
            inner: InMemoryEventLog::new(),
            fail_appends: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl EventLog for FlakyLog {
    fn append(&self, request: AppendRequest) -> BoxFuture<'_, Result<StoredEvent, EventLogError>> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(EventLogError::Backend("injected append failure".to_string()))
            });
        }
        self.inner.append(request)
    }

    fn read_all(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            let aggregate_id = aggregate_id.to_string();
            return Box::pin(async move {
                Err(EventLogError::Unreadable {
                    aggregate_id,
                    detail: "injected read failure".to_string(),
                })
            });
        }
        self.inner.read_all(aggregate_type, aggregate_id)
    }

    fn read_namespace(
        &self,
        aggregate_type: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>> {
        self.inner.read_namespace(aggregate_type)
    }

    fn ids(&self, aggregate_type: &str) -> BoxFuture<'_, Result<Vec<String>, EventLogError>> {
        self.inner.ids(aggregate_type)
    }
}

/// Poll until `check` passes or the deadline expires; eventual-consistency
/// assertions on the projection store use this instead of fixed sleeps.
pub async fn wait_until<F: Fn() -> bool>(check: F, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

