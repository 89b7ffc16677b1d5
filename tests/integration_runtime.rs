//! Runtime behavior under failure injection: activation failures, commit
//! failures, and recovery by replay.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use uuid::Uuid;

use snack_fleet::event_store::EventLog;
use snack_fleet::runtime::{Runtime, RuntimeConfig};
use snack_fleet::stream::EventStream;
use snack_fleet::{
    Aggregate, AppError, Denomination, MachineCommand, Money, OperationContext, Slot,
    SnackMachine,
};

mod common;

fn flaky_runtime() -> (Runtime<SnackMachine>, Arc<common::FlakyLog>) {
    let log = Arc::new(common::FlakyLog::new());
    let runtime = Runtime::new(
        log.clone() as Arc<dyn EventLog>,
        EventStream::default(),
        RuntimeConfig {
            idle_timeout: Duration::from_secs(60),
            mailbox_capacity: 16,
            ..RuntimeConfig::default()
        },
    );
    (runtime, log)
}

fn initialize_command(machine_id: Uuid) -> MachineCommand {
    MachineCommand::Initialize {
        machine_id,
        money_inside: Money::none(),
        slots: vec![Slot::empty(0)],
    }
}

#[tokio::test]
async fn test_activation_failure_fails_messages_for_that_id_only() {
    let (runtime, log) = flaky_runtime();
    let ctx = OperationContext::new();
    let healthy_id = Uuid::new_v4();
    let broken_id = Uuid::new_v4();

    runtime
        .execute(&healthy_id, initialize_command(healthy_id), &ctx)
        .await
        .unwrap();

    log.fail_reads(true);
    // The broken id cannot replay; its command gets an activation error.
    let err = runtime
        .execute(&broken_id, initialize_command(broken_id), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ActivationFailed { .. }));

    // The healthy, already-resident id is unaffected.
    let machine = runtime.query(&healthy_id).await.unwrap();
    assert_eq!(machine.version(), 1);

    // Once the log heals, the broken id activates normally.
    log.fail_reads(false);
    runtime
        .execute(&broken_id, initialize_command(broken_id), &ctx)
        .await
        .unwrap();
    assert_eq!(runtime.query(&broken_id).await.unwrap().version(), 1);
}

#[tokio::test]
async fn test_commit_failure_discards_candidate_state() {
    let (runtime, log) = flaky_runtime();
    let ctx = OperationContext::new();
    let machine_id = Uuid::new_v4();

    runtime
        .execute(&machine_id, initialize_command(machine_id), &ctx)
        .await
        .unwrap();

    log.fail_appends(true);
    let err = runtime
        .execute(
            &machine_id,
            MachineCommand::LoadMoney {
                money: Money::single(Denomination::Ten),
            },
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CommitFailed(_)));

    // The validated-but-uncommitted mutation left no trace: version and
    // state still reflect only the committed history.
    let machine = runtime.query(&machine_id).await.unwrap();
    assert_eq!(machine.version(), 1);
    assert_eq!(machine.money_inside().amount(), dec!(0));

    // And the same command succeeds once the log heals.
    log.fail_appends(false);
    runtime
        .execute(
            &machine_id,
            MachineCommand::LoadMoney {
                money: Money::single(Denomination::Ten),
            },
            &ctx,
        )
        .await
        .unwrap();
    let machine = runtime.query(&machine_id).await.unwrap();
    assert_eq!(machine.version(), 2);
    assert_eq!(machine.money_inside().amount(), dec!(10));
}

#[tokio::test]
async fn test_commands_queued_behind_commit_failure_still_run() {
    let (runtime, log) = flaky_runtime();
    let runtime = Arc::new(runtime);
    let ctx = OperationContext::new();
    let machine_id = Uuid::new_v4();

    runtime
        .execute(&machine_id, initialize_command(machine_id), &ctx)
        .await
        .unwrap();

    log.fail_appends(true);
    let failing = {
        let runtime = Arc::clone(&runtime);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            runtime
                .execute(
                    &machine_id,
                    MachineCommand::LoadMoney {
                        money: Money::single(Denomination::One),
                    },
                    &ctx,
                )
                .await
        })
    };
    let result = failing.await.unwrap();
    assert!(matches!(result, Err(AppError::CommitFailed(_))));

    // The worker recovered by replay and keeps serving this id.
    log.fail_appends(false);
    runtime
        .execute(
            &machine_id,
            MachineCommand::LoadMoney {
                money: Money::single(Denomination::Two),
            },
            &ctx,
        )
        .await
        .unwrap();
    let machine = runtime.query(&machine_id).await.unwrap();
    assert_eq!(machine.version(), 2);
    assert_eq!(machine.money_inside().amount(), dec!(2));
}

#[tokio::test]
async fn test_interleaved_queries_see_committed_snapshots() {
    let (fleet, _log) = common::test_fleet();
    let (machine_id, _) = common::seed_machine(&fleet, 5, dec!(1)).await;
    let ctx = OperationContext::new();

    // Fire a burst of writes while querying concurrently; every query must
    // observe a committed snapshot (monotonic version, consistent money).
    let fleet = Arc::new(fleet);
    let writer = {
        let fleet = Arc::clone(&fleet);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                fleet
                    .machine_command(
                        machine_id,
                        MachineCommand::LoadMoney {
                            money: Money::single(Denomination::One),
                        },
                        &ctx,
                    )
                    .await
                    .unwrap();
            }
        })
    };

    let mut last_version = 0;
    for _ in 0..50 {
        let machine = fleet.machine(machine_id).await.unwrap();
        assert!(machine.version() >= last_version, "snapshot went backwards");
        // Amount always equals the fold of the committed events.
        assert_eq!(
            machine.money_inside().amount(),
            rust_decimal::Decimal::from(machine.version() - 2)
        );
        last_version = machine.version();
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    let machine = fleet.machine(machine_id).await.unwrap();
    assert_eq!(machine.version(), 22);
}
