use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use scheduler_config::AppConfig;
use scheduler_dispatcher::{
    build_strategy, CoordinationStrategy, DispatchCoordinator, LockPollingStrategy, StrategyKind,
};
use scheduler_domain::{RobotLifecycle, RobotRegistration, SchedulerError, StateChange};
use scheduler_testing_utils::{init_test_logging, StrategyProbe, TransferRequestBuilder};

const WAIT: Duration = Duration::from_secs(10);

async fn started_probe(kind: StrategyKind, robots: usize) -> StrategyProbe {
    let strategy = build_strategy(kind, &AppConfig::default()).unwrap();
    let mut probe = StrategyProbe::new(strategy);
    probe.register_fleet(robots).await.unwrap();
    probe.strategy().start().await.unwrap();
    probe
}

#[tokio::test]
async fn test_every_strategy_completes_workload_without_violations() {
    init_test_logging();

    for kind in StrategyKind::ALL {
        let mut probe = started_probe(kind, 3).await;
        for request in TransferRequestBuilder::batch(1, 30) {
            probe.strategy().request_transfer(request).await.unwrap();
        }

        let completed = probe.drive(30, WAIT).await.unwrap();
        assert_eq!(completed.len(), 30, "{kind} did not finish");
        let unique: HashSet<u64> = completed.iter().copied().collect();
        assert_eq!(unique.len(), 30, "{kind} delivered an item twice");

        assert!(probe.settle(WAIT).await, "{kind} did not settle");
        let coordinator = probe.strategy().coordinator();
        assert!(coordinator.violations().await.is_empty(), "{kind} recorded violations");
        for robot in coordinator.robots().await {
            assert!(robot.invariant_holds());
        }
        assert_eq!(coordinator.stats().await.completed, 30);

        probe.strategy().stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_fifo_strategies_serve_single_robot_in_arrival_order() {
    let fifo = [
        StrategyKind::LockPolling,
        StrategyKind::EventPush,
        StrategyKind::Autonomous,
        StrategyKind::PubSubSingle,
        StrategyKind::PubSubDedicated,
        StrategyKind::SynchronizedBatch,
    ];

    for kind in fifo {
        let mut probe = started_probe(kind, 1).await;
        for request in TransferRequestBuilder::batch(1, 8) {
            probe.strategy().request_transfer(request).await.unwrap();
        }
        let completed = probe.drive(8, WAIT).await.unwrap();
        assert_eq!(completed, (1..=8).collect::<Vec<u64>>(), "{kind} broke arrival order");
        probe.strategy().stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_queued_request_follows_robot_back_to_idle() {
    let kinds = StrategyKind::ALL
        .into_iter()
        .filter(|kind| *kind != StrategyKind::SynchronizedBatch);

    for kind in kinds {
        let mut probe = started_probe(kind, 2).await;
        let strategy = probe.strategy().clone();

        strategy
            .request_transfer(TransferRequestBuilder::new().with_item(1).build())
            .await
            .unwrap();
        strategy
            .request_transfer(TransferRequestBuilder::new().with_item(2).build())
            .await
            .unwrap();

        let first = probe.next_assignment("R1", WAIT).await.unwrap();
        let second = probe.next_assignment("R2", WAIT).await.unwrap();
        probe.pick_up(&first).await.unwrap();

        strategy
            .request_transfer(TransferRequestBuilder::new().with_item(3).build())
            .await
            .unwrap();
        probe.place("R1").await.unwrap();

        let next = probe.next_assignment("R1", WAIT).await.unwrap();
        assert_eq!(next.item_id(), 3, "{kind} sent the queued request elsewhere");
        assert!(probe.try_assignment("R2").is_none());

        probe.complete(&second).await.unwrap();
        probe.complete(&next).await.unwrap();
        assert!(probe.settle(WAIT).await);
        strategy.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_batch_releases_only_when_fleet_is_idle() {
    let mut probe = started_probe(StrategyKind::SynchronizedBatch, 2).await;
    let strategy = probe.strategy().clone();

    for request in TransferRequestBuilder::batch(1, 5) {
        strategy.request_transfer(request).await.unwrap();
    }
    // The first request found the whole fleet idle and went out alone.
    let first = probe.next_assignment("R1", WAIT).await.unwrap();
    assert_eq!(first.item_id(), 1);
    assert!(probe.try_assignment("R2").is_none());
    assert_eq!(strategy.coordinator().queue_len().await, 4);

    probe.complete(&first).await.unwrap();
    let a = probe.next_assignment("R1", WAIT).await.unwrap();
    let b = probe.next_assignment("R2", WAIT).await.unwrap();
    assert_eq!((a.item_id(), b.item_id()), (2, 3));

    probe.complete(&a).await.unwrap();
    assert!(probe.try_assignment("R1").is_none());
    probe.complete(&b).await.unwrap();
    assert_eq!(probe.next_assignment("R1", WAIT).await.unwrap().item_id(), 4);
    assert_eq!(probe.next_assignment("R2", WAIT).await.unwrap().item_id(), 5);

    strategy.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_robot_and_duplicate_registration_are_reported() {
    for kind in StrategyKind::ALL {
        let probe = started_probe(kind, 1).await;
        let strategy = probe.strategy();

        let err = strategy
            .notify_robot_state_changed(StateChange::placed("ghost"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, SchedulerError::RobotNotFound { .. }),
            "{kind} returned {err}"
        );

        let err = strategy
            .register_robot(RobotRegistration::new("R1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateRobot { .. }));

        strategy.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    for kind in StrategyKind::ALL {
        let probe = started_probe(kind, 1).await;
        let strategy = probe.strategy();

        strategy.start().await.unwrap();
        strategy.stop().await.unwrap();
        strategy.stop().await.unwrap();

        let err = strategy
            .request_transfer(TransferRequestBuilder::new().build())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::StrategyStopped(_)));
        assert!(strategy
            .register_robot(RobotRegistration::new("R2"))
            .await
            .is_err());
        assert!(strategy
            .notify_robot_state_changed(StateChange::placed("R1"))
            .await
            .is_err());
        assert!(strategy.start().await.is_err());
    }
}

#[tokio::test]
async fn test_lock_polling_defers_state_changes_to_poller() {
    let strategy = build_strategy(StrategyKind::LockPolling, &AppConfig::default()).unwrap();
    let mut probe = StrategyProbe::new(strategy.clone());
    probe.register_fleet(1).await.unwrap();

    strategy
        .request_transfer(TransferRequestBuilder::new().with_item(1).build())
        .await
        .unwrap();
    let assignment = probe.next_assignment("R1", WAIT).await.unwrap();

    // Not started: signals wait on the board.
    probe.complete(&assignment).await.unwrap();
    assert_eq!(
        strategy.coordinator().stats().await.completed,
        0
    );

    strategy.start().await.unwrap();
    assert!(probe.settle(WAIT).await);
    assert_eq!(strategy.coordinator().stats().await.completed, 1);
    strategy.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_lock_polling_applies_signals_on_the_next_tick() {
    let coordinator = Arc::new(DispatchCoordinator::with_defaults("lock"));
    let strategy = LockPollingStrategy::new(Arc::clone(&coordinator), Duration::from_secs(1));
    let mut inbox = strategy
        .register_robot(RobotRegistration::new("R1"))
        .await
        .unwrap();
    strategy.start().await.unwrap();
    // Let the poller consume its immediate first tick.
    tokio::time::sleep(Duration::from_millis(10)).await;

    strategy
        .request_transfer(TransferRequestBuilder::new().with_item(1).build())
        .await
        .unwrap();
    assert_eq!(inbox.try_recv().unwrap().item_id(), 1);
    strategy
        .notify_robot_state_changed(StateChange::picked_up("R1", 1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(strategy.pending_signals().await, 1);
    assert_eq!(
        coordinator.robot_state("R1").await.unwrap().state,
        RobotLifecycle::Busy
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(strategy.pending_signals().await, 0);
    assert_eq!(
        coordinator.robot_state("R1").await.unwrap().state,
        RobotLifecycle::Carrying
    );
    strategy.stop().await.unwrap();
}

#[tokio::test]
async fn test_autonomous_request_waits_behind_unclaimed_queue() {
    let strategy = build_strategy(StrategyKind::Autonomous, &AppConfig::default()).unwrap();
    let mut probe = StrategyProbe::new(strategy.clone());
    probe.register_fleet(1).await.unwrap();
    strategy.start().await.unwrap();

    for item in [1, 2] {
        strategy
            .request_transfer(TransferRequestBuilder::new().with_item(item).build())
            .await
            .unwrap();
    }
    let first = probe.next_assignment("R1", WAIT).await.unwrap();
    assert_eq!(first.item_id(), 1);

    // Robot is back to idle but has not claimed item 2 yet.
    let coordinator = strategy.coordinator();
    coordinator
        .update_robot_state("R1", RobotLifecycle::Carrying, Some(1), None)
        .await
        .unwrap();
    coordinator
        .update_robot_state("R1", RobotLifecycle::Idle, None, None)
        .await
        .unwrap();
    strategy
        .request_transfer(TransferRequestBuilder::new().with_item(3).build())
        .await
        .unwrap();

    let completed = probe.drive(2, WAIT).await.unwrap();
    assert_eq!(completed, vec![2, 3]);
    assert_eq!(coordinator.violation_count().await, 0);
    strategy.stop().await.unwrap();
}

#[tokio::test]
async fn test_pubsub_single_applies_messages_published_before_start() {
    let strategy = build_strategy(StrategyKind::PubSubSingle, &AppConfig::default()).unwrap();
    let mut probe = StrategyProbe::new(strategy.clone());
    probe.register_fleet(2).await.unwrap();

    for request in TransferRequestBuilder::batch(1, 4) {
        strategy.request_transfer(request).await.unwrap();
    }
    assert_eq!(strategy.coordinator().stats().await.dispatched, 0);

    strategy.start().await.unwrap();
    let completed = probe.drive(4, WAIT).await.unwrap();
    assert_eq!(completed.len(), 4);
    strategy.stop().await.unwrap();
}

#[tokio::test]
async fn test_heuristic_strategy_uses_scored_policy() {
    let strategy = build_strategy("ant".parse().unwrap(), &AppConfig::default()).unwrap();
    assert_eq!(strategy.kind(), StrategyKind::Heuristic);
    assert_eq!(strategy.coordinator().policy().code(), "scored");
    assert_eq!(strategy.kind().mode().as_str(), "event");
}
