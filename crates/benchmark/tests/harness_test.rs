use scheduler_benchmark::{BenchmarkHarness, ShutdownSignal, Verdict};
use scheduler_config::AppConfig;
use scheduler_dispatcher::StrategyKind;
use scheduler_domain::{RobotEvent, TransitionTable};
use scheduler_testing_utils::init_test_logging;

fn small_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.benchmark.robots = 3;
    config.benchmark.carrier_groups = 2;
    config.benchmark.items_per_group = 10;
    config.benchmark.cycles = 2;
    config.benchmark.timeout_seconds = 30;
    config
}

#[tokio::test]
async fn test_every_strategy_passes_reduced_workload() {
    init_test_logging();
    let harness = BenchmarkHarness::new(small_config());
    assert_eq!(harness.total_transfers(), 40);

    let summary = harness.run_all().await;
    assert_eq!(summary.runs.len(), StrategyKind::ALL.len());
    for run in &summary.runs {
        assert_eq!(run.verdict, Verdict::Pass, "{} failed: {:?}", run.strategy, run.reason);
        assert_eq!(run.completed, 40);
        assert_eq!(run.violations, 0);
        let stats = run.stats.expect("stats recorded");
        assert_eq!(stats.dispatched, 40);
        assert_eq!(stats.completed, 40);
    }
    assert!(summary.all_passed());
}

#[tokio::test]
async fn test_bounded_in_flight_window_still_completes() {
    let mut config = small_config();
    config.benchmark.max_in_flight = 2;
    config.benchmark.priority_levels = 3;
    config.coordinator.dispatch_policy = "priority".to_string();
    let harness = BenchmarkHarness::new(config);

    let report = harness.run_one(StrategyKind::EventPush).await;
    assert!(report.passed(), "{:?}", report.reason);
    let stats = report.stats.unwrap();
    assert!(stats.max_queue_depth <= 2);
}

#[tokio::test]
async fn test_unknown_code_fails_and_later_runs_continue() {
    let mut config = small_config();
    config.strategies.enabled = vec!["genetic".to_string(), "actor".to_string()];
    let summary = BenchmarkHarness::new(config).run_all().await;

    assert_eq!(summary.runs.len(), 2);
    assert_eq!(summary.runs[0].strategy, "genetic");
    assert_eq!(summary.runs[0].mode, "-");
    assert_eq!(summary.runs[0].verdict, Verdict::Fail);
    assert!(summary.runs[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("unknown strategy code"));
    assert!(summary.runs[1].passed());
    assert_eq!(summary.failed_runs(), 1);
}

#[tokio::test]
async fn test_malformed_transition_table_reports_init_failure() {
    let mut table = TransitionTable::standard();
    table
        .rules
        .retain(|rule| rule.event != RobotEvent::PickupConfirmed);
    let mut config = small_config();
    config.coordinator.transition_table = Some(table);

    let report = BenchmarkHarness::new(config)
        .run_one(StrategyKind::LockPolling)
        .await;
    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.completed, 0);
    assert!(report.reason.unwrap().contains("failed to initialize"));
}

#[tokio::test]
async fn test_run_that_cannot_finish_in_time_fails() {
    let mut config = small_config();
    config.benchmark.robots = 1;
    config.benchmark.pickup_delay_us = 50_000;
    config.benchmark.place_delay_us = 50_000;
    config.benchmark.timeout_seconds = 1;

    let report = BenchmarkHarness::new(config)
        .run_one(StrategyKind::EventPush)
        .await;
    assert_eq!(report.verdict, Verdict::Fail);
    assert!(report.completed < report.total);
    assert!(report.reason.unwrap().contains("timed out"));
    assert_eq!(report.violations, 0);
}

#[tokio::test]
async fn test_shutdown_before_run_skips_remaining_strategies() {
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();
    let summary = BenchmarkHarness::new(small_config())
        .with_shutdown(shutdown)
        .run_all()
        .await;
    assert!(summary.runs.is_empty());
    assert!(!summary.all_passed());
}
