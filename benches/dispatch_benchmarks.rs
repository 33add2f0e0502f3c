use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scheduler_benchmark::BenchmarkHarness;
use scheduler_config::AppConfig;
use scheduler_dispatcher::{
    AssignmentReceiver, CoordinatorSettings, DispatchCoordinator, DispatchPolicy, StrategyKind,
};
use scheduler_domain::{RobotLifecycle, RobotRegistration, TransferRequest};
use tokio::runtime::Runtime;

/// Push `items` requests through the coordinator and confirm every transfer
/// from a single task, so only the coordinator itself is measured.
async fn coordinator_cycle(policy: DispatchPolicy, robots: usize, items: u64) -> usize {
    let coordinator = DispatchCoordinator::new(CoordinatorSettings {
        label: "bench".to_string(),
        policy,
        ..CoordinatorSettings::default()
    })
    .unwrap();

    let mut inboxes: Vec<(String, AssignmentReceiver)> = Vec::with_capacity(robots);
    for n in 1..=robots {
        let id = format!("R{n}");
        let inbox = coordinator
            .register_robot(RobotRegistration::new(id.as_str()))
            .await
            .unwrap();
        inboxes.push((id, inbox));
    }

    for item in 1..=items {
        let mut request = TransferRequest::new(item, "carrier-0", format!("PM{}", item % 4 + 1));
        request.priority = Some((item % 3) as u8);
        coordinator.request_transfer(request).await.unwrap();
    }

    let mut done = 0u64;
    while done < items {
        for (id, inbox) in inboxes.iter_mut() {
            while let Ok(assignment) = inbox.try_recv() {
                coordinator
                    .update_robot_state(
                        id,
                        RobotLifecycle::Carrying,
                        Some(assignment.item_id()),
                        None,
                    )
                    .await
                    .unwrap();
                coordinator
                    .update_robot_state(id, RobotLifecycle::Idle, None, None)
                    .await
                    .unwrap();
                done += 1;
            }
        }
    }
    coordinator.violation_count().await
}

fn bench_coordinator_policies(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("coordinator_dispatch");

    for items in [100u64, 1_000] {
        group.throughput(Throughput::Elements(items));
        for (name, policy) in [("fifo", DispatchPolicy::Fifo), ("priority", DispatchPolicy::Priority)] {
            group.bench_with_input(BenchmarkId::new(name, items), &items, |b, &items| {
                b.iter(|| {
                    let violations = runtime.block_on(coordinator_cycle(policy.clone(), 4, items));
                    std::hint::black_box(violations);
                })
            });
        }
    }

    group.finish();
}

fn bench_strategies_end_to_end(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("strategy_end_to_end");
    group.sample_size(10);

    let mut config = AppConfig::default();
    config.benchmark.robots = 3;
    config.benchmark.carrier_groups = 2;
    config.benchmark.items_per_group = 25;
    config.benchmark.cycles = 2;
    group.throughput(Throughput::Elements(config.benchmark.total_transfers() as u64));

    for kind in StrategyKind::ALL {
        let harness = BenchmarkHarness::new(config.clone());
        group.bench_function(kind.code(), |b| {
            b.iter(|| {
                let report = runtime.block_on(harness.run_one(kind));
                std::hint::black_box(report);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_coordinator_policies, bench_strategies_end_to_end);
criterion_main!(benches);
