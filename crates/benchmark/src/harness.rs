//! Drives one workload against each configured strategy in turn.
//!
//! A run registers the fleet, spawns one agent task per robot, starts the
//! strategy and issues the workload, then counts completions until every
//! transfer is done, the timeout expires, or shutdown is requested. Any
//! failure becomes a failed report and the next strategy still runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{error, info, warn};

use scheduler_config::AppConfig;
use scheduler_dispatcher::{build_strategy, CoordinationStrategy, StrategyKind};
use scheduler_domain::{RobotRegistration, SchedulerError, SchedulerResult};

use crate::report::{BenchmarkSummary, RunReport, Verdict};
use crate::robot_agent::{AgentSummary, Completion, RobotAgent};
use crate::shutdown::{ShutdownListener, ShutdownSignal};
use crate::workload::Workload;

enum RunEnd {
    Finished,
    TimedOut,
    Interrupted,
    Failed(String),
}

pub struct BenchmarkHarness {
    config: AppConfig,
    shutdown: ShutdownSignal,
}

impl BenchmarkHarness {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Share an externally owned signal, e.g. one wired to Ctrl-C.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn total_transfers(&self) -> u64 {
        self.config.benchmark.total_transfers() as u64
    }

    /// Run every strategy code in `strategies.enabled`, in order.
    pub async fn run_all(&self) -> BenchmarkSummary {
        let mut summary = BenchmarkSummary::default();
        for code in &self.config.strategies.enabled {
            if self.shutdown.is_triggered() {
                warn!(strategy = %code, "shutdown requested, remaining runs skipped");
                break;
            }
            let report = match code.parse::<StrategyKind>() {
                Ok(kind) => self.run_one(kind).await,
                Err(e) => {
                    error!(strategy = %code, error = %e, "strategy cannot be built");
                    RunReport::failed(code.as_str(), "-", self.total_transfers(), e.to_string())
                }
            };
            summary.runs.push(report);
        }
        summary
    }

    pub async fn run_one(&self, kind: StrategyKind) -> RunReport {
        info!(
            strategy = kind.code(),
            mode = %kind.mode(),
            robots = self.config.benchmark.robots,
            transfers = self.total_transfers(),
            "benchmark run starting"
        );
        match self.execute(kind).await {
            Ok(report) => {
                info!(
                    strategy = kind.code(),
                    verdict = %report.verdict,
                    completed = report.completed,
                    total = report.total,
                    elapsed_s = report.elapsed_seconds,
                    violations = report.violations,
                    "benchmark run finished"
                );
                report
            }
            Err(e) => {
                error!(strategy = kind.code(), error = %e, "benchmark run failed");
                RunReport::failed(
                    kind.code(),
                    kind.mode().as_str(),
                    self.total_transfers(),
                    e.to_string(),
                )
            }
        }
    }

    async fn execute(&self, kind: StrategyKind) -> SchedulerResult<RunReport> {
        let bench = &self.config.benchmark;
        let total = self.total_transfers();
        let strategy = build_strategy(kind, &self.config)?;

        let agent_stop = ShutdownSignal::new();
        let (completion_tx, mut completions) = mpsc::unbounded_channel();
        let mut agents = Vec::with_capacity(bench.robots);
        for n in 1..=bench.robots {
            let robot_id = format!("R{n}");
            let registration = RobotRegistration::new(robot_id.as_str())
                .with_home_station(format!("carrier-{}", (n - 1) % bench.carrier_groups));
            let inbox = strategy.register_robot(registration).await?;
            let agent = RobotAgent::new(robot_id, Arc::clone(&strategy), inbox, completion_tx.clone())
                .with_delays(
                    Duration::from_micros(bench.pickup_delay_us),
                    Duration::from_micros(bench.place_delay_us),
                );
            agents.push(agent.spawn(agent_stop.subscribe()));
        }
        drop(completion_tx);

        if let Err(e) = strategy.start().await {
            agent_stop.trigger();
            join_agents(agents).await;
            return Err(SchedulerError::strategy_init(kind.code(), e.to_string()));
        }

        let window = (bench.max_in_flight > 0).then(|| Arc::new(Semaphore::new(bench.max_in_flight)));
        let started = Instant::now();
        let deadline = started + Duration::from_secs(bench.timeout_seconds);

        let mut requester: JoinHandle<SchedulerResult<u64>> = tokio::spawn(issue_requests(
            Arc::clone(&strategy),
            Workload::from_config(bench),
            Duration::from_micros(bench.request_interval_us),
            window.clone(),
            self.shutdown.subscribe(),
        ));
        let mut requester_done = false;
        let mut interrupt = self.shutdown.subscribe();

        let mut completed: u64 = 0;
        let end = loop {
            if completed >= total {
                break RunEnd::Finished;
            }
            tokio::select! {
                _ = sleep_until(deadline) => break RunEnd::TimedOut,
                _ = interrupt.recv() => break RunEnd::Interrupted,
                joined = &mut requester, if !requester_done => {
                    requester_done = true;
                    match joined {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => break RunEnd::Failed(format!("request issue failed: {e}")),
                        Err(e) => break RunEnd::Failed(format!("request task panicked: {e}")),
                    }
                }
                next = completions.recv() => match next {
                    Some(Completion { .. }) => {
                        completed += 1;
                        if let Some(window) = &window {
                            window.add_permits(1);
                        }
                    }
                    None => break RunEnd::Failed("all robot agents exited".to_string()),
                },
            }
        };
        let elapsed = started.elapsed();

        if !requester_done {
            requester.abort();
        }
        agent_stop.trigger();
        strategy.stop().await?;
        let summaries = join_agents(agents).await;
        let agent_errors: u64 = summaries.iter().map(|s| s.errors).sum();

        let coordinator = strategy.coordinator();
        let violations = coordinator.violation_count().await;
        let stats = coordinator.stats().await;

        let ratio = if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        };
        let reason = match &end {
            RunEnd::Finished | RunEnd::TimedOut if violations > 0 => {
                Some(format!("{violations} invariant violation(s) recorded"))
            }
            RunEnd::Finished => None,
            RunEnd::TimedOut => Some(format!(
                "timed out after {}s with {completed}/{total} transfers completed",
                bench.timeout_seconds
            )),
            RunEnd::Interrupted => Some("interrupted by shutdown".to_string()),
            RunEnd::Failed(reason) => Some(reason.clone()),
        };
        let verdict = match end {
            RunEnd::Finished | RunEnd::TimedOut
                if ratio >= bench.pass_threshold && violations == 0 =>
            {
                Verdict::Pass
            }
            _ => Verdict::Fail,
        };
        if agent_errors > 0 {
            warn!(strategy = kind.code(), agent_errors, "robot agents reported errors");
        }

        Ok(RunReport {
            strategy: kind.code().to_string(),
            mode: kind.mode().as_str().to_string(),
            elapsed_seconds: elapsed.as_secs_f64(),
            completed,
            total,
            violations,
            verdict,
            reason: if verdict == Verdict::Pass { None } else { reason },
            stats: Some(stats),
        })
    }
}

async fn issue_requests(
    strategy: Arc<dyn CoordinationStrategy>,
    workload: Workload,
    interval: Duration,
    window: Option<Arc<Semaphore>>,
    shutdown: ShutdownListener,
) -> SchedulerResult<u64> {
    let mut issued: u64 = 0;
    for request in workload {
        if shutdown.is_triggered() {
            break;
        }
        if let Some(window) = &window {
            let permit = window
                .acquire()
                .await
                .map_err(|e| SchedulerError::Benchmark(e.to_string()))?;
            // Returned by the completion loop, not on drop.
            permit.forget();
        }
        strategy.request_transfer(request).await?;
        issued += 1;

        if !interval.is_zero() {
            sleep(interval).await;
        } else if issued % 256 == 0 {
            tokio::task::yield_now().await;
        }
    }
    Ok(issued)
}

async fn join_agents(agents: Vec<JoinHandle<AgentSummary>>) -> Vec<AgentSummary> {
    let mut summaries = Vec::with_capacity(agents.len());
    for agent in agents {
        match agent.await {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!(error = %e, "robot agent task failed"),
        }
    }
    summaries
}
