//! Coordination strategies: interchangeable trigger mechanisms in front of
//! one [`DispatchCoordinator`].
//!
//! Every variant funnels mutation through the coordinator, either by calling
//! it directly under its mutex or by feeding a channel that one task drains.
//! None of them keeps a private copy of robot state.

mod autonomous;
mod event_push;
mod heuristic;
mod lock_polling;
mod pubsub_dedicated;
mod pubsub_single;
mod synchronized_batch;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use scheduler_config::AppConfig;
use scheduler_domain::{
    RobotRegistration, SchedulerError, SchedulerResult, StateChange, TransferRequest,
    TransitionAction, TransitionTable,
};

use crate::coordinator::{
    AssignmentReceiver, CoordinatorSettings, DispatchCoordinator, DispatchPolicy,
};
use crate::scoring::build_scorer;

pub use autonomous::AutonomousStrategy;
pub use event_push::EventPushStrategy;
pub use heuristic::HeuristicStrategy;
pub use lock_polling::LockPollingStrategy;
pub use pubsub_dedicated::PubSubDedicatedStrategy;
pub use pubsub_single::PubSubSingleStrategy;
pub use synchronized_batch::SynchronizedBatchStrategy;

/// Common contract of every coordination strategy.
#[async_trait]
pub trait CoordinationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn coordinator(&self) -> &Arc<DispatchCoordinator>;

    async fn register_robot(
        &self,
        registration: RobotRegistration,
    ) -> SchedulerResult<AssignmentReceiver>;

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()>;

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()>;

    async fn start(&self) -> SchedulerResult<()>;

    async fn stop(&self) -> SchedulerResult<()>;

    fn name(&self) -> &'static str {
        self.kind().code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    LockPolling,
    EventPush,
    Autonomous,
    PubSubSingle,
    PubSubDedicated,
    Heuristic,
    SynchronizedBatch,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::LockPolling,
        StrategyKind::EventPush,
        StrategyKind::Autonomous,
        StrategyKind::PubSubSingle,
        StrategyKind::PubSubDedicated,
        StrategyKind::Heuristic,
        StrategyKind::SynchronizedBatch,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            StrategyKind::LockPolling => "lock",
            StrategyKind::EventPush => "actor",
            StrategyKind::Autonomous => "autonomous",
            StrategyKind::PubSubSingle => "pubsub-single",
            StrategyKind::PubSubDedicated => "pubsub-dedicated",
            StrategyKind::Heuristic => "heuristic",
            StrategyKind::SynchronizedBatch => "batch",
        }
    }

    pub fn mode(&self) -> CommunicationMode {
        match self {
            StrategyKind::LockPolling => CommunicationMode::Polling,
            StrategyKind::EventPush | StrategyKind::Autonomous | StrategyKind::Heuristic => {
                CommunicationMode::Event
            }
            StrategyKind::PubSubSingle => CommunicationMode::One,
            StrategyKind::PubSubDedicated => CommunicationMode::Multi,
            StrategyKind::SynchronizedBatch => CommunicationMode::Batch,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StrategyKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "lock" => Ok(StrategyKind::LockPolling),
            "actor" => Ok(StrategyKind::EventPush),
            "autonomous" => Ok(StrategyKind::Autonomous),
            "pubsub-single" => Ok(StrategyKind::PubSubSingle),
            "pubsub-dedicated" => Ok(StrategyKind::PubSubDedicated),
            "heuristic" | "ant" => Ok(StrategyKind::Heuristic),
            "batch" => Ok(StrategyKind::SynchronizedBatch),
            other => Err(SchedulerError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Report tag describing how state changes reach the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationMode {
    Polling,
    Event,
    One,
    Multi,
    Batch,
}

impl CommunicationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMode::Polling => "polling",
            CommunicationMode::Event => "event",
            CommunicationMode::One => "one",
            CommunicationMode::Multi => "multi",
            CommunicationMode::Batch => "batch",
        }
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a ready-to-start strategy from configuration. A transition table
/// that fails validation surfaces as `StrategyInit` for this strategy only.
pub fn build_strategy(
    kind: StrategyKind,
    config: &AppConfig,
) -> SchedulerResult<Arc<dyn CoordinationStrategy>> {
    let base = config
        .coordinator
        .transition_table
        .clone()
        .unwrap_or_else(TransitionTable::standard);

    let (table, policy) = match kind {
        StrategyKind::Autonomous | StrategyKind::SynchronizedBatch => (
            base.without_action(TransitionAction::DrainQueue),
            configured_policy(config)?,
        ),
        StrategyKind::Heuristic => {
            let scorer = build_scorer(&config.strategies.heuristic)
                .map_err(|e| SchedulerError::strategy_init(kind.code(), e.to_string()))?;
            (
                base,
                DispatchPolicy::Scored {
                    scorer,
                    lookahead: config.strategies.heuristic.lookahead,
                },
            )
        }
        _ => (base, configured_policy(config)?),
    };

    let coordinator = DispatchCoordinator::new(CoordinatorSettings {
        label: kind.code().to_string(),
        table,
        policy,
        starvation_limit: config.coordinator.starvation_limit,
    })
    .map(Arc::new)
    .map_err(|e| SchedulerError::strategy_init(kind.code(), e.to_string()))?;

    info!(
        strategy = kind.code(),
        mode = %kind.mode(),
        policy = coordinator.policy().code(),
        "strategy built"
    );

    let strategy: Arc<dyn CoordinationStrategy> = match kind {
        StrategyKind::LockPolling => Arc::new(LockPollingStrategy::new(
            coordinator,
            std::time::Duration::from_millis(config.strategies.polling_interval_ms),
        )),
        StrategyKind::EventPush => Arc::new(EventPushStrategy::new(coordinator)),
        StrategyKind::Autonomous => Arc::new(AutonomousStrategy::new(coordinator)),
        StrategyKind::PubSubSingle => Arc::new(PubSubSingleStrategy::new(coordinator)),
        StrategyKind::PubSubDedicated => Arc::new(PubSubDedicatedStrategy::new(coordinator)),
        StrategyKind::Heuristic => Arc::new(HeuristicStrategy::new(coordinator)),
        StrategyKind::SynchronizedBatch => {
            Arc::new(SynchronizedBatchStrategy::new(coordinator))
        }
    };
    Ok(strategy)
}

/// Parse a strategy code and build it.
pub fn build_strategy_by_code(
    code: &str,
    config: &AppConfig,
) -> SchedulerResult<Arc<dyn CoordinationStrategy>> {
    build_strategy(code.parse()?, config)
}

fn configured_policy(config: &AppConfig) -> SchedulerResult<DispatchPolicy> {
    match config.coordinator.dispatch_policy.as_str() {
        "fifo" => Ok(DispatchPolicy::Fifo),
        "priority" => Ok(DispatchPolicy::Priority),
        "scored" => Ok(DispatchPolicy::Scored {
            scorer: build_scorer(&config.strategies.heuristic)?,
            lookahead: config.strategies.heuristic.lookahead,
        }),
        other => Err(SchedulerError::config_error(format!(
            "unknown dispatch policy: {other}"
        ))),
    }
}

/// Start/stop bookkeeping shared by the strategies. Both transitions are
/// one-shot; repeating them is a no-op.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    started: AtomicBool,
    stopped: AtomicBool,
}

impl RunState {
    /// Returns true on the first call only.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    /// Returns true on the first call only.
    pub(crate) fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_active(&self, kind: StrategyKind) -> SchedulerResult<()> {
        if self.is_stopped() {
            return Err(SchedulerError::StrategyStopped(kind.code().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_codes_roundtrip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.code().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!("ant".parse::<StrategyKind>().unwrap(), StrategyKind::Heuristic);
        assert_eq!(" Batch ".parse::<StrategyKind>().unwrap(), StrategyKind::SynchronizedBatch);
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = "genetic".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownStrategy(code) if code == "genetic"));
        assert!(build_strategy_by_code("genetic", &AppConfig::default()).is_err());
    }

    #[test]
    fn test_communication_modes() {
        let modes: Vec<&str> = StrategyKind::ALL
            .iter()
            .map(|kind| kind.mode().as_str())
            .collect();
        assert_eq!(
            modes,
            vec!["polling", "event", "event", "one", "multi", "event", "batch"]
        );
    }

    #[test]
    fn test_run_state_is_one_shot() {
        let run = RunState::default();
        assert!(run.ensure_active(StrategyKind::EventPush).is_ok());
        assert!(run.mark_started());
        assert!(!run.mark_started());
        assert!(run.mark_stopped());
        assert!(!run.mark_stopped());
        assert!(matches!(
            run.ensure_active(StrategyKind::EventPush),
            Err(SchedulerError::StrategyStopped(_))
        ));
    }

    #[tokio::test]
    async fn test_build_strategy_uses_manual_drain_for_self_scheduling() {
        let config = AppConfig::default();
        for kind in StrategyKind::ALL {
            let strategy = build_strategy(kind, &config).unwrap();
            assert_eq!(strategy.kind(), kind);
            let expects_drain = !matches!(
                kind,
                StrategyKind::Autonomous | StrategyKind::SynchronizedBatch
            );
            assert_eq!(strategy.coordinator().drains_on_idle(), expects_drain);
        }
    }

    #[tokio::test]
    async fn test_build_strategy_reports_bad_table_as_init_failure() {
        let mut config = AppConfig::default();
        let mut table = TransitionTable::standard();
        table.rules.clear();
        config.coordinator.transition_table = Some(table);

        let err = match build_strategy(StrategyKind::EventPush, &config) {
            Err(err) => err,
            Ok(_) => panic!("malformed table accepted"),
        };
        assert!(matches!(err, SchedulerError::StrategyInit { strategy, .. } if strategy == "actor"));
    }
}
