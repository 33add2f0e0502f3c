use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use scheduler_domain::{
    RobotLifecycle, RobotRegistration, SchedulerResult, StateChange, TransferRequest,
};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

/// Pipeline in lock-step: requests only accumulate, and whenever the whole
/// fleet is idle one batch hands a request to every robot at once.
pub struct SynchronizedBatchStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
    batches: AtomicU64,
}

impl SynchronizedBatchStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self {
            coordinator,
            run: RunState::default(),
            batches: AtomicU64::new(0),
        }
    }

    /// Batches dispatched so far.
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    async fn try_batch(&self) -> SchedulerResult<()> {
        let dispatched = self.coordinator.dispatch_batch().await?;
        if dispatched > 0 {
            let batch = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(strategy = self.name(), batch, dispatched, "batch released");
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStrategy for SynchronizedBatchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SynchronizedBatch
    }

    fn coordinator(&self) -> &Arc<DispatchCoordinator> {
        &self.coordinator
    }

    async fn register_robot(
        &self,
        registration: RobotRegistration,
    ) -> SchedulerResult<AssignmentReceiver> {
        self.run.ensure_active(self.kind())?;
        let receiver = self.coordinator.register_robot(registration).await?;
        self.try_batch().await?;
        Ok(receiver)
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.enqueue_transfer(request).await?;
        self.try_batch().await
    }

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        let update = self
            .coordinator
            .update_robot_state(
                &change.robot_id,
                change.state,
                change.held_item,
                change.waiting_for,
            )
            .await?;
        if update.current == RobotLifecycle::Idle {
            self.try_batch().await?;
        }
        Ok(())
    }

    async fn start(&self) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        if self.run.mark_started() {
            info!(strategy = self.name(), "strategy started");
        }
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        if self.run.mark_stopped() {
            info!(
                strategy = self.name(),
                batches = self.batch_count(),
                "strategy stopped"
            );
        }
        Ok(())
    }
}
