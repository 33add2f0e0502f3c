use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use scheduler_domain::{
    RobotLifecycle, RobotRegistration, SchedulerResult, StateChange, TransferRequest,
};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

/// Robots schedule themselves. The coordinator runs a table without queue
/// draining; a robot that returns to idle (or joins) asks for its next
/// request with `claim_next`.
pub struct AutonomousStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
}

impl AutonomousStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self {
            coordinator,
            run: RunState::default(),
        }
    }

    async fn self_schedule(&self, robot_id: &str) -> SchedulerResult<()> {
        if let Some(item_id) = self.coordinator.claim_next(robot_id).await? {
            debug!(strategy = self.name(), robot_id, item_id, "robot claimed queued transfer");
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStrategy for AutonomousStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Autonomous
    }

    fn coordinator(&self) -> &Arc<DispatchCoordinator> {
        &self.coordinator
    }

    async fn register_robot(
        &self,
        registration: RobotRegistration,
    ) -> SchedulerResult<AssignmentReceiver> {
        self.run.ensure_active(self.kind())?;
        let robot_id = registration.robot_id.clone();
        let receiver = self.coordinator.register_robot(registration).await?;
        self.self_schedule(&robot_id).await?;
        Ok(receiver)
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.request_transfer(request).await?;
        Ok(())
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
            self.self_schedule(&update.robot_id).await?;
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
            info!(strategy = self.name(), "strategy stopped");
        }
        Ok(())
    }
}
