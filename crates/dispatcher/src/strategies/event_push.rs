use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use scheduler_domain::{RobotRegistration, SchedulerResult, StateChange, TransferRequest};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

/// Actor-style push: every state change is delivered to the coordinator as
/// soon as the robot reports it, and the coordinator reacts in the same call.
pub struct EventPushStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
}

impl EventPushStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self {
            coordinator,
            run: RunState::default(),
        }
    }
}

#[async_trait]
impl CoordinationStrategy for EventPushStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EventPush
    }

    fn coordinator(&self) -> &Arc<DispatchCoordinator> {
        &self.coordinator
    }

    async fn register_robot(
        &self,
        registration: RobotRegistration,
    ) -> SchedulerResult<AssignmentReceiver> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.register_robot(registration).await
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.request_transfer(request).await?;
        Ok(())
    }

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator
            .update_robot_state(
                &change.robot_id,
                change.state,
                change.held_item,
                change.waiting_for,
            )
            .await?;
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
