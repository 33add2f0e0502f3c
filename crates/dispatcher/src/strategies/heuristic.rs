use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use scheduler_domain::{RobotRegistration, SchedulerResult, StateChange, TransferRequest};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator, DispatchPolicy};

/// Event-driven trigger in front of a coordinator running the scored policy.
/// The scorer (arrival order or pheromone trails) decides which robot gets a
/// new request and which queued request a freed robot takes next.
pub struct HeuristicStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
}

impl HeuristicStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self {
            coordinator,
            run: RunState::default(),
        }
    }

    pub fn scorer_name(&self) -> Option<&str> {
        match self.coordinator.policy() {
            DispatchPolicy::Scored { scorer, .. } => Some(scorer.name()),
            _ => None,
        }
    }
}

#[async_trait]
impl CoordinationStrategy for HeuristicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Heuristic
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
            info!(
                strategy = self.name(),
                scorer = self.scorer_name().unwrap_or("none"),
                "strategy started"
            );
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
