use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use scheduler_dispatcher::{AssignmentReceiver, CoordinationStrategy};
use scheduler_domain::{Assignment, ItemId, RobotId, SchedulerResult, StateChange};

use crate::shutdown::ShutdownListener;

/// One finished transfer reported back to the harness.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub robot_id: RobotId,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSummary {
    pub robot_id: RobotId,
    pub completed: u64,
    pub errors: u64,
}

/// Simulated robot: waits for an assignment, confirms pickup, confirms
/// place, reports the completion, and waits again.
pub struct RobotAgent {
    robot_id: RobotId,
    strategy: Arc<dyn CoordinationStrategy>,
    inbox: AssignmentReceiver,
    completions: mpsc::UnboundedSender<Completion>,
    pickup_delay: Duration,
    place_delay: Duration,
}

impl RobotAgent {
    pub fn new(
        robot_id: impl Into<RobotId>,
        strategy: Arc<dyn CoordinationStrategy>,
        inbox: AssignmentReceiver,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            robot_id: robot_id.into(),
            strategy,
            inbox,
            completions,
            pickup_delay: Duration::ZERO,
            place_delay: Duration::ZERO,
        }
    }

    pub fn with_delays(mut self, pickup: Duration, place: Duration) -> Self {
        self.pickup_delay = pickup;
        self.place_delay = place;
        self
    }

    pub fn spawn(self, shutdown: ShutdownListener) -> JoinHandle<AgentSummary> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: ShutdownListener) -> AgentSummary {
        let mut summary = AgentSummary {
            robot_id: self.robot_id.clone(),
            ..AgentSummary::default()
        };

        loop {
            let assignment = tokio::select! {
                _ = shutdown.recv() => break,
                next = self.inbox.recv() => match next {
                    Some(assignment) => assignment,
                    None => break,
                },
            };

            match self.carry(&assignment).await {
                Ok(()) => {
                    summary.completed += 1;
                    let completion = Completion {
                        robot_id: self.robot_id.clone(),
                        item_id: assignment.item_id(),
                    };
                    if self.completions.send(completion).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        robot_id = %self.robot_id,
                        item_id = assignment.item_id(),
                        error = %e,
                        "transfer aborted"
                    );
                    if e.is_fatal() || shutdown.is_triggered() {
                        break;
                    }
                }
            }
        }

        debug!(
            robot_id = %summary.robot_id,
            completed = summary.completed,
            errors = summary.errors,
            "robot agent finished"
        );
        summary
    }

    async fn carry(&self, assignment: &Assignment) -> SchedulerResult<()> {
        if !self.pickup_delay.is_zero() {
            sleep(self.pickup_delay).await;
        }
        self.strategy
            .notify_robot_state_changed(StateChange::picked_up(
                self.robot_id.as_str(),
                assignment.item_id(),
            ))
            .await?;

        if !self.place_delay.is_zero() {
            sleep(self.place_delay).await;
        }
        self.strategy
            .notify_robot_state_changed(StateChange::placed(self.robot_id.as_str()))
            .await
    }
}
