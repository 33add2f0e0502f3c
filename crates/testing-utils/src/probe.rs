//! Drive a coordination strategy as a fleet of scripted robots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use scheduler_dispatcher::{AssignmentReceiver, CoordinationStrategy};
use scheduler_domain::{
    Assignment, ItemId, RobotId, RobotRegistration, SchedulerResult, StateChange,
};

use crate::builders::RobotRegistrationBuilder;
use crate::helpers::TestEnv;

pub struct StrategyProbe {
    strategy: Arc<dyn CoordinationStrategy>,
    inboxes: HashMap<RobotId, AssignmentReceiver>,
    order: Vec<RobotId>,
}

impl StrategyProbe {
    pub fn new(strategy: Arc<dyn CoordinationStrategy>) -> Self {
        Self {
            strategy,
            inboxes: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn strategy(&self) -> &Arc<dyn CoordinationStrategy> {
        &self.strategy
    }

    pub async fn register(&mut self, registration: RobotRegistration) -> SchedulerResult<()> {
        let robot_id = registration.robot_id.clone();
        let inbox = self.strategy.register_robot(registration).await?;
        self.inboxes.insert(robot_id.clone(), inbox);
        self.order.push(robot_id);
        Ok(())
    }

    /// Register `R1..=Rn`.
    pub async fn register_fleet(&mut self, count: usize) -> SchedulerResult<()> {
        for registration in RobotRegistrationBuilder::fleet(count) {
            self.register(registration).await?;
        }
        Ok(())
    }

    /// Next assignment delivered to `robot_id`, if one arrives in time.
    pub async fn next_assignment(&mut self, robot_id: &str, wait: Duration) -> Option<Assignment> {
        let inbox = self.inboxes.get_mut(robot_id)?;
        timeout(wait, inbox.recv()).await.ok().flatten()
    }

    /// Assignment already waiting for `robot_id`, without blocking.
    pub fn try_assignment(&mut self, robot_id: &str) -> Option<Assignment> {
        self.inboxes.get_mut(robot_id)?.try_recv().ok()
    }

    pub async fn pick_up(&self, assignment: &Assignment) -> SchedulerResult<()> {
        self.strategy
            .notify_robot_state_changed(StateChange::picked_up(
                assignment.robot_id.as_str(),
                assignment.item_id(),
            ))
            .await
    }

    pub async fn place(&self, robot_id: &str) -> SchedulerResult<()> {
        self.strategy
            .notify_robot_state_changed(StateChange::placed(robot_id))
            .await
    }

    pub async fn complete(&self, assignment: &Assignment) -> SchedulerResult<()> {
        self.pick_up(assignment).await?;
        self.place(&assignment.robot_id).await
    }

    /// Act as every robot: confirm pickup and place for each assignment as it
    /// arrives until `expected` transfers are done or `wait` runs out.
    /// Returns the completed item ids in completion order.
    pub async fn drive(&mut self, expected: usize, wait: Duration) -> SchedulerResult<Vec<ItemId>> {
        let deadline = Instant::now() + wait;
        let mut completed = Vec::with_capacity(expected);
        while completed.len() < expected && Instant::now() < deadline {
            let mut progressed = false;
            for robot_id in self.order.clone() {
                if let Some(assignment) = self.try_assignment(&robot_id) {
                    self.complete(&assignment).await?;
                    completed.push(assignment.item_id());
                    progressed = true;
                }
            }
            if !progressed {
                sleep(Duration::from_millis(1)).await;
            }
        }
        Ok(completed)
    }

    /// Wait until the queue is empty and every robot is idle.
    pub async fn settle(&self, wait: Duration) -> bool {
        let coordinator = Arc::clone(self.strategy.coordinator());
        TestEnv::wait_for(
            move || {
                let coordinator = Arc::clone(&coordinator);
                async move { coordinator.queue_len().await == 0 && coordinator.all_robots_idle().await }
            },
            wait,
        )
        .await
    }
}
