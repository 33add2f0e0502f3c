use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scheduler_domain::{
    RobotId, RobotRegistration, SchedulerError, SchedulerResult, StateChange, TransferRequest,
};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

#[derive(Debug)]
enum RobotMessage {
    StateChanged(StateChange),
    /// A request was published; check whether this robot can take work.
    Wake,
    Shutdown,
}

type RobotInbox = mpsc::UnboundedReceiver<RobotMessage>;

/// Distributed publish/subscribe: one task per robot. State changes go to
/// the owning robot's task, and every published request wakes every robot
/// task so each can try to claim work. The fan-out makes the cost of a
/// request grow with fleet size; this variant exists to measure exactly
/// that.
pub struct PubSubDedicatedStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
    routes: RwLock<HashMap<RobotId, mpsc::UnboundedSender<RobotMessage>>>,
    /// Inboxes of robots registered before `start`.
    parked: Mutex<Vec<(RobotId, RobotInbox)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PubSubDedicatedStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self {
            coordinator,
            run: RunState::default(),
            routes: RwLock::new(HashMap::new()),
            parked: Mutex::new(Vec::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    async fn spawn_robot_task(&self, robot_id: RobotId, inbox: RobotInbox) {
        let handle = tokio::spawn(robot_loop(Arc::clone(&self.coordinator), robot_id, inbox));
        self.workers.lock().await.push(handle);
    }
}

async fn robot_loop(coordinator: Arc<DispatchCoordinator>, robot_id: RobotId, mut inbox: RobotInbox) {
    let mut wakes: u64 = 0;
    let mut claims: u64 = 0;
    while let Some(message) = inbox.recv().await {
        let result = match message {
            RobotMessage::StateChanged(change) => coordinator
                .update_robot_state(
                    &change.robot_id,
                    change.state,
                    change.held_item,
                    change.waiting_for,
                )
                .await
                .map(|_| ()),
            RobotMessage::Wake => {
                wakes += 1;
                match coordinator.is_robot_available(&robot_id).await {
                    Ok(true) => coordinator.claim_next(&robot_id).await.map(|claimed| {
                        if claimed.is_some() {
                            claims += 1;
                        }
                    }),
                    Ok(false) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            RobotMessage::Shutdown => break,
        };
        if let Err(e) = result {
            warn!(
                strategy = coordinator.label(),
                robot_id = %robot_id,
                error = %e,
                "robot task message rejected"
            );
        }
    }
    debug!(
        strategy = coordinator.label(),
        robot_id = %robot_id,
        wakes,
        claims,
        "robot task finished"
    );
}

#[async_trait]
impl CoordinationStrategy for PubSubDedicatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PubSubDedicated
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

        let (route, inbox) = mpsc::unbounded_channel();
        self.routes.write().await.insert(robot_id.clone(), route);
        if self.run.is_started() {
            self.spawn_robot_task(robot_id, inbox).await;
        } else {
            self.parked.lock().await.push((robot_id, inbox));
        }
        Ok(receiver)
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.request_transfer(request).await?;

        let routes = self.routes.read().await;
        for (robot_id, route) in routes.iter() {
            if route.send(RobotMessage::Wake).is_err() {
                debug!(strategy = self.name(), robot_id = %robot_id, "robot task gone, wake dropped");
            }
        }
        Ok(())
    }

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        let routes = self.routes.read().await;
        let route = routes
            .get(&change.robot_id)
            .ok_or_else(|| SchedulerError::robot_not_found(change.robot_id.as_str()))?;
        let robot_id = change.robot_id.clone();
        route
            .send(RobotMessage::StateChanged(change))
            .map_err(|_| SchedulerError::channel_closed(format!("robot task {robot_id}")))
    }

    async fn start(&self) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        if !self.run.mark_started() {
            return Ok(());
        }

        let parked: Vec<_> = self.parked.lock().await.drain(..).collect();
        let robots = parked.len();
        for (robot_id, inbox) in parked {
            self.spawn_robot_task(robot_id, inbox).await;
        }

        info!(strategy = self.name(), robots, "strategy started");
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        if !self.run.mark_stopped() {
            return Ok(());
        }

        for route in self.routes.read().await.values() {
            let _ = route.send(RobotMessage::Shutdown);
        }
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(strategy = self.name(), error = %e, "robot task ended abnormally");
            }
        }
        info!(strategy = self.name(), "strategy stopped");
        Ok(())
    }
}
