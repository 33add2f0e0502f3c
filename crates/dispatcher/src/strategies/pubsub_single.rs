use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scheduler_domain::{
    RobotId, RobotRegistration, SchedulerError, SchedulerResult, StateChange, TransferRequest,
};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

#[derive(Debug)]
enum CoordinationMessage {
    Transfer(TransferRequest),
    StateChanged(StateChange),
    Shutdown,
}

/// Centralized publish/subscribe: requests and state changes are published
/// onto one channel and a single coordination task applies them in order.
/// Messages published before `start` wait in the channel.
pub struct PubSubSingleStrategy {
    coordinator: Arc<DispatchCoordinator>,
    run: RunState,
    publisher: mpsc::UnboundedSender<CoordinationMessage>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<CoordinationMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    known_robots: RwLock<HashSet<RobotId>>,
}

impl PubSubSingleStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        let (publisher, subscriber) = mpsc::unbounded_channel();
        Self {
            coordinator,
            run: RunState::default(),
            publisher,
            subscriber: Mutex::new(Some(subscriber)),
            worker: Mutex::new(None),
            known_robots: RwLock::new(HashSet::new()),
        }
    }

    fn publish(&self, message: CoordinationMessage) -> SchedulerResult<()> {
        self.publisher
            .send(message)
            .map_err(|_| SchedulerError::channel_closed("pubsub-single coordination channel"))
    }
}

async fn coordination_loop(
    coordinator: Arc<DispatchCoordinator>,
    mut subscriber: mpsc::UnboundedReceiver<CoordinationMessage>,
) {
    let mut processed: u64 = 0;
    while let Some(message) = subscriber.recv().await {
        let result = match message {
            CoordinationMessage::Transfer(request) => coordinator
                .request_transfer(request)
                .await
                .map(|_| ()),
            CoordinationMessage::StateChanged(change) => coordinator
                .update_robot_state(
                    &change.robot_id,
                    change.state,
                    change.held_item,
                    change.waiting_for,
                )
                .await
                .map(|_| ()),
            CoordinationMessage::Shutdown => break,
        };
        processed += 1;
        if let Err(e) = result {
            warn!(strategy = coordinator.label(), error = %e, "coordination message rejected");
        }
    }
    debug!(strategy = coordinator.label(), processed, "coordination task finished");
}

#[async_trait]
impl CoordinationStrategy for PubSubSingleStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PubSubSingle
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
        self.known_robots.write().await.insert(robot_id);
        Ok(receiver)
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.publish(CoordinationMessage::Transfer(request))
    }

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        if !self.known_robots.read().await.contains(&change.robot_id) {
            return Err(SchedulerError::robot_not_found(change.robot_id));
        }
        self.publish(CoordinationMessage::StateChanged(change))
    }

    async fn start(&self) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        if !self.run.mark_started() {
            return Ok(());
        }

        let subscriber = self.subscriber.lock().await.take().ok_or_else(|| {
            SchedulerError::strategy_init(self.name(), "coordination channel already consumed")
        })?;
        let handle = tokio::spawn(coordination_loop(Arc::clone(&self.coordinator), subscriber));
        *self.worker.lock().await = Some(handle);

        info!(strategy = self.name(), "strategy started");
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        if !self.run.mark_stopped() {
            return Ok(());
        }

        // Shutdown is queued behind everything already published.
        if self.run.is_started() {
            self.publish(CoordinationMessage::Shutdown)?;
        }
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(strategy = self.name(), error = %e, "coordination task ended abnormally");
            }
        }
        info!(strategy = self.name(), "strategy stopped");
        Ok(())
    }
}
