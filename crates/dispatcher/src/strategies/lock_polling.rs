use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use scheduler_domain::{
    RobotId, RobotRegistration, SchedulerError, SchedulerResult, StateChange, TransferRequest,
};

use super::{CoordinationStrategy, RunState, StrategyKind};
use crate::coordinator::{AssignmentReceiver, DispatchCoordinator};

/// Per-robot signal slots. Robots post here; only the poller reads.
#[derive(Debug, Default)]
struct SignalBoard {
    order: Vec<RobotId>,
    pending: HashMap<RobotId, VecDeque<StateChange>>,
}

impl SignalBoard {
    fn register(&mut self, robot_id: RobotId) {
        self.pending.insert(robot_id.clone(), VecDeque::new());
        self.order.push(robot_id);
    }

    /// Take every pending signal, robot by robot in registration order.
    fn collect(&mut self) -> Vec<StateChange> {
        let mut signals = Vec::new();
        for robot_id in &self.order {
            if let Some(queue) = self.pending.get_mut(robot_id) {
                signals.extend(queue.drain(..));
            }
        }
        signals
    }
}

/// Periodic polling: a loop wakes every `interval`, visits each robot's
/// signal slot and forwards what it finds to the coordinator. Transfer
/// requests go to the coordinator directly.
pub struct LockPollingStrategy {
    coordinator: Arc<DispatchCoordinator>,
    board: Arc<Mutex<SignalBoard>>,
    interval: Duration,
    run: RunState,
    shutdown: broadcast::Sender<()>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl LockPollingStrategy {
    pub fn new(coordinator: Arc<DispatchCoordinator>, interval: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            coordinator,
            board: Arc::new(Mutex::new(SignalBoard::default())),
            interval: interval.max(Duration::from_micros(100)),
            run: RunState::default(),
            shutdown,
            poller: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Signals posted but not yet forwarded.
    pub async fn pending_signals(&self) -> usize {
        let board = self.board.lock().await;
        board.pending.values().map(VecDeque::len).sum()
    }
}

/// One polling cycle. Returns how many signals were applied.
async fn poll_once(coordinator: &DispatchCoordinator, board: &Mutex<SignalBoard>) -> usize {
    let signals = board.lock().await.collect();
    let mut applied = 0;
    for change in signals {
        let robot_id = change.robot_id.clone();
        match coordinator
            .update_robot_state(
                &change.robot_id,
                change.state,
                change.held_item,
                change.waiting_for,
            )
            .await
        {
            Ok(_) => applied += 1,
            Err(e) => warn!(
                strategy = coordinator.label(),
                robot_id = %robot_id,
                error = %e,
                "polled state change rejected"
            ),
        }
    }
    applied
}

#[async_trait]
impl CoordinationStrategy for LockPollingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LockPolling
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
        self.board.lock().await.register(robot_id);
        Ok(receiver)
    }

    async fn request_transfer(&self, request: TransferRequest) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        self.coordinator.request_transfer(request).await?;
        Ok(())
    }

    async fn notify_robot_state_changed(&self, change: StateChange) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        let mut board = self.board.lock().await;
        let slot = board
            .pending
            .get_mut(&change.robot_id)
            .ok_or_else(|| SchedulerError::robot_not_found(change.robot_id.as_str()))?;
        slot.push_back(change);
        Ok(())
    }

    async fn start(&self) -> SchedulerResult<()> {
        self.run.ensure_active(self.kind())?;
        if !self.run.mark_started() {
            return Ok(());
        }

        let coordinator = Arc::clone(&self.coordinator);
        let board = Arc::clone(&self.board);
        let mut shutdown = self.shutdown.subscribe();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        let applied = poll_once(&coordinator, &board).await;
                        if applied > 0 {
                            debug!(strategy = coordinator.label(), applied, "poll cycle");
                        }
                    }
                }
            }
        });
        *self.poller.lock().await = Some(handle);

        info!(
            strategy = self.name(),
            interval_us = self.interval.as_micros() as u64,
            "strategy started"
        );
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        if !self.run.mark_stopped() {
            return Ok(());
        }

        let _ = self.shutdown.send(());
        if let Some(handle) = self.poller.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(strategy = self.name(), error = %e, "poller task ended abnormally");
            }
        }
        let flushed = poll_once(&self.coordinator, &self.board).await;
        info!(strategy = self.name(), flushed, "strategy stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_board_keeps_registration_and_post_order() {
        let mut board = SignalBoard::default();
        board.register("R2".to_string());
        board.register("R1".to_string());

        let post = |board: &mut SignalBoard, change: StateChange| {
            board
                .pending
                .get_mut(&change.robot_id)
                .unwrap()
                .push_back(change);
        };
        post(&mut board, StateChange::picked_up("R1", 1));
        post(&mut board, StateChange::placed("R1"));
        post(&mut board, StateChange::picked_up("R2", 2));

        let signals = board.collect();
        let order: Vec<(&str, _)> = signals
            .iter()
            .map(|c| (c.robot_id.as_str(), c.state))
            .collect();
        assert_eq!(
            order,
            vec![
                ("R2", scheduler_domain::RobotLifecycle::Carrying),
                ("R1", scheduler_domain::RobotLifecycle::Carrying),
                ("R1", scheduler_domain::RobotLifecycle::Idle),
            ]
        );
        assert!(board.collect().is_empty());
    }
}
