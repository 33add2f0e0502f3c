//! The dispatch coordinator owns every robot record and the pending queue.
//!
//! All mutation goes through one `tokio::sync::Mutex`, which is the single
//! serialization point the strategies route through. Robot lifecycle edges
//! come from a [`TransitionTable`] that is only ever looked up, never
//! interpreted beyond its actions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use scheduler_domain::{
    Assignment, InvariantViolation, ItemId, RobotEvent, RobotId, RobotLifecycle,
    RobotRegistration, RobotState, SchedulerError, SchedulerResult, TransferRequest,
    TransitionAction, TransitionTable, ViolationKind,
};
use scheduler_observability::DispatchMetrics;

use crate::queue::{DispatchQueue, QueueDiscipline};
use crate::scoring::AssignmentScorer;

pub type AssignmentReceiver = mpsc::UnboundedReceiver<Assignment>;

pub const DEFAULT_LOOKAHEAD: usize = 64;

/// How a free robot and a pending request are matched.
#[derive(Clone)]
pub enum DispatchPolicy {
    Fifo,
    Priority,
    Scored {
        scorer: Arc<dyn AssignmentScorer>,
        lookahead: usize,
    },
}

impl DispatchPolicy {
    pub fn scored(scorer: Arc<dyn AssignmentScorer>) -> Self {
        DispatchPolicy::Scored {
            scorer,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DispatchPolicy::Fifo => "fifo",
            DispatchPolicy::Priority => "priority",
            DispatchPolicy::Scored { .. } => "scored",
        }
    }

    fn discipline(&self) -> QueueDiscipline {
        match self {
            DispatchPolicy::Priority => QueueDiscipline::Priority,
            _ => QueueDiscipline::Fifo,
        }
    }
}

impl fmt::Debug for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPolicy::Scored { scorer, lookahead } => f
                .debug_struct("Scored")
                .field("scorer", &scorer.name())
                .field("lookahead", lookahead)
                .finish(),
            other => f.write_str(other.code()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Metric and log label, normally the strategy code.
    pub label: String,
    pub table: TransitionTable,
    pub policy: DispatchPolicy,
    pub starvation_limit: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            label: "coordinator".to_string(),
            table: TransitionTable::standard(),
            policy: DispatchPolicy::Fifo,
            starvation_limit: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub dispatched: u64,
    /// Dispatched without waiting in the queue.
    pub immediate: u64,
    pub queued: u64,
    pub completed: u64,
    pub requeued: u64,
    pub max_queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dispatched { robot_id: RobotId, item_id: ItemId },
    Queued { item_id: ItemId, depth: usize },
}

/// Result of an applied state update.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub robot_id: RobotId,
    pub previous: RobotLifecycle,
    pub current: RobotLifecycle,
    pub event: RobotEvent,
    pub violations: Vec<ViolationKind>,
    /// Item bound to the robot by a queue drain during this update.
    pub next_item: Option<ItemId>,
}

struct Binding {
    seq: u64,
    request: TransferRequest,
}

struct RobotSlot {
    robot: RobotState,
    binding: Option<Binding>,
    mailbox: mpsc::UnboundedSender<Assignment>,
}

impl RobotSlot {
    fn is_available(&self) -> bool {
        self.robot.is_available() && self.binding.is_none()
    }

    fn bound_item(&self) -> Option<ItemId> {
        self.binding.as_ref().map(|b| b.request.item_id)
    }
}

struct CoordinatorState {
    slots: Vec<RobotSlot>,
    index: HashMap<RobotId, usize>,
    queue: DispatchQueue,
    violations: Vec<InvariantViolation>,
    stats: DispatchStats,
}

pub struct DispatchCoordinator {
    label: String,
    table: TransitionTable,
    policy: DispatchPolicy,
    metrics: DispatchMetrics,
    state: Mutex<CoordinatorState>,
}

impl DispatchCoordinator {
    /// Validates the transition table before anything can be registered.
    pub fn new(settings: CoordinatorSettings) -> SchedulerResult<Self> {
        settings.table.validate()?;
        Ok(Self::build(settings))
    }

    /// Standard table, FIFO policy.
    pub fn with_defaults(label: impl Into<String>) -> Self {
        Self::build(CoordinatorSettings {
            label: label.into(),
            ..CoordinatorSettings::default()
        })
    }

    fn build(settings: CoordinatorSettings) -> Self {
        let queue = DispatchQueue::new(settings.policy.discipline(), settings.starvation_limit);
        Self {
            metrics: DispatchMetrics::new(&settings.label),
            label: settings.label,
            table: settings.table,
            policy: settings.policy,
            state: Mutex::new(CoordinatorState {
                slots: Vec::new(),
                index: HashMap::new(),
                queue,
                violations: Vec::new(),
                stats: DispatchStats::default(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// True when returning to idle pulls the next request automatically.
    pub fn drains_on_idle(&self) -> bool {
        self.table
            .lookup(RobotLifecycle::Carrying, RobotEvent::PlaceConfirmed)
            .is_some_and(|rule| rule.has_action(TransitionAction::DrainQueue))
    }

    pub async fn register_robot(
        &self,
        registration: RobotRegistration,
    ) -> SchedulerResult<AssignmentReceiver> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.index.contains_key(&registration.robot_id) {
            return Err(SchedulerError::duplicate_robot(registration.robot_id));
        }

        let (mailbox, receiver) = mpsc::unbounded_channel();
        let ordinal = state.slots.len();
        let robot = RobotState::new(registration, ordinal);
        info!(
            strategy = %self.label,
            robot_id = %robot.id,
            ordinal,
            capabilities = ?robot.capabilities,
            "robot registered"
        );
        state.index.insert(robot.id.clone(), ordinal);
        state.slots.push(RobotSlot {
            robot,
            binding: None,
            mailbox,
        });

        if self.drains_on_idle() {
            self.drain_into(state, ordinal)?;
        }

        Ok(receiver)
    }

    /// Bind the request to the first eligible idle robot (best score under
    /// the scored policy), or queue it. An idle robot that could still serve
    /// an older queued request takes from the queue instead, so a request
    /// never overtakes compatible work that is already waiting.
    pub async fn request_transfer(
        &self,
        request: TransferRequest,
    ) -> SchedulerResult<DispatchOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let seq = state.queue.allocate_seq();

        match self.pick_robot(state, &request) {
            Some(index) if self.has_queued_work_for(state, index) => {
                let robot_id = state.slots[index].robot.id.clone();
                let item_id = request.item_id;
                self.enqueue(state, seq, request);
                match self.drain_into(state, index)? {
                    Some(served) if served == item_id => {
                        Ok(DispatchOutcome::Dispatched { robot_id, item_id })
                    }
                    _ => Ok(DispatchOutcome::Queued {
                        item_id,
                        depth: state.queue.len(),
                    }),
                }
            }
            Some(index) => {
                let robot_id = state.slots[index].robot.id.clone();
                let item_id = request.item_id;
                if self.bind(state, index, seq, request, false)? {
                    Ok(DispatchOutcome::Dispatched { robot_id, item_id })
                } else {
                    Ok(DispatchOutcome::Queued {
                        item_id,
                        depth: state.queue.len(),
                    })
                }
            }
            None => Ok(self.enqueue(state, seq, request)),
        }
    }

    /// Queue without trying to bind.
    pub async fn enqueue_transfer(
        &self,
        request: TransferRequest,
    ) -> SchedulerResult<DispatchOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let seq = state.queue.allocate_seq();
        Ok(self.enqueue(state, seq, request))
    }

    /// Apply a reported lifecycle change.
    ///
    /// The `(current, requested)` pair is classified into an event and looked
    /// up in the table; a pair with no edge is rejected with
    /// `IllegalTransition` and nothing changes. Requests for idle always have
    /// an edge: a held item reported with idle, or still recorded on a robot
    /// forced to idle, is cleared and recorded as `HeldItemOnIdle`, and a
    /// robot forced out of busy returns its request to the queue at its
    /// original position. When the edge carries `DrainQueue` and the robot
    /// ends up free, the next compatible queued request is bound to it
    /// before this returns and reported as `next_item`.
    pub async fn update_robot_state(
        &self,
        robot_id: &str,
        new_state: RobotLifecycle,
        held_item: Option<ItemId>,
        waiting_for: Option<String>,
    ) -> SchedulerResult<StateUpdate> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let index = *state
            .index
            .get(robot_id)
            .ok_or_else(|| SchedulerError::robot_not_found(robot_id))?;
        let previous = state.slots[index].robot.state;
        let event = RobotEvent::classify(previous, new_state)
            .ok_or_else(|| SchedulerError::illegal_transition(robot_id, previous, new_state))?;
        let rule = self
            .table
            .lookup(previous, event)
            .ok_or_else(|| SchedulerError::illegal_transition(robot_id, previous, new_state))?;

        let slot = &state.slots[index];
        let mut violations: Vec<(ViolationKind, Option<ItemId>, String)> = Vec::new();

        let pickup_item = if rule.has_action(TransitionAction::SetHeldItem) {
            let bound = slot.bound_item();
            let item = held_item
                .or(bound)
                .ok_or_else(|| SchedulerError::illegal_transition(robot_id, previous, new_state))?;
            if let Some(expected) = bound.filter(|expected| *expected != item) {
                violations.push((
                    ViolationKind::PickupMismatch,
                    Some(item),
                    format!("picked up item {item} while item {expected} was assigned"),
                ));
            }
            Some(item)
        } else {
            None
        };

        if rule.to == RobotLifecycle::Idle {
            let stale = if event == RobotEvent::ForceIdle {
                slot.robot.held_item
            } else {
                None
            };
            if let Some(item) = held_item.or(stale) {
                violations.push((
                    ViolationKind::HeldItemOnIdle,
                    Some(item),
                    format!("idle reported while holding item {item}; held item cleared"),
                ));
            }
        }
        if event == RobotEvent::ForceIdle && previous == RobotLifecycle::Busy {
            violations.push((
                ViolationKind::AbandonedAssignment,
                slot.bound_item(),
                "forced idle before pickup; request returned to the queue".to_string(),
            ));
        }

        let slot = &mut state.slots[index];
        let mut released = None;
        let mut requeued = None;
        let mut drain = false;
        for action in &rule.actions {
            match action {
                TransitionAction::SetHeldItem => slot.robot.held_item = pickup_item,
                TransitionAction::ClearHeldItem => slot.robot.held_item = None,
                TransitionAction::ReleaseAssignment => {
                    released = slot.binding.take().map(|b| b.request)
                }
                TransitionAction::RequeueAssignment => requeued = slot.binding.take(),
                TransitionAction::DrainQueue => drain = true,
            }
        }
        slot.robot.state = rule.to;
        slot.robot.waiting_for = waiting_for;
        slot.robot.updated_at = Utc::now();
        let owned_id = slot.robot.id.clone();

        if let Some(request) = released {
            slot.robot.location = Some(request.destination.clone());
            state.stats.completed += 1;
            self.metrics.record_completion();
            if let DispatchPolicy::Scored { scorer, .. } = &self.policy {
                scorer.on_completed(&state.slots[index].robot, &request);
            }
            debug!(
                strategy = %self.label,
                robot_id = %owned_id,
                item_id = request.item_id,
                destination = %request.destination,
                "transfer completed"
            );
        }
        if let Some(binding) = requeued {
            state.queue.requeue(binding.seq, binding.request);
            state.stats.requeued += 1;
            self.metrics.record_requeue();
            self.metrics.update_queue_depth(state.queue.len());
        }

        let kinds: Vec<ViolationKind> = violations.iter().map(|(kind, _, _)| *kind).collect();
        for (kind, item, detail) in violations {
            self.record_violation(state, &owned_id, kind, item, detail);
        }

        debug!(
            strategy = %self.label,
            robot_id = %owned_id,
            from = %previous,
            to = %rule.to,
            %event,
            "robot state updated"
        );

        let next_item = if drain && state.slots[index].is_available() {
            self.drain_into(state, index)?
        } else {
            None
        };

        Ok(StateUpdate {
            robot_id: owned_id,
            previous,
            current: rule.to,
            event,
            violations: kinds,
            next_item,
        })
    }

    /// Idle and holding nothing. A stale held item on an idle robot is
    /// cleared and recorded.
    pub async fn is_robot_available(&self, robot_id: &str) -> SchedulerResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let index = *state
            .index
            .get(robot_id)
            .ok_or_else(|| SchedulerError::robot_not_found(robot_id))?;

        let slot = &mut state.slots[index];
        if slot.robot.is_idle() {
            if let Some(item) = slot.robot.held_item.take() {
                let owned_id = slot.robot.id.clone();
                self.record_violation(
                    state,
                    &owned_id,
                    ViolationKind::HeldItemOnIdle,
                    Some(item),
                    format!("idle robot still held item {item}; held item cleared"),
                );
            }
        }
        Ok(state.slots[index].is_available())
    }

    /// Robot self-request: bind the next compatible queued request if the
    /// robot is free.
    pub async fn claim_next(&self, robot_id: &str) -> SchedulerResult<Option<ItemId>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let index = *state
            .index
            .get(robot_id)
            .ok_or_else(|| SchedulerError::robot_not_found(robot_id))?;

        if !state.slots[index].is_available() {
            return Ok(None);
        }
        self.drain_into(state, index)
    }

    /// When every robot is free, hand one queued request to each of them in
    /// a single critical section. Returns how many were dispatched.
    pub async fn dispatch_batch(&self) -> SchedulerResult<usize> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.slots.is_empty() || !state.slots.iter().all(RobotSlot::is_available) {
            return Ok(0);
        }

        let mut dispatched = 0;
        for index in 0..state.slots.len() {
            if state.queue.is_empty() {
                break;
            }
            if self.drain_into(state, index)?.is_some() {
                dispatched += 1;
            }
        }
        if dispatched > 0 {
            debug!(
                strategy = %self.label,
                dispatched,
                remaining = state.queue.len(),
                "batch dispatched"
            );
        }
        Ok(dispatched)
    }

    pub async fn robot_state(&self, robot_id: &str) -> SchedulerResult<RobotState> {
        let state = self.state.lock().await;
        state
            .index
            .get(robot_id)
            .map(|&index| state.slots[index].robot.clone())
            .ok_or_else(|| SchedulerError::robot_not_found(robot_id))
    }

    pub async fn contains_robot(&self, robot_id: &str) -> bool {
        self.state.lock().await.index.contains_key(robot_id)
    }

    /// Robot records in registration order.
    pub async fn robots(&self) -> Vec<RobotState> {
        let state = self.state.lock().await;
        state.slots.iter().map(|slot| slot.robot.clone()).collect()
    }

    pub async fn bound_item(&self, robot_id: &str) -> SchedulerResult<Option<ItemId>> {
        let state = self.state.lock().await;
        state
            .index
            .get(robot_id)
            .map(|&index| state.slots[index].bound_item())
            .ok_or_else(|| SchedulerError::robot_not_found(robot_id))
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn pending_requests(&self) -> Vec<TransferRequest> {
        let state = self.state.lock().await;
        state.queue.iter().map(|e| e.request.clone()).collect()
    }

    pub async fn violations(&self) -> Vec<InvariantViolation> {
        self.state.lock().await.violations.clone()
    }

    pub async fn violation_count(&self) -> usize {
        self.state.lock().await.violations.len()
    }

    pub async fn stats(&self) -> DispatchStats {
        self.state.lock().await.stats
    }

    pub async fn all_robots_idle(&self) -> bool {
        let state = self.state.lock().await;
        state.slots.iter().all(RobotSlot::is_available)
    }

    fn pick_robot(&self, state: &CoordinatorState, request: &TransferRequest) -> Option<usize> {
        let mut eligible = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_available() && slot.robot.can_serve(request));

        match &self.policy {
            DispatchPolicy::Scored { scorer, .. } => {
                let now = Utc::now();
                let mut best: Option<(usize, f64)> = None;
                for (index, slot) in eligible {
                    let value = scorer.score(&slot.robot, request, now);
                    match best {
                        Some((_, top)) if value <= top => {}
                        _ => best = Some((index, value)),
                    }
                }
                best.map(|(index, _)| index)
            }
            _ => eligible.next().map(|(index, _)| index),
        }
    }

    fn has_queued_work_for(&self, state: &CoordinatorState, index: usize) -> bool {
        let robot = &state.slots[index].robot;
        state.queue.iter().any(|entry| robot.can_serve(&entry.request))
    }

    fn enqueue(
        &self,
        state: &mut CoordinatorState,
        seq: u64,
        request: TransferRequest,
    ) -> DispatchOutcome {
        let item_id = request.item_id;
        state.queue.push_with_seq(seq, request);
        let depth = state.queue.len();
        state.stats.queued += 1;
        state.stats.max_queue_depth = state.stats.max_queue_depth.max(depth);
        self.metrics.record_queued(depth);
        debug!(strategy = %self.label, item_id, depth, "transfer queued");
        DispatchOutcome::Queued { item_id, depth }
    }

    fn drain_into(
        &self,
        state: &mut CoordinatorState,
        index: usize,
    ) -> SchedulerResult<Option<ItemId>> {
        let entry = {
            let robot = &state.slots[index].robot;
            match &self.policy {
                DispatchPolicy::Scored { scorer, lookahead } => {
                    let now = Utc::now();
                    state.queue.pop_best_by(
                        *lookahead,
                        |request| robot.can_serve(request),
                        |request| scorer.score(robot, request, now),
                    )
                }
                _ => state.queue.pop_next(|request| robot.can_serve(request)),
            }
        };

        match entry {
            Some(entry) => {
                let item_id = entry.request.item_id;
                let bound = self.bind(state, index, entry.seq, entry.request, true)?;
                Ok(bound.then_some(item_id))
            }
            None => Ok(None),
        }
    }

    /// Move an available robot to busy and deliver the assignment. A robot
    /// that is not available gets nothing; the request goes back to the
    /// queue and a violation is recorded.
    fn bind(
        &self,
        state: &mut CoordinatorState,
        index: usize,
        seq: u64,
        request: TransferRequest,
        from_queue: bool,
    ) -> SchedulerResult<bool> {
        let next = self
            .table
            .lookup(RobotLifecycle::Idle, RobotEvent::Dispatch)
            .map(|rule| rule.to)
            .ok_or_else(|| {
                SchedulerError::InvalidTransitionTable("missing edge (idle, dispatch)".to_string())
            })?;

        if !state.slots[index].is_available() {
            let robot = &state.slots[index].robot;
            let robot_id = robot.id.clone();
            let detail = format!("dispatch refused, robot is {}", robot.state);
            let item_id = request.item_id;
            state.queue.requeue(seq, request);
            self.record_violation(
                state,
                &robot_id,
                ViolationKind::AssignToBusyRobot,
                Some(item_id),
                detail,
            );
            return Ok(false);
        }

        let now = Utc::now();
        let wait_seconds = request.wait_seconds(now);
        let item_id = request.item_id;
        let slot = &mut state.slots[index];
        slot.robot.state = next;
        slot.robot.waiting_for = None;
        slot.robot.updated_at = now;

        let assignment = Assignment {
            robot_id: slot.robot.id.clone(),
            request: request.clone(),
            dispatched_at: now,
            from_queue,
        };
        slot.binding = Some(Binding { seq, request });
        if slot.mailbox.send(assignment).is_err() {
            warn!(
                strategy = %self.label,
                robot_id = %slot.robot.id,
                item_id,
                "assignment channel closed, robot will not see its transfer"
            );
        }
        debug!(
            strategy = %self.label,
            robot_id = %slot.robot.id,
            item_id,
            from_queue,
            "transfer dispatched"
        );

        state.stats.dispatched += 1;
        if !from_queue {
            state.stats.immediate += 1;
        } else {
            self.metrics.update_queue_depth(state.queue.len());
        }
        self.metrics.record_dispatch(from_queue, wait_seconds);
        Ok(true)
    }

    fn record_violation(
        &self,
        state: &mut CoordinatorState,
        robot_id: &str,
        kind: ViolationKind,
        item_id: Option<ItemId>,
        detail: String,
    ) {
        warn!(
            strategy = %self.label,
            robot_id,
            %kind,
            item_id = ?item_id,
            detail = %detail,
            "invariant violation repaired"
        );
        self.metrics.record_violation();
        state
            .violations
            .push(InvariantViolation::new(robot_id, kind, item_id, detail));
    }
}

impl fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("label", &self.label)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
