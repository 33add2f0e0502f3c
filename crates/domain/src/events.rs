//! Signals exchanged between robots, strategies and the coordinator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::robot::{ItemId, RobotId, RobotLifecycle};

/// A robot-reported state change, routed to the coordinator by a strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    pub robot_id: RobotId,
    pub state: RobotLifecycle,
    pub held_item: Option<ItemId>,
    pub waiting_for: Option<String>,
}

impl StateChange {
    pub fn new(robot_id: impl Into<RobotId>, state: RobotLifecycle) -> Self {
        Self {
            robot_id: robot_id.into(),
            state,
            held_item: None,
            waiting_for: None,
        }
    }

    /// Pickup confirmed: the robot now holds `item`.
    pub fn picked_up(robot_id: impl Into<RobotId>, item: ItemId) -> Self {
        Self::new(robot_id, RobotLifecycle::Carrying).with_held_item(item)
    }

    /// Place confirmed: the robot released its item.
    pub fn placed(robot_id: impl Into<RobotId>) -> Self {
        Self::new(robot_id, RobotLifecycle::Idle)
    }

    pub fn with_held_item(mut self, item: ItemId) -> Self {
        self.held_item = Some(item);
        self
    }

    pub fn waiting_for(mut self, marker: impl Into<String>) -> Self {
        self.waiting_for = Some(marker.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Idle was reported or found while an item was held.
    HeldItemOnIdle,
    /// A bound robot was forced back to idle before pickup.
    AbandonedAssignment,
    /// Pickup reported an item other than the one bound to the robot.
    PickupMismatch,
    /// Dispatch targeted a robot that was not available.
    AssignToBusyRobot,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::HeldItemOnIdle => "held_item_on_idle",
            ViolationKind::AbandonedAssignment => "abandoned_assignment",
            ViolationKind::PickupMismatch => "pickup_mismatch",
            ViolationKind::AssignToBusyRobot => "assign_to_busy_robot",
        };
        f.write_str(name)
    }
}

/// Warning recorded when the coordinator repairs a broken invariant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvariantViolation {
    pub id: Uuid,
    pub robot_id: RobotId,
    pub kind: ViolationKind,
    pub item_id: Option<ItemId>,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl InvariantViolation {
    pub fn new(
        robot_id: impl Into<RobotId>,
        kind: ViolationKind,
        item_id: Option<ItemId>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            robot_id: robot_id.into(),
            kind,
            item_id,
            detail: detail.into(),
            occurred_at: Utc::now(),
        }
    }
}
