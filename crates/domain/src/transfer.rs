use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::robot::{ItemId, RobotId};

/// Request to move one item from a source station to a destination station.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRequest {
    pub item_id: ItemId,
    pub source: String,
    pub destination: String,
    pub enqueued_at: DateTime<Utc>,
    /// Higher is served first when the priority discipline is active.
    pub priority: Option<u8>,
    pub required_capability: Option<String>,
}

impl TransferRequest {
    pub fn new(item_id: ItemId, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            item_id,
            source: source.into(),
            destination: destination.into(),
            enqueued_at: Utc::now(),
            priority: None,
            required_capability: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    pub fn effective_priority(&self) -> u8 {
        self.priority.unwrap_or(0)
    }

    pub fn wait_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.enqueued_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A request bound to a robot, delivered on the robot's assignment channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub robot_id: RobotId,
    pub request: TransferRequest,
    pub dispatched_at: DateTime<Utc>,
    /// True when the request waited in the queue before being bound.
    pub from_queue: bool,
}

impl Assignment {
    pub fn item_id(&self) -> ItemId {
        self.request.item_id
    }
}
