use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transfer::TransferRequest;
use crate::{SchedulerError, SchedulerResult};

/// Stable robot identifier, unique per coordinator.
pub type RobotId = String;
pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotLifecycle {
    Idle,
    Busy,
    Carrying,
}

impl RobotLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotLifecycle::Idle => "idle",
            RobotLifecycle::Busy => "busy",
            RobotLifecycle::Carrying => "carrying",
        }
    }
}

impl fmt::Display for RobotLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotLifecycle {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RobotLifecycle::Idle),
            "busy" => Ok(RobotLifecycle::Busy),
            "carrying" => Ok(RobotLifecycle::Carrying),
            other => Err(SchedulerError::config_error(format!(
                "invalid robot state: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotRegistration {
    pub robot_id: RobotId,
    /// Capabilities (zones, end-effector types) this robot serves. Empty means
    /// the robot can serve any request.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Station the robot is parked at when registered.
    #[serde(default)]
    pub home_station: Option<String>,
}

impl RobotRegistration {
    pub fn new(robot_id: impl Into<RobotId>) -> Self {
        Self {
            robot_id: robot_id.into(),
            capabilities: Vec::new(),
            home_station: None,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_home_station(mut self, station: impl Into<String>) -> Self {
        self.home_station = Some(station.into());
        self
    }
}

/// Per-robot lifecycle record owned by the dispatch coordinator.
///
/// `state == Carrying` iff `held_item` is set, and `state == Idle` implies
/// `held_item` is unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotState {
    pub id: RobotId,
    pub state: RobotLifecycle,
    pub held_item: Option<ItemId>,
    pub waiting_for: Option<String>,
    pub capabilities: Vec<String>,
    /// Destination of the last transfer this robot completed.
    pub location: Option<String>,
    /// Registration order, used as the dispatch tie-break.
    pub ordinal: usize,
    pub updated_at: DateTime<Utc>,
}

impl RobotState {
    pub fn new(registration: RobotRegistration, ordinal: usize) -> Self {
        Self {
            id: registration.robot_id,
            state: RobotLifecycle::Idle,
            held_item: None,
            waiting_for: None,
            capabilities: registration.capabilities,
            location: registration.home_station,
            ordinal,
            updated_at: Utc::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == RobotLifecycle::Idle
    }

    /// Idle and holding nothing.
    pub fn is_available(&self) -> bool {
        self.is_idle() && self.held_item.is_none()
    }

    pub fn can_serve(&self, request: &TransferRequest) -> bool {
        match &request.required_capability {
            None => true,
            Some(_) if self.capabilities.is_empty() => true,
            Some(capability) => self.capabilities.iter().any(|c| c == capability),
        }
    }

    pub fn invariant_holds(&self) -> bool {
        match self.state {
            RobotLifecycle::Idle => self.held_item.is_none(),
            RobotLifecycle::Busy => self.held_item.is_none(),
            RobotLifecycle::Carrying => self.held_item.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_robot_is_available() {
        let robot = RobotState::new(RobotRegistration::new("R1"), 0);
        assert_eq!(robot.state, RobotLifecycle::Idle);
        assert!(robot.is_available());
        assert!(robot.invariant_holds());
    }

    #[test]
    fn test_lifecycle_parse_and_display() {
        assert_eq!("Carrying".parse::<RobotLifecycle>().unwrap(), RobotLifecycle::Carrying);
        assert_eq!(RobotLifecycle::Busy.to_string(), "busy");
        assert!("parked".parse::<RobotLifecycle>().is_err());
    }

    #[test]
    fn test_capability_matching() {
        let general = RobotState::new(RobotRegistration::new("R1"), 0);
        let vacuum = RobotState::new(
            RobotRegistration::new("R2").with_capabilities(["vacuum"]),
            1,
        );

        let plain = TransferRequest::new(1, "LP1", "PM1");
        let needs_vacuum = TransferRequest::new(2, "LP1", "PM1").with_capability("vacuum");
        let needs_edge = TransferRequest::new(3, "LP1", "PM1").with_capability("edge-grip");

        assert!(general.can_serve(&plain));
        assert!(general.can_serve(&needs_edge));
        assert!(vacuum.can_serve(&plain));
        assert!(vacuum.can_serve(&needs_vacuum));
        assert!(!vacuum.can_serve(&needs_edge));
    }

    #[test]
    fn test_invariant_detects_idle_with_item() {
        let mut robot = RobotState::new(RobotRegistration::new("R1"), 0);
        robot.held_item = Some(7);
        assert!(!robot.invariant_holds());
        assert!(!robot.is_available());
    }
}
