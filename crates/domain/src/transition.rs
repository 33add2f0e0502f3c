//! Data-driven robot lifecycle table.
//!
//! The table arrives already deserialized (from configuration or built in
//! code) and the coordinator only ever looks edges up in it. `validate` is the
//! gate a strategy runs before starting: a table that could let a robot hold
//! two items, or reach idle while holding one, is rejected.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::robot::RobotLifecycle;
use crate::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotEvent {
    Dispatch,
    PickupConfirmed,
    PlaceConfirmed,
    ForceIdle,
}

impl RobotEvent {
    /// Map an externally requested state onto the event that would produce it.
    /// `Dispatch` is never externally requested.
    pub fn classify(current: RobotLifecycle, requested: RobotLifecycle) -> Option<Self> {
        use RobotLifecycle::*;
        match (current, requested) {
            (Busy, Carrying) => Some(RobotEvent::PickupConfirmed),
            (Carrying, Idle) => Some(RobotEvent::PlaceConfirmed),
            (_, Idle) => Some(RobotEvent::ForceIdle),
            _ => None,
        }
    }
}

impl fmt::Display for RobotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RobotEvent::Dispatch => "dispatch",
            RobotEvent::PickupConfirmed => "pickup_confirmed",
            RobotEvent::PlaceConfirmed => "place_confirmed",
            RobotEvent::ForceIdle => "force_idle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    SetHeldItem,
    ClearHeldItem,
    ReleaseAssignment,
    RequeueAssignment,
    DrainQueue,
}

/// One `(from, event) -> (to, actions)` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: RobotLifecycle,
    pub event: RobotEvent,
    pub to: RobotLifecycle,
    #[serde(default)]
    pub actions: Vec<TransitionAction>,
}

impl TransitionRule {
    pub fn new(
        from: RobotLifecycle,
        event: RobotEvent,
        to: RobotLifecycle,
        actions: &[TransitionAction],
    ) -> Self {
        Self {
            from,
            event,
            to,
            actions: actions.to_vec(),
        }
    }

    pub fn has_action(&self, action: TransitionAction) -> bool {
        self.actions.contains(&action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTable {
    pub rules: Vec<TransitionRule>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransitionTable {
    pub fn new(rules: Vec<TransitionRule>) -> Self {
        Self { rules }
    }

    /// idle -> busy -> carrying -> idle, draining the queue whenever a robot
    /// comes back to idle.
    pub fn standard() -> Self {
        use RobotEvent::*;
        use RobotLifecycle::*;
        use TransitionAction::*;

        Self::new(vec![
            TransitionRule::new(Idle, Dispatch, Busy, &[]),
            TransitionRule::new(Busy, PickupConfirmed, Carrying, &[SetHeldItem]),
            TransitionRule::new(
                Carrying,
                PlaceConfirmed,
                Idle,
                &[ClearHeldItem, ReleaseAssignment, DrainQueue],
            ),
            TransitionRule::new(
                Busy,
                ForceIdle,
                Idle,
                &[ClearHeldItem, RequeueAssignment, DrainQueue],
            ),
            TransitionRule::new(Idle, ForceIdle, Idle, &[ClearHeldItem, DrainQueue]),
        ])
    }

    /// Same edges as `standard` but robots returning to idle leave the queue
    /// alone; the owning strategy decides when work is pulled.
    pub fn manual_drain() -> Self {
        Self::standard().without_action(TransitionAction::DrainQueue)
    }

    pub fn without_action(mut self, action: TransitionAction) -> Self {
        for rule in &mut self.rules {
            rule.actions.retain(|a| *a != action);
        }
        self
    }

    pub fn lookup(&self, from: RobotLifecycle, event: RobotEvent) -> Option<&TransitionRule> {
        self.rules
            .iter()
            .find(|rule| rule.from == from && rule.event == event)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        use RobotEvent::*;
        use RobotLifecycle::*;
        use TransitionAction::*;

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert((rule.from, rule.event)) {
                return Err(invalid(format!(
                    "duplicate edge for ({}, {})",
                    rule.from, rule.event
                )));
            }
            if rule.to == Busy && rule.event != Dispatch {
                return Err(invalid(format!(
                    "only dispatch may enter busy, found ({}, {})",
                    rule.from, rule.event
                )));
            }
            if rule.to == Carrying && !rule.has_action(SetHeldItem) {
                return Err(invalid(format!(
                    "edge ({}, {}) enters carrying without set_held_item",
                    rule.from, rule.event
                )));
            }
            if rule.to == Idle && !rule.has_action(ClearHeldItem) {
                return Err(invalid(format!(
                    "edge ({}, {}) enters idle without clear_held_item",
                    rule.from, rule.event
                )));
            }
            if rule.from == Busy
                && rule.to == Idle
                && !(rule.has_action(ReleaseAssignment) || rule.has_action(RequeueAssignment))
            {
                return Err(invalid(
                    "forced idle from busy must release or requeue the assignment",
                ));
            }
        }

        let required = [
            (Idle, Dispatch, Busy),
            (Busy, PickupConfirmed, Carrying),
            (Carrying, PlaceConfirmed, Idle),
            // An external request for idle is always applied and repaired.
            (Busy, ForceIdle, Idle),
            (Idle, ForceIdle, Idle),
        ];
        for (from, event, to) in required {
            match self.lookup(from, event) {
                Some(rule) if rule.to == to => {}
                Some(rule) => {
                    return Err(invalid(format!(
                        "({from}, {event}) must lead to {to}, found {}",
                        rule.to
                    )))
                }
                None => return Err(invalid(format!("missing edge ({from}, {event})"))),
            }
        }
        if let Some(rule) = self.lookup(Carrying, PlaceConfirmed) {
            if !rule.has_action(ReleaseAssignment) {
                return Err(invalid("place_confirmed must release the assignment"));
            }
        }

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidTransitionTable(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use RobotLifecycle::*;

    #[test]
    fn test_standard_table_is_valid() {
        let table = TransitionTable::standard();
        assert!(table.validate().is_ok());

        let place = table.lookup(Carrying, RobotEvent::PlaceConfirmed).unwrap();
        assert_eq!(place.to, Idle);
        assert!(place.has_action(TransitionAction::DrainQueue));
    }

    #[test]
    fn test_manual_drain_table_has_no_drain() {
        let table = TransitionTable::manual_drain();
        assert!(table.validate().is_ok());
        assert!(table
            .rules
            .iter()
            .all(|rule| !rule.has_action(TransitionAction::DrainQueue)));
    }

    #[test]
    fn test_classify_requested_states() {
        assert_eq!(
            RobotEvent::classify(Busy, Carrying),
            Some(RobotEvent::PickupConfirmed)
        );
        assert_eq!(
            RobotEvent::classify(Carrying, Idle),
            Some(RobotEvent::PlaceConfirmed)
        );
        assert_eq!(RobotEvent::classify(Busy, Idle), Some(RobotEvent::ForceIdle));
        assert_eq!(RobotEvent::classify(Idle, Idle), Some(RobotEvent::ForceIdle));
        assert_eq!(RobotEvent::classify(Idle, Carrying), None);
        assert_eq!(RobotEvent::classify(Idle, Busy), None);
        assert_eq!(RobotEvent::classify(Carrying, Busy), None);
    }

    #[test]
    fn test_validate_rejects_idle_without_clear() {
        let mut table = TransitionTable::standard();
        for rule in &mut table.rules {
            if rule.event == RobotEvent::PlaceConfirmed {
                rule.actions.retain(|a| *a != TransitionAction::ClearHeldItem);
            }
        }
        let err = table.validate().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTransitionTable(_)));
    }

    #[test]
    fn test_validate_rejects_missing_and_duplicate_edges() {
        let mut missing = TransitionTable::standard();
        missing
            .rules
            .retain(|rule| rule.event != RobotEvent::PickupConfirmed);
        assert!(missing.validate().is_err());

        let mut duplicate = TransitionTable::standard();
        let first = duplicate.rules[0].clone();
        duplicate.rules.push(first);
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_external_entry_into_busy() {
        let mut table = TransitionTable::standard();
        table.rules.push(TransitionRule::new(
            Carrying,
            RobotEvent::ForceIdle,
            Busy,
            &[],
        ));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_table_deserializes_from_toml() {
        let source = r#"
[[rules]]
from = "idle"
event = "dispatch"
to = "busy"

[[rules]]
from = "busy"
event = "pickup_confirmed"
to = "carrying"
actions = ["set_held_item"]

[[rules]]
from = "carrying"
event = "place_confirmed"
to = "idle"
actions = ["clear_held_item", "release_assignment", "drain_queue"]

[[rules]]
from = "busy"
event = "force_idle"
to = "idle"
actions = ["clear_held_item", "requeue_assignment"]

[[rules]]
from = "idle"
event = "force_idle"
to = "idle"
actions = ["clear_held_item"]
"#;
        let table: TransitionTable = toml::from_str(source).unwrap();
        assert_eq!(table.rules.len(), 5);
        assert!(table.validate().is_ok());
        assert!(table
            .lookup(Busy, RobotEvent::ForceIdle)
            .unwrap()
            .has_action(TransitionAction::RequeueAssignment));
    }

    #[test]
    fn test_validate_requires_forced_idle_edges() {
        for from in [Busy, Idle] {
            let mut table = TransitionTable::standard();
            table
                .rules
                .retain(|rule| !(rule.from == from && rule.event == RobotEvent::ForceIdle));
            let err = table.validate().unwrap_err();
            assert!(err.to_string().contains("force_idle"), "{err}");
        }
    }
}
