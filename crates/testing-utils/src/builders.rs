//! Test data builders for transfer requests and robot registrations.

use chrono::{DateTime, Utc};
use scheduler_domain::{ItemId, RobotRegistration, TransferRequest};

/// Builder for creating test TransferRequest values
pub struct TransferRequestBuilder {
    request: TransferRequest,
}

impl TransferRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: TransferRequest::new(1, "carrier-0", "PM1"),
        }
    }

    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.request.item_id = item_id;
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.request.source = source.to_string();
        self
    }

    pub fn with_destination(mut self, destination: &str) -> Self {
        self.request.destination = destination.to_string();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.request.priority = Some(priority);
        self
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        self.request.required_capability = Some(capability.to_string());
        self
    }

    pub fn enqueued_at(mut self, at: DateTime<Utc>) -> Self {
        self.request.enqueued_at = at;
        self
    }

    pub fn build(self) -> TransferRequest {
        self.request
    }

    /// `count` requests with consecutive item ids starting at `first`.
    pub fn batch(first: ItemId, count: usize) -> Vec<TransferRequest> {
        (0..count as ItemId)
            .map(|offset| {
                TransferRequestBuilder::new()
                    .with_item(first + offset)
                    .with_destination(&format!("PM{}", offset % 4 + 1))
                    .build()
            })
            .collect()
    }
}

impl Default for TransferRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test RobotRegistration values
pub struct RobotRegistrationBuilder {
    registration: RobotRegistration,
}

impl RobotRegistrationBuilder {
    pub fn new(robot_id: &str) -> Self {
        Self {
            registration: RobotRegistration::new(robot_id),
        }
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        self.registration.capabilities.push(capability.to_string());
        self
    }

    pub fn with_home_station(mut self, station: &str) -> Self {
        self.registration.home_station = Some(station.to_string());
        self
    }

    pub fn build(self) -> RobotRegistration {
        self.registration
    }

    /// Registrations `R1..=Rn`.
    pub fn fleet(count: usize) -> Vec<RobotRegistration> {
        (1..=count)
            .map(|n| RobotRegistrationBuilder::new(&format!("R{n}")).build())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_defaults_and_overrides() {
        let request = TransferRequestBuilder::new()
            .with_item(42)
            .with_priority(3)
            .with_capability("vacuum")
            .build();
        assert_eq!(request.item_id, 42);
        assert_eq!(request.source, "carrier-0");
        assert_eq!(request.priority, Some(3));
        assert_eq!(request.required_capability.as_deref(), Some("vacuum"));
    }

    #[test]
    fn test_batch_and_fleet() {
        let batch = TransferRequestBuilder::batch(10, 5);
        let items: Vec<ItemId> = batch.iter().map(|r| r.item_id).collect();
        assert_eq!(items, vec![10, 11, 12, 13, 14]);
        assert_eq!(batch[4].destination, "PM1");

        let fleet = RobotRegistrationBuilder::fleet(3);
        let ids: Vec<&str> = fleet.iter().map(|r| r.robot_id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2", "R3"]);
    }
}
