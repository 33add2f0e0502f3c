use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;

use scheduler_config::HeuristicConfig;
use scheduler_domain::{RobotId, RobotState, SchedulerError, SchedulerResult, TransferRequest};

/// Ranks a (robot, request) pairing for the scored dispatch policy. Higher is
/// better. Called with the coordinator lock held, so implementations must not
/// block.
pub trait AssignmentScorer: Send + Sync {
    fn score(&self, robot: &RobotState, request: &TransferRequest, now: DateTime<Utc>) -> f64;

    /// Feedback after `robot` placed the item of `request`.
    fn on_completed(&self, _robot: &RobotState, _request: &TransferRequest) {}

    fn name(&self) -> &str;
}

/// Scores by time spent waiting, which reproduces arrival order.
#[derive(Debug, Default)]
pub struct ArrivalOrderScorer;

impl AssignmentScorer for ArrivalOrderScorer {
    fn score(&self, _robot: &RobotState, request: &TransferRequest, now: DateTime<Utc>) -> f64 {
        request.wait_seconds(now)
    }

    fn name(&self) -> &str {
        "arrival"
    }
}

/// Ant-colony style scorer. Each completed transfer deposits pheromone on the
/// (robot, source station) trail and every trail evaporates a little, so
/// robots drift toward the sources they have recently served. Waiting time is
/// added on top so old requests keep climbing.
pub struct PheromoneScorer {
    deposit: f64,
    evaporation: f64,
    age_weight: f64,
    trails: Mutex<HashMap<(RobotId, String), f64>>,
}

impl PheromoneScorer {
    pub fn new(deposit: f64, evaporation: f64, age_weight: f64) -> Self {
        Self {
            deposit,
            evaporation: evaporation.clamp(0.0, 1.0),
            age_weight,
            trails: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &HeuristicConfig) -> Self {
        Self::new(config.deposit, config.evaporation, config.age_weight)
    }

    pub fn trail(&self, robot_id: &str, station: &str) -> f64 {
        let trails = self.trails.lock().unwrap_or_else(|e| e.into_inner());
        trails
            .get(&(robot_id.to_string(), station.to_string()))
            .copied()
            .unwrap_or(0.0)
    }
}

impl AssignmentScorer for PheromoneScorer {
    fn score(&self, robot: &RobotState, request: &TransferRequest, now: DateTime<Utc>) -> f64 {
        self.trail(&robot.id, &request.source) + self.age_weight * request.wait_seconds(now)
    }

    fn on_completed(&self, robot: &RobotState, request: &TransferRequest) {
        let mut trails = self.trails.lock().unwrap_or_else(|e| e.into_inner());
        let keep = 1.0 - self.evaporation;
        trails.retain(|_, level| {
            *level *= keep;
            *level > f64::EPSILON
        });
        *trails
            .entry((robot.id.clone(), request.source.clone()))
            .or_insert(0.0) += self.deposit;
        debug!(
            robot_id = %robot.id,
            station = %request.source,
            trails = trails.len(),
            "pheromone deposited"
        );
    }

    fn name(&self) -> &str {
        "pheromone"
    }
}

impl fmt::Debug for PheromoneScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PheromoneScorer")
            .field("deposit", &self.deposit)
            .field("evaporation", &self.evaporation)
            .field("age_weight", &self.age_weight)
            .finish_non_exhaustive()
    }
}

/// Build the scorer named in the heuristic configuration.
pub fn build_scorer(config: &HeuristicConfig) -> SchedulerResult<Arc<dyn AssignmentScorer>> {
    match config.scorer.as_str() {
        "arrival" => Ok(Arc::new(ArrivalOrderScorer)),
        "pheromone" => Ok(Arc::new(PheromoneScorer::from_config(config))),
        other => Err(SchedulerError::config_error(format!(
            "unknown heuristic scorer: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scheduler_domain::RobotRegistration;

    fn robot(id: &str) -> RobotState {
        RobotState::new(RobotRegistration::new(id), 0)
    }

    #[test]
    fn test_arrival_scorer_prefers_older_requests() {
        let now = Utc::now();
        let mut old = TransferRequest::new(1, "carrier-0", "PM1");
        old.enqueued_at = now - Duration::seconds(10);
        let mut young = TransferRequest::new(2, "carrier-0", "PM1");
        young.enqueued_at = now - Duration::seconds(1);

        let scorer = ArrivalOrderScorer;
        let r1 = robot("R1");
        assert!(scorer.score(&r1, &old, now) > scorer.score(&r1, &young, now));
    }

    #[test]
    fn test_pheromone_deposit_and_evaporation() {
        let scorer = PheromoneScorer::new(1.0, 0.5, 0.0);
        let r1 = robot("R1");
        let request = TransferRequest::new(1, "carrier-3", "PM2");

        scorer.on_completed(&r1, &request);
        assert!((scorer.trail("R1", "carrier-3") - 1.0).abs() < 1e-9);

        scorer.on_completed(&r1, &TransferRequest::new(2, "carrier-4", "PM2"));
        assert!((scorer.trail("R1", "carrier-3") - 0.5).abs() < 1e-9);
        assert!((scorer.trail("R1", "carrier-4") - 1.0).abs() < 1e-9);
        assert_eq!(scorer.trail("R2", "carrier-3"), 0.0);
    }

    #[test]
    fn test_pheromone_trail_raises_score() {
        let scorer = PheromoneScorer::new(2.0, 0.0, 0.0);
        let r1 = robot("R1");
        let familiar = TransferRequest::new(1, "carrier-1", "PM1");
        let unknown = TransferRequest::new(2, "carrier-2", "PM1");
        scorer.on_completed(&r1, &familiar);

        let now = Utc::now();
        assert!(scorer.score(&r1, &familiar, now) > scorer.score(&r1, &unknown, now));
    }

    #[test]
    fn test_build_scorer_from_config() {
        let mut config = HeuristicConfig::default();
        assert_eq!(build_scorer(&config).unwrap().name(), "pheromone");

        config.scorer = "arrival".to_string();
        assert_eq!(build_scorer(&config).unwrap().name(), "arrival");

        config.scorer = "genetic".to_string();
        assert!(build_scorer(&config).is_err());
    }
}
