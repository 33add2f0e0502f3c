use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use scheduler_config::BenchmarkConfig;
use scheduler_domain::{ItemId, TransferRequest};

/// Deterministic stream of transfer requests: for every cycle, every carrier
/// group releases its items in order. Item ids are unique across the run;
/// destinations and priorities come from a seeded generator.
#[derive(Debug)]
pub struct Workload {
    carrier_groups: usize,
    items_per_group: usize,
    cycles: usize,
    stations: usize,
    priority_levels: u8,
    rng: StdRng,
    next_index: usize,
}

impl Workload {
    pub fn from_config(config: &BenchmarkConfig) -> Self {
        Self {
            carrier_groups: config.carrier_groups,
            items_per_group: config.items_per_group,
            cycles: config.cycles,
            stations: config.stations.max(1),
            priority_levels: config.priority_levels,
            rng: StdRng::seed_from_u64(config.seed),
            next_index: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.carrier_groups * self.items_per_group * self.cycles
    }
}

impl Iterator for Workload {
    type Item = TransferRequest;

    fn next(&mut self) -> Option<TransferRequest> {
        if self.next_index >= self.total() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        let group = (index / self.items_per_group) % self.carrier_groups;
        let station = self.rng.random_range(1..=self.stations);
        let mut request = TransferRequest::new(
            index as ItemId + 1,
            format!("carrier-{group}"),
            format!("PM{station}"),
        );
        if self.priority_levels > 0 {
            request.priority = Some(self.rng.random_range(0..self.priority_levels));
        }
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total() - self.next_index;
        (remaining, Some(remaining))
    }
}
