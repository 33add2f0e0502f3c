//! Pending transfer requests owned by the dispatch coordinator.
//!
//! Entries are kept in arrival (`seq`) order. A requeued request keeps its
//! original sequence number, so it goes back to the position it held. Each
//! pop only considers entries the caller's predicate accepts (capability
//! matching). An entry that has been overtaken `starvation_limit` times is
//! served next whatever the discipline says.

use std::collections::VecDeque;

use scheduler_domain::TransferRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDiscipline {
    /// Oldest compatible request first.
    Fifo,
    /// Highest priority first, arrival order among equal priorities.
    Priority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRequest {
    pub seq: u64,
    pub request: TransferRequest,
    /// Times a younger compatible request was served ahead of this one.
    pub bypassed: u32,
}

#[derive(Debug)]
pub struct DispatchQueue {
    entries: VecDeque<QueuedRequest>,
    next_seq: u64,
    discipline: QueueDiscipline,
    starvation_limit: u32,
}

impl DispatchQueue {
    pub fn new(discipline: QueueDiscipline, starvation_limit: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            discipline,
            starvation_limit: starvation_limit.max(1),
        }
    }

    pub fn fifo() -> Self {
        Self::new(QueueDiscipline::Fifo, u32::MAX)
    }

    pub fn discipline(&self) -> QueueDiscipline {
        self.discipline
    }

    /// Reserve an arrival number without queueing. Immediately dispatched
    /// requests take one too so a later requeue lands in arrival order.
    pub fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn push(&mut self, request: TransferRequest) -> u64 {
        let seq = self.allocate_seq();
        self.push_with_seq(seq, request);
        seq
    }

    pub fn push_with_seq(&mut self, seq: u64, request: TransferRequest) {
        self.insert(QueuedRequest {
            seq,
            request,
            bypassed: 0,
        });
    }

    /// Put a previously dispatched request back at its original position.
    pub fn requeue(&mut self, seq: u64, request: TransferRequest) {
        self.push_with_seq(seq, request);
    }

    fn insert(&mut self, entry: QueuedRequest) {
        match self.entries.back() {
            Some(last) if last.seq > entry.seq => {
                let position = self.entries.partition_point(|e| e.seq < entry.seq);
                self.entries.insert(position, entry);
            }
            _ => self.entries.push_back(entry),
        }
    }

    /// Remove the next request the discipline selects among those `accept`
    /// allows.
    pub fn pop_next<F>(&mut self, accept: F) -> Option<QueuedRequest>
    where
        F: Fn(&TransferRequest) -> bool,
    {
        match self.discipline {
            QueueDiscipline::Fifo => {
                // Nothing older is skipped for being outranked, so no
                // bypass bookkeeping is needed.
                let index = self.entries.iter().position(|e| accept(&e.request))?;
                self.entries.remove(index)
            }
            QueueDiscipline::Priority => self.select(usize::MAX, accept, |request| {
                f64::from(request.effective_priority())
            }),
        }
    }

    /// Remove the highest scoring request among the first `lookahead`
    /// compatible ones. Ties go to the older request.
    pub fn pop_best_by<F, S>(&mut self, lookahead: usize, accept: F, score: S) -> Option<QueuedRequest>
    where
        F: Fn(&TransferRequest) -> bool,
        S: Fn(&TransferRequest) -> f64,
    {
        self.select(lookahead.max(1), accept, score)
    }

    fn select<F, S>(&mut self, lookahead: usize, accept: F, score: S) -> Option<QueuedRequest>
    where
        F: Fn(&TransferRequest) -> bool,
        S: Fn(&TransferRequest) -> f64,
    {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| accept(&e.request))
            .map(|(index, _)| index)
            .take(lookahead)
            .collect();

        let starving = candidates
            .iter()
            .copied()
            .find(|&index| self.entries[index].bypassed >= self.starvation_limit);

        let chosen = match starving {
            Some(index) => index,
            None => {
                let mut best: Option<(usize, f64)> = None;
                for &index in &candidates {
                    let value = score(&self.entries[index].request);
                    match best {
                        Some((_, top)) if value <= top => {}
                        _ => best = Some((index, value)),
                    }
                }
                best?.0
            }
        };

        for &index in candidates.iter().take_while(|&&index| index < chosen) {
            let entry = &mut self.entries[index];
            entry.bypassed = entry.bypassed.saturating_add(1);
        }

        self.entries.remove(chosen)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.entries.iter()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::fifo()
    }
}
