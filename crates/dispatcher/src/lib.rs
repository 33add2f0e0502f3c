//! Dispatch coordination for the robot fleet: the invariant-enforcing
//! coordinator, its pending-request queue, assignment scoring, and the
//! interchangeable coordination strategies built on top of it.

pub mod coordinator;
pub mod queue;
pub mod scoring;
pub mod strategies;

pub use coordinator::{
    AssignmentReceiver, CoordinatorSettings, DispatchCoordinator, DispatchOutcome,
    DispatchPolicy, DispatchStats, StateUpdate,
};
pub use queue::{DispatchQueue, QueueDiscipline, QueuedRequest};
pub use scoring::{build_scorer, ArrivalOrderScorer, AssignmentScorer, PheromoneScorer};
pub use strategies::{
    build_strategy, build_strategy_by_code, AutonomousStrategy, CommunicationMode,
    CoordinationStrategy, EventPushStrategy, HeuristicStrategy, LockPollingStrategy,
    PubSubDedicatedStrategy, PubSubSingleStrategy, StrategyKind, SynchronizedBatchStrategy,
};
