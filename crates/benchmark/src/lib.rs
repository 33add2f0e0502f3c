//! Benchmark harness: a seeded workload, one simulated agent per robot, and
//! a per-strategy pass/fail report.

pub mod harness;
pub mod report;
pub mod robot_agent;
pub mod shutdown;
pub mod workload;

pub use harness::BenchmarkHarness;
pub use report::{BenchmarkSummary, RunReport, Verdict};
pub use robot_agent::{AgentSummary, Completion, RobotAgent};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use workload::Workload;
