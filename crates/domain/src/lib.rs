//! Robot, transfer and transition-table model shared by the dispatcher and
//! the benchmark harness.

pub mod events;
pub mod robot;
pub mod transfer;
pub mod transition;

pub use events::*;
pub use robot::*;
pub use scheduler_errors::{SchedulerError, SchedulerResult};
pub use transfer::*;
pub use transition::*;
