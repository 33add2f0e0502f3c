pub mod app_config;
pub mod benchmark;
pub mod coordinator;
pub mod observability;
pub mod strategies;

pub use app_config::*;
pub use benchmark::*;
pub use coordinator::*;
pub use observability::*;
pub use strategies::*;
